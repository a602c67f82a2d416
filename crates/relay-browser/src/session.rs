//! Chromium over CDP with faked media permissions.

use crate::auth::StorageState;
use crate::error::{BrowserError, BrowserResult};
use crate::locator::Locator;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{GrantPermissionsParams, PermissionType};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Auto-accept the mic prompt and allow audio without a user gesture.
pub const MEDIA_FLAGS: [&str; 2] = [
    "--use-fake-ui-for-media-stream",
    "--autoplay-policy=no-user-gesture-required",
];

/// Poll interval for element waits.
const FIND_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Persistent profile (used by `login`); a throwaway profile otherwise.
    pub user_data_dir: Option<PathBuf>,
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(options: &LaunchOptions) -> BrowserResult<Self> {
        let mut builder = BrowserConfig::builder().window_size(1280, 900);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if let Some(exe) = &options.executable {
            builder = builder.chrome_executable(exe);
        }
        for arg in MEDIA_FLAGS.iter().copied().chain(options.extra_args.iter().map(String::as_str)) {
            builder = builder.arg(arg);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
        });
        let page = browser.new_page("about:blank").await?;
        info!("🌐 Browser launched");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Grant microphone capture for `origin` so the page never prompts.
    pub async fn grant_microphone(&self, origin: &str) -> BrowserResult<()> {
        let params = GrantPermissionsParams::builder()
            .permissions(vec![PermissionType::AudioCapture])
            .origin(origin)
            .build()
            .map_err(BrowserError::Launch)?;
        self.browser.execute(params).await?;
        info!("🎤 Microphone granted for {}", origin);
        Ok(())
    }

    pub async fn load_auth(&self, state: &StorageState) -> BrowserResult<()> {
        if state.cookies.is_empty() {
            return Ok(());
        }
        self.page.set_cookies(state.cookie_params()?).await?;
        Ok(())
    }

    /// Current cookies in snapshot form (what `login` writes to `auth.json`).
    pub async fn storage_state(&self) -> BrowserResult<StorageState> {
        let cookies = self.page.get_cookies().await?;
        Ok(StorageState::from_cookies(&cookies))
    }

    pub async fn goto(&self, url: &str) -> BrowserResult<()> {
        info!("🧭 Navigating to {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> BrowserResult<Element> {
        let element = match locator.xpath() {
            Some(xpath) => self.page.find_xpath(xpath).await?,
            None => self.page.find_element(locator.to_string()).await?,
        };
        Ok(element)
    }

    /// Poll until `locator` resolves, bounded by `timeout`.
    pub async fn wait_for(&self, locator: &Locator, timeout: Duration) -> BrowserResult<Element> {
        let poll = async {
            loop {
                match self.find(locator).await {
                    Ok(el) => return el,
                    Err(e) => debug!("{} not there yet: {}", locator, e),
                }
                tokio::time::sleep(FIND_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::ElementTimeout {
                selector: locator.to_string(),
                timeout,
            })
    }

    pub async fn click(&self, locator: &Locator, timeout: Duration) -> BrowserResult<()> {
        let element = self.wait_for(locator, timeout).await?;
        element.scroll_into_view().await?;
        element.click().await?;
        info!("🖱️ Clicked {}", locator);
        Ok(())
    }

    /// Click each step in order, waiting for it to become available first.
    pub async fn click_sequence(&self, steps: &[Locator], timeout: Duration) -> BrowserResult<()> {
        for step in steps {
            self.click(step, timeout).await?;
        }
        Ok(())
    }

    /// Evaluate a JS expression that yields a boolean.
    pub async fn eval_bool(&self, expression: String) -> BrowserResult<bool> {
        let result = self.page.evaluate(expression).await?;
        Ok(result.into_value::<bool>()?)
    }

    pub async fn screenshot<P: AsRef<Path>>(&self, path: P) -> BrowserResult<()> {
        let path = path.as_ref();
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await?;
        info!("📸 Screenshot saved as {}", path.display());
        Ok(())
    }

    pub async fn close(mut self) -> BrowserResult<()> {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        info!("👋 Browser closed");
        Ok(())
    }
}
