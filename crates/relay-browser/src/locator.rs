//! Element locators written in config as short strings.
//!
//! | prefix        | meaning                                    |
//! |---------------|--------------------------------------------|
//! | `text=Foo`    | element whose own text contains "Foo"      |
//! | `button=Join` | enabled `<button>` whose text contains it  |
//! | `aria=Play`   | `<button aria-label="Play">`               |
//! | `xpath=//…`   | raw XPath (a bare `//…` works too)         |
//! | anything else | CSS selector                               |

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
    Text(String),
    Button { label: String, enabled_only: bool },
    AriaButton(String),
}

impl Locator {
    /// XPath for the locator; `None` for plain CSS.
    pub fn xpath(&self) -> Option<String> {
        match self {
            Locator::Css(_) => None,
            Locator::XPath(x) => Some(x.clone()),
            Locator::Text(t) => Some(format!(
                "//*[text()[contains(normalize-space(.), {})]]",
                xpath_literal(t)
            )),
            Locator::Button { label, enabled_only } => Some(format!(
                "//button[contains(normalize-space(.), {}){}]",
                xpath_literal(label),
                if *enabled_only { " and not(@disabled)" } else { "" }
            )),
            Locator::AriaButton(label) => {
                Some(format!("//button[@aria-label={}]", xpath_literal(label)))
            }
        }
    }
}

/// Quote `s` as an XPath 1.0 string literal (no escape syntax, so mixed quotes need `concat`).
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

impl FromStr for Locator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty locator".to_string());
        }
        let locator = if let Some(t) = s.strip_prefix("text=") {
            Locator::Text(t.to_string())
        } else if let Some(b) = s.strip_prefix("button=") {
            Locator::Button {
                label: b.to_string(),
                enabled_only: true,
            }
        } else if let Some(a) = s.strip_prefix("aria=") {
            Locator::AriaButton(a.to_string())
        } else if let Some(x) = s.strip_prefix("xpath=") {
            Locator::XPath(x.to_string())
        } else if s.starts_with("//") {
            Locator::XPath(s.to_string())
        } else {
            Locator::Css(s.to_string())
        };
        Ok(locator)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(c) => write!(f, "{}", c),
            Locator::XPath(x) => write!(f, "xpath={}", x),
            Locator::Text(t) => write!(f, "text={}", t),
            Locator::Button { label, .. } => write!(f, "button={}", label),
            Locator::AriaButton(a) => write!(f, "aria={}", a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixes() {
        assert_eq!("text=Interactive mode".parse(), Ok(Locator::Text("Interactive mode".into())));
        assert_eq!(
            "button=Join".parse(),
            Ok(Locator::Button {
                label: "Join".into(),
                enabled_only: true
            })
        );
        assert_eq!("aria=Play audio".parse(), Ok(Locator::AriaButton("Play audio".into())));
        assert_eq!("//div[@id='x']".parse(), Ok(Locator::XPath("//div[@id='x']".into())));
        assert_eq!("div.speaking".parse(), Ok(Locator::Css("div.speaking".into())));
        assert!("  ".parse::<Locator>().is_err());
    }

    #[test]
    fn renders_xpath() {
        let join: Locator = "button=Join".parse().unwrap();
        assert_eq!(
            join.xpath().unwrap(),
            "//button[contains(normalize-space(.), 'Join') and not(@disabled)]"
        );
        assert_eq!(
            Locator::AriaButton("Play audio".into()).xpath().unwrap(),
            "//button[@aria-label='Play audio']"
        );
        assert!(Locator::Css("div".into()).xpath().is_none());
    }

    #[test]
    fn quotes_awkward_text() {
        assert_eq!(xpath_literal("Dr. Farsight Podcast"), "'Dr. Farsight Podcast'");
        assert_eq!(xpath_literal("Farsight's"), "\"Farsight's\"");
        assert_eq!(xpath_literal(r#"a'b"c"#), r#"concat('a', "'", 'b"c')"#);
    }
}
