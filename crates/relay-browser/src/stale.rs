//! Kill leftover automation browsers before a fresh session.

use sysinfo::System;
use tracing::{info, warn};

/// Case-insensitive substring match against any of `patterns`.
pub fn matches_browser(process_name: &str, patterns: &[String]) -> bool {
    let name = process_name.to_ascii_lowercase();
    patterns
        .iter()
        .any(|p| !p.is_empty() && name.contains(&p.to_ascii_lowercase()))
}

/// Kill every process whose name matches; returns how many were signalled.
pub fn kill_stale_browsers(patterns: &[String]) -> usize {
    let mut sys = System::new();
    sys.refresh_processes();
    let mut killed = 0;
    for (pid, process) in sys.processes() {
        if !matches_browser(process.name(), patterns) {
            continue;
        }
        if process.kill() {
            killed += 1;
        } else {
            warn!("⚠️ Could not kill {} (pid {})", process.name(), pid);
        }
    }
    if killed > 0 {
        info!("✅ Killed {} stale browser process(es)", killed);
    }
    killed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        let patterns = vec!["chromium".to_string()];
        assert!(matches_browser("chromium.exe", &patterns));
        assert!(matches_browser("Chromium Helper", &patterns));
        assert!(!matches_browser("chrome.exe", &patterns));
        assert!(!matches_browser("anything", &[String::new()]));
    }
}
