//! Text level meter for `--monitor`. Observational only; never touches samples.

use crate::buffer::rms;
use std::io::Write;

/// Width of the bar in cells.
pub const METER_WIDTH: usize = 50;

/// Renders short-window RMS as `[█████     ] 0.123` on a single rewritten line.
#[derive(Debug, Clone)]
pub struct LevelMeter {
    width: usize,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self { width: METER_WIDTH }
    }
}

impl LevelMeter {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }

    /// Bar for a level in 0.0..=1.0 (values outside are clamped for the bar,
    /// the printed number is the raw level).
    pub fn render(&self, level: f32) -> String {
        let filled = ((level.clamp(0.0, 1.0) * self.width as f32) as usize).min(self.width);
        format!(
            "[{}{}] {:.3}",
            "█".repeat(filled),
            " ".repeat(self.width - filled),
            level
        )
    }

    /// RMS of `window` rendered and written over the current stderr line.
    pub fn show(&self, window: &[f32]) {
        let line = self.render(rms(window));
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r{}", line);
        let _ = err.flush();
    }

    /// Terminate the meter line.
    pub fn finish(&self) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err);
    }
}

/// Progress bar used by tone playback: `[#####     ] 3/10s`.
pub fn progress_bar(done: u64, total: u64, width: usize) -> String {
    let total = total.max(1);
    let filled = ((done.min(total) as usize) * width) / total as usize;
    format!(
        "[{}{}] {}/{}s",
        "#".repeat(filled),
        " ".repeat(width - filled),
        done.min(total),
        total
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_proportional_bar() {
        let meter = LevelMeter::new(10);
        assert_eq!(meter.render(0.0), "[          ] 0.000");
        assert_eq!(meter.render(0.5), "[█████     ] 0.500");
        assert_eq!(meter.render(1.7), "[██████████] 1.700");
    }

    #[test]
    fn progress_bar_fills_with_time() {
        assert_eq!(progress_bar(0, 3, 6), "[      ] 0/3s");
        assert_eq!(progress_bar(3, 3, 6), "[######] 3/3s");
        assert_eq!(progress_bar(9, 3, 6), "[######] 3/3s");
    }
}
