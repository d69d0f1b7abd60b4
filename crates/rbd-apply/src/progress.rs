//! Progress line and throughput sampling.
//!
//! The meter redraws a single line on the diagnostic stream:
//!
//! ```text
//! [=========================                         ] (50%, 12.40 MiB/s)
//! [                   size unknown                   ] (??%, 3.00 KiB/s)
//! ```
//!
//! Throughput is sampled incrementally: bytes accumulate in a window that
//! is only turned into a rate once the clock has moved past the previous
//! sample. Between ticks the last rate is shown again. [`ProgressMeter::finish`]
//! ignores the window and divides the total by the whole elapsed time.

use std::io::{self, Write};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::ApplyConfig;

const RATE_UNITS: [&str; 5] = ["B/s", "KiB/s", "MiB/s", "GiB/s", "TiB/s"];

const UNKNOWN_SIZE_LABEL: &str = "size unknown";

pub struct ProgressMeter<W, C> {
    out: W,
    clock: C,
    bar_width: usize,
    enabled: bool,
    /// Bytes since the last rate sample.
    window_bytes: u64,
    total_bytes: u64,
    start: Duration,
    last_sample: Duration,
    /// Bytes per second.
    rate: f64,
}

impl<W: Write, C: Clock> ProgressMeter<W, C> {
    pub fn new(out: W, clock: C, config: &ApplyConfig) -> Self {
        let now = clock.now();
        Self {
            out,
            clock,
            bar_width: config.bar_width,
            enabled: config.progress,
            window_bytes: 0,
            total_bytes: 0,
            start: now,
            last_sample: now,
            rate: 0.0,
        }
    }

    /// Account for `bytes` just transferred and redraw at `position`.
    ///
    /// `size` is the declared image size, if any; it only affects the bar.
    ///
    /// # Errors
    ///
    /// Fails if the progress sink cannot be written.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&mut self, position: u64, bytes: u64, size: Option<u64>) -> io::Result<()> {
        self.window_bytes += bytes;
        self.total_bytes += bytes;

        let now = self.clock.now();
        if now > self.last_sample {
            let window = (now - self.last_sample).as_secs_f64();
            self.rate = self.window_bytes as f64 / window;
            self.window_bytes = 0;
            self.last_sample = now;
        }

        let percent = match size {
            Some(size) => format!("{}%", percent(position, size)),
            None => "??%".to_owned(),
        };
        let bar = render_bar(position, size, self.bar_width);
        self.draw(&bar, &percent)
    }

    /// Compute the overall rate, draw a full bar and end the line.
    ///
    /// A zero elapsed time is counted as one second.
    ///
    /// # Errors
    ///
    /// Fails if the progress sink cannot be written.
    #[allow(clippy::cast_precision_loss)]
    pub fn finish(&mut self) -> io::Result<()> {
        let elapsed = self.clock.now().saturating_sub(self.start);
        let secs = if elapsed.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f64()
        };
        self.rate = self.total_bytes as f64 / secs;

        let bar = "=".repeat(self.bar_width);
        self.draw(&bar, "100%")?;
        if self.enabled {
            self.out.write_all(b"\n")?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn draw(&mut self, bar: &str, percent: &str) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        write!(self.out, "\r[{bar}] ({percent}, {})", format_rate(self.rate))?;
        self.out.flush()
    }

    /// Current throughput estimate in bytes per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Whole percent of `position` within `size`, capped at 100.
/// An empty image counts as complete.
fn percent(position: u64, size: u64) -> u64 {
    if size == 0 {
        return 100;
    }
    let pct = u128::from(position) * 100 / u128::from(size);
    u64::try_from(pct.min(100)).unwrap_or(100)
}

/// Draw the bar body (without brackets) for `position` out of `size`.
///
/// With no size the bar holds a centred "size unknown" label instead.
pub fn render_bar(position: u64, size: Option<u64>, width: usize) -> String {
    let Some(size) = size else {
        let label: String = UNKNOWN_SIZE_LABEL.chars().take(width).collect();
        return format!("{label:^width$}");
    };

    let filled = if size == 0 {
        width
    } else {
        let cells = u128::from(position) * width as u128 / u128::from(size);
        usize::try_from(cells).unwrap_or(width).min(width)
    };

    let mut bar = "=".repeat(filled);
    bar.push_str(&" ".repeat(width - filled));
    bar
}

/// Format a byte rate using the largest binary unit not exceeding it.
///
/// ```text
///   512.0        → "512.00 B/s"
///   1536.0       → "1.50 KiB/s"
///   3 * 1024^3   → "3.00 GiB/s"
/// ```
pub fn format_rate(rate: f64) -> String {
    let mut value = rate;
    let mut unit = 0;
    while value >= 1024.0 && unit < RATE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", RATE_UNITS[unit])
}
