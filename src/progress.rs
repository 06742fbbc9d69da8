//! Download progress reporting using indicatif.
//!
//! The library reports through the [`DownloadProgress`] trait; the CLI
//! installs [`Progress`], which draws one bar per transfer on stderr.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress callback for file transfers.
pub trait DownloadProgress: Send + Sync {
    /// A transfer is starting. `total` is the size if known.
    fn on_start(&self, name: &str, total: Option<u64>);

    /// `bytes` more bytes were written.
    fn on_bytes(&self, bytes: u64);

    /// The transfer ended, successfully or not.
    fn on_finish(&self, name: &str, success: bool);
}

/// Progress reporter using indicatif.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter. With `quiet` nothing is drawn.
    ///
    /// ```
    /// use geofetch::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style(known_total: bool) -> ProgressStyle {
        let template = if known_total {
            "{spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})"
        } else {
            "{spinner:.green} {msg} {bytes} ({bytes_per_sec})"
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .progress_chars("=> ")
    }
}

impl DownloadProgress for Progress {
    fn on_start(&self, name: &str, total: Option<u64>) {
        if self.quiet {
            return;
        }
        let bar = match total {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        bar.set_style(Self::style(total.is_some()));
        bar.set_message(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        *self.bar.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
    }

    fn on_bytes(&self, bytes: u64) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            bar.inc(bytes);
        }
    }

    fn on_finish(&self, name: &str, success: bool) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if success {
                bar.finish_and_clear();
                log::debug!("Downloaded {} ({})", name, bytesize::ByteSize(bar.position()));
            } else {
                bar.abandon_with_message(format!("{name} failed"));
            }
        }
    }
}
