use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};
use tracing::debug;

/// Spinner shown on stderr while a model request is outstanding.
///
/// Disabled when stderr is not a terminal or `NO_COLOR` is set, so piped
/// output stays clean. Failures here never affect the request.
pub struct Progress {
    spinner: Option<ProgressBar>,
    started: Instant,
}

impl Progress {
    pub fn start(message: &str) -> Self {
        let enabled = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        let spinner = enabled.then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "])
                .template("{spinner:.green} {msg}")
            {
                pb.set_style(style);
            }
            pb.set_message(message.to_string());
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        });

        Self {
            spinner,
            started: Instant::now(),
        }
    }

    pub fn finish(self) {
        if let Some(pb) = &self.spinner {
            pb.finish_and_clear();
        }
        debug!(elapsed_ms = self.started.elapsed().as_millis() as u64, "request finished");
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}
