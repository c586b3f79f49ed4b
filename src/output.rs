use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use oa_session::{Notifier, SessionError};
use std::time::Duration;

/// Spinner on stderr while a network call runs
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spinner_success(pb: &ProgressBar, message: &str) {
    pb.finish_and_clear();
    eprintln!("{} {}", style("✔").green(), message);
}

pub fn spinner_error(pb: &ProgressBar, err: &SessionError) {
    pb.finish_and_clear();
    eprintln!("{} {}", style("✘").red(), err.user_message());
}

/// Terminal stand-in for toasts and navigation
pub struct ConsoleNotifier;

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    fn error(&self, message: &str) {
        eprintln!("{} {}", style("error:").red().bold(), message);
    }

    async fn redirect(&self, _location: &str) {
        eprintln!(
            "{} session ended, sign in again with `oa-session login`",
            style("note:").yellow().bold()
        );
    }
}
