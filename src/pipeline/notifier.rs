use tokio::sync::mpsc;

/// What the pipeline asks the surrounding UI to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    /// Show an error toast
    Error(String),
    /// Navigate to a location (the login entry point on 401)
    Redirect(String),
}

/// The user-facing surface: message toasts and navigation
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);

    async fn redirect(&self, location: &str);
}

/// Logs instead of showing anything. Default for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

#[async_trait::async_trait]
impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        tracing::warn!(reason = message, "request failed");
    }

    async fn redirect(&self, location: &str) {
        tracing::info!(location, "redirect requested");
    }
}

/// Forwards every event to a channel consumed by a UI loop
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn emit(&self, event: UiEvent) {
        // receiver gone means nobody is listening any more
        let _ = self.sender.send(event);
    }
}

#[async_trait::async_trait]
impl Notifier for ChannelNotifier {
    fn error(&self, message: &str) {
        self.emit(UiEvent::Error(message.to_string()));
    }

    async fn redirect(&self, location: &str) {
        self.emit(UiEvent::Redirect(location.to_string()));
    }
}
