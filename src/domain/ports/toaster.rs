use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Default,
    Destructive,
}

/// Transient UI message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub duration: Option<Duration>,
    pub variant: ToastVariant,
}

#[derive(Debug, thiserror::Error)]
#[error("Toast delivery failed: {0}")]
pub struct ToastError(pub String);

/// Best-effort sink for transient UI messages.
/// Callers log failures and never propagate them.
pub trait Toaster: Send + Sync {
    fn show(&self, toast: Toast) -> Result<(), ToastError>;
}
