use crate::domain::ports::toaster::{Toast, ToastError, ToastVariant, Toaster};
use std::sync::{Arc, Mutex, PoisonError};

/// Toaster that writes every toast to the log
#[derive(Clone, Default)]
pub struct TracingToaster;

impl TracingToaster {
    pub fn new() -> Self {
        Self
    }
}

impl Toaster for TracingToaster {
    fn show(&self, toast: Toast) -> Result<(), ToastError> {
        match toast.variant {
            ToastVariant::Destructive => {
                tracing::warn!(duration = ?toast.duration, "[toast] {}: {}", toast.title, toast.description)
            }
            ToastVariant::Default => {
                tracing::info!(duration = ?toast.duration, "[toast] {}: {}", toast.title, toast.description)
            }
        }
        Ok(())
    }
}

/// Mock implementation of Toaster for testing
/// Records all toasts shown instead of displaying them
#[derive(Clone, Default)]
pub struct MockToaster {
    shown: Arc<Mutex<Vec<Toast>>>,
    should_fail: bool,
}

impl MockToaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toaster that records every toast and then reports a delivery failure
    pub fn new_failing() -> Self {
        Self {
            shown: Arc::new(Mutex::new(Vec::new())),
            should_fail: true,
        }
    }

    /// Retrieve all toasts that have been shown
    pub fn shown(&self) -> Vec<Toast> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Toaster for MockToaster {
    fn show(&self, toast: Toast) -> Result<(), ToastError> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(toast);

        if self.should_fail {
            Err(ToastError("mock toaster failure".to_string()))
        } else {
            Ok(())
        }
    }
}
