//! Error types for the capture pipeline

use std::io;

/// Result type alias for pipeline operations
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

/// Errors raised inside the capture pipeline.
///
/// None of these ever reach the caller of an instrumented operation. They
/// are returned from the explicit lifecycle calls (`start`, `shutdown`) and
/// from [`AggregateStore::ingest`](crate::AggregateStore::ingest), and are
/// logged everywhere else.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The drain thread could not be spawned. Measurement stays disabled
    /// until a later start succeeds.
    #[error("failed to spawn capture drain thread: {0}")]
    Spawn(#[from] io::Error),

    /// The aggregate store refused an event.
    #[error("aggregate store rejected event: {0}")]
    Ingest(String),

    /// The drain thread terminated by panicking.
    #[error("capture drain thread panicked: {0}")]
    DrainPanicked(String),
}

impl CaptureError {
    /// Create an ingestion error with the given message.
    pub fn ingest(message: impl Into<String>) -> Self {
        Self::Ingest(message.into())
    }
}

/// Render a panic payload as text for logging.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let static_payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(static_payload.as_ref()), "boom");

        let owned_payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned_payload.as_ref()), "owned");

        let other_payload: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(
            panic_message(other_payload.as_ref()),
            "non-string panic payload"
        );
    }

    #[test]
    fn test_error_display() {
        let err = CaptureError::ingest("store full");
        assert_eq!(err.to_string(), "aggregate store rejected event: store full");
    }
}
