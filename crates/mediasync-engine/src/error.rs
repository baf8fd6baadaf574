use mediasync_core::AppError;
use mediasync_gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Local state contradicts what the write implies.
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    #[error(transparent)]
    Repository(#[from] AppError),

    #[error("Failed to enqueue job: {0}")]
    Queue(#[source] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Gateway(e) => e.into(),
            EngineError::Reconciliation(msg) => AppError::Reconciliation(msg),
            EngineError::Repository(e) => e,
            EngineError::Queue(source) => AppError::InternalWithSource {
                message: "Failed to enqueue transformation job".to_string(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasync_core::ErrorMetadata;

    #[test]
    fn test_reconciliation_is_server_error() {
        let err: AppError = EngineError::Reconciliation("previous document missing".into()).into();
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "RECONCILIATION_ERROR");
    }

    #[test]
    fn test_gateway_error_keeps_message() {
        let err: AppError =
            EngineError::from(GatewayError::QuotaExceeded("quota exceeded".into())).into();
        assert_eq!(err.http_status_code(), 502);
        assert!(err.to_string().contains("quota exceeded"));
    }
}
