//! Error types for the game host

use cellquest_core::CoreError;
use std::any::Any;
use std::net::IpAddr;
use thiserror::Error;

/// Errors a game script can see from its engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Script panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// Describe a panic payload caught from a script
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string payload".to_string());
        Self::Panicked(msg)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Core(CoreError::Serialization(e))
    }
}

/// Reasons a connect is refused
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Too many new sessions from {0}")]
    RateLimited(IpAddr),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        assert_eq!(EngineError::SessionClosed.to_string(), "Session closed");
        assert_eq!(
            EngineError::InvalidRequest("no options".into()).to_string(),
            "Invalid request: no options"
        );
    }

    #[test]
    fn test_panic_payloads() {
        let err = EngineError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "Script panicked: boom");
        let err = EngineError::from_panic(Box::new(format!("bad {}", 7)));
        assert_eq!(err.to_string(), "Script panicked: bad 7");
        let err = EngineError::from_panic(Box::new(42u8));
        assert_eq!(err.to_string(), "Script panicked: non-string payload");
    }

    #[test]
    fn test_json_error_wraps_core() {
        let err: EngineError = serde_json::from_str::<u8>("x").unwrap_err().into();
        assert!(matches!(err, EngineError::Core(CoreError::Serialization(_))));
    }
}
