use simple_error::SimpleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid parameters, calls made in the wrong lifecycle state or dimension mismatches.
    #[error("configuration error: {0}")]
    Config(String),

    /// Numeric instability during integration. The run that hit it is aborted.
    #[error("runtime error at t = {t} ms: {reason}")]
    Runtime { t: usize, reason: String },

    #[error("monitor output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("monitor serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    pub fn config(reason: impl Into<String>) -> Self {
        SimError::Config(reason.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, SimError::Config(_))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, SimError::Runtime { .. })
    }
}

impl From<SimpleError> for SimError {
    fn from(err: SimpleError) -> Self {
        SimError::Config(err.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_error_becomes_config_error() {
        let err: SimError = SimpleError::new("max_weight must be finite").into();
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "configuration error: max_weight must be finite"
        );
    }

    #[test]
    fn runtime_error_message() {
        let err = SimError::Runtime {
            t: 12,
            reason: "membrane potential of neuron 3 is not finite".to_string(),
        };
        assert!(err.is_runtime());
        assert_eq!(
            err.to_string(),
            "runtime error at t = 12 ms: membrane potential of neuron 3 is not finite"
        );
    }
}
