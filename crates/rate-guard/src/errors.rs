use marketgate_core_types::GateError;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum RateError {
    #[error("counter store failure: {0}")]
    Store(String),
    #[error("counter store returned an invalid count: {0}")]
    InvalidCount(String),
}

impl From<RateError> for GateError {
    fn from(value: RateError) -> Self {
        GateError::new(value.to_string())
    }
}
