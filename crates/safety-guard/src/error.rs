use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SafetyError {
    #[error("max relative target must be a finite, non-negative number of degrees (got {value} for {scope})")]
    InvalidLimit { scope: String, value: f64 },
}
