use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid configuration: {what}")]
    InvalidConfiguration { what: String },
}

impl CoreError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        CoreError::InvalidConfiguration { what: what.into() }
    }
}
