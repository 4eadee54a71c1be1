use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Translation errors
    #[error("Unknown {kind} name: {value}")]
    UnknownName { kind: &'static str, value: String },

    #[error("Unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: i64 },
}

impl Error {
    pub(crate) fn unknown_name(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownName {
            kind,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
