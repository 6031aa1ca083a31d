/// Rejection of a scan configuration (or of one of its enumerated fields).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("target must not be blank")]
    BlankTarget,
    #[error("invalid {field}: {value:?} (expected one of: {expected})")]
    InvalidField {
        field: &'static str,
        value: String,
        expected: String,
    },
}

impl ConfigError {
    /// Name of the configuration field that was rejected.
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankTarget => "target",
            Self::InvalidField { field, .. } => field,
        }
    }

    pub(crate) fn invalid<T: std::fmt::Display>(
        field: &'static str,
        value: &str,
        allowed: &[T],
    ) -> Self {
        let expected = allowed
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self::InvalidField {
            field,
            value: value.to_string(),
            expected,
        }
    }
}
