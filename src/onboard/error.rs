/// Terminal onboarding failures. Each message names the offending flag or
/// flag combination so the operator can fix the invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnboardError {
    /// A value required by the resolved choice or mode is absent.
    #[error("Missing {flag}{}", context_suffix(.context))]
    MissingCredential {
        flag: String,
        context: Option<String>,
    },

    #[error("Invalid {flag} \"{value}\" (use: {})", .allowed.join(", "))]
    InvalidEnumValue {
        flag: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("Invalid {flag} \"{value}\": expected {expected}")]
    InvalidValue {
        flag: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0}")]
    UnsafeCombination(String),

    #[error("Unsupported auth choice in non-interactive mode: {0}")]
    UnsupportedChoice(String),

    #[error("Multiple auth flags provided: {}. Pass exactly one, or select with --auth-choice.", .0.join(", "))]
    AmbiguousAuthChoice(Vec<String>),

    #[error("Gateway daemon install failed: {0}")]
    InstallFailure(String),
}

impl OnboardError {
    pub fn missing(flag: impl Into<String>) -> Self {
        Self::MissingCredential {
            flag: flag.into(),
            context: None,
        }
    }

    pub fn missing_for(flag: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingCredential {
            flag: flag.into(),
            context: Some(context.into()),
        }
    }
}

fn context_suffix(context: &Option<String>) -> String {
    context
        .as_deref()
        .map(|c| format!(" ({c})"))
        .unwrap_or_default()
}
