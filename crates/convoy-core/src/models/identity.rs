use serde::{Deserialize, Serialize};

/// Caller identity established by the identity verifier.
///
/// `subject` is whatever claim the verifier exposed (email, username or `sub`);
/// it is empty when the verifier accepted the token without returning claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject.is_empty()
    }
}
