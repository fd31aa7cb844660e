use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::import::ValidationError;

const MAX_IDENTITY_LEN: usize = 128;

/// An authenticated caller, as asserted by the upstream authenticator.
///
/// Identities scope database rows and name a directory under the uploads
/// area, so the accepted alphabet is deliberately path-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_IDENTITY_LEN
            && !trimmed.starts_with('.')
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'));

        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ValidationError::InvalidIdentity)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}
