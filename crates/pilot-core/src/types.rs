use serde::{Deserialize, Serialize};

/// Identifier of the end user on whose behalf a turn runs.
pub type SubjectId = i64;

/// Opaque bearer credential forwarded to the backend.
///
/// `Debug` and `Display` are redacted so the token never ends up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Parse an `Authorization` header value, accepting both `Bearer <token>`
    /// and a bare token. The scheme is matched case-insensitively; empty
    /// values and a scheme with no token yield `None`.
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim_start();
        let token = match value.get(..6) {
            Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {
                let rest = &value[6..];
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    rest
                } else {
                    value
                }
            }
            _ => value,
        }
        .trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

/// The identity injected into every tool call of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub credential: Credential,
    pub subject_id: SubjectId,
}

impl Identity {
    pub fn new(credential: Credential, subject_id: SubjectId) -> Self {
        Self {
            credential,
            subject_id,
        }
    }

    /// Build an identity only when both parts are present and usable.
    pub fn from_parts(credential: Option<Credential>, subject_id: Option<SubjectId>) -> Option<Self> {
        match (credential, subject_id) {
            (Some(credential), Some(subject_id)) if !credential.is_empty() => {
                Some(Self::new(credential, subject_id))
            }
            _ => None,
        }
    }
}
