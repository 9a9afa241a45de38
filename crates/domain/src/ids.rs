use ulid::Ulid;

use crate::error::DomainError;

/// Checks that a string contains only alphanumeric chars, hyphens, and underscores.
fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Checks that a string is a valid prefixed identifier (e.g. "req_foo-bar").
fn is_valid_prefixed_id(s: &str, prefix: &str) -> bool {
    s.starts_with(prefix) && is_valid_slug(s)
}

macro_rules! validated_id {
    ($name:ident, $prefix:expr, $err:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: &str) -> Result<Self, DomainError> {
                if !is_valid_prefixed_id(raw, $prefix) {
                    return Err(DomainError::$err(raw.to_string()));
                }
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(&s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

validated_id!(RequestId, "req_", InvalidRequestId);
validated_id!(JobId, "job_", InvalidJobId);

impl JobId {
    /// Mint a fresh job id: `job_` followed by a ULID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("job_{}", Ulid::new()))
    }

    /// The reserved sentinel id occupying a root's child set while the root
    /// is still enumerating its direct children. Never minted by `generate`.
    #[must_use]
    pub fn marker() -> Self {
        Self(format!("job_{}", Ulid::nil()))
    }

    #[must_use]
    pub fn is_marker(&self) -> bool {
        *self == Self::marker()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_request_id() {
        assert!(RequestId::new("req_bulk-delete-42").is_ok());
        assert!(RequestId::new("req_abc_123").is_ok());
        assert!(RequestId::new("req_a").is_ok());
    }

    #[test]
    fn invalid_request_id() {
        assert!(RequestId::new("").is_err());
        assert!(RequestId::new("bulk-delete-42").is_err()); // missing prefix
        assert!(RequestId::new("req_has spaces").is_err());
        assert!(RequestId::new("req_has.dots").is_err());
        let long = "req_".to_string() + &"a".repeat(61);
        assert!(RequestId::new(&long).is_err()); // too long
    }

    #[test]
    fn valid_job_id() {
        assert!(JobId::new("job_expand-dir").is_ok());
        assert!(JobId::new("job_leaf_7").is_ok());
    }

    #[test]
    fn invalid_job_id() {
        assert!(JobId::new("").is_err());
        assert!(JobId::new("expand-dir").is_err());
        assert!(JobId::new("req_wrong-prefix").is_err());
    }

    #[test]
    fn generated_job_id_is_valid_and_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert!(JobId::new(a.as_str()).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn marker_is_reserved() {
        let marker = JobId::marker();
        assert!(marker.is_marker());
        assert_eq!(marker.as_str(), "job_00000000000000000000000000");
        assert!(!JobId::generate().is_marker());
    }

    #[test]
    fn serde_round_trip_request_id() {
        let id = RequestId::new("req_test-123").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"req_test-123\"");
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn serde_rejects_invalid_job_id() {
        let result: Result<JobId, _> = serde_json::from_str("\"not-a-job-id\"");
        assert!(result.is_err());
    }
}
