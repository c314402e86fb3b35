//! Identifier newtypes.
//!
//! Agent, workflow, step, and instance identifiers are caller-chosen strings.
//! They end up inside storage keys and signed payloads, so they are limited to
//! printable ASCII without whitespace or the storage separator characters.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Longest accepted identifier, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 256;

fn check_identifier(kind: &'static str, value: &str) -> CoreResult<()> {
    let reject = |reason| {
        Err(CoreError::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason,
        })
    };
    if value.is_empty() {
        return reject("empty");
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return reject("too long");
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_graphic() && b != b'/' && b != b'\\')
    {
        return reject("must be printable ASCII without whitespace or slashes");
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier.
            ///
            /// # Errors
            ///
            /// Returns [`CoreError::InvalidIdentifier`] if the value is empty,
            /// longer than [`MAX_IDENTIFIER_LEN`], or contains whitespace,
            /// control characters, or slashes.
            pub fn new(value: impl Into<String>) -> CoreResult<Self> {
                let value = value.into();
                check_identifier($kind, &value)?;
                Ok(Self(value))
            }

            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> CoreResult<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> CoreResult<Self> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique identifier of a registered agent.
    AgentId,
    "agent"
);

string_id!(
    /// Identifier of a published workflow.
    WorkflowId,
    "workflow"
);

string_id!(
    /// Identifier of a step within a workflow.
    StepId,
    "step"
);

string_id!(
    /// Identifier of one running instance of a workflow.
    ///
    /// Execution log sequence numbers are scoped to an instance.
    InstanceId,
    "instance"
);

string_id!(
    /// Identifier of the application an agent is registered under.
    AppId,
    "app"
);

impl InstanceId {
    /// Generate a fresh random instance id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Unique identifier of a minted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub Uuid);

impl TokenId {
    /// Create a new random token ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a token ID from a UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", self.0)
    }
}
