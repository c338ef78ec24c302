use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MAX_ID_LEN: usize = 256;

// Identifiers are opaque tokens: a validated value is stored exactly as given,
// so `new(x)` and `from_string(x)` always agree.
fn validate_token(value: &str, kind: &str, allow_inner_space: bool) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_ID_LEN}"
        )));
    }
    if value.trim() != value {
        return Err(Error::InvalidId(format!(
            "{kind} must not have leading or trailing whitespace"
        )));
    }
    if value.chars().any(|ch| ch.is_control()) {
        return Err(Error::InvalidId(format!(
            "{kind} must not contain control characters"
        )));
    }
    if !allow_inner_space && value.chars().any(char::is_whitespace) {
        return Err(Error::InvalidId(format!(
            "{kind} must not contain whitespace"
        )));
    }
    Ok(value.to_string())
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr, $allow_inner_space:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_token(value.as_ref(), $kind, $allow_inner_space).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// User identifier. The caller's identity is assumed already established.
    UserId,
    "user id",
    false
);
define_id_type!(
    /// Role identifier.
    RoleId,
    "role id",
    false
);
define_id_type!(
    /// Resource identifier matched by policy statements.
    ResourceId,
    "resource id",
    false
);
define_id_type!(
    /// Action identifier matched by policy statements.
    ActionId,
    "action id",
    false
);
define_id_type!(
    /// Statement identifier, used for diagnostics only.
    StatementId,
    "statement id",
    true
);

/// Policy identity, generated by a policy store when a policy is added.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PolicyId(Uuid);

impl PolicyId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID, e.g. when decoding from a durable store.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PolicyId {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(input.trim())
            .map_err(|_| Error::InvalidId(format!("policy id `{input}` is not a uuid")))?;
        Ok(Self(uuid))
    }
}

impl TryFrom<&str> for PolicyId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}
