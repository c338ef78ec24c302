use crate::types::{PolicyId, RoleId, UserId};
use thiserror::Error;

/// Backing-store error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Role removal requested for a user who does not currently hold it.
    #[error("user {user} does not hold role {role}")]
    NotAssigned { user: UserId, role: RoleId },
    /// Operation references a policy identifier absent from the store.
    #[error("policy {0} not found")]
    PolicyNotFound(PolicyId),
    /// Update requested on a policy that was never added to a store.
    #[error("policy was never stored and cannot be updated")]
    PolicyNeverStored,
    /// The role index references a policy missing from the policy table.
    #[error("corrupted policy index: role {role} references missing policy {policy}")]
    CorruptedIndex { role: RoleId, policy: PolicyId },
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Backing store failure.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl Error {
    /// Returns true for errors that mean "the referenced thing does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotAssigned { .. } | Self::PolicyNotFound(_))
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
