use crate::error::Result;
use crate::policy::Policy;
use crate::types::{PolicyId, RoleId, UserId};
use async_trait::async_trait;

/// Store interface for user role assignments.
///
/// Implementations must make each call atomic with respect to concurrent
/// mutation of the same store.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Grants `role` to `user`.
    ///
    /// Returns `true` if the user did not hold the role before this call.
    async fn add_user_to_role(&self, user: &UserId, role: &RoleId) -> Result<bool>;

    /// Revokes `role` from `user`.
    ///
    /// Fails with [`Error::NotAssigned`](crate::Error::NotAssigned) if the user
    /// does not currently hold the role.
    async fn remove_user_from_role(&self, user: &UserId, role: &RoleId) -> Result<()>;

    /// Returns the roles currently held by `user`, sorted ascending.
    async fn roles_of(&self, user: &UserId) -> Result<Vec<RoleId>>;

    /// Returns whether `user` currently holds `role`.
    async fn has_role(&self, user: &UserId, role: &RoleId) -> Result<bool> {
        Ok(self.roles_of(user).await?.contains(role))
    }

    /// Returns the users currently holding `role`, sorted ascending.
    async fn users_in_role(&self, role: &RoleId) -> Result<Vec<UserId>>;
}

/// Store interface for policies and their attachment to roles.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Persists `policy` under a fresh identity and attaches it to `roles`.
    async fn add_policy(&self, policy: Policy, roles: &[RoleId]) -> Result<PolicyId>;

    /// Attaches an existing policy to `roles`.
    async fn assign_policy(&self, id: &PolicyId, roles: &[RoleId]) -> Result<()>;

    /// Detaches an existing policy from `roles`.
    async fn unassign_policy(&self, id: &PolicyId, roles: &[RoleId]) -> Result<()>;

    /// Replaces the statements of a stored policy.
    ///
    /// Role attachments are left untouched.
    async fn update_policy(&self, policy: Policy) -> Result<()>;

    /// Returns a stored policy with its identity attached.
    async fn policy(&self, id: &PolicyId) -> Result<Policy>;

    /// Deletes a policy together with all of its role attachments.
    async fn remove_policy(&self, id: &PolicyId) -> Result<()>;

    /// Returns the policies currently attached to `role`, in no particular order.
    async fn policies_for(&self, role: &RoleId) -> Result<Vec<Policy>>;

    /// Returns the roles a policy is currently attached to, sorted ascending.
    async fn roles_for(&self, id: &PolicyId) -> Result<Vec<RoleId>>;
}

/// Composite store trait for backends that hold both relations.
pub trait Store: RoleStore + PolicyStore {}

impl<T> Store for T where T: RoleStore + PolicyStore {}

#[async_trait]
impl<T> RoleStore for std::sync::Arc<T>
where
    T: RoleStore + ?Sized,
{
    async fn add_user_to_role(&self, user: &UserId, role: &RoleId) -> Result<bool> {
        (**self).add_user_to_role(user, role).await
    }

    async fn remove_user_from_role(&self, user: &UserId, role: &RoleId) -> Result<()> {
        (**self).remove_user_from_role(user, role).await
    }

    async fn roles_of(&self, user: &UserId) -> Result<Vec<RoleId>> {
        (**self).roles_of(user).await
    }

    async fn has_role(&self, user: &UserId, role: &RoleId) -> Result<bool> {
        (**self).has_role(user, role).await
    }

    async fn users_in_role(&self, role: &RoleId) -> Result<Vec<UserId>> {
        (**self).users_in_role(role).await
    }
}

#[async_trait]
impl<T> PolicyStore for std::sync::Arc<T>
where
    T: PolicyStore + ?Sized,
{
    async fn add_policy(&self, policy: Policy, roles: &[RoleId]) -> Result<PolicyId> {
        (**self).add_policy(policy, roles).await
    }

    async fn assign_policy(&self, id: &PolicyId, roles: &[RoleId]) -> Result<()> {
        (**self).assign_policy(id, roles).await
    }

    async fn unassign_policy(&self, id: &PolicyId, roles: &[RoleId]) -> Result<()> {
        (**self).unassign_policy(id, roles).await
    }

    async fn update_policy(&self, policy: Policy) -> Result<()> {
        (**self).update_policy(policy).await
    }

    async fn policy(&self, id: &PolicyId) -> Result<Policy> {
        (**self).policy(id).await
    }

    async fn remove_policy(&self, id: &PolicyId) -> Result<()> {
        (**self).remove_policy(id).await
    }

    async fn policies_for(&self, role: &RoleId) -> Result<Vec<Policy>> {
        (**self).policies_for(role).await
    }

    async fn roles_for(&self, id: &PolicyId) -> Result<Vec<RoleId>> {
        (**self).roles_for(id).await
    }
}
