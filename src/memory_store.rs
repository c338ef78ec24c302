use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::policy::Policy;
use crate::store::{PolicyStore, RoleStore};
use crate::types::{PolicyId, RoleId, UserId};

/// In-memory role assignment store.
///
/// Clones share the same index. Construct one per service (or per test) and
/// hand clones to the engine and to administration code.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoleStore {
    inner: Arc<RwLock<HashMap<UserId, BTreeSet<RoleId>>>>,
}

impl MemoryRoleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn add_user_to_role(&self, user: &UserId, role: &RoleId) -> Result<bool> {
        let mut guard = self.inner.write();
        let granted = guard.entry(user.clone()).or_default().insert(role.clone());
        tracing::debug!(%user, %role, granted, "add user to role");
        Ok(granted)
    }

    async fn remove_user_from_role(&self, user: &UserId, role: &RoleId) -> Result<()> {
        let mut guard = self.inner.write();
        let Some(roles) = guard.get_mut(user) else {
            return Err(Error::NotAssigned {
                user: user.clone(),
                role: role.clone(),
            });
        };
        if !roles.remove(role) {
            return Err(Error::NotAssigned {
                user: user.clone(),
                role: role.clone(),
            });
        }
        if roles.is_empty() {
            guard.remove(user);
        }
        tracing::debug!(%user, %role, "remove user from role");
        Ok(())
    }

    async fn roles_of(&self, user: &UserId) -> Result<Vec<RoleId>> {
        let guard = self.inner.read();
        Ok(guard
            .get(user)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn has_role(&self, user: &UserId, role: &RoleId) -> Result<bool> {
        let guard = self.inner.read();
        Ok(guard.get(user).is_some_and(|roles| roles.contains(role)))
    }

    async fn users_in_role(&self, role: &RoleId) -> Result<Vec<UserId>> {
        let guard = self.inner.read();
        let mut users: Vec<UserId> = guard
            .iter()
            .filter(|(_, roles)| roles.contains(role))
            .map(|(user, _)| user.clone())
            .collect();
        users.sort_unstable();
        Ok(users)
    }
}

/// In-memory policy store.
///
/// The policy table and the role index live under one lock, so every id in
/// the index resolves in the table.
#[derive(Debug, Default, Clone)]
pub struct MemoryPolicyStore {
    inner: Arc<RwLock<PolicyIndex>>,
}

#[derive(Debug, Default)]
struct PolicyIndex {
    policies: HashMap<PolicyId, Policy>,
    by_role: HashMap<RoleId, HashSet<PolicyId>>,
}

impl PolicyIndex {
    fn ensure_exists(&self, id: &PolicyId) -> Result<()> {
        if self.policies.contains_key(id) {
            Ok(())
        } else {
            Err(Error::PolicyNotFound(*id))
        }
    }

    fn attach(&mut self, id: PolicyId, roles: &[RoleId]) {
        for role in roles {
            self.by_role.entry(role.clone()).or_default().insert(id);
        }
    }

    fn detach(&mut self, id: &PolicyId, roles: &[RoleId]) {
        for role in roles {
            if let Some(ids) = self.by_role.get_mut(role) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_role.remove(role);
                }
            }
        }
    }
}

impl MemoryPolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored policies.
    pub fn len(&self) -> usize {
        self.inner.read().policies.len()
    }

    /// Returns whether the store holds no policies.
    pub fn is_empty(&self) -> bool {
        self.inner.read().policies.is_empty()
    }

    #[cfg(test)]
    fn corrupt_index(&self, role: RoleId, id: PolicyId) {
        self.inner.write().by_role.entry(role).or_default().insert(id);
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn add_policy(&self, policy: Policy, roles: &[RoleId]) -> Result<PolicyId> {
        let id = PolicyId::generate();
        let mut guard = self.inner.write();
        guard.policies.insert(id, policy.with_id(id));
        guard.attach(id, roles);
        tracing::debug!(policy = %id, roles = roles.len(), "add policy");
        Ok(id)
    }

    async fn assign_policy(&self, id: &PolicyId, roles: &[RoleId]) -> Result<()> {
        let mut guard = self.inner.write();
        guard.ensure_exists(id)?;
        guard.attach(*id, roles);
        tracing::debug!(policy = %id, roles = roles.len(), "assign policy");
        Ok(())
    }

    async fn unassign_policy(&self, id: &PolicyId, roles: &[RoleId]) -> Result<()> {
        let mut guard = self.inner.write();
        guard.ensure_exists(id)?;
        guard.detach(id, roles);
        tracing::debug!(policy = %id, roles = roles.len(), "unassign policy");
        Ok(())
    }

    async fn update_policy(&self, policy: Policy) -> Result<()> {
        let id = policy.id().ok_or(Error::PolicyNeverStored)?;
        let mut guard = self.inner.write();
        let Some(stored) = guard.policies.get_mut(&id) else {
            return Err(Error::PolicyNotFound(id));
        };
        *stored = policy;
        tracing::debug!(policy = %id, "update policy");
        Ok(())
    }

    async fn policy(&self, id: &PolicyId) -> Result<Policy> {
        let guard = self.inner.read();
        guard
            .policies
            .get(id)
            .cloned()
            .ok_or(Error::PolicyNotFound(*id))
    }

    async fn remove_policy(&self, id: &PolicyId) -> Result<()> {
        let mut guard = self.inner.write();
        if guard.policies.remove(id).is_none() {
            return Err(Error::PolicyNotFound(*id));
        }
        guard.by_role.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
        tracing::debug!(policy = %id, "remove policy");
        Ok(())
    }

    async fn policies_for(&self, role: &RoleId) -> Result<Vec<Policy>> {
        let guard = self.inner.read();
        let Some(ids) = guard.by_role.get(role) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .map(|id| {
                guard.policies.get(id).cloned().ok_or_else(|| {
                    tracing::error!(%role, policy = %id, "role index references missing policy");
                    Error::CorruptedIndex {
                        role: role.clone(),
                        policy: *id,
                    }
                })
            })
            .collect()
    }

    async fn roles_for(&self, id: &PolicyId) -> Result<Vec<RoleId>> {
        let guard = self.inner.read();
        guard.ensure_exists(id)?;
        let mut roles: Vec<RoleId> = guard
            .by_role
            .iter()
            .filter(|(_, ids)| ids.contains(id))
            .map(|(role, _)| role.clone())
            .collect();
        roles.sort_unstable();
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Effect, PolicyStatement};
    use futures::executor::block_on;
    use tracing_test::traced_test;

    fn user(value: &str) -> UserId {
        UserId::try_from(value).unwrap()
    }

    fn role(value: &str) -> RoleId {
        RoleId::try_from(value).unwrap()
    }

    fn deploy_policy() -> Policy {
        Policy::new([PolicyStatement::try_new(
            "DeployProject",
            Effect::Allow,
            ["auto-kitteh://organizations/organization-4/project-1"],
            ["DeployProject"],
        )
        .unwrap()])
    }

    #[test]
    fn add_user_to_role_is_idempotent() {
        let store = MemoryRoleStore::new();

        assert!(block_on(store.add_user_to_role(&user("user-1"), &role("role-1"))).unwrap());
        assert!(!block_on(store.add_user_to_role(&user("user-1"), &role("role-1"))).unwrap());
        block_on(store.add_user_to_role(&user("user-1"), &role("role-2"))).unwrap();

        let roles = block_on(store.roles_of(&user("user-1"))).unwrap();
        assert_eq!(roles, vec![role("role-1"), role("role-2")]);
    }

    #[test]
    fn roles_of_is_sorted_regardless_of_grant_order() {
        let store = MemoryRoleStore::new();
        for name in ["viewer", "admin", "manager"] {
            block_on(store.add_user_to_role(&user("user-1"), &role(name))).unwrap();
        }

        let roles = block_on(store.roles_of(&user("user-1"))).unwrap();
        assert_eq!(roles, vec![role("admin"), role("manager"), role("viewer")]);
    }

    #[test]
    fn remove_user_from_role_requires_assignment() {
        let store = MemoryRoleStore::new();
        block_on(store.add_user_to_role(&user("user-1"), &role("role-1"))).unwrap();
        block_on(store.add_user_to_role(&user("user-1"), &role("role-2"))).unwrap();

        block_on(store.remove_user_from_role(&user("user-1"), &role("role-1"))).unwrap();
        let err = block_on(store.remove_user_from_role(&user("user-1"), &role("role-3")))
            .expect_err("role-3 was never granted");
        assert!(matches!(err, Error::NotAssigned { .. }));

        let roles = block_on(store.roles_of(&user("user-1"))).unwrap();
        assert_eq!(roles, vec![role("role-2")]);
    }

    #[test]
    fn remove_twice_fails_and_regrant_reports_change() {
        let store = MemoryRoleStore::new();
        block_on(store.add_user_to_role(&user("user-1"), &role("role-1"))).unwrap();
        block_on(store.remove_user_from_role(&user("user-1"), &role("role-1"))).unwrap();

        let err = block_on(store.remove_user_from_role(&user("user-1"), &role("role-1")))
            .expect_err("already removed");
        assert!(matches!(err, Error::NotAssigned { .. }));
        assert!(block_on(store.roles_of(&user("user-1"))).unwrap().is_empty());

        assert!(block_on(store.add_user_to_role(&user("user-1"), &role("role-1"))).unwrap());
        assert!(block_on(store.has_role(&user("user-1"), &role("role-1"))).unwrap());
    }

    #[test]
    fn unknown_user_has_no_roles() {
        let store = MemoryRoleStore::new();
        assert!(block_on(store.roles_of(&user("ghost"))).unwrap().is_empty());
        let err = block_on(store.remove_user_from_role(&user("ghost"), &role("role-1")))
            .expect_err("unknown user");
        assert!(err.is_not_found());
    }

    #[test]
    fn users_in_role_lists_current_holders() {
        let store = MemoryRoleStore::new();
        block_on(store.add_user_to_role(&user("itay"), &role("manager"))).unwrap();
        block_on(store.add_user_to_role(&user("haim"), &role("manager"))).unwrap();
        block_on(store.add_user_to_role(&user("haim"), &role("developer"))).unwrap();
        block_on(store.remove_user_from_role(&user("itay"), &role("manager"))).unwrap();

        let users = block_on(store.users_in_role(&role("manager"))).unwrap();
        assert_eq!(users, vec![user("haim")]);
    }

    #[test]
    fn add_policy_attaches_to_roles_and_assigns_identity() {
        let store = MemoryPolicyStore::new();
        let id = block_on(store.add_policy(deploy_policy(), &[role("developer"), role("admin")]))
            .unwrap();

        let policies = block_on(store.policies_for(&role("developer"))).unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].id(), Some(id));
        assert_eq!(
            block_on(store.roles_for(&id)).unwrap(),
            vec![role("admin"), role("developer")]
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn policies_for_unknown_role_is_empty() {
        let store = MemoryPolicyStore::new();
        assert!(block_on(store.policies_for(&role("nobody"))).unwrap().is_empty());
    }

    #[test]
    fn unassign_then_reassign_round_trip() {
        let store = MemoryPolicyStore::new();
        let id = block_on(store.add_policy(deploy_policy(), &[])).unwrap();
        assert!(block_on(store.policies_for(&role("developer"))).unwrap().is_empty());

        block_on(store.assign_policy(&id, &[role("developer")])).unwrap();
        block_on(store.assign_policy(&id, &[role("developer")])).unwrap();
        assert_eq!(block_on(store.policies_for(&role("developer"))).unwrap().len(), 1);

        block_on(store.unassign_policy(&id, &[role("developer")])).unwrap();
        assert!(block_on(store.policies_for(&role("developer"))).unwrap().is_empty());

        block_on(store.assign_policy(&id, &[role("developer")])).unwrap();
        let policies = block_on(store.policies_for(&role("developer"))).unwrap();
        assert_eq!(policies[0].id(), Some(id));
    }

    #[test]
    fn assign_and_unassign_unknown_policy_fail() {
        let store = MemoryPolicyStore::new();
        let missing = PolicyId::generate();

        let err = block_on(store.assign_policy(&missing, &[role("developer")])).unwrap_err();
        assert!(matches!(err, Error::PolicyNotFound(id) if id == missing));
        let err = block_on(store.unassign_policy(&missing, &[role("developer")])).unwrap_err();
        assert!(matches!(err, Error::PolicyNotFound(_)));
        assert!(block_on(store.policies_for(&role("developer"))).unwrap().is_empty());
    }

    #[test]
    fn update_policy_replaces_statements() {
        let store = MemoryPolicyStore::new();
        let id = block_on(store.add_policy(deploy_policy(), &[role("developer")])).unwrap();

        let replacement = Policy::new([PolicyStatement::try_new(
            "ModifyEnvironment",
            Effect::Deny,
            ["auto-kitteh://organizations/organization-4/project-1"],
            ["ModifyEnvironment"],
        )
        .unwrap()])
        .with_id(id);
        block_on(store.update_policy(replacement)).unwrap();

        let stored = block_on(store.policy(&id)).unwrap();
        assert_eq!(stored.statements().len(), 1);
        assert_eq!(stored.statements()[0].id().as_str(), "ModifyEnvironment");
        assert_eq!(block_on(store.roles_for(&id)).unwrap(), vec![role("developer")]);
    }

    #[test]
    fn update_policy_rejects_unstored_and_unknown() {
        let store = MemoryPolicyStore::new();

        let err = block_on(store.update_policy(deploy_policy())).unwrap_err();
        assert!(matches!(err, Error::PolicyNeverStored));

        let err = block_on(store.update_policy(deploy_policy().with_id(PolicyId::generate())))
            .unwrap_err();
        assert!(matches!(err, Error::PolicyNotFound(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_policy_drops_every_attachment() {
        let store = MemoryPolicyStore::new();
        let id = block_on(store.add_policy(deploy_policy(), &[role("developer"), role("admin")]))
            .unwrap();
        let kept = block_on(store.add_policy(deploy_policy(), &[role("admin")])).unwrap();

        block_on(store.remove_policy(&id)).unwrap();

        assert!(block_on(store.policies_for(&role("developer"))).unwrap().is_empty());
        let admin = block_on(store.policies_for(&role("admin"))).unwrap();
        assert_eq!(admin.len(), 1);
        assert_eq!(admin[0].id(), Some(kept));
        assert!(matches!(
            block_on(store.policy(&id)),
            Err(Error::PolicyNotFound(_))
        ));
        assert!(matches!(
            block_on(store.remove_policy(&id)),
            Err(Error::PolicyNotFound(_))
        ));
    }

    #[traced_test]
    #[test]
    fn corrupted_index_is_reported_not_dropped() {
        let store = MemoryPolicyStore::new();
        block_on(store.add_policy(deploy_policy(), &[role("developer")])).unwrap();
        let dangling = PolicyId::generate();
        store.corrupt_index(role("developer"), dangling);

        let err = block_on(store.policies_for(&role("developer"))).unwrap_err();
        assert!(matches!(err, Error::CorruptedIndex { policy, .. } if policy == dangling));
        assert!(logs_contain("role index references missing policy"));
    }

    #[test]
    fn clones_share_the_same_index() {
        let store = MemoryRoleStore::new();
        let handle = store.clone();
        block_on(handle.add_user_to_role(&user("itay"), &role("manager"))).unwrap();
        assert_eq!(
            block_on(store.roles_of(&user("itay"))).unwrap(),
            vec![role("manager")]
        );
    }
}
