use crate::error::Result;
use crate::policy::{Effect, Policy};
use crate::store::{PolicyStore, RoleStore, Store};
use crate::types::{ActionId, PolicyId, ResourceId, StatementId, UserId};
use futures::future::try_join_all;
use std::collections::HashSet;
use std::fmt;

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Access is granted.
    Allow,
    /// Access is denied.
    Deny,
}

impl Decision {
    /// Returns true for [`Decision::Allow`].
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    // Deny beats allow beats no match.
    fn combine(allowed: bool, denied: bool) -> Self {
        if allowed && !denied {
            Self::Allow
        } else {
            Self::Deny
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// A single authorization question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    /// User asking for access.
    pub user: UserId,
    /// Resource being accessed.
    pub resource: ResourceId,
    /// Action being performed.
    pub action: ActionId,
}

impl Request {
    /// Creates a request from validated identifiers.
    pub fn new(user: UserId, resource: ResourceId, action: ActionId) -> Self {
        Self {
            user,
            resource,
            action,
        }
    }

    /// Creates a request from raw strings, validating each identifier.
    pub fn try_new(user: &str, resource: &str, action: &str) -> Result<Self> {
        Ok(Self {
            user: UserId::new(user)?,
            resource: ResourceId::new(resource)?,
            action: ActionId::new(action)?,
        })
    }
}

/// A statement that matched a request during [`Engine::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedStatement {
    /// Policy the statement belongs to.
    pub policy: Option<PolicyId>,
    /// Statement identifier.
    pub statement: StatementId,
    /// Statement effect.
    pub effect: Effect,
}

/// Decision together with every statement that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Final decision.
    pub decision: Decision,
    /// Matching statements, in evaluation order.
    pub matched: Vec<MatchedStatement>,
}

/// Decision engine composing a role store and a policy store.
///
/// The engine never mutates either store. Store handles are usually cheap
/// clones of the instances used for administration.
#[derive(Debug)]
pub struct Engine<R, P> {
    roles: R,
    policies: P,
    concurrent_policy_fetch: bool,
    short_circuit: bool,
}

/// Builder for [`Engine`].
#[derive(Debug)]
pub struct EngineBuilder<R, P> {
    roles: R,
    policies: P,
    concurrent_policy_fetch: bool,
    short_circuit: bool,
}

impl<S> EngineBuilder<S, S>
where
    S: Store + Clone,
{
    /// Creates a builder for a backend that holds both relations.
    pub fn from_store(store: S) -> Self {
        Self::new(store.clone(), store)
    }
}

impl<R, P> EngineBuilder<R, P> {
    /// Creates a new builder with default configuration.
    pub fn new(roles: R, policies: P) -> Self {
        Self {
            roles,
            policies,
            concurrent_policy_fetch: false,
            short_circuit: true,
        }
    }

    /// Fetches the policies of every role concurrently instead of one by one.
    pub fn concurrent_policy_fetch(mut self, on: bool) -> Self {
        self.concurrent_policy_fetch = on;
        self
    }

    /// Stops evaluation at the first matching deny statement.
    pub fn short_circuit(mut self, on: bool) -> Self {
        self.short_circuit = on;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<R, P> {
        Engine {
            roles: self.roles,
            policies: self.policies,
            concurrent_policy_fetch: self.concurrent_policy_fetch,
            short_circuit: self.short_circuit,
        }
    }
}

impl<R, P> Engine<R, P>
where
    R: RoleStore,
    P: PolicyStore,
{
    /// Returns the role store.
    pub fn role_store(&self) -> &R {
        &self.roles
    }

    /// Returns the policy store.
    pub fn policy_store(&self) -> &P {
        &self.policies
    }

    /// Decides a request with deny-overrides-allow and default deny.
    ///
    /// A user without roles, or without any matching statement, is denied.
    /// Errors only come from the backing stores.
    pub async fn decide(&self, request: &Request) -> Result<Decision> {
        let policies = self.assigned_policies(&request.user).await?;
        let decision = decide_over(
            &policies,
            request.resource.as_str(),
            request.action.as_str(),
            self.short_circuit,
        );
        tracing::debug!(
            user = %request.user,
            resource = %request.resource,
            action = %request.action,
            policies = policies.len(),
            %decision,
            "authorization decided"
        );
        Ok(decision)
    }

    /// Infallible form of [`Engine::decide`].
    ///
    /// Store failures resolve to deny and are logged.
    pub async fn is_authorized(&self, request: &Request) -> bool {
        match self.decide(request).await {
            Ok(decision) => decision.is_allowed(),
            Err(error) => {
                tracing::error!(
                    user = %request.user,
                    resource = %request.resource,
                    action = %request.action,
                    %error,
                    "authorization failed closed"
                );
                false
            }
        }
    }

    /// Evaluates every statement and reports which ones matched.
    pub async fn evaluate(&self, request: &Request) -> Result<Evaluation> {
        let policies = self.assigned_policies(&request.user).await?;
        let resource = request.resource.as_str();
        let action = request.action.as_str();

        let mut matched = Vec::new();
        for policy in &policies {
            for statement in policy.matching(resource, action) {
                tracing::trace!(
                    policy = ?policy.id(),
                    statement = %statement.id(),
                    effect = %statement.effect(),
                    "statement matched"
                );
                matched.push(MatchedStatement {
                    policy: policy.id(),
                    statement: statement.id().clone(),
                    effect: statement.effect(),
                });
            }
        }

        let allowed = matched.iter().any(|m| m.effect == Effect::Allow);
        let denied = matched.iter().any(|m| m.effect == Effect::Deny);
        Ok(Evaluation {
            decision: Decision::combine(allowed, denied),
            matched,
        })
    }

    // Union of the policies attached to each of the user's roles. A policy
    // attached to several roles is kept once.
    async fn assigned_policies(&self, user: &UserId) -> Result<Vec<Policy>> {
        let roles = self.roles.roles_of(user).await?;

        let per_role = if self.concurrent_policy_fetch {
            try_join_all(roles.iter().map(|role| self.policies.policies_for(role))).await?
        } else {
            let mut per_role = Vec::with_capacity(roles.len());
            for role in &roles {
                per_role.push(self.policies.policies_for(role).await?);
            }
            per_role
        };

        let mut seen = HashSet::new();
        Ok(per_role
            .into_iter()
            .flatten()
            .filter(|policy| policy.id().is_none_or(|id| seen.insert(id)))
            .collect())
    }
}

fn decide_over(policies: &[Policy], resource: &str, action: &str, short_circuit: bool) -> Decision {
    let mut allowed = false;
    let mut denied = false;
    for statement in policies
        .iter()
        .flat_map(|policy| policy.matching(resource, action))
    {
        match statement.effect() {
            Effect::Deny if short_circuit => return Decision::Deny,
            Effect::Deny => denied = true,
            Effect::Allow => allowed = true,
        }
    }
    Decision::combine(allowed, denied)
}
