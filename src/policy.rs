use crate::error::Result;
use crate::types::{ActionId, PolicyId, ResourceId, StatementId};
use std::collections::HashSet;
use std::fmt;

/// Polarity of a policy statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Effect {
    /// Grants the matched actions.
    Allow,
    /// Forbids the matched actions, overriding any allow.
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// Immutable rule pairing a set of resources and a set of actions with an effect.
///
/// A statement matches a `(resource, action)` pair when the resource is in
/// its resource set and the action is in its action set. Identifiers are
/// compared by equality only; there is no pattern or wildcard matching.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicyStatement {
    id: StatementId,
    resources: HashSet<ResourceId>,
    actions: HashSet<ActionId>,
    effect: Effect,
}

impl PolicyStatement {
    /// Creates a statement from already-validated identifiers.
    pub fn new<R, A>(id: StatementId, effect: Effect, resources: R, actions: A) -> Self
    where
        R: IntoIterator<Item = ResourceId>,
        A: IntoIterator<Item = ActionId>,
    {
        Self {
            id,
            resources: resources.into_iter().collect(),
            actions: actions.into_iter().collect(),
            effect,
        }
    }

    /// Creates a statement from raw strings, validating every identifier.
    ///
    /// This is the entry point for boundaries that receive statements as
    /// external records.
    pub fn try_new<R, A>(id: &str, effect: Effect, resources: R, actions: A) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let id = StatementId::new(id)?;
        let resources = resources
            .into_iter()
            .map(ResourceId::new)
            .collect::<Result<HashSet<_>>>()?;
        let actions = actions
            .into_iter()
            .map(ActionId::new)
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self {
            id,
            resources,
            actions,
            effect,
        })
    }

    /// Returns the statement identifier.
    pub fn id(&self) -> &StatementId {
        &self.id
    }

    /// Returns the statement effect.
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Returns the resources this statement covers.
    pub fn resources(&self) -> &HashSet<ResourceId> {
        &self.resources
    }

    /// Returns the actions this statement covers.
    pub fn actions(&self) -> &HashSet<ActionId> {
        &self.actions
    }

    /// Returns whether the statement applies to `resource` and `action`.
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resources.contains(resource) && self.actions.contains(action)
    }
}

/// Bundle of statements assignable to roles.
///
/// A policy carries an identity only once a store has persisted it; a policy
/// without identity cannot be updated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Policy {
    #[cfg_attr(feature = "serde", serde(default))]
    id: Option<PolicyId>,
    statements: Vec<PolicyStatement>,
}

impl Policy {
    /// Creates a policy that has not been stored yet.
    pub fn new(statements: impl IntoIterator<Item = PolicyStatement>) -> Self {
        Self {
            id: None,
            statements: statements.into_iter().collect(),
        }
    }

    /// Attaches a stored identity to this policy.
    pub fn with_id(mut self, id: PolicyId) -> Self {
        self.id = Some(id);
        self
    }

    /// Returns the stored identity, if any.
    pub fn id(&self) -> Option<PolicyId> {
        self.id
    }

    /// Returns the statements of this policy.
    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    /// Returns every statement matching `resource` and `action`.
    pub fn matching<'a>(
        &'a self,
        resource: &'a str,
        action: &'a str,
    ) -> impl Iterator<Item = &'a PolicyStatement> + 'a {
        self.statements
            .iter()
            .filter(move |statement| statement.matches(resource, action))
    }
}
