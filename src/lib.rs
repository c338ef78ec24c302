//! Role-based access control core.
//!
//! This crate provides the three pieces an RBAC service needs to answer
//! "may this user perform this action on this resource":
//!
//! - a [`RoleStore`] tracking which roles each user holds,
//! - a [`PolicyStore`] holding policies and the roles they are attached to,
//! - an [`Engine`] combining both with deny-overrides-allow and default deny.
//!
//! Stores are async traits so durable backends can sit behind the same
//! interface as the bundled in-memory implementations.
//!
//! # Examples
//!
//! Basic authorization flow using the in-memory stores (`memory-store`, on by default):
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # {
//! use futures::executor::block_on;
//! use rs_rbac::{
//!     Effect, EngineBuilder, MemoryPolicyStore, MemoryRoleStore, Policy, PolicyStatement,
//!     PolicyStore, Request, RoleId, RoleStore, UserId,
//! };
//!
//! let roles = MemoryRoleStore::new();
//! let policies = MemoryPolicyStore::new();
//! let manager = RoleId::try_from("manager").unwrap();
//!
//! let statement = PolicyStatement::try_new(
//!     "ManageUsers",
//!     Effect::Allow,
//!     ["organization-1"],
//!     ["AddUser"],
//! )
//! .unwrap();
//! block_on(policies.add_policy(Policy::new([statement]), &[manager.clone()])).unwrap();
//! block_on(roles.add_user_to_role(&UserId::try_from("itay").unwrap(), &manager)).unwrap();
//!
//! let engine = EngineBuilder::new(roles, policies).build();
//! let request = Request::try_new("itay", "organization-1", "AddUser").unwrap();
//! assert!(block_on(engine.is_authorized(&request)));
//! # }
//! ```
#![forbid(unsafe_code)]

mod engine;
mod error;
mod policy;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::engine::{Decision, Engine, EngineBuilder, Evaluation, MatchedStatement, Request};
pub use crate::error::{Error, Result, StoreError};
pub use crate::policy::{Effect, Policy, PolicyStatement};
pub use crate::store::{PolicyStore, RoleStore, Store};
pub use crate::types::{ActionId, PolicyId, ResourceId, RoleId, StatementId, UserId};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::{MemoryPolicyStore, MemoryRoleStore};
