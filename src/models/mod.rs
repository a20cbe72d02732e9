//! Account pool and model registry
//!
//! The pool tracks per-account health and picks which account serves a
//! request; the registry maps logical model ids to the accounts and agents
//! able to serve them.

pub mod pool;
pub mod registry;

pub use pool::{AccountHealth, AccountId, AccountPool, AccountStatus, FailureRecord, Selection};
pub use registry::{AgentBinding, ModelRecord, ModelRegistry, RegistryCell};
