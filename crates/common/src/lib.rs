//! Shared data model, configuration schema, and error vocabulary for the
//! depsync update engine. Nothing in this crate touches the network,
//! spawns a process, or reads a config file from disk — it is the
//! passive schema the engine crate (`depsync`) operates on.

pub mod config;
pub mod error;
pub mod log_schema;
pub mod model;
pub mod text;

pub use config::RootConfig;
pub use error::CoreError;
pub use model::{
    Constraint, DependencyType, Group, LockArtifact, LockOutcome, Package, PackageUpdate, Scope,
    UpdatePlan, VersionCandidate,
};
