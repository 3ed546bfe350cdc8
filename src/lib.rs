//! depsync: a locally-executed dependency-update engine covering
//! heterogeneous package ecosystems.
//!
//! The crate is a library — CLI argument parsing, config-file loading,
//! and output rendering stay with the host binary (§1, §6). What lives
//! here is the pipeline: scan manifests, resolve installed versions,
//! fetch and filter candidate versions, pick a target, then apply,
//! re-lock, and validate with rollback on failure.
//!
//! Modules map one-to-one onto the component table: [`exec`] (command
//! substrate), [`version`] (versioning strategies), [`fetch`]
//! (available-versions fetcher), [`filter`] and [`select`] (constraint
//! filter and target selector), [`scan`] (manifest scanner), [`lock`]
//! (lock resolver), [`apply`] (update applier), [`systest`]
//! (system-test runner), and [`orchestrator`] (the five-phase driver
//! that ties all of the above together).

pub mod apply;
pub mod exec;
pub mod fetch;
pub mod filter;
pub mod lock;
pub mod orchestrator;
pub mod scan;
pub mod select;
pub mod systest;
pub mod version;

pub use depsync_common as common;

pub use exec::{ExecRequest, Executor, FakeExecutor, ShellExecutor};
pub use orchestrator::{
    ExecutionMode, Filters, FixedPresenter, Orchestrator, PackageReport, PackageStatus, Presenter,
    Report, RunOptions, TypeFilter,
};
