//! Runtime support for generated archgen processes.
//!
//! Generated code registers one build function per instance on a [`Graph`],
//! builds a [`Container`], and `get`s its startup instances. Instances are
//! built on first use and memoized; instances that are also [`Runnable`] are
//! spawned as supervised background tasks sharing one cancellation signal.
//!
//! # Modules
//!
//! - [`container`] -- Definitions, lazy construction and supervision
//! - [`instance`] -- Type-erased values and the `Runnable` contract
//! - [`context`] -- Shared cancellation
//! - [`tasks`] -- Task outcomes and the shutdown report
//! - [`error`] -- Runtime error types

pub mod container;
pub mod context;
pub mod error;
pub mod instance;
pub mod tasks;

pub use container::{BuildFn, Container, Graph};
pub use context::{CancelSignal, Context};
pub use error::{BoxError, RuntimeError, TaskError};
pub use instance::{Instance, Runnable};
pub use tasks::{ShutdownReport, TaskFailure};

// Generated code names this crate only; re-export what its runnables need.
pub use async_trait::async_trait;
