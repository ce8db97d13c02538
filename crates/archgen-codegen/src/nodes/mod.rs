//! Stock IR nodes.
//!
//! Between them these exercise every capability contract, and they double as
//! worked examples for writing new node kinds:
//!
//! - [`ConfigValue`]: a string value built at runtime
//! - [`LocalModuleNode`]: copies an existing crate into the workspace
//! - [`ServiceImpl`]: a service built by a constructor in some crate
//! - [`ServiceWrapper`]: a generated logging wrapper around another service

mod config;
mod local_module;
mod service;
mod wrapper;

pub use config::ConfigValue;
pub use local_module::LocalModuleNode;
pub use service::ServiceImpl;
pub use wrapper::{wrap_service, ServiceWrapper};
