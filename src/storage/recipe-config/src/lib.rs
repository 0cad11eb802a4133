//! # Recipe Config
//!
//! Scoped configuration storage for the recipe CLI.
//!
//! Configuration is split into three scopes (see [`ExecutionContext`]):
//! `global`, `project` and `user`. Every read and write targets one or more
//! scopes selected through [`ContextOptions`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod context;
pub mod error;
pub mod memory;

pub use backend::{validate_key, ConfigStore, DeleteResult};
pub use context::{ContextOptions, ContextResolver, ExecutionContext};
pub use error::ConfigError;
pub use memory::MemoryConfigStore;
