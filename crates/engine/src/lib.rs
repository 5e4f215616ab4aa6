//! Database engine contract for the backup core.
//!
//! The backup core drives the engine only through [`Engine`]; the driver,
//! the wire protocol and the SQL behind each method belong to the
//! implementation. A [`MockEngine`] backed by real directories is available
//! with the `mock` feature for tests in other crates.

mod engine;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod models;
#[cfg(unix)]
mod owner;

pub use crate::engine::Engine;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::{MockEngine, MockOp, MockState};
pub use crate::models::{Database, Disk, FREEZABLE_ENGINE_SUFFIX, Table};
#[cfg(unix)]
pub use crate::owner::Ownership;
use std::sync::Arc;

pub type EngineHandle = Arc<dyn Engine + Send + Sync>;
