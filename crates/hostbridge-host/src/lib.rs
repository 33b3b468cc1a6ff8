//! hostbridge host runtime.
//!
//! Drives queries on the native policy engine: decodes each event, resolves it
//! against registered host classes and cached instances, and answers over the
//! engine seam.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied. A failing event aborts
//! its own query (which is always released) and never the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bridge;
pub mod builtins;
pub mod class;
pub mod config;
pub mod engine;
pub mod filter;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod stream;
pub mod translator;
pub mod value;

pub use bridge::Bridge;
pub use class::{Arity, Class, ClassBuilder, FieldType, HostIter, RelationKind};
pub use config::{BridgeConfig, DebugMode};
pub use engine::{Engine, EngineQuery, QueryChannel};
pub use filter::DataFilterAdapter;
pub use query::{Query, ResultRow};
pub use registry::{ClassRegistry, Registry};
pub use resolver::Resolver;
pub use stream::QueryStream;
pub use translator::Translator;
pub use value::{arg, arg_ref, ClassHandle, FromHost, HostValue, Instance, Nil};
