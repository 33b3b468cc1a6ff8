//! Wire formats exchanged with the native engine.
//!
//! - `wire`: JSON entry points and error classification for all of them.
//! - `event`: query events, engine messages and policy sources.
//! - `filter`: data-filter plans produced by the engine.
//!
//! Decoders are panic-free: an object with the wrong shape reports
//! `MalformedValue` and an unrecognized tag reports `UnknownVariant`.

pub mod event;
pub mod filter;
pub mod wire;
