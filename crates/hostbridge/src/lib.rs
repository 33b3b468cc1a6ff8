//! Top-level facade crate for hostbridge.
//!
//! Re-exports the wire-level core and the host runtime so users can depend on a single crate.

pub mod core {
    pub use hostbridge_core::*;
}

pub mod host {
    pub use hostbridge_host::*;
}
