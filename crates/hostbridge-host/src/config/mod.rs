//! Bridge configuration.
//!
//! YAML, strictly parsed: an unknown key anywhere is an error. `schema` holds
//! the shape and its defaults; this module loads it and checks what serde
//! cannot express.

pub mod schema;

use std::fs;
use std::path::Path;

use hostbridge_core::{BridgeError, Result};
use tracing::debug;

use crate::builtins;

pub use schema::{BridgeConfig, DebugMode, HostSection, QuerySection};

/// The only config version this crate reads.
pub const CONFIG_VERSION: u32 = 1;

pub fn load_from_file(path: impl AsRef<Path>) -> Result<BridgeConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("read {} failed: {e}", path.display())))?;
    let cfg = load_from_str(&s)?;
    debug!(
        path = %path.display(),
        debug = ?cfg.query.debug,
        accept_expression = cfg.query.accept_expression,
        "bridge config loaded"
    );
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<BridgeConfig> {
    let cfg: BridgeConfig = serde_yaml::from_str(s)
        .map_err(|e| BridgeError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(BridgeError::Config(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }

        let nil = self.host.nil_constant.as_str();
        if !is_identifier(nil) {
            return Err(BridgeError::Config(format!(
                "host.nil_constant `{nil}` is not an identifier"
            )));
        }
        // The nil constant would replace the class constant of the same name.
        if self.host.builtin_classes && builtins::classes().iter().any(|c| c.name == nil) {
            return Err(BridgeError::Config(format!(
                "host.nil_constant `{nil}` collides with a builtin class"
            )));
        }

        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
