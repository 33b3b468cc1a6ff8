//! Config shape and defaults.

use serde::Deserialize;

use super::CONFIG_VERSION;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    #[serde(default)]
    pub query: QuerySection,

    #[serde(default)]
    pub host: HostSection,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            query: QuerySection::default(),
            host: HostSection::default(),
        }
    }
}

/// What the dispatcher does when the engine stops at a `debug()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// Log the message and tell the engine to continue.
    #[default]
    Continue,
    /// Abort the query.
    Fail,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuerySection {
    /// Let result rows carry symbolic expressions (data filtering).
    #[serde(default)]
    pub accept_expression: bool,

    #[serde(default)]
    pub debug: DebugMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    #[serde(default = "default_nil_constant")]
    pub nil_constant: String,

    #[serde(default = "default_builtin_classes")]
    pub builtin_classes: bool,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            nil_constant: default_nil_constant(),
            builtin_classes: default_builtin_classes(),
        }
    }
}

fn default_nil_constant() -> String {
    "nil".into()
}
fn default_builtin_classes() -> bool {
    true
}
