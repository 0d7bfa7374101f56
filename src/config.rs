//! Graph construction options.
//!
//! Options can be built in code or loaded from JSON; missing keys fall back to
//! their defaults.
//!
//! ```json
//! { "auto_name_prefix": "node", "max_rank": 4 }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphOptions {
    /// Prefix for names given to operators built with `Operator::unnamed`
    /// (default: `"op"`, producing `op0`, `op1`, ...).
    pub auto_name_prefix: String,
    /// Highest rank accepted for graph inputs and constants (default: 5).
    pub max_rank: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            auto_name_prefix: "op".to_owned(),
            max_rank: 5,
        }
    }
}

impl GraphOptions {
    /// Parses options from JSON and validates them.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let options: GraphOptions = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auto_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "auto_name_prefix",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.max_rank == 0 {
            return Err(ConfigError::Invalid {
                field: "max_rank",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}
