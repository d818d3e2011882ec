//! Test-runner mode and the `"<mode>:<name>"` value encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which Unity test platform a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestMode {
    EditMode,
    PlayMode,
}

impl TestMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TestMode::EditMode => "EditMode",
            TestMode::PlayMode => "PlayMode",
        }
    }

    /// Encodes a combined `"<mode>:<name>"` value, e.g. for `ExecuteTests`.
    pub fn with_name(self, name: &str) -> String {
        format!("{}:{name}", self.as_str())
    }

    /// Splits a `"<mode>:<payload>"` value at the first colon.
    ///
    /// The payload may itself contain colons (fully qualified test names,
    /// JSON test trees).
    pub fn split_value(value: &str) -> Option<(TestMode, &str)> {
        let (mode, rest) = value.split_once(':')?;
        let mode = mode.parse().ok()?;
        Some((mode, rest))
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EditMode" => Ok(TestMode::EditMode),
            "PlayMode" => Ok(TestMode::PlayMode),
            other => Err(format!("unknown test mode: {other}")),
        }
    }
}
