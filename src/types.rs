use std::fmt;

use serde::{Deserialize, Serialize};

/// Key identifying which script slot a request targets.
///
/// Registered scripts use their configured id; the ad-hoc slot uses the
/// reserved [`ScriptIdentity::ADHOC`] key, which can never be a registered id
/// because `@` is rejected by config validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ScriptIdentity(String);

impl ScriptIdentity {
    pub const ADHOC: &'static str = "@adhoc";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn adhoc() -> Self {
        Self(Self::ADHOC.to_string())
    }

    pub fn is_adhoc(&self) -> bool {
        self.0 == Self::ADHOC
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScriptIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ScriptIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a caller wants to receive output.
///
/// - `Buffered`: one JSON result after the process has terminated.
/// - `Streamed`: a live text body that ends when the process terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Buffered,
    Streamed,
}
