use serde::Serialize;

/// The final payload handed back to the calling automation.
///
/// Serializes to `{"changed": true, "msg": ...}` on success and
/// `{"failed": true, "msg": ...}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Changed { changed: bool, msg: String },
    Failed { failed: bool, msg: String },
}

impl RunOutcome {
    pub fn success(msg: impl Into<String>) -> Self {
        Self::Changed {
            changed: true,
            msg: msg.into(),
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failed {
            failed: true,
            msg: msg.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
