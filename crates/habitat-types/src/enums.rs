//! Enumeration types shared by the relay and the dashboard.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Severity of a dashboard alert.
///
/// Serialized in lowercase (`"info"`, `"warning"`, `"error"`), which is the
/// form the dashboard switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Informational notice.
    Info,
    /// Something an operator should look at.
    Warning,
    /// A failure requiring attention.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_serialize_lowercase() {
        let json = serde_json::to_string(&[AlertLevel::Info, AlertLevel::Warning, AlertLevel::Error]).ok();
        assert_eq!(json.as_deref(), Some(r#"["info","warning","error"]"#));
    }
}
