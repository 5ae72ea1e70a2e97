//! Backend contract types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::BackendError;

/// User/session snapshot returned by the dashboard endpoint.
///
/// Only the fields the dashboard reads are typed; anything else the backend
/// sends is kept in `extra` so it survives a round trip through the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub aura_color: Option<String>,

    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub xp: Option<u64>,
    #[serde(default)]
    pub streak: Option<u32>,

    /// History entries keyed by entry id.
    #[serde(default)]
    pub history: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trivia: Option<serde_json::Value>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Profile edit. Unset fields are left unchanged by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// `#rrggbb`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aura_color: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), BackendError> {
        let fields = [&self.first_name, &self.last_name, &self.bio, &self.aura_color];
        if fields.iter().all(|f| f.is_none()) {
            return Err(BackendError::InvalidInput("profile update has no fields".to_string()));
        }

        if let Some(color) = &self.aura_color
            && !is_hex_color(color)
        {
            return Err(BackendError::InvalidInput(format!("aura_color must be #rrggbb, got {color:?}")));
        }

        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7 && value.starts_with('#') && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// How the profile edit body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Form,
    Json,
}

/// Status field of a contract reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
    Guest,
}

/// `{status, message}` body returned by mutating endpoints.
///
/// Some endpoints report failures under `error` instead of `message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractReply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ContractReply {
    pub fn text(&self) -> String {
        self.message.clone().or_else(|| self.error.clone()).unwrap_or_default()
    }
}

/// Result of a profile edit as the page would act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ProfileOutcome {
    Updated(String),
    Rejected(String),
    /// Session is a guest session; the page must navigate here.
    RedirectToLogin(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_keeps_unknown_fields() {
        let json = r##"{
            "username": "ada",
            "first_name": "Ada",
            "aura_color": "#aabbcc",
            "level": 3,
            "xp": 1200,
            "history": {"e1": {"date": "2026-01-02", "mood": "calm"}},
            "trivia": {"q": "?", "a": "!"},
            "constellation": "The Kettle"
        }"##;

        let snapshot: DashboardSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.username.as_deref(), Some("ada"));
        assert_eq!(snapshot.level, Some(3));
        assert_eq!(snapshot.history.len(), 1);
        assert!(snapshot.insight.is_none());
        assert_eq!(snapshot.extra.get("constellation").and_then(|v| v.as_str()), Some("The Kettle"));
    }

    #[test]
    fn test_snapshot_tolerates_empty_object() {
        let snapshot: DashboardSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, DashboardSnapshot::default());
    }

    #[test]
    fn test_profile_update_validation() {
        assert!(ProfileUpdate::default().validate().is_err());

        let update = ProfileUpdate { bio: Some("hello".into()), ..Default::default() };
        assert!(update.validate().is_ok());

        let update = ProfileUpdate { aura_color: Some("red".into()), ..Default::default() };
        assert!(matches!(update.validate(), Err(BackendError::InvalidInput(_))));

        let update = ProfileUpdate { aura_color: Some("#A0b1C2".into()), ..Default::default() };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate { first_name: Some("Ada".into()), ..Default::default() };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"first_name":"Ada"}"#);
    }

    #[test]
    fn test_reply_text_falls_back_to_error() {
        let reply: ContractReply = serde_json::from_str(r#"{"status":"error","error":"Database Offline"}"#).unwrap();
        assert_eq!(reply.status, ReplyStatus::Error);
        assert_eq!(reply.text(), "Database Offline");
    }
}
