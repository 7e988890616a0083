use serde::{Deserialize, Serialize};

pub(crate) fn default_api_base() -> String {
    "https://api.line.me".to_string()
}

/// Messaging API channel credentials and addressing.
#[derive(Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Shared secret used to verify `X-Line-Signature`.
    #[serde(default, rename = "channelSecret")]
    pub channel_secret: String,
    /// Long-lived token for the outbound reply and push APIs.
    #[serde(default, rename = "channelAccessToken")]
    pub channel_access_token: String,
    #[serde(default = "default_api_base", rename = "apiBase")]
    pub api_base: String,
    /// Groups the push endpoint may address. The first entry is the default target.
    #[serde(default, rename = "allowedGroupIds")]
    pub allowed_group_ids: Vec<String>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            channel_access_token: String::new(),
            api_base: default_api_base(),
            allowed_group_ids: Vec::new(),
        }
    }
}

redact_debug!(
    LineConfig,
    redact(channel_secret),
    redact(channel_access_token),
    api_base,
    allowed_group_ids,
);

impl LineConfig {
    /// Parse a comma-separated group id list, dropping blanks.
    pub fn parse_group_ids(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether the push endpoint may address `group_id`. An empty list allows any group.
    pub fn is_group_allowed(&self, group_id: &str) -> bool {
        self.allowed_group_ids.is_empty() || self.allowed_group_ids.iter().any(|g| g == group_id)
    }
}
