use super::schema::{Config, LineConfig};
use tracing::debug;

/// Env var holding a comma-separated group allow-list.
pub const ALLOWED_GROUP_IDS_ENV: &str = "LINEHOOK_ALLOWED_GROUP_IDS";

macro_rules! define_credentials {
    ($( $name:literal, $env:literal => $($path:ident).+ );* $(;)?) => {
        /// (slot name, env var name) pairs.
        pub const CREDENTIAL_ENV_VARS: &[(&str, &str)] = &[$(($name, $env)),*];

        /// Current value of a credential slot, if the name is known.
        pub fn get_credential_value<'a>(config: &'a Config, name: &str) -> Option<&'a str> {
            match name {
                $($name => Some(config.$($path).+.as_str()),)*
                _ => None,
            }
        }

        fn apply_secret_overrides(config: &mut Config) {
            $(
                if let Ok(val) = std::env::var($env)
                    && !val.is_empty()
                {
                    debug!("config: {} set from {}", $name, $env);
                    config.$($path).+ = val;
                }
            )*
        }
    };
}

define_credentials! {
    "channel-secret",       "LINEHOOK_CHANNEL_SECRET"       => line.channel_secret;
    "channel-access-token", "LINEHOOK_CHANNEL_ACCESS_TOKEN" => line.channel_access_token;
    "push-token",           "LINEHOOK_PUSH_TOKEN"           => gateway.push_token;
}

/// Apply environment variable overrides.
///
/// Any `LINEHOOK_*` variable that is set and non-empty replaces the value from
/// the config file, so secrets can be injected without touching it.
pub fn apply_env_overrides(config: &mut Config) {
    apply_secret_overrides(config);

    if let Ok(raw) = std::env::var(ALLOWED_GROUP_IDS_ENV) {
        let ids = LineConfig::parse_group_ids(&raw);
        if !ids.is_empty() {
            debug!(
                "config: {} allowed group id(s) from {}",
                ids.len(),
                ALLOWED_GROUP_IDS_ENV
            );
            config.line.allowed_group_ids = ids;
        }
    }
}
