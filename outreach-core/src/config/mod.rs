use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Campaign-facing configuration. Every field has a default; a missing
/// value is never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachConfig {
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Static OTP seed; present for completeness, unused by the
    /// puzzle-based challenge.
    #[serde(default)]
    pub otp_seed: Option<String>,
    /// Consumed by real driver backends; the scripted session ignores it.
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// Optional process-lifetime cap, independent of the daily limit.
    #[serde(default)]
    pub session_limit: Option<u32>,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub templates: MessageTemplates,
}

/// Message bodies with `{{key}}` placeholders, substituted per target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplates {
    #[serde(default = "default_connect_note")]
    pub connect_note: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_follow_up")]
    pub follow_up: String,
}

impl OutreachConfig {
    /// Rejects values the engine cannot run with. Called once after
    /// loading; workflows assume a validated config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "app_url".to_string(),
            });
        }
        if !self.app_url.starts_with("http://") && !self.app_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "app_url".to_string(),
                reason: format!("'{}' is not an http(s) URL", self.app_url),
            });
        }
        if self.daily_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "daily_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn default_app_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "password123".to_string()
}

fn default_daily_limit() -> u32 {
    20
}

fn default_cooldown_seconds() -> u64 {
    60
}

fn default_db_path() -> String {
    "outreach.db".to_string()
}

fn default_connect_note() -> String {
    "Hi {{name}}, I saw your profile and would love to connect! I'm interested in your work at {{company}}.".to_string()
}

fn default_greeting() -> String {
    "Hi {{name}}, great to see you in my network! How are things at {{company}}?".to_string()
}

fn default_follow_up() -> String {
    "Hi {{name}}, great to connect with you! I noticed your work at {{company}} - would love to keep in touch.".to_string()
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            connect_note: default_connect_note(),
            greeting: default_greeting(),
            follow_up: default_follow_up(),
        }
    }
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            app_url: default_app_url(),
            username: default_username(),
            password: default_password(),
            otp_seed: None,
            headless: false,
            daily_limit: default_daily_limit(),
            session_limit: None,
            cooldown_seconds: default_cooldown_seconds(),
            db_path: default_db_path(),
            templates: MessageTemplates::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(OutreachConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_daily_limit_is_rejected() {
        let config = OutreachConfig {
            daily_limit: 0,
            ..OutreachConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let config = OutreachConfig {
            app_url: "ftp://example.com".to_string(),
            ..OutreachConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
