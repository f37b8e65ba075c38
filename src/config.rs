//! Process configuration read from the environment

use crate::i18n::Lang;
use crate::runtime::identity::normalize_phone;
use crate::state_machine::UserId;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Admins configured outside the database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    user_ids: HashSet<UserId>,
    phones: HashSet<String>,
}

impl AdminAllowList {
    pub fn from_user_ids(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            user_ids: ids.into_iter().collect(),
            phones: HashSet::new(),
        }
    }

    /// Phones are normalized; entries that are not phone numbers are dropped
    pub fn from_phones<'a>(phones: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            user_ids: HashSet::new(),
            phones: phones.into_iter().filter_map(normalize_phone).collect(),
        }
    }

    #[must_use]
    pub fn merge(mut self, other: AdminAllowList) -> Self {
        self.user_ids.extend(other.user_ids);
        self.phones.extend(other.phones);
        self
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.user_ids.contains(&user_id)
    }

    pub fn contains_phone(&self, phone: &str) -> bool {
        self.phones.contains(phone)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.user_ids.iter().copied()
    }

    pub fn phones(&self) -> impl Iterator<Item = &str> {
        self.phones.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty() && self.phones.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub api_url: String,
    pub db_path: PathBuf,
    pub port: u16,
    /// When unset the bot long-polls instead of serving a webhook
    pub webhook_secret: Option<String>,
    pub admins: AdminAllowList,
    pub default_language: Lang,
    pub state_ttl: Option<Duration>,
    pub actor_idle: Duration,
}

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ACTOR_IDLE_SECS: u64 = 600;

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let api_url = get("BOT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let db_path = get("SCHOOL_DESK_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.school-desk/school.db"))
            },
            PathBuf::from,
        );

        let port: u16 = match get("SCHOOL_DESK_PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                var: "SCHOOL_DESK_PORT",
                value: v,
                reason: "expected a port number",
            })?,
            None => DEFAULT_PORT,
        };

        let webhook_secret = get("WEBHOOK_SECRET");

        let mut user_ids = Vec::new();
        for item in get("ADMIN_USER_IDS").iter().flat_map(|v| v.split(',')) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            user_ids.push(item.parse::<UserId>().map_err(|_| ConfigError::Invalid {
                var: "ADMIN_USER_IDS",
                value: item.to_string(),
                reason: "expected comma-separated numeric ids",
            })?);
        }
        let phones = get("ADMIN_PHONES").unwrap_or_default();
        let admins = AdminAllowList::from_user_ids(user_ids)
            .merge(AdminAllowList::from_phones(phones.split(',').map(str::trim)));

        let default_language = match get("DEFAULT_LANGUAGE") {
            Some(v) => Lang::from_code(&v).ok_or(ConfigError::Invalid {
                var: "DEFAULT_LANGUAGE",
                value: v,
                reason: "expected en, ru or uz",
            })?,
            None => Lang::Uz,
        };

        let state_ttl = parse_secs(get("STATE_TTL_SECS"), "STATE_TTL_SECS")?.map(Duration::from_secs);
        let actor_idle = Duration::from_secs(
            parse_secs(get("ACTOR_IDLE_SECS"), "ACTOR_IDLE_SECS")?.unwrap_or(DEFAULT_ACTOR_IDLE_SECS),
        );

        Ok(Self {
            bot_token,
            api_url,
            db_path,
            port,
            webhook_secret,
            admins,
            default_language,
            state_ttl,
            actor_idle,
        })
    }
}

fn parse_secs(value: Option<String>, var: &'static str) -> Result<Option<u64>, ConfigError> {
    match value {
        None => Ok(None),
        Some(v) => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Some(secs)),
            _ => Err(ConfigError::Invalid {
                var,
                value: v,
                reason: "expected a positive number of seconds",
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "123:abc"), ("HOME", "/home/bot")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.db_path, PathBuf::from("/home/bot/.school-desk/school.db"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.webhook_secret, None);
        assert_eq!(config.default_language, Lang::Uz);
        assert_eq!(config.state_ttl, None);
        assert_eq!(config.actor_idle, Duration::from_secs(600));
        assert!(config.admins.is_empty());
    }

    #[test]
    fn test_token_is_required() {
        assert_eq!(
            BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "  ")])).unwrap_err(),
            ConfigError::Missing("BOT_TOKEN")
        );
    }

    #[test]
    fn test_admin_lists() {
        let config = BotConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_USER_IDS", "11, 12,,"),
            ("ADMIN_PHONES", "+998 90 000 00 01, not-a-phone"),
        ]))
        .unwrap();
        assert!(config.admins.contains_user(11));
        assert!(config.admins.contains_user(12));
        assert!(config.admins.contains_phone("+998900000001"));
        assert_eq!(config.admins.phones().count(), 1);
    }

    #[test]
    fn test_invalid_values() {
        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_USER_IDS", "11,abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "ADMIN_USER_IDS", .. }));

        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("STATE_TTL_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "STATE_TTL_SECS", .. }));

        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("DEFAULT_LANGUAGE", "de")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DEFAULT_LANGUAGE", .. }));
    }
}
