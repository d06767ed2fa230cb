// Startup configuration.
//
// Everything comes from the environment (optionally via a .env file). Parsing
// goes through a lookup function so tests never have to touch process env.

use crate::core::ai::models::DEFAULT_SUMMARY_PROMPT;
use crate::core::ai::AiConfig;
use crate::core::memo::{AuthorRoster, MemoSettings, SheetClock};
use crate::infra::google_sheets::SheetTarget;
use chrono_tz::Tz;
use std::time::Duration;
use thiserror::Error;

/// Discord interaction tokens die after 15 minutes; stay under that.
const MAX_SESSION_TIMEOUT_SECS: u64 = 14 * 60;

// Discord limits for select menu options.
const MAX_AUTHORS: usize = 25;
const MAX_AUTHOR_NAME_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error(
        "Missing service account credentials: \
         set GOOGLE_SERVICE_ACCOUNT_KEY or GOOGLE_SERVICE_ACCOUNT_JSON"
    )]
    MissingCredentials,

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Could not read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub system_prompt: String,
    pub config: AiConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discord_token: String,
    /// Register slash commands in this guild only (instant updates while testing).
    pub guild_id: Option<u64>,
    pub ai: AiSettings,
    pub service_account_json: String,
    pub sheet: SheetTarget,
    pub memo: MemoSettings,
    pub session_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let discord_token = require("DISCORD_TOKEN")?;
        let guild_id = parse_opt::<u64>(&get, "DISCORD_GUILD_ID")?;

        let api_key = match get("GROQ_API_KEY") {
            Some(key) => key,
            None => require("AI_API_KEY").map_err(|_| ConfigError::Missing("GROQ_API_KEY"))?,
        };

        let system_prompt = if let Some(path) = get("AI_SYSTEM_PROMPT_FILE") {
            read_file(&path)?
        } else {
            get("AI_SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SUMMARY_PROMPT.to_string())
        };

        let defaults = AiConfig::default();
        let temperature =
            parse_opt::<f32>(&get, "AI_TEMPERATURE")?.unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                key: "AI_TEMPERATURE",
                reason: format!("{} is outside 0.0..=2.0", temperature),
            });
        }

        let ai = AiSettings {
            api_key,
            base_url: get("AI_BASE_URL"),
            system_prompt,
            config: AiConfig {
                model: get("AI_MODEL").unwrap_or(defaults.model),
                temperature,
                max_tokens: parse_opt::<u32>(&get, "AI_MAX_TOKENS")?,
            },
        };

        let service_account_json = if let Some(path) = get("GOOGLE_SERVICE_ACCOUNT_KEY") {
            read_file(&path)?
        } else {
            get("GOOGLE_SERVICE_ACCOUNT_JSON").ok_or(ConfigError::MissingCredentials)?
        };

        let spreadsheet_id = get("SPREADSHEET_ID");
        let spreadsheet_name = match (&spreadsheet_id, get("SPREADSHEET_NAME")) {
            (_, Some(name)) => name,
            (Some(id), None) => id.clone(),
            (None, None) => return Err(ConfigError::Missing("SPREADSHEET_NAME")),
        };
        let sheet = SheetTarget {
            spreadsheet_name,
            spreadsheet_id,
            tab_name: require("SPREADSHEET_TAB_NAME")?,
        };

        let roster = match get("MEMO_AUTHORS") {
            Some(list) => AuthorRoster::new(list.split(',')).ok_or(ConfigError::Invalid {
                key: "MEMO_AUTHORS",
                reason: "no author names given".to_string(),
            })?,
            None => AuthorRoster::default(),
        };
        check_roster(&roster)?;

        let clock = if let Some(zone) = get("MEMO_TIMEZONE") {
            let tz: Tz = zone.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "MEMO_TIMEZONE",
                reason: format!("{}", e),
            })?;
            SheetClock::Zone(tz)
        } else if let Some(hours) = parse_opt::<i32>(&get, "MEMO_UTC_OFFSET_HOURS")? {
            SheetClock::from_offset_hours(hours).ok_or(ConfigError::Invalid {
                key: "MEMO_UTC_OFFSET_HOURS",
                reason: format!("{} is not a valid UTC offset", hours),
            })?
        } else {
            SheetClock::default()
        };

        let defaults = MemoSettings::default();
        let reset_delay = parse_opt::<u64>(&get, "MEMO_RESET_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.reset_delay);

        let session_timeout = Duration::from_secs(
            parse_opt::<u64>(&get, "MEMO_SESSION_TIMEOUT_SECS")?
                .unwrap_or(MAX_SESSION_TIMEOUT_SECS)
                .clamp(30, MAX_SESSION_TIMEOUT_SECS),
        );

        Ok(Self {
            discord_token,
            guild_id,
            ai,
            service_account_json,
            sheet,
            memo: MemoSettings {
                roster,
                clock,
                reset_delay,
            },
            session_timeout,
        })
    }
}

fn parse_opt<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("'{}': {}", raw, e),
            })
        })
        .transpose()
}

fn check_roster(roster: &AuthorRoster) -> Result<(), ConfigError> {
    if roster.names().len() > MAX_AUTHORS {
        return Err(ConfigError::Invalid {
            key: "MEMO_AUTHORS",
            reason: format!(
                "{} names given, at most {} fit in the menu",
                roster.names().len(),
                MAX_AUTHORS
            ),
        });
    }

    if let Some(name) = roster
        .names()
        .iter()
        .find(|name| name.chars().count() > MAX_AUTHOR_NAME_CHARS)
    {
        return Err(ConfigError::Invalid {
            key: "MEMO_AUTHORS",
            reason: format!(
                "'{}' is longer than {} characters",
                name, MAX_AUTHOR_NAME_CHARS
            ),
        });
    }

    Ok(())
}

fn read_file(path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DISCORD_TOKEN", "discord-token".to_string()),
            ("GROQ_API_KEY", "gsk_test".to_string()),
            ("GOOGLE_SERVICE_ACCOUNT_JSON", "{}".to_string()),
            ("SPREADSHEET_NAME", "Team Memos".to_string()),
            ("SPREADSHEET_TAB_NAME", "Log".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn minimal_env_uses_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.ai.config.model, "llama-3.1-8b-instant");
        assert_eq!(config.ai.config.temperature, 0.5);
        assert_eq!(config.ai.system_prompt, DEFAULT_SUMMARY_PROMPT);
        assert!(config.ai.base_url.is_none());
        assert_eq!(config.sheet.spreadsheet_name, "Team Memos");
        assert_eq!(config.sheet.tab_name, "Log");
        assert_eq!(config.memo.roster.names().len(), 4);
        assert_eq!(config.memo.clock, SheetClock::default());
        assert_eq!(config.memo.reset_delay, Duration::from_millis(1200));
        assert_eq!(config.session_timeout, Duration::from_secs(14 * 60));
        assert!(config.guild_id.is_none());
    }

    #[test]
    fn each_required_key_is_reported() {
        for key in [
            "DISCORD_TOKEN",
            "GROQ_API_KEY",
            "SPREADSHEET_NAME",
            "SPREADSHEET_TAB_NAME",
        ] {
            let mut env = base_env();
            env.remove(key);

            match load(&env) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, key),
                other => panic!("expected Missing({}), got {:?}", key, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn missing_credentials_is_fatal() {
        let mut env = base_env();
        env.remove("GOOGLE_SERVICE_ACCOUNT_JSON");

        assert!(matches!(load(&env), Err(ConfigError::MissingCredentials)));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut env = base_env();
        env.insert("DISCORD_TOKEN", "   ".to_string());

        assert!(matches!(load(&env), Err(ConfigError::Missing("DISCORD_TOKEN"))));
    }

    #[test]
    fn ai_api_key_is_accepted_as_alias() {
        let mut env = base_env();
        env.remove("GROQ_API_KEY");
        env.insert("AI_API_KEY", "sk-other".to_string());

        assert_eq!(load(&env).unwrap().ai.api_key, "sk-other");
    }

    #[test]
    fn spreadsheet_id_replaces_name_lookup() {
        let mut env = base_env();
        env.remove("SPREADSHEET_NAME");
        env.insert("SPREADSHEET_ID", "1AbCdEf".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.sheet.spreadsheet_id.as_deref(), Some("1AbCdEf"));
        assert_eq!(config.sheet.spreadsheet_name, "1AbCdEf");
    }

    #[test]
    fn credentials_can_come_from_a_key_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"client_email": "bot@x.iam.gserviceaccount.com"}}"#).unwrap();

        let mut env = base_env();
        env.remove("GOOGLE_SERVICE_ACCOUNT_JSON");
        env.insert(
            "GOOGLE_SERVICE_ACCOUNT_KEY",
            file.path().to_string_lossy().to_string(),
        );

        let config = load(&env).unwrap();
        assert!(config.service_account_json.contains("bot@x.iam"));
    }

    #[test]
    fn unreadable_key_file_is_reported() {
        let mut env = base_env();
        env.insert(
            "GOOGLE_SERVICE_ACCOUNT_KEY",
            "/definitely/not/here.json".to_string(),
        );

        assert!(matches!(load(&env), Err(ConfigError::Unreadable { .. })));
    }

    #[test]
    fn system_prompt_file_wins_over_inline_prompt() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "Summarize in one line.").unwrap();

        let mut env = base_env();
        env.insert("AI_SYSTEM_PROMPT", "inline".to_string());
        env.insert(
            "AI_SYSTEM_PROMPT_FILE",
            file.path().to_string_lossy().to_string(),
        );

        assert_eq!(load(&env).unwrap().ai.system_prompt, "Summarize in one line.");
    }

    #[test]
    fn ai_overrides_are_parsed() {
        let mut env = base_env();
        env.insert("AI_MODEL", "llama-3.3-70b-versatile".to_string());
        env.insert("AI_TEMPERATURE", "0.2".to_string());
        env.insert("AI_MAX_TOKENS", "300".to_string());
        env.insert("AI_BASE_URL", "http://localhost:11434/v1".to_string());

        let ai = load(&env).unwrap().ai;
        assert_eq!(ai.config.model, "llama-3.3-70b-versatile");
        assert_eq!(ai.config.temperature, 0.2);
        assert_eq!(ai.config.max_tokens, Some(300));
        assert_eq!(ai.base_url.as_deref(), Some("http://localhost:11434/v1"));
    }

    #[test]
    fn bad_numbers_name_the_key() {
        let mut env = base_env();
        env.insert("AI_TEMPERATURE", "warm".to_string());

        match load(&env) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "AI_TEMPERATURE"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }

        env.insert("AI_TEMPERATURE", "3.5".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { key: "AI_TEMPERATURE", .. })
        ));
    }

    #[test]
    fn authors_come_from_comma_list() {
        let mut env = base_env();
        env.insert("MEMO_AUTHORS", "Kim, Lee ,Park,,".to_string());

        let roster = load(&env).unwrap().memo.roster;
        assert_eq!(roster.names(), &["Kim", "Lee", "Park"]);

        env.insert("MEMO_AUTHORS", " , ,".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { key: "MEMO_AUTHORS", .. })
        ));
    }

    #[test]
    fn authors_must_fit_the_select_menu() {
        let mut env = base_env();
        let crowd: Vec<String> = (1..=26).map(|i| format!("Member {}", i)).collect();
        env.insert("MEMO_AUTHORS", crowd.join(","));
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { key: "MEMO_AUTHORS", .. })
        ));

        env.insert("MEMO_AUTHORS", crowd[..25].join(","));
        assert_eq!(load(&env).unwrap().memo.roster.names().len(), 25);

        env.insert("MEMO_AUTHORS", format!("Kim,{}", "가".repeat(101)));
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { key: "MEMO_AUTHORS", .. })
        ));

        env.insert("MEMO_AUTHORS", format!("Kim,{}", "가".repeat(100)));
        assert!(load(&env).is_ok());
    }

    #[test]
    fn timezone_and_offset_settings() {
        let mut env = base_env();
        env.insert("MEMO_UTC_OFFSET_HOURS", "-5".to_string());
        assert_eq!(
            load(&env).unwrap().memo.clock,
            SheetClock::from_offset_hours(-5).unwrap()
        );

        env.insert("MEMO_TIMEZONE", "Asia/Seoul".to_string());
        assert_eq!(
            load(&env).unwrap().memo.clock,
            SheetClock::Zone(chrono_tz::Asia::Seoul)
        );

        env.insert("MEMO_TIMEZONE", "Mars/Olympus".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { key: "MEMO_TIMEZONE", .. })
        ));
    }

    #[test]
    fn session_timeout_is_clamped_below_token_lifetime() {
        let mut env = base_env();
        env.insert("MEMO_SESSION_TIMEOUT_SECS", "3600".to_string());
        assert_eq!(load(&env).unwrap().session_timeout, Duration::from_secs(840));

        env.insert("MEMO_SESSION_TIMEOUT_SECS", "5".to_string());
        assert_eq!(load(&env).unwrap().session_timeout, Duration::from_secs(30));
    }

    #[test]
    fn guild_and_reset_delay_overrides() {
        let mut env = base_env();
        env.insert("DISCORD_GUILD_ID", "1432001978447167611".to_string());
        env.insert("MEMO_RESET_DELAY_MS", "0".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.guild_id, Some(1432001978447167611));
        assert_eq!(config.memo.reset_delay, Duration::ZERO);
    }
}
