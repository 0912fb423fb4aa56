// Engine configuration.
use std::{env, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{macros::date, Date};

use crate::logic::{
    error::{EngineError, EngineResult},
    io::read_json_file,
    time::{iso_date_format, string_to_date},
    types::CompetitorId,
};

// Environment variable that points to a JSON configuration file.
pub const CONFIG_FILE_VAR: &str = "ENGINE_CONFIG";

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // An empty URL keeps everything in memory.
    pub database_url: String,

    // How many days a single run may simulate at most.
    pub max_iterations: u32,

    // Seed for all randomness. None seeds from the OS.
    pub seed: Option<u64>,

    // The competitor controlled by the player, if any.
    pub user_competitor_id: Option<CompetitorId>,

    // Weekdays on which matches may be played (1 = Monday, 7 = Sunday).
    pub match_weekdays: Vec<u8>,

    // Whether group stage matches may end in a draw.
    pub allow_group_draws: bool,

    // Days between the end of a season and the start of the next one.
    pub off_season_days: u32,

    // Days between accepting a transfer and finalising it.
    pub transfer_finalize_days: u32,

    #[serde(with = "iso_date_format")]
    pub start_date: Date,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_iterations: 7,
            seed: None,
            user_competitor_id: None,
            match_weekdays: vec![3, 6, 7],
            allow_group_draws: true,
            off_season_days: 30,
            transfer_finalize_days: 3,
            start_date: date!(2025-07-01),
        }
    }
}

impl EngineConfig {
    // Load the configuration: the file named by ENGINE_CONFIG (if any), then environment overrides.
    pub fn load() -> EngineResult<Self> {
        let config = match env::var(CONFIG_FILE_VAR) {
            Ok(path) => Self::from_json_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        return Ok(config);
    }

    // Read the configuration from a JSON file. Missing fields get their defaults.
    pub fn from_json_file(path: &Path) -> EngineResult<Self> {
        let json = read_json_file(path)?;
        let config: Self = serde_json::from_str(&json)?;
        return Ok(config);
    }

    // Default configuration with environment overrides applied.
    pub fn from_env() -> EngineResult<Self> {
        Self::default().with_env_overrides()
    }

    // Apply ENGINE_* environment variables on top of this configuration.
    pub fn with_env_overrides(mut self) -> EngineResult<Self> {
        if let Ok(url) = env::var("ENGINE_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(n) = parse_var("ENGINE_MAX_ITERATIONS")? {
            self.max_iterations = n;
        }
        if let Some(seed) = parse_var("ENGINE_SEED")? {
            self.seed = Some(seed);
        }
        if let Some(id) = parse_var("ENGINE_USER_COMPETITOR")? {
            self.user_competitor_id = Some(id);
        }
        if let Ok(days) = env::var("ENGINE_MATCH_WEEKDAYS") {
            self.match_weekdays = parse_weekdays(&days)?;
        }
        if let Some(allow) = parse_var("ENGINE_ALLOW_GROUP_DRAWS")? {
            self.allow_group_draws = allow;
        }
        if let Some(days) = parse_var("ENGINE_OFF_SEASON_DAYS")? {
            self.off_season_days = days;
        }
        if let Some(days) = parse_var("ENGINE_TRANSFER_FINALIZE_DAYS")? {
            self.transfer_finalize_days = days;
        }
        if let Ok(s) = env::var("ENGINE_START_DATE") {
            self.start_date = string_to_date(&s)
                .map_err(|e| EngineError::Config(format!("ENGINE_START_DATE: {e}")))?;
        }
        return Ok(self);
    }

    // Check that the values make sense.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_iterations == 0 {
            return Err(EngineError::Config("max_iterations must be at least 1".to_string()));
        }
        if let Some(day) = self.match_weekdays.iter().find(|d| !(1..=7).contains(*d)) {
            return Err(EngineError::Config(format!("{day} is not a weekday")));
        }
        return Ok(());
    }
}

// Parse an environment variable if it is set.
fn parse_var<T: FromStr>(name: &str) -> EngineResult<Option<T>>
where T::Err: std::fmt::Display {
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>()
            .map(Some)
            .map_err(|e| EngineError::Config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

// Parse a comma-separated list of weekday numbers.
fn parse_weekdays(s: &str) -> EngineResult<Vec<u8>> {
    s.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.parse::<u8>().map_err(|e| EngineError::Config(format!("ENGINE_MATCH_WEEKDAYS: {e}"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_get_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"seed": 5, "start_date": "2026-01-02"}"#).unwrap();
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.start_date, date!(2026-01-02));
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.match_weekdays, vec![3, 6, 7]);
    }

    #[test]
    fn weekday_parsing() {
        assert_eq!(parse_weekdays("1, 3,7").unwrap(), vec![1, 3, 7]);
        assert_eq!(parse_weekdays("").unwrap(), Vec::<u8>::new());
        assert!(parse_weekdays("mon").is_err());
    }

    #[test]
    fn validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let mut config = EngineConfig::default();
        config.match_weekdays = vec![0];
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.max_iterations = 0;
        assert!(config.validate().is_err());
    }
}
