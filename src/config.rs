use crate::error::{Error, Result};
use crate::models::question::Difficulty;
use crate::services::detection_service::DetectorPolicy;
use crate::services::grading_service::GradingSettings;
use crate::services::normalization_service::NormalizerSettings;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `text` or `json`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub public_rps: u32,
    pub max_batch_questions: usize,
    pub default_points: f64,
    pub numeric_tolerance: f64,
    pub participation_share: f64,
    pub explicit_type_first: bool,
    pub log_format: LogFormat,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_address: get_env("SERVER_ADDRESS")?,
            public_rps: get_env_or("PUBLIC_RPS", 50)?,
            max_batch_questions: get_env_or("MAX_BATCH_QUESTIONS", 200)?,
            default_points: get_env_or("DEFAULT_POINTS", 10.0)?,
            numeric_tolerance: get_env_or("NUMERIC_TOLERANCE", 0.001)?,
            participation_share: get_env_or("PARTICIPATION_SHARE", 0.1)?,
            explicit_type_first: get_env_or("EXPLICIT_TYPE_FIRST", true)?,
            log_format: get_env_or("LOG_FORMAT", LogFormat::Text)?,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if !(self.default_points.is_finite() && self.default_points >= 0.0) {
            return Err(Error::Config("DEFAULT_POINTS must be non-negative".to_string()));
        }
        if !(self.numeric_tolerance.is_finite() && self.numeric_tolerance >= 0.0) {
            return Err(Error::Config("NUMERIC_TOLERANCE must be non-negative".to_string()));
        }
        if !(0.0..=1.0).contains(&self.participation_share) {
            return Err(Error::Config(
                "PARTICIPATION_SHARE must be between 0 and 1".to_string(),
            ));
        }
        if self.max_batch_questions == 0 {
            return Err(Error::Config("MAX_BATCH_QUESTIONS must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn normalizer_settings(&self) -> NormalizerSettings {
        NormalizerSettings {
            default_points: self.default_points,
            default_difficulty: Difficulty::Medium,
            numeric_tolerance: self.numeric_tolerance,
            detector: DetectorPolicy {
                explicit_tag_first: self.explicit_type_first,
            },
            max_batch: self.max_batch_questions,
        }
    }

    pub fn grading_settings(&self) -> GradingSettings {
        GradingSettings {
            participation_share: self.participation_share,
            ..GradingSettings::default()
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(name, &raw),
        _ => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            server_address: "127.0.0.1:0".into(),
            public_rps: 50,
            max_batch_questions: 200,
            default_points: 10.0,
            numeric_tolerance: 0.001,
            participation_share: 0.1,
            explicit_type_first: true,
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn parses_values_and_reports_the_variable() {
        assert_eq!(parse_value::<u32>("PUBLIC_RPS", " 20 ").unwrap(), 20);
        assert!(!parse_value::<bool>("EXPLICIT_TYPE_FIRST", "false").unwrap());
        assert_eq!(parse_value::<LogFormat>("LOG_FORMAT", "JSON").unwrap(), LogFormat::Json);

        let err = parse_value::<u32>("PUBLIC_RPS", "fast").unwrap_err();
        assert!(err.to_string().contains("PUBLIC_RPS"));
    }

    #[test]
    fn rejects_out_of_range_settings() {
        assert!(sample().check().is_ok());

        let mut config = sample();
        config.participation_share = 1.5;
        assert!(matches!(config.check(), Err(Error::Config(_))));

        let mut config = sample();
        config.default_points = -1.0;
        assert!(config.check().is_err());
    }

    #[test]
    fn settings_follow_config() {
        let mut config = sample();
        config.explicit_type_first = false;
        config.max_batch_questions = 5;
        let settings = config.normalizer_settings();
        assert!(!settings.detector.explicit_tag_first);
        assert_eq!(settings.max_batch, 5);
        assert_eq!(config.grading_settings().participation_share, 0.1);
    }
}
