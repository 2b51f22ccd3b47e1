use anyhow::{bail, ensure, Context, Result};
use std::env;

use crate::time::{RangePolicy, DEFAULT_DURATION_MINUTES, MINUTES_PER_DAY};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub courses_api_url: String,
    pub policy: RangePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().with_context(|| format!("invalid PORT: {raw}"))?,
            None => 8081,
        };
        let courses_api_url = lookup("COURSES_API_URL")
            .filter(|url| !url.trim().is_empty())
            .context("COURSES_API_URL not set")?;

        let default_duration_minutes = match lookup("SCHEDULE_DURATION_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid SCHEDULE_DURATION_MINUTES: {raw}"))?,
            None => DEFAULT_DURATION_MINUTES,
        };
        ensure!(
            default_duration_minutes > 0 && i32::from(default_duration_minutes) < MINUTES_PER_DAY,
            "SCHEDULE_DURATION_MINUTES must be between 1 and {}",
            MINUTES_PER_DAY - 1
        );

        let require_exact_duration = match lookup("SCHEDULE_EXACT_DURATION") {
            Some(raw) => parse_flag(&raw).with_context(|| format!("invalid SCHEDULE_EXACT_DURATION: {raw}"))?,
            None => false,
        };

        Ok(Self {
            port,
            courses_api_url: courses_api_url.trim().trim_end_matches('/').to_string(),
            policy: RangePolicy {
                default_duration_minutes,
                require_exact_duration,
            },
        })
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected true or false, got {other:?}"),
    }
}
