use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::db::config::{env_bool, env_u32, env_u64};

pub const DEFAULT_AUTH_USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// Header carrying the user id validated by the upstream identity provider
    pub auth_user_header: String,
    /// Question import is disabled while unset
    pub admin_api_key: Option<String>,
    pub exam: ExamConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExamConfig {
    /// Default count for practice and review sessions
    pub default_practice_count: u32,
    pub full_simulation_count: u32,
    pub seconds_per_question: u32,
    pub max_question_count: u32,
    /// Fixed sampling seed, for tests and replays only
    pub selection_seed: Option<u64>,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            default_practice_count: 10,
            full_simulation_count: 50,
            seconds_per_question: 72,
            max_question_count: 100,
            selection_seed: None,
        }
    }
}

impl ExamConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_practice_count: env_u32("EXAM_DEFAULT_PRACTICE_COUNT", defaults.default_practice_count)
                .max(1),
            full_simulation_count: env_u32("EXAM_FULL_SIMULATION_COUNT", defaults.full_simulation_count)
                .max(1),
            seconds_per_question: env_u32("EXAM_SECONDS_PER_QUESTION", defaults.seconds_per_question)
                .max(1),
            max_question_count: env_u32("EXAM_MAX_QUESTION_COUNT", defaults.max_question_count).max(1),
            selection_seed: std::env::var("SELECTION_SEED")
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub schedule: String,
    pub stale_hours: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: "0 */10 * * * *".to_string(),
            stale_hours: 24,
        }
    }
}

impl CleanupConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_bool("SESSION_CLEANUP_ENABLED", defaults.enabled),
            schedule: std::env::var("SESSION_CLEANUP_SCHEDULE")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.schedule),
            stale_hours: env_u64("SESSION_STALE_HOURS", defaults.stale_hours).max(1),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let auth_user_header = std::env::var("AUTH_USER_HEADER")
            .ok()
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTH_USER_HEADER.to_string());

        let admin_api_key = std::env::var("ADMIN_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Self {
            host,
            port,
            log_level,
            auth_user_header,
            admin_api_key,
            exam: ExamConfig::from_env(),
            cleanup: CleanupConfig::from_env(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 3000,
            log_level: "info".to_string(),
            auth_user_header: DEFAULT_AUTH_USER_HEADER.to_string(),
            admin_api_key: None,
            exam: ExamConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_defaults() {
        let exam = ExamConfig::default();
        assert_eq!(exam.default_practice_count, 10);
        assert_eq!(exam.full_simulation_count, 50);
        assert_eq!(exam.seconds_per_question, 72);
        assert_eq!(exam.max_question_count, 100);
        assert!(exam.selection_seed.is_none());
    }

    #[test]
    fn test_bind_addr() {
        let config = Config {
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.auth_user_header, "x-user-id");
    }
}
