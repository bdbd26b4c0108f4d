use std::env;
use std::path::PathBuf;

use crate::error::EngineError;

/// Engine configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub ranking: RankingConfig,
    pub refinement: RefinementConfig,
    pub deprecation: DeprecationConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Relevance ranking configuration
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Maximum number of results returned per query.
    pub top_k: usize,
    /// Minimum final score a result must reach to be surfaced.
    pub threshold: f64,
    /// Candidate scan cap; larger populations are truncated to stay inside
    /// the ranking latency budget.
    pub max_candidates: usize,
}

/// Confidence refinement configuration
#[derive(Debug, Clone)]
pub struct RefinementConfig {
    /// Retries for a versioned save that lost a concurrent update race.
    pub max_update_retries: u32,
}

/// Automatic deprecation thresholds
#[derive(Debug, Clone)]
pub struct DeprecationConfig {
    /// Confidence below which an item is deprecated automatically.
    pub confidence_floor: f64,
    /// Failure count that deprecates an item with no recorded successes.
    pub failure_threshold: u32,
    /// Contradiction count that deprecates an item outright.
    pub contradiction_threshold: u32,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, EngineError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let ranking = RankingConfig {
            top_k: env::var("PROCMEM_TOP_K")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            threshold: env::var("PROCMEM_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.7),
            max_candidates: env::var("PROCMEM_MAX_CANDIDATES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(512),
        };

        let refinement = RefinementConfig {
            max_update_retries: env::var("PROCMEM_MAX_UPDATE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        };

        let deprecation = DeprecationConfig {
            confidence_floor: env::var("PROCMEM_DEPRECATE_BELOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.30),
            failure_threshold: env::var("PROCMEM_DEPRECATE_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            contradiction_threshold: env::var("PROCMEM_DEPRECATE_CONTRADICTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("PROCMEM_DATABASE_PATH")
                    .unwrap_or_else(|_| "./data/knowledge.db".to_string()),
            ),
            max_connections: env::var("PROCMEM_DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("PROCMEM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("PROCMEM_LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let config = EngineConfig {
            ranking,
            refinement,
            deprecation,
            database,
            logging,
        };
        config.validate()?;

        Ok(config)
    }

    /// Reject configurations the ranking and deprecation math cannot honor
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.ranking.top_k == 0 {
            return Err(EngineError::Config {
                message: "PROCMEM_TOP_K must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.ranking.threshold) {
            return Err(EngineError::Config {
                message: format!(
                    "PROCMEM_THRESHOLD must be within [0.0, 1.0], got {}",
                    self.ranking.threshold
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.deprecation.confidence_floor) {
            return Err(EngineError::Config {
                message: format!(
                    "PROCMEM_DEPRECATE_BELOW must be within [0.0, 1.0], got {}",
                    self.deprecation.confidence_floor
                ),
            });
        }
        Ok(())
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            threshold: 0.7,
            max_candidates: 512,
        }
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_update_retries: 3,
        }
    }
}

impl Default for DeprecationConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.30,
            failure_threshold: 3,
            contradiction_threshold: 2,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/knowledge.db"),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.ranking.top_k, 3);
        assert!((config.ranking.threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.ranking.max_candidates, 512);
        assert_eq!(config.refinement.max_update_retries, 3);
        assert!((config.deprecation.confidence_floor - 0.30).abs() < f64::EPSILON);
        assert_eq!(config.deprecation.failure_threshold, 3);
        assert_eq!(config.deprecation.contradiction_threshold, 2);
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = EngineConfig::default();
        config.ranking.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = EngineConfig::default();
        config.ranking.threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PROCMEM_THRESHOLD"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }
}
