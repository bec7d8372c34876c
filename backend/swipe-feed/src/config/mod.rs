use serde::Deserialize;
use thiserror::Error;

const RANKING_PREFIX: &str = "RANKING_";
const FEED_PREFIX: &str = "FEED_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Everything a feed session needs besides its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub ranking: RankingConfig,
    pub feed: FeedConfig,
}

/// Ranking coefficients.
///
/// Every field is required: two engines given the same inputs and the same
/// config must produce the same base scores, so nothing here is defaulted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RankingConfig {
    pub category_preference: f64,
    pub brand_preference: f64,
    pub popularity_score: f64,
    pub recency_boost: f64,
    /// Applied to the base score when the viewer follows the author
    pub following_boost_multiplier: f64,
    /// Upper bound (exclusive) of the random jitter added after boosting
    pub diversity_factor: f64,
}

/// Window and batch sizes for assembly and pagination
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedConfig {
    /// Recommended mode keeps this many top-scored items before shuffling
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,
    /// Recommended mode serves this many items after shuffling
    #[serde(default = "default_feed_size")]
    pub feed_size: usize,
    /// Items requested from the content store per replenishment
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Replenish once fewer than this many cards remain ahead of the cursor
    #[serde(default = "default_replenish_threshold")]
    pub replenish_threshold: usize,
    /// Cards exposed by a default peek
    #[serde(default = "default_stack_depth")]
    pub stack_depth: usize,
}

fn default_candidate_pool_size() -> usize {
    50
}

fn default_feed_size() -> usize {
    20
}

fn default_batch_size() -> usize {
    20
}

fn default_replenish_threshold() -> usize {
    3
}

fn default_stack_depth() -> usize {
    3
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            candidate_pool_size: default_candidate_pool_size(),
            feed_size: default_feed_size(),
            batch_size: default_batch_size(),
            replenish_threshold: default_replenish_threshold(),
            stack_depth: default_stack_depth(),
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let coefficients = [
            ("category_preference", self.category_preference),
            ("brand_preference", self.brand_preference),
            ("popularity_score", self.popularity_score),
            ("recency_boost", self.recency_boost),
            ("following_boost_multiplier", self.following_boost_multiplier),
            ("diversity_factor", self.diversity_factor),
        ];

        for (field, value) in coefficients {
            if !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is not a finite number", value),
                });
            }
        }

        if self.following_boost_multiplier < 0.0 {
            return Err(ConfigError::Invalid {
                field: "following_boost_multiplier",
                reason: "must not be negative".to_string(),
            });
        }

        if self.diversity_factor < 0.0 {
            return Err(ConfigError::Invalid {
                field: "diversity_factor",
                reason: "must not be negative".to_string(),
            });
        }

        Ok(())
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed_size == 0 {
            return Err(ConfigError::Invalid {
                field: "feed_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.feed_size > self.candidate_pool_size {
            return Err(ConfigError::Invalid {
                field: "feed_size",
                reason: format!(
                    "{} exceeds candidate_pool_size {}",
                    self.feed_size, self.candidate_pool_size
                ),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.stack_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "stack_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Load from the process environment (and `.env` if present).
    ///
    /// Ranking coefficients are read from `RANKING_*` and are all required;
    /// feed sizes are read from `FEED_*` and fall back to the standard window.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let ranking: RankingConfig = envy::prefixed(RANKING_PREFIX).from_env()?;
        let feed: FeedConfig = envy::prefixed(FEED_PREFIX).from_env()?;
        Self::validated(ranking, feed)
    }

    /// Same as [`SessionConfig::from_env`] but reads from explicit key/value pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        let ranking: RankingConfig = envy::prefixed(RANKING_PREFIX).from_iter(vars.clone())?;
        let feed: FeedConfig = envy::prefixed(FEED_PREFIX).from_iter(vars)?;
        Self::validated(ranking, feed)
    }

    fn validated(ranking: RankingConfig, feed: FeedConfig) -> Result<Self, ConfigError> {
        ranking.validate()?;
        feed.validate()?;
        Ok(Self { ranking, feed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking_vars() -> Vec<(String, String)> {
        vec![
            ("RANKING_CATEGORY_PREFERENCE", "0.4"),
            ("RANKING_BRAND_PREFERENCE", "0.2"),
            ("RANKING_POPULARITY_SCORE", "0.2"),
            ("RANKING_RECENCY_BOOST", "0.2"),
            ("RANKING_FOLLOWING_BOOST_MULTIPLIER", "1.5"),
            ("RANKING_DIVERSITY_FACTOR", "0.1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_from_vars_uses_feed_defaults() {
        let config = SessionConfig::from_vars(ranking_vars()).unwrap();

        assert_eq!(config.ranking.category_preference, 0.4);
        assert_eq!(config.ranking.following_boost_multiplier, 1.5);
        assert_eq!(config.feed, FeedConfig::default());
        assert_eq!(config.feed.candidate_pool_size, 50);
        assert_eq!(config.feed.feed_size, 20);
    }

    #[test]
    fn test_feed_overrides() {
        let mut vars = ranking_vars();
        vars.push(("FEED_BATCH_SIZE".to_string(), "10".to_string()));
        vars.push(("FEED_STACK_DEPTH".to_string(), "5".to_string()));

        let config = SessionConfig::from_vars(vars).unwrap();
        assert_eq!(config.feed.batch_size, 10);
        assert_eq!(config.feed.stack_depth, 5);
        assert_eq!(config.feed.replenish_threshold, 3);
    }

    #[test]
    fn test_missing_ranking_coefficient_is_rejected() {
        let vars: Vec<_> = ranking_vars()
            .into_iter()
            .filter(|(k, _)| k != "RANKING_RECENCY_BOOST")
            .collect();

        let result = SessionConfig::from_vars(vars);
        assert!(matches!(result, Err(ConfigError::Env(_))));
    }

    #[test]
    fn test_negative_diversity_factor_is_rejected() {
        let mut vars = ranking_vars();
        vars.retain(|(k, _)| k != "RANKING_DIVERSITY_FACTOR");
        vars.push(("RANKING_DIVERSITY_FACTOR".to_string(), "-0.5".to_string()));

        let result = SessionConfig::from_vars(vars);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "diversity_factor",
                ..
            })
        ));
    }

    #[test]
    fn test_feed_size_must_fit_candidate_pool() {
        let config = FeedConfig {
            candidate_pool_size: 10,
            feed_size: 20,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
