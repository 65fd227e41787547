use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::core::RewardMode;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    pub agent: AgentConfig,
    pub portfolio: PortfolioConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// CSV file with the tick history
    #[serde(default)]
    pub path: String,
    /// Feature columns fed to the model; kept sorted by name
    #[serde(default = "default_feature_fields")]
    pub feature_fields: Vec<String>,
    /// Fraction of the history held out as the most recent test suffix
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Where the fitted scaler lives
    #[serde(default = "default_scaler_path")]
    pub scaler_path: String,
}

fn default_feature_fields() -> Vec<String> {
    vec![
        "change".to_string(),
        "close_vwap".to_string(),
        "high_low".to_string(),
        "open_close".to_string(),
    ]
}

fn default_test_fraction() -> f64 {
    0.40
}

fn default_scaler_path() -> String {
    "scaler.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Ticks per state window
    pub window_length: usize,
    /// Size of the discrete action space; the simulator supports exactly 3
    pub action_space_size: usize,
    /// Decisions between replay fits, also the batch size of each replay
    pub replay_interval: usize,
    /// Episodes per training session
    pub episode_count: usize,
    /// Discount applied to the bootstrapped next-state value
    pub discount_factor: f64,
    /// Exploration never decays below this
    pub epsilon_floor: f64,
    /// Linear exploration decay per decision
    pub epsilon_decay_step: f64,
    /// Whether trade outcomes produce shaped rewards
    #[serde(default)]
    pub reward_mode: RewardMode,
    /// Replay memory capacity
    pub memory_capacity: usize,
    /// Optional cap on ticks consumed per episode
    #[serde(default)]
    pub max_ticks: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioConfig {
    /// Cash at the start of every episode
    pub starting_cash: f64,
    /// Shares held at the start of every episode (entered at zero basis)
    #[serde(default)]
    pub starting_shares: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Hidden ReLU layer widths, input to head
    #[serde(default = "default_hidden_layers")]
    pub hidden_layers: Vec<usize>,
    /// SGD step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Load this model instead of starting fresh
    #[serde(default)]
    pub path: Option<String>,
    /// Directory run artifacts and saved models go to
    #[serde(default = "default_save_dir")]
    pub save_dir: String,
}

fn default_hidden_layers() -> Vec<usize> {
    vec![64, 32, 8]
}

fn default_learning_rate() -> f64 {
    1e-4
}

fn default_save_dir() -> String {
    "output".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig {
                path: String::new(),
                feature_fields: default_feature_fields(),
                test_fraction: default_test_fraction(),
                scaler_path: default_scaler_path(),
            },
            agent: AgentConfig {
                window_length: 14,
                action_space_size: 3,
                replay_interval: 32,
                episode_count: 3,
                discount_factor: 0.01,
                epsilon_floor: 0.01,
                epsilon_decay_step: 0.002,
                reward_mode: RewardMode::default(),
                memory_capacity: 1000,
                max_ticks: None,
            },
            portfolio: PortfolioConfig {
                starting_cash: 20_000.0,
                starting_shares: 0,
            },
            model: ModelConfig {
                hidden_layers: default_hidden_layers(),
                learning_rate: default_learning_rate(),
                path: None,
                save_dir: default_save_dir(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                json: false,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("data.path", "")?
            .set_default("data.feature_fields", default_feature_fields())?
            .set_default("data.test_fraction", default_test_fraction())?
            .set_default("data.scaler_path", default_scaler_path())?
            .set_default("agent.window_length", 14)?
            .set_default("agent.action_space_size", 3)?
            .set_default("agent.replay_interval", 32)?
            .set_default("agent.episode_count", 3)?
            .set_default("agent.discount_factor", 0.01)?
            .set_default("agent.epsilon_floor", 0.01)?
            .set_default("agent.epsilon_decay_step", 0.002)?
            .set_default("agent.reward_mode", "enabled")?
            .set_default("agent.memory_capacity", 1000)?
            .set_default("portfolio.starting_cash", 20_000.0)?
            .set_default("portfolio.starting_shares", 0)?
            .set_default("model.learning_rate", default_learning_rate())?
            .set_default("model.save_dir", default_save_dir())?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("QTRADER_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (QTRADER_DATA__PATH, etc.)
            .add_source(
                Environment::with_prefix("QTRADER")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        // Scaler columns are sorted by name; keeping the fields in the same
        // order means every layer agrees on the layout.
        config.data.feature_fields.sort();
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.agent.window_length == 0 {
            errors.push("window_length must be at least 1".to_string());
        }

        if self.agent.window_length > self.agent.replay_interval {
            errors.push(format!(
                "window_length {} must not exceed replay_interval {}",
                self.agent.window_length, self.agent.replay_interval
            ));
        }

        if self.agent.memory_capacity < self.agent.replay_interval {
            errors.push(format!(
                "memory_capacity {} cannot hold one replay batch of {}",
                self.agent.memory_capacity, self.agent.replay_interval
            ));
        }

        if self.agent.action_space_size != 3 {
            errors.push("action_space_size must be 3 (buy, sell, hold)".to_string());
        }

        if !(0.0..=1.0).contains(&self.agent.epsilon_floor) {
            errors.push("epsilon_floor must be between 0 and 1".to_string());
        }

        if self.agent.epsilon_decay_step <= 0.0 {
            errors.push("epsilon_decay_step must be positive".to_string());
        }

        if self.agent.episode_count == 0 {
            errors.push("episode_count must be at least 1".to_string());
        }

        if self.data.test_fraction <= 0.0 || self.data.test_fraction >= 1.0 {
            errors.push("test_fraction must be between 0 and 1".to_string());
        }

        if self.data.feature_fields.is_empty() {
            errors.push("feature_fields must name at least one column".to_string());
        }

        let mut unique = self.data.feature_fields.clone();
        unique.sort();
        unique.dedup();
        if unique.len() != self.data.feature_fields.len() {
            errors.push("feature_fields contains duplicate columns".to_string());
        }

        if self.portfolio.starting_cash <= 0.0 {
            errors.push("starting_cash must be positive".to_string());
        }

        if self.model.learning_rate <= 0.0 {
            errors.push("learning_rate must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
