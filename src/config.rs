use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub tracking: TrackingConfig,
    pub scraper: ScraperConfig,
    pub browser: BrowserConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Minutes between check cycles. Must be 1-59: the cycle is scheduled
    /// with a minute-step cron expression.
    pub check_interval_minutes: u32,
    /// Absolute percentage change required before a notification fires.
    /// Zero means notify on any numeric change.
    pub price_change_threshold_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub navigation_timeout_secs: u64,
    pub warmup_timeout_secs: u64,
    pub price_check_attempts: u32,
    pub price_check_delay_secs: u64,
    /// Which inner price check triggers a full page reload.
    pub reload_after_check: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub window_width: u32,
    pub window_height: u32,
    pub chrome_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub telegram: Option<TelegramConfig>,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Directory for failure artifacts (page HTML, screenshots).
    /// Disabled when unset.
    pub artifacts_dir: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PRICEWATCH_"
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracking.check_interval_minutes == 0 || self.tracking.check_interval_minutes > 59 {
            return Err(ConfigError::Message(
                "tracking.check_interval_minutes must be between 1 and 59".into(),
            ));
        }

        if !self.tracking.price_change_threshold_percent.is_finite()
            || self.tracking.price_change_threshold_percent < 0.0
        {
            return Err(ConfigError::Message(
                "tracking.price_change_threshold_percent must be a non-negative number".into(),
            ));
        }

        if self.scraper.max_attempts == 0 {
            return Err(ConfigError::Message(
                "scraper.max_attempts must be greater than 0".into(),
            ));
        }

        if self.scraper.price_check_attempts == 0 {
            return Err(ConfigError::Message(
                "scraper.price_check_attempts must be greater than 0".into(),
            ));
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message(
                "browser window dimensions must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if let Some(smtp) = &self.notifications.smtp {
            if smtp.port == 0 {
                return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
            }
        }

        Ok(())
    }
}

/// A fully-populated configuration for unit tests across the crate.
#[cfg(test)]
pub fn tests_config() -> AppConfig {
    AppConfig {
        tracking: TrackingConfig {
            check_interval_minutes: 30,
            price_change_threshold_percent: 5.0,
        },
        scraper: ScraperConfig {
            max_attempts: 3,
            retry_delay_secs: 5,
            navigation_timeout_secs: 60,
            warmup_timeout_secs: 30,
            price_check_attempts: 3,
            price_check_delay_secs: 2,
            reload_after_check: 2,
        },
        browser: BrowserConfig {
            user_agent: "TestAgent/1.0".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            window_width: 1920,
            window_height: 1080,
            chrome_path: None,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        },
        notifications: NotificationsConfig::default(),
        debug: DebugConfig::default(),
    }
}
