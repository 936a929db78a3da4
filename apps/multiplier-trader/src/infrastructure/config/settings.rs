//! Trader Configuration Settings
//!
//! Configuration types for the trader, loaded from environment variables.
//! Order fields and the buy count fail loudly when invalid; connection tuning
//! knobs fall back to their defaults.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::application::services::{DEFAULT_PACING_DELAY, DEFAULT_REPLY_TIMEOUT, SequencerConfig};
use crate::domain::order::{
    ContractDirection, DEFAULT_CURRENCY, DEFAULT_MULTIPLIER, DEFAULT_SYMBOL, DurationUnit,
    MarketParameters, OrderPlan, OrderPlanError,
};
use crate::domain::session::Credential;
use crate::infrastructure::deriv::{BackoffConfig, HeartbeatConfig, TransportConfig};

/// Default Deriv WebSocket endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://ws.derivws.com/websockets/v3";

/// Default Deriv application id.
pub const DEFAULT_APP_ID: u32 = 62002;

/// Shortest reply timeout accepted; smaller values are raised to it.
pub const MIN_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// What the binary does once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Place orders.
    #[default]
    Run,
    /// Only check the credential.
    Check,
}

impl RunMode {
    /// Mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Check => "check",
        }
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "run" => Ok(Self::Run),
            "check" => Ok(Self::Check),
            other => Err(ConfigError::InvalidValue {
                key: "TRADER_MODE".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSettings {
    /// WebSocket endpoint without query string.
    pub url: String,
    /// Application id appended as `app_id`.
    pub app_id: u32,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            app_id: DEFAULT_APP_ID,
        }
    }
}

/// Run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Number of buy attempts.
    pub buy_count: u32,
    /// Delay between a buy reply and the next proposal.
    pub pacing_delay: Duration,
    /// Time to wait for each reply.
    pub reply_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            buy_count: 1,
            pacing_delay: DEFAULT_PACING_DELAY,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Heartbeat timeout before considering the connection dead.
    pub heartbeat_timeout: Duration,
    /// Connection attempts before giving up.
    pub connect_attempts: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
            connect_attempts: 3,
        }
    }
}

/// Complete trader configuration.
#[derive(Debug, Clone)]
pub struct TraderConfig {
    /// Endpoint settings.
    pub endpoint: EndpointSettings,
    /// API token.
    pub credential: Credential,
    /// Run or check.
    pub mode: RunMode,
    /// Order placed on every attempt.
    pub plan: OrderPlan,
    /// Market parameters.
    pub market: MarketParameters,
    /// Run settings.
    pub run: RunSettings,
    /// Connection settings.
    pub connection: ConnectionSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl TraderConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or an order field
    /// is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or an order field
    /// is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = required(&lookup, "DERIV_TOKEN")?;
        let credential =
            Credential::new(token).map_err(|_| ConfigError::EmptyValue("DERIV_TOKEN".to_string()))?;

        let endpoint = EndpointSettings {
            url: lookup("DERIV_ENDPOINT")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            app_id: parse_u32(&lookup, "DERIV_APP_ID", DEFAULT_APP_ID),
        };

        let mode = lookup("TRADER_MODE")
            .map(|v| v.parse::<RunMode>())
            .transpose()?
            .unwrap_or_default();

        let plan = build_plan(&lookup)?;
        let market = MarketParameters {
            landing_company: lookup("TRADER_LANDING_COMPANY")
                .unwrap_or_else(|| MarketParameters::default().landing_company),
            product_type: lookup("TRADER_PRODUCT_TYPE")
                .unwrap_or_else(|| MarketParameters::default().product_type),
        };

        let run = RunSettings {
            buy_count: parse_buy_count(&lookup)?,
            pacing_delay: parse_duration_millis(
                &lookup,
                "TRADER_PACING_DELAY_MS",
                RunSettings::default().pacing_delay,
            ),
            reply_timeout: parse_duration_secs(
                &lookup,
                "TRADER_REPLY_TIMEOUT_SECS",
                RunSettings::default().reply_timeout,
            )
            .max(MIN_REPLY_TIMEOUT),
        };

        let connection = ConnectionSettings {
            heartbeat_interval: parse_duration_secs(
                &lookup,
                "TRADER_HEARTBEAT_INTERVAL_SECS",
                ConnectionSettings::default().heartbeat_interval,
            ),
            heartbeat_timeout: parse_duration_secs(
                &lookup,
                "TRADER_HEARTBEAT_TIMEOUT_SECS",
                ConnectionSettings::default().heartbeat_timeout,
            ),
            connect_attempts: parse_u32(
                &lookup,
                "TRADER_CONNECT_ATTEMPTS",
                ConnectionSettings::default().connect_attempts,
            ),
        };

        Ok(Self {
            endpoint,
            credential,
            mode,
            plan,
            market,
            run,
            connection,
            metrics_port: parse_u16(&lookup, "TRADER_METRICS_PORT", 0),
        })
    }

    /// WebSocket URL with the application id.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("{}?app_id={}", self.endpoint.url, self.endpoint.app_id)
    }

    /// Transport configuration.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            heartbeat: HeartbeatConfig::new(
                self.connection.heartbeat_interval,
                self.connection.heartbeat_timeout,
            ),
            backoff: BackoffConfig::with_max_attempts(self.connection.connect_attempts),
            ..TransportConfig::new(self.ws_url())
        }
    }

    /// Sequencer configuration.
    #[must_use]
    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            pacing_delay: self.run.pacing_delay,
            reply_timeout: self.run.reply_timeout,
            market: self.market.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// Order fields do not form a valid plan.
    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderPlanError),
}

fn build_plan<F>(lookup: &F) -> Result<OrderPlan, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let stake_raw = required(lookup, "TRADER_STAKE")?;
    let stake = Decimal::from_str(stake_raw.trim()).map_err(|_| ConfigError::InvalidValue {
        key: "TRADER_STAKE".to_string(),
        value: stake_raw.clone(),
    })?;

    let direction = lookup("TRADER_DIRECTION")
        .map(|v| v.parse::<ContractDirection>())
        .transpose()?
        .unwrap_or_default();
    let duration_unit = lookup("TRADER_DURATION_UNIT")
        .map(|v| v.parse::<DurationUnit>())
        .transpose()?
        .unwrap_or_default();
    let multiplier = match lookup("TRADER_MULTIPLIER") {
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| ConfigError::InvalidValue {
            key: "TRADER_MULTIPLIER".to_string(),
            value: raw,
        })?,
        None => DEFAULT_MULTIPLIER,
    };

    let plan = OrderPlan::builder(
        lookup("TRADER_SYMBOL").unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
        stake,
    )
    .direction(direction)
    .multiplier(multiplier)
    .duration_unit(duration_unit)
    .currency(lookup("TRADER_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()))
    .build()?;
    Ok(plan)
}

/// Number of buy attempts. Unlike the tuning knobs, a bad value is an error.
fn parse_buy_count<F>(lookup: &F) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("TRADER_BUY_COUNT") {
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| ConfigError::InvalidValue {
            key: "TRADER_BUY_COUNT".to_string(),
            value: raw,
        }),
        None => Ok(RunSettings::default().buy_count),
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_u16<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_u32<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
