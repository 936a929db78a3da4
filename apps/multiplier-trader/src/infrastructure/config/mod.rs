//! Configuration Module
//!
//! Configuration loading for the trader binary.

mod settings;

pub use settings::{
    ConfigError, ConnectionSettings, DEFAULT_APP_ID, DEFAULT_ENDPOINT, EndpointSettings, RunMode,
    RunSettings, TraderConfig,
};
