//! Order Plan
//!
//! The immutable description of the multiplier order placed on every buy
//! attempt of a run. A plan is validated once, when it is built, and is then
//! only read.
//!
//! # Wire mapping
//!
//! | Field        | Proposal field  | Example    |
//! |--------------|-----------------|------------|
//! | symbol       | `symbol`        | `BOOM500`  |
//! | direction    | `contract_type` | `MULTUP`   |
//! | stake        | `amount`        | `2000`     |
//! | multiplier   | `multiplier`    | `400`      |
//! | duration     | `duration_unit` | `s`        |
//! | currency     | `currency`      | `USD`      |

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default instrument traded when none is configured.
pub const DEFAULT_SYMBOL: &str = "BOOM500";

/// Default leverage multiplier.
pub const DEFAULT_MULTIPLIER: u32 = 400;

/// Default account currency.
pub const DEFAULT_CURRENCY: &str = "USD";

// =============================================================================
// Errors
// =============================================================================

/// Validation errors for an order plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderPlanError {
    /// Instrument symbol is empty.
    #[error("instrument symbol cannot be empty")]
    EmptySymbol,

    /// Stake is zero or negative.
    #[error("stake amount must be positive, got {0}")]
    NonPositiveStake(Decimal),

    /// Multiplier is zero.
    #[error("leverage multiplier must be positive")]
    ZeroMultiplier,

    /// Currency is not a three-letter code.
    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),

    /// Direction string not recognised.
    #[error("invalid contract direction: {0} (expected up or down)")]
    InvalidDirection(String),

    /// Duration unit string not recognised.
    #[error("invalid duration unit: {0} (expected t, s, m, h or d)")]
    InvalidDurationUnit(String),
}

// =============================================================================
// Value Objects
// =============================================================================

/// Direction of a multiplier contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContractDirection {
    /// Profit when the price rises (`MULTUP`).
    #[default]
    Up,
    /// Profit when the price falls (`MULTDOWN`).
    Down,
}

impl ContractDirection {
    /// Contract type sent on the wire.
    #[must_use]
    pub const fn contract_type(self) -> &'static str {
        match self {
            Self::Up => "MULTUP",
            Self::Down => "MULTDOWN",
        }
    }
}

impl FromStr for ContractDirection {
    type Err = OrderPlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" | "multup" | "long" => Ok(Self::Up),
            "down" | "multdown" | "short" => Ok(Self::Down),
            other => Err(OrderPlanError::InvalidDirection(other.to_string())),
        }
    }
}

/// Duration unit attached to the proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DurationUnit {
    /// Ticks.
    Ticks,
    /// Seconds.
    #[default]
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl DurationUnit {
    /// Unit code sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticks => "t",
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
        }
    }
}

impl FromStr for DurationUnit {
    type Err = OrderPlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "t" => Ok(Self::Ticks),
            "s" => Ok(Self::Seconds),
            "m" => Ok(Self::Minutes),
            "h" => Ok(Self::Hours),
            "d" => Ok(Self::Days),
            other => Err(OrderPlanError::InvalidDurationUnit(other.to_string())),
        }
    }
}

/// Market parameters sent with the metadata and proposal requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParameters {
    /// Landing company the account belongs to.
    pub landing_company: String,
    /// Product type.
    pub product_type: String,
}

impl Default for MarketParameters {
    fn default() -> Self {
        Self {
            landing_company: "svg".to_string(),
            product_type: "basic".to_string(),
        }
    }
}

// =============================================================================
// Order Plan
// =============================================================================

/// Validated, immutable multiplier order plan.
///
/// Deserializing goes through [`OrderPlanBuilder::build`], so a decoded plan
/// holds the same invariants as a built one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OrderPlanBuilder")]
pub struct OrderPlan {
    symbol: String,
    direction: ContractDirection,
    stake: Decimal,
    multiplier: u32,
    duration_unit: DurationUnit,
    currency: String,
}

impl OrderPlan {
    /// Start building a plan for a symbol and stake.
    #[must_use]
    pub fn builder(symbol: impl Into<String>, stake: Decimal) -> OrderPlanBuilder {
        OrderPlanBuilder {
            symbol: symbol.into(),
            stake,
            direction: ContractDirection::default(),
            multiplier: DEFAULT_MULTIPLIER,
            duration_unit: DurationUnit::default(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Instrument symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Contract direction.
    #[must_use]
    pub const fn direction(&self) -> ContractDirection {
        self.direction
    }

    /// Stake per order. Also used as the maximum buy price.
    #[must_use]
    pub const fn stake(&self) -> Decimal {
        self.stake
    }

    /// Leverage multiplier.
    #[must_use]
    pub const fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Duration unit.
    #[must_use]
    pub const fn duration_unit(&self) -> DurationUnit {
        self.duration_unit
    }

    /// Currency code.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }
}

/// Builder for [`OrderPlan`].
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPlanBuilder {
    symbol: String,
    stake: Decimal,
    #[serde(default)]
    direction: ContractDirection,
    #[serde(default = "default_multiplier")]
    multiplier: u32,
    #[serde(default)]
    duration_unit: DurationUnit,
    #[serde(default = "default_currency")]
    currency: String,
}

const fn default_multiplier() -> u32 {
    DEFAULT_MULTIPLIER
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl TryFrom<OrderPlanBuilder> for OrderPlan {
    type Error = OrderPlanError;

    fn try_from(builder: OrderPlanBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

impl OrderPlanBuilder {
    /// Set the contract direction.
    #[must_use]
    pub const fn direction(mut self, direction: ContractDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Set the leverage multiplier.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the duration unit.
    #[must_use]
    pub const fn duration_unit(mut self, unit: DurationUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    /// Set the currency code.
    #[must_use]
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Validate and build the plan.
    ///
    /// # Errors
    ///
    /// Returns an `OrderPlanError` describing the first invalid field.
    pub fn build(self) -> Result<OrderPlan, OrderPlanError> {
        let symbol = self.symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(OrderPlanError::EmptySymbol);
        }
        if self.stake <= Decimal::ZERO {
            return Err(OrderPlanError::NonPositiveStake(self.stake));
        }
        if self.multiplier == 0 {
            return Err(OrderPlanError::ZeroMultiplier);
        }

        let currency = self.currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OrderPlanError::InvalidCurrency(self.currency));
        }

        Ok(OrderPlan {
            symbol,
            direction: self.direction,
            stake: self.stake,
            multiplier: self.multiplier,
            duration_unit: self.duration_unit,
            currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn deserialized_plan_is_validated() {
        let plan: OrderPlan =
            serde_json::from_str(r#"{"symbol":" BOOM500 ","stake":"10.50","currency":"usd"}"#)
                .unwrap();
        assert_eq!(plan.symbol(), "BOOM500");
        assert_eq!(plan.stake(), Decimal::new(1050, 2));
        assert_eq!(plan.multiplier(), DEFAULT_MULTIPLIER);
        assert_eq!(plan.currency(), "USD");

        let encoded = serde_json::to_string(&plan).unwrap();
        assert_eq!(serde_json::from_str::<OrderPlan>(&encoded).unwrap(), plan);
    }

    #[test_case(r#"{"symbol":"BOOM500","stake":"0"}"# ; "zero stake")]
    #[test_case(r#"{"symbol":"  ","stake":"10"}"# ; "blank symbol")]
    #[test_case(r#"{"symbol":"BOOM500","stake":"10","multiplier":0}"# ; "zero multiplier")]
    #[test_case(r#"{"symbol":"BOOM500","stake":"10","currency":"dollars"}"# ; "bad currency")]
    fn deserialized_plan_rejects_invalid_fields(text: &str) {
        assert!(serde_json::from_str::<OrderPlan>(text).is_err());
    }

    #[test]
    fn builder_applies_defaults() {
        let plan = OrderPlan::builder("BOOM500", Decimal::new(2000, 0))
            .build()
            .unwrap();

        assert_eq!(plan.symbol(), "BOOM500");
        assert_eq!(plan.direction(), ContractDirection::Up);
        assert_eq!(plan.multiplier(), DEFAULT_MULTIPLIER);
        assert_eq!(plan.duration_unit(), DurationUnit::Seconds);
        assert_eq!(plan.currency(), "USD");
    }

    #[test]
    fn builder_normalises_currency_and_symbol() {
        let plan = OrderPlan::builder(" R_100 ", Decimal::new(10, 0))
            .currency("usd")
            .build()
            .unwrap();
        assert_eq!(plan.symbol(), "R_100");
        assert_eq!(plan.currency(), "USD");
    }

    #[test]
    fn builder_rejects_empty_symbol() {
        let err = OrderPlan::builder("  ", Decimal::ONE).build().unwrap_err();
        assert_eq!(err, OrderPlanError::EmptySymbol);
    }

    #[test]
    fn builder_rejects_non_positive_stake() {
        let err = OrderPlan::builder("BOOM500", Decimal::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, OrderPlanError::NonPositiveStake(_)));

        let err = OrderPlan::builder("BOOM500", Decimal::new(-5, 0))
            .build()
            .unwrap_err();
        assert!(matches!(err, OrderPlanError::NonPositiveStake(_)));
    }

    #[test]
    fn builder_rejects_zero_multiplier() {
        let err = OrderPlan::builder("BOOM500", Decimal::ONE)
            .multiplier(0)
            .build()
            .unwrap_err();
        assert_eq!(err, OrderPlanError::ZeroMultiplier);
    }

    #[test]
    fn builder_rejects_bad_currency() {
        let err = OrderPlan::builder("BOOM500", Decimal::ONE)
            .currency("US")
            .build()
            .unwrap_err();
        assert!(matches!(err, OrderPlanError::InvalidCurrency(_)));
    }

    #[test_case("up", ContractDirection::Up ; "plain up")]
    #[test_case("DOWN", ContractDirection::Down ; "upper down")]
    #[test_case("multup", ContractDirection::Up ; "wire up")]
    #[test_case("short", ContractDirection::Down ; "short alias")]
    fn direction_parsing(input: &str, expected: ContractDirection) {
        assert_eq!(input.parse::<ContractDirection>().unwrap(), expected);
    }

    #[test]
    fn direction_rejects_unknown() {
        assert!("sideways".parse::<ContractDirection>().is_err());
    }

    #[test]
    fn direction_contract_type() {
        assert_eq!(ContractDirection::Up.contract_type(), "MULTUP");
        assert_eq!(ContractDirection::Down.contract_type(), "MULTDOWN");
    }

    #[test]
    fn duration_unit_round_trips_codes() {
        for code in ["t", "s", "m", "h", "d"] {
            let unit: DurationUnit = code.parse().unwrap();
            assert_eq!(unit.as_str(), code);
        }
        assert!("w".parse::<DurationUnit>().is_err());
    }

    #[test]
    fn market_parameters_defaults() {
        let params = MarketParameters::default();
        assert_eq!(params.landing_company, "svg");
        assert_eq!(params.product_type, "basic");
    }
}
