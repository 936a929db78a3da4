//! Deriv WebSocket Message Types
//!
//! Wire types for the four calls the sequencer makes. Every outbound request
//! carries `req_id`, which the server echoes back alongside `msg_type`.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {"authorize": "a1-xxxx", "req_id": 1}
//! {"contracts_for": "BOOM500", "currency": "USD", "landing_company": "svg", "product_type": "basic", "req_id": 2}
//! {"proposal": 1, "amount": 2000, "basis": "stake", "contract_type": "MULTUP", "currency": "USD",
//!  "duration_unit": "s", "multiplier": 400, "product_type": "basic", "symbol": "BOOM500", "req_id": 3}
//! {"buy": "0b7a1c2e-...", "price": 2000, "req_id": 4}
//! ```
//!
//! Replies look like `{"msg_type": "buy", "req_id": 4, "buy": {...}}` or, on
//! failure, `{"msg_type": "buy", "req_id": 4, "error": {"code": "...", "message": "..."}}`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Basis sent with every proposal.
pub const PROPOSAL_BASIS: &str = "stake";

// =============================================================================
// Outbound
// =============================================================================

/// `authorize` request.
#[derive(Debug, Serialize)]
pub struct AuthorizeRequest<'a> {
    /// API token.
    pub authorize: &'a str,
    /// Request id.
    pub req_id: u64,
}

/// `contracts_for` request.
#[derive(Debug, Serialize)]
pub struct ContractsForRequest<'a> {
    /// Instrument symbol.
    pub contracts_for: &'a str,
    /// Account currency.
    pub currency: &'a str,
    /// Landing company.
    pub landing_company: &'a str,
    /// Product type.
    pub product_type: &'a str,
    /// Request id.
    pub req_id: u64,
}

/// `proposal` request for a multiplier contract.
#[derive(Debug, Serialize)]
pub struct ProposalRequest<'a> {
    /// Always 1.
    pub proposal: u8,
    /// Stake.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Always `stake`.
    pub basis: &'a str,
    /// `MULTUP` or `MULTDOWN`.
    pub contract_type: &'a str,
    /// Currency.
    pub currency: &'a str,
    /// Duration unit code.
    pub duration_unit: &'a str,
    /// Leverage multiplier.
    pub multiplier: u32,
    /// Product type.
    pub product_type: &'a str,
    /// Instrument symbol.
    pub symbol: &'a str,
    /// Request id.
    pub req_id: u64,
}

/// `buy` request.
#[derive(Debug, Serialize)]
pub struct BuyRequest<'a> {
    /// Proposal id.
    pub buy: &'a str,
    /// Maximum price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Request id.
    pub req_id: u64,
}

// =============================================================================
// Inbound
// =============================================================================

/// `error` object of a failed reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    /// Error code (e.g. `InvalidToken`).
    #[serde(default)]
    pub code: Option<String>,
    /// Error message.
    #[serde(default)]
    pub message: Option<String>,
}

/// `authorize` object of a successful reply.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeBody {
    /// Login id.
    #[serde(default)]
    pub loginid: Option<String>,
    /// Account currency.
    #[serde(default)]
    pub currency: Option<String>,
    /// Balance.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub balance: Option<Decimal>,
}

/// One contract entry of a `contracts_for` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailableContract {
    /// Contract type (e.g. `MULTUP`).
    pub contract_type: String,
}

/// `contracts_for` object of a successful reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractsForBody {
    /// Contracts offered.
    #[serde(default)]
    pub available: Vec<AvailableContract>,
}

/// `proposal` object of a successful reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalBody {
    /// Proposal id to buy.
    pub id: String,
    /// Asking price.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub ask_price: Option<Decimal>,
    /// Potential payout.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub payout: Option<Decimal>,
    /// Spot price.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub spot: Option<Decimal>,
}

/// `buy` object of a successful reply.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyBody {
    /// Contract id.
    pub contract_id: u64,
    /// Transaction id.
    #[serde(default)]
    pub transaction_id: Option<u64>,
    /// Price paid.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub buy_price: Option<Decimal>,
    /// Balance after purchase.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub balance_after: Option<Decimal>,
    /// Purchase time (epoch seconds).
    #[serde(default)]
    pub purchase_time: Option<i64>,
    /// Contract description.
    #[serde(default)]
    pub longcode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_request_serializes_price_as_number() {
        let request = BuyRequest {
            buy: "P1",
            price: Decimal::new(2000, 0),
            req_id: 12,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["buy"], "P1");
        assert!(json["price"].is_number());
        assert_eq!(json["req_id"], 12);
    }

    #[test]
    fn buy_body_parses_float_amounts() {
        let body: BuyBody = serde_json::from_str(
            r#"{"contract_id": 250, "transaction_id": 501, "buy_price": 2000, "balance_after": 8000.5, "purchase_time": 1700000000}"#,
        )
        .unwrap();
        assert_eq!(body.contract_id, 250);
        assert_eq!(body.balance_after, Some(Decimal::new(80005, 1)));
        assert!(body.longcode.is_none());
    }

    #[test]
    fn error_body_without_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"code":"InsufficientBalance"}"#).unwrap();
        assert_eq!(body.code.as_deref(), Some("InsufficientBalance"));
        assert!(body.message.is_none());
    }

    #[test]
    fn authorize_body_tolerates_missing_fields() {
        let body: AuthorizeBody = serde_json::from_str("{}").unwrap();
        assert!(body.loginid.is_none());
        assert!(body.balance.is_none());
    }
}
