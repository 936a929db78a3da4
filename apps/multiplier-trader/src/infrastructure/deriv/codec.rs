//! JSON Codec
//!
//! Encodes domain requests into Deriv JSON and decodes inbound text frames
//! into [`Reply`] values.
//!
//! Decoding inspects `msg_type` first. When an `error` value is present the
//! reply is an error regardless of kind or shape; otherwise the payload is read from
//! the field named after the kind.

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::messages::{
    AuthorizeBody, AuthorizeRequest, BuyBody, BuyRequest, ContractsForBody, ContractsForRequest,
    ErrorBody, PROPOSAL_BASIS, ProposalBody, ProposalRequest,
};
use crate::domain::protocol::{
    InstrumentMetadata, Proposal, ProposalId, Purchase, RemoteError, Reply, ReplyKind,
    ReplyPayload, Request, RequestBody,
};
use crate::domain::session::AccountInfo;

/// Message used when an error reply does not describe itself.
const UNDESCRIBED_ERROR: &str = "request rejected";

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inbound message is not a reply this crate understands.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

/// JSON codec for the Deriv API.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a request as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, request: &Request) -> Result<String, CodecError> {
        let req_id = request.correlation_id;
        let text = match &request.body {
            RequestBody::Authorize { credential } => serde_json::to_string(&AuthorizeRequest {
                authorize: credential.expose(),
                req_id,
            })?,
            RequestBody::ContractsFor {
                symbol,
                currency,
                market,
            } => serde_json::to_string(&ContractsForRequest {
                contracts_for: symbol,
                currency,
                landing_company: &market.landing_company,
                product_type: &market.product_type,
                req_id,
            })?,
            RequestBody::Proposal { plan, market } => serde_json::to_string(&ProposalRequest {
                proposal: 1,
                amount: plan.stake(),
                basis: PROPOSAL_BASIS,
                contract_type: plan.direction().contract_type(),
                currency: plan.currency(),
                duration_unit: plan.duration_unit().as_str(),
                multiplier: plan.multiplier(),
                product_type: &market.product_type,
                symbol: plan.symbol(),
                req_id,
            })?,
            RequestBody::Buy { proposal_id, price } => serde_json::to_string(&BuyRequest {
                buy: proposal_id.as_str(),
                price: *price,
                req_id,
            })?,
        };
        Ok(text)
    }

    /// Decode an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Json` for invalid JSON and
    /// `CodecError::MalformedReply` when required fields are missing.
    pub fn decode(&self, text: &str) -> Result<Reply, CodecError> {
        let Value::Object(mut fields) = serde_json::from_str::<Value>(text)? else {
            return Err(CodecError::MalformedReply(
                "expected a JSON object".to_string(),
            ));
        };

        let correlation_id = fields.get("req_id").and_then(Value::as_u64);
        let kind = fields
            .get("msg_type")
            .and_then(Value::as_str)
            .map_or(ReplyKind::Unspecified, ReplyKind::from_msg_type);

        if let Some(error) = fields.remove("error") {
            return Ok(Reply {
                kind,
                correlation_id,
                body: Err(remote_error(error)),
            });
        }

        let payload = match &kind {
            ReplyKind::Authorize => {
                let body: AuthorizeBody = take_field(&mut fields, "authorize")?;
                ReplyPayload::Authorize(AccountInfo {
                    login_id: body.loginid,
                    currency: body.currency,
                    balance: body.balance,
                })
            }
            ReplyKind::ContractsFor => {
                let body: ContractsForBody = take_field(&mut fields, "contracts_for")?;
                let symbol = fields
                    .get("echo_req")
                    .and_then(|echo| echo.get("contracts_for"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                ReplyPayload::ContractsFor(InstrumentMetadata {
                    symbol,
                    contract_types: body
                        .available
                        .into_iter()
                        .map(|c| c.contract_type)
                        .collect(),
                })
            }
            ReplyKind::Proposal => {
                let body: ProposalBody = take_field(&mut fields, "proposal")?;
                ReplyPayload::Proposal(Proposal {
                    id: ProposalId::new(body.id),
                    ask_price: body.ask_price,
                    payout: body.payout,
                    spot: body.spot,
                })
            }
            ReplyKind::Buy => {
                let body: BuyBody = take_field(&mut fields, "buy")?;
                ReplyPayload::Buy(Purchase {
                    contract_id: body.contract_id,
                    transaction_id: body.transaction_id,
                    buy_price: body.buy_price,
                    balance_after: body.balance_after,
                    purchase_time: body
                        .purchase_time
                        .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                    longcode: body.longcode,
                })
            }
            ReplyKind::Other(_) => ReplyPayload::Ignored,
            ReplyKind::Unspecified => {
                return Err(CodecError::MalformedReply(
                    "missing msg_type".to_string(),
                ));
            }
        };

        Ok(Reply {
            kind,
            correlation_id,
            body: Ok(payload),
        })
    }
}

/// Any `error` value marks the reply as failed, whatever its shape.
fn remote_error(error: Value) -> RemoteError {
    match error {
        Value::String(message) if !message.trim().is_empty() => RemoteError {
            code: None,
            message,
        },
        Value::Object(_) => {
            let body: ErrorBody = serde_json::from_value(error).unwrap_or(ErrorBody {
                code: None,
                message: None,
            });
            let message = body
                .message
                .filter(|m| !m.trim().is_empty())
                .or_else(|| body.code.clone())
                .unwrap_or_else(|| UNDESCRIBED_ERROR.to_string());
            RemoteError {
                code: body.code,
                message,
            }
        }
        _ => RemoteError {
            code: None,
            message: UNDESCRIBED_ERROR.to_string(),
        },
    }
}

fn take_field<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    name: &str,
) -> Result<T, CodecError> {
    let value = fields
        .remove(name)
        .ok_or_else(|| CodecError::MalformedReply(format!("missing `{name}` object")))?;
    Ok(serde_json::from_value(value)?)
}
