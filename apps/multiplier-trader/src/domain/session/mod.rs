//! Credential and Session
//!
//! The credential is the API token pasted by the user. It is opaque to this
//! crate and never appears in logs: both `Debug` and `Display` redact it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Token is empty or whitespace.
    #[error("credential token cannot be empty")]
    Empty,
}

/// API token used by the authorize request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Create a credential, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Empty` if the token is blank.
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self { token })
    }

    /// Expose the raw token for the wire encoder.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential([REDACTED])")
    }
}

/// Account details returned by a successful authorize reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account login id (e.g. "CR123456").
    pub login_id: Option<String>,
    /// Account currency.
    pub currency: Option<String>,
    /// Balance at authorization time.
    pub balance: Option<Decimal>,
}

/// Authorization session for one connection.
///
/// Starts unauthorized and flips to authorized exactly once, on the first
/// successful authorize reply. Never persisted.
#[derive(Debug, Clone)]
pub struct Session {
    credential: Credential,
    account: Option<AccountInfo>,
}

impl Session {
    /// Create an unauthorized session for a credential.
    #[must_use]
    pub const fn new(credential: Credential) -> Self {
        Self {
            credential,
            account: None,
        }
    }

    /// Credential this session authenticates with.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Whether an authorize reply has been accepted.
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        self.account.is_some()
    }

    /// Account info, once authorized.
    #[must_use]
    pub const fn account(&self) -> Option<&AccountInfo> {
        self.account.as_ref()
    }

    /// Mark the session authorized.
    pub fn authorize(&mut self, account: AccountInfo) {
        self.account = Some(account);
    }
}
