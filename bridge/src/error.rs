// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // The GraphQL node answered with an error payload
    GraphQlError(String),
    // Transient network failure talking to a remote endpoint
    TransientProviderError(String),
    // Permanent provider misbehavior (missing fields, wrong data)
    ProviderError(String),
    // The stored cursor block is no longer on the canonical chain
    ReorgedCursor { monitor: String, block_hash: String },
    // Every staging endpoint rejected the signed transaction
    StageFailed(String),
    // The remote signing service failed or returned garbage
    SigningError(String),
    // A memo that should carry an EVM recipient does not parse
    InvalidRecipient(String),
    // A burn's 32-byte recipient tag does not carry the expected planet prefix
    InvalidRecipientTag(String),
    // Amount arithmetic left the representable range
    AmountOverflow(String),
    // Failure to serialize an action or transaction
    SerializationError(String),
    // Embedded store failure
    StorageError(String),
    // Uncategorized error
    Generic(String),
}

impl BridgeError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::GraphQlError(_) => "graphql_error",
            BridgeError::TransientProviderError(_) => "transient_provider_error",
            BridgeError::ProviderError(_) => "provider_error",
            BridgeError::ReorgedCursor { .. } => "reorged_cursor",
            BridgeError::StageFailed(_) => "stage_failed",
            BridgeError::SigningError(_) => "signing_error",
            BridgeError::InvalidRecipient(_) => "invalid_recipient",
            BridgeError::InvalidRecipientTag(_) => "invalid_recipient_tag",
            BridgeError::AmountOverflow(_) => "amount_overflow",
            BridgeError::SerializationError(_) => "serialization_error",
            BridgeError::StorageError(_) => "storage_error",
            BridgeError::Generic(_) => "generic",
        }
    }

    /// A fatal error aborts the owning monitor loop instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::ReorgedCursor { .. })
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::ReorgedCursor { monitor, block_hash } => write!(
                f,
                "cursor block {} for monitor {} is no longer canonical",
                block_hash, monitor
            ),
            BridgeError::GraphQlError(m)
            | BridgeError::TransientProviderError(m)
            | BridgeError::ProviderError(m)
            | BridgeError::StageFailed(m)
            | BridgeError::SigningError(m)
            | BridgeError::InvalidRecipient(m)
            | BridgeError::InvalidRecipientTag(m)
            | BridgeError::AmountOverflow(m)
            | BridgeError::SerializationError(m)
            | BridgeError::StorageError(m)
            | BridgeError::Generic(m) => write!(f, "{}: {}", self.error_type(), m),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<sqlx::Error> for BridgeError {
    fn from(e: sqlx::Error) -> Self {
        BridgeError::StorageError(e.to_string())
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            BridgeError::TransientProviderError(e.to_string())
        } else {
            BridgeError::ProviderError(e.to_string())
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
