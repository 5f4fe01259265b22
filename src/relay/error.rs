//! Error types for the transaction pipeline

use thiserror::Error;

use crate::delivery::DeliveryError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Rejected domain mismatch: {address}")]
    DomainMismatch { address: String },

    #[error("Malformed message: {0}")]
    MalformedMessage(&'static str),

    #[error("No address token in subject: {subject}")]
    MalformedSubjectToken { subject: String },

    #[error("Transaction direction is unresolved")]
    DirectionUnresolved,

    #[error("No recipient admitted")]
    NoRecipient,

    #[error("Unresolvable destination {address}: {source}")]
    UnresolvableDestination {
        address: String,
        #[source]
        source: DeliveryError,
    },

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
