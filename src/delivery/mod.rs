//! Handing messages to the next hop

pub mod dkim;
pub mod mx;
pub mod smtp;

use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

pub use dkim::{DkimKeyError, DkimSigner};
pub use mx::{DnsResolver, MxResolver, domain_of};
pub use smtp::SmtpClient;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Invalid address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("All recipients refused: {0:?}")]
    AllRecipientsRefused(Vec<Refusal>),

    #[error("DNS lookup failed: {0}")]
    Resolve(#[from] hickory_resolver::error::ResolveError),

    #[error("No mail exchanger for {0}")]
    NoExchanger(String),

    #[error("DKIM signing failed: {0}")]
    Signature(#[from] rsa::signature::Error),
}

/// Host and port of the next hop, resolved per transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTarget {
    pub host: String,
    pub port: u16,
}

impl RelayTarget {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_owned(),
            port,
        }
    }
}

impl fmt::Display for RelayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A recipient the next hop turned down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    pub address: String,
    pub reason: String,
}

/// Outbound SMTP client seam
pub trait Transport: Send + Sync {
    /// Submit `message` to `target` for `recipients`. Returns the recipients
    /// that were refused while at least one was accepted.
    fn send(
        &self,
        target: &RelayTarget,
        sender: &str,
        recipients: &[String],
        message: &[u8],
    ) -> Result<Vec<Refusal>, DeliveryError>;
}

/// Sends finished transactions through a [`Transport`]
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// One submission attempt, never retried
    pub fn dispatch(
        &self,
        target: &RelayTarget,
        sender: &str,
        recipients: &[String],
        message: &[u8],
    ) -> Result<(), DeliveryError> {
        let refused = self
            .transport
            .send(target, sender, recipients, message)?;

        if !refused.is_empty() {
            let addresses: Vec<&str> = refused.iter().map(|r| r.address.as_str()).collect();
            warn!("recipients refused: {addresses:?}");
        }
        info!("delivered {sender} -> {recipients:?} via {target}");
        Ok(())
    }
}
