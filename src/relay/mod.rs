//! Transaction pipeline: role strategies deciding what happens to each mail

pub mod direction;
pub mod error;
pub mod gate;
pub mod passthrough;
pub mod server;
pub mod transaction;

use std::sync::Arc;

use serde::Deserialize;

pub use direction::{Direction, DirectionClassifier};
pub use error::RelayError;
pub use gate::DomainGate;
pub use passthrough::MxRelay;
pub use server::ShieldServer;
pub use transaction::{MailTransaction, TransactionState};

use crate::config::{Config, ConfigError};
use crate::delivery::{Dispatcher, DkimSigner, DnsResolver, SmtpClient};

/// Which half of the shield this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Public MX for the shielded domain; rewrites and forwards to the relay
    Server,
    /// Private hop; delivers to the recipient domain's MX unchanged
    Relay,
}

/// Role-specific behaviour consulted by the SMTP session
pub trait MailHandler: Send + Sync {
    fn role(&self) -> Role;

    /// Called once MAIL FROM has set `transaction.sender`
    fn accept_sender(&self, transaction: &mut MailTransaction);

    /// Admit `recipient` or refuse it with a reason
    fn admit_recipient(
        &self,
        transaction: &mut MailTransaction,
        recipient: String,
    ) -> Result<(), RelayError>;

    /// Transform and forward the finished message. Failures are logged and
    /// leave the transaction `Dropped`; the peer has already been told 250.
    fn complete(&self, transaction: &mut MailTransaction);
}

/// Build the strategy for the configured role with real network backends
pub fn from_config(config: &Config) -> Result<Arc<dyn MailHandler>, ConfigError> {
    let dispatcher = Dispatcher::new(Arc::new(SmtpClient::new(config.hostname())));

    let handler: Arc<dyn MailHandler> = match config.role {
        Role::Server => {
            let signer = match &config.dkim {
                Some(dkim) => Some(
                    DkimSigner::load(&dkim.key_file, &config.server.domain, &dkim.selector)
                        .map_err(|source| ConfigError::DkimKey {
                            path: dkim.key_file.clone(),
                            source,
                        })?,
                ),
                None => None,
            };
            let sign_inbound = config.dkim.as_ref().is_some_and(|d| d.sign_inbound);

            Arc::new(
                ShieldServer::new(
                    &config.server.domain,
                    &config.remote.host,
                    &config.remote.user,
                    config.relay_target()?,
                    dispatcher,
                )
                .with_signer(signer, sign_inbound),
            )
        }
        Role::Relay => {
            let resolver = DnsResolver::from_system_conf().map_err(ConfigError::Resolver)?;
            Arc::new(MxRelay::new(
                &config.server.domain,
                Arc::new(resolver),
                config.remote.port,
                dispatcher,
            ))
        }
    };

    Ok(handler)
}
