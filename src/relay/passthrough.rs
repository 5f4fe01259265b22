//! Relay role: deliver unchanged to the recipient domain's exchanger

use std::sync::Arc;

use log::warn;

use crate::delivery::{DeliveryError, Dispatcher, MxResolver, RelayTarget, domain_of};
use crate::relay::{DomainGate, MailHandler, MailTransaction, RelayError, Role};

pub struct MxRelay {
    gate: DomainGate,
    resolver: Arc<dyn MxResolver>,
    port: u16,
    dispatcher: Dispatcher,
}

impl MxRelay {
    /// `port` is used for every exchanger contacted
    pub fn new(
        domain: &str,
        resolver: Arc<dyn MxResolver>,
        port: u16,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            gate: DomainGate::new(Role::Relay, domain),
            resolver,
            port,
            dispatcher,
        }
    }

    /// Exchanger for the first recipient's domain
    fn destination(&self, transaction: &MailTransaction) -> Result<RelayTarget, RelayError> {
        let recipient = transaction.first_recipient().ok_or(RelayError::NoRecipient)?;
        let domain = domain_of(recipient).ok_or_else(|| RelayError::UnresolvableDestination {
            address: recipient.to_owned(),
            source: DeliveryError::NoExchanger(recipient.to_owned()),
        })?;

        let host = self
            .resolver
            .exchanger(domain)
            .map_err(|source| RelayError::UnresolvableDestination {
                address: recipient.to_owned(),
                source,
            })?;
        Ok(RelayTarget::new(&host, self.port))
    }
}

impl MailHandler for MxRelay {
    fn role(&self) -> Role {
        Role::Relay
    }

    fn accept_sender(&self, _transaction: &mut MailTransaction) {}

    fn admit_recipient(
        &self,
        transaction: &mut MailTransaction,
        recipient: String,
    ) -> Result<(), RelayError> {
        self.gate.admit(transaction, recipient)
    }

    fn complete(&self, transaction: &mut MailTransaction) {
        let target = match self.destination(transaction) {
            Ok(target) => target,
            Err(e) => {
                warn!("bad outbound address: {e}");
                transaction.mark_dropped();
                return;
            }
        };
        transaction.mark_transformed();

        match self.dispatcher.dispatch(
            &target,
            &transaction.sender,
            &transaction.recipients,
            transaction.outgoing(),
        ) {
            Ok(()) => transaction.mark_delivered(),
            Err(e) => {
                warn!("delivery to {target} failed: {e}");
                transaction.mark_dropped();
            }
        }
    }
}
