//! Server role: the public face of the shielded domain

use log::{debug, warn};

use crate::delivery::{Dispatcher, DkimSigner, RelayTarget};
use crate::message::EnvelopeRewriter;
use crate::relay::{
    Direction, DirectionClassifier, DomainGate, MailHandler, MailTransaction, RelayError, Role,
};

/// Rewrites every accepted message and forwards it to the private relay
pub struct ShieldServer {
    classifier: DirectionClassifier,
    gate: DomainGate,
    rewriter: EnvelopeRewriter,
    target: RelayTarget,
    dispatcher: Dispatcher,
    signer: Option<DkimSigner>,
    sign_inbound: bool,
}

impl ShieldServer {
    /// `domain` is the shielded domain, `host`/`user` the real mailbox
    pub fn new(
        domain: &str,
        host: &str,
        user: &str,
        target: RelayTarget,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            classifier: DirectionClassifier::new(host),
            gate: DomainGate::new(Role::Server, domain),
            rewriter: EnvelopeRewriter::new(domain, &format!("{user}@{host}")),
            target,
            dispatcher,
            signer: None,
            sign_inbound: false,
        }
    }

    /// Outbound mail is signed whenever a signer is present; inbound only
    /// with `sign_inbound`
    pub fn with_signer(mut self, signer: Option<DkimSigner>, sign_inbound: bool) -> Self {
        self.signer = signer;
        self.sign_inbound = sign_inbound;
        self
    }

    fn transform(&self, transaction: &mut MailTransaction) -> Result<(), RelayError> {
        let recipient = transaction
            .first_recipient()
            .ok_or(RelayError::NoRecipient)?
            .to_owned();
        let direction = transaction.direction;

        let rewritten = self.rewriter.rewrite(
            &transaction.content,
            direction,
            &transaction.sender,
            &recipient,
        )?;
        transaction.apply(rewritten);

        if let Some(signer) = &self.signer {
            if direction == Direction::Outbound || self.sign_inbound {
                match signer.sign(transaction.outgoing()) {
                    Ok(signed) => {
                        debug!("signed for d={}", signer.domain());
                        transaction.rewritten = Some(signed);
                    }
                    Err(e) => warn!("DKIM signing failed, sending unsigned: {e}"),
                }
            }
        }
        Ok(())
    }
}

impl MailHandler for ShieldServer {
    fn role(&self) -> Role {
        Role::Server
    }

    fn accept_sender(&self, transaction: &mut MailTransaction) {
        transaction.direction = self.classifier.classify(&transaction.sender);
    }

    fn admit_recipient(
        &self,
        transaction: &mut MailTransaction,
        recipient: String,
    ) -> Result<(), RelayError> {
        self.gate.admit(transaction, recipient)
    }

    fn complete(&self, transaction: &mut MailTransaction) {
        if let Err(e) = self.transform(transaction) {
            warn!("dropping message from {}: {e}", transaction.sender);
            transaction.mark_dropped();
            return;
        }

        debug!(
            "rewritten {} -> {:?}",
            transaction.sender, transaction.recipients
        );
        match self.dispatcher.dispatch(
            &self.target,
            &transaction.sender,
            &transaction.recipients,
            transaction.outgoing(),
        ) {
            Ok(()) => transaction.mark_delivered(),
            Err(e) => {
                warn!("relay to {} failed: {e}", self.target);
                transaction.mark_dropped();
            }
        }
    }
}
