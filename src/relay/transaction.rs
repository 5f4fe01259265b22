//! Per-connection mail transaction state

use crate::message::Rewritten;
use crate::relay::direction::Direction;

/// Lifecycle of a single mail transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// Nothing known yet
    #[default]
    Init,
    /// MAIL FROM accepted
    SenderKnown,
    /// At least one recipient admitted
    RecipientsAdmitted,
    /// Headers rewritten (server role) or destination resolved (relay role)
    DataTransformed,
    /// Handed to the next hop
    Delivered,
    /// Abandoned after logging; the peer still sees 250
    Dropped,
}

/// Envelope, content and outcome of one SMTP transaction.
///
/// One instance lives inside each connection's session and is never shared
/// with other connections.
#[derive(Debug, Clone, Default)]
pub struct MailTransaction {
    /// Envelope sender
    pub sender: String,
    /// Envelope recipients in admission order; only the first is meaningful
    /// to the address codec
    pub recipients: Vec<String>,
    /// Raw message bytes as received, terminators included
    pub content: Vec<u8>,
    /// Classification recorded at MAIL FROM (server role)
    pub direction: Direction,
    /// Final message produced by the envelope rewriter
    pub rewritten: Option<Vec<u8>>,
    /// Where this transaction is in its lifecycle
    pub state: TransactionState,
}

impl MailTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transaction for `sender`, discarding any previous one
    pub fn set_sender(&mut self, sender: String) {
        *self = Self {
            sender,
            state: TransactionState::SenderKnown,
            ..Self::default()
        };
    }

    /// Append an admitted recipient
    pub fn admit(&mut self, recipient: String) {
        self.recipients.push(recipient);
        self.state = TransactionState::RecipientsAdmitted;
    }

    pub fn first_recipient(&self) -> Option<&str> {
        self.recipients.first().map(String::as_str)
    }

    pub fn append_content(&mut self, bytes: &[u8]) {
        self.content.extend_from_slice(bytes);
    }

    /// Replace the envelope and message with the rewriter's output
    pub fn apply(&mut self, rewritten: Rewritten) {
        self.sender = rewritten.sender;
        self.recipients = rewritten.recipients;
        self.rewritten = Some(rewritten.message);
        self.state = TransactionState::DataTransformed;
    }

    pub fn mark_transformed(&mut self) {
        self.state = TransactionState::DataTransformed;
    }

    pub fn mark_delivered(&mut self) {
        self.state = TransactionState::Delivered;
    }

    pub fn mark_dropped(&mut self) {
        self.state = TransactionState::Dropped;
    }

    /// Bytes to transmit: the rewritten message when there is one, else the
    /// original content
    pub fn outgoing(&self) -> &[u8] {
        self.rewritten.as_deref().unwrap_or(&self.content)
    }
}
