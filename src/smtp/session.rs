//! Per-connection protocol state

use std::mem;

use crate::relay::{MailTransaction, RelayError};
use crate::smtp::command::Verb;
use crate::smtp::error::SmtpError;
use crate::smtp::limits::{Limit, SmtpLimits};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmtpState {
    /// Waiting for HELO
    #[default]
    Initial,
    GreetingReceived,
    MailReceived,
    /// At least one recipient admitted
    RecipientsReceived,
    /// Collecting message data until the lone dot
    DataMode,
}

/// Bookkeeping for the DATA phase in progress
#[derive(Debug, Default)]
struct DataPhase {
    size: usize,
    /// First limit broken; later lines are swallowed
    overflow: Option<Limit>,
}

/// Protocol state plus the mail transaction of one connection
#[derive(Debug, Default)]
pub struct SmtpSession {
    pub state: SmtpState,
    pub transaction: MailTransaction,
    /// Domain announced in HELO or EHLO
    pub client_domain: Option<String>,
    data: DataPhase,
}

impl SmtpSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permits(&self, verb: Verb) -> bool {
        match verb {
            Verb::Mail => self.state == SmtpState::GreetingReceived,
            Verb::Rcpt => matches!(
                self.state,
                SmtpState::MailReceived | SmtpState::RecipientsReceived
            ),
            Verb::Data => self.state == SmtpState::RecipientsReceived,
            Verb::Rset => self.state != SmtpState::Initial,
            _ => true,
        }
    }

    pub fn in_data_mode(&self) -> bool {
        self.state == SmtpState::DataMode
    }

    /// HELO or EHLO: remember the client and drop any open transaction
    pub fn greet(&mut self, domain: String) {
        self.client_domain = Some(domain);
        self.reset();
    }

    /// Abandon the transaction; the greeting stays
    pub fn reset(&mut self) {
        self.state = SmtpState::GreetingReceived;
        self.transaction = MailTransaction::new();
        self.data = DataPhase::default();
    }

    pub fn begin_mail(&mut self, sender: String) {
        self.transaction.set_sender(sender);
        self.state = SmtpState::MailReceived;
    }

    /// Offer a recipient to `admit`. A refusal leaves the state as it was.
    pub fn add_recipient<F>(&mut self, recipient: String, admit: F) -> Result<(), SmtpError>
    where
        F: FnOnce(&mut MailTransaction, String) -> Result<(), RelayError>,
    {
        if self.transaction.recipients.len() >= SmtpLimits::MAX_RECIPIENTS {
            return Err(SmtpError::Exceeded(Limit::Recipients));
        }

        admit(&mut self.transaction, recipient)?;
        self.state = SmtpState::RecipientsReceived;
        Ok(())
    }

    pub fn start_data(&mut self) -> Result<(), SmtpError> {
        if !self.permits(Verb::Data) {
            return Err(SmtpError::OutOfSequence { verb: Verb::Data });
        }

        self.transaction.content.clear();
        self.data = DataPhase::default();
        self.state = SmtpState::DataMode;
        Ok(())
    }

    /// The lone dot ending the data phase
    pub fn is_end_of_data(line: &[u8]) -> bool {
        matches!(line, b".\r\n" | b".\n")
    }

    /// Append one raw line, terminator included, with one leading dot
    /// removed. Once a limit is broken the rest is swallowed.
    pub fn push_data_line(&mut self, line: &[u8]) {
        if self.data.overflow.is_some() {
            return;
        }
        if line.len() > SmtpLimits::TEXT_LINE_MAX_LENGTH {
            self.data.overflow = Some(Limit::TextLine);
            return;
        }

        let line = line.strip_prefix(b".").unwrap_or(line);
        if self.data.size + line.len() > SmtpLimits::MAX_DATA_SIZE {
            self.data.overflow = Some(Limit::MessageSize);
            return;
        }
        self.transaction.append_content(line);
        self.data.size += line.len();
    }

    /// End the data phase. The transaction is handed out unless a limit was
    /// broken; either way the session is ready for the next MAIL.
    pub fn finish_data(&mut self) -> Result<MailTransaction, SmtpError> {
        if !self.in_data_mode() {
            return Err(SmtpError::OutOfSequence { verb: Verb::Data });
        }

        let transaction = mem::take(&mut self.transaction);
        let overflow = self.data.overflow.take();
        self.reset();

        match overflow {
            Some(limit) => Err(SmtpError::Exceeded(limit)),
            None => Ok(transaction),
        }
    }
}
