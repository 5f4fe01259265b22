//! Errors raised while serving a client

use thiserror::Error;

use crate::relay::RelayError;
use crate::smtp::command::Verb;
use crate::smtp::limits::Limit;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unrecognized command")]
    Unrecognized,

    #[error("{verb} out of sequence")]
    OutOfSequence { verb: Verb },

    #[error("Invalid syntax: {0}")]
    Syntax(&'static str),

    #[error("{0}")]
    Exceeded(Limit),

    #[error("Recipient {0} outside the shielded domain")]
    DomainMismatch(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),
}

impl From<RelayError> for SmtpError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::DomainMismatch { address } => SmtpError::DomainMismatch(address),
            other => SmtpError::Transaction(other.to_string()),
        }
    }
}

impl SmtpError {
    pub fn reply_code(&self) -> u16 {
        match self {
            SmtpError::Io(_) => 421,
            SmtpError::Unrecognized => 500,
            SmtpError::OutOfSequence { .. } => 503,
            SmtpError::Syntax(_) => 501,
            SmtpError::Exceeded(limit) => limit.reply_code(),
            SmtpError::DomainMismatch(_) => 550,
            SmtpError::Transaction(_) => 451,
        }
    }

    /// Reply text for the peer. Addresses and internal causes stay in the log.
    pub fn reply_text(&self) -> String {
        match self {
            SmtpError::Io(_) => "Service not available".to_owned(),
            SmtpError::Unrecognized => "Syntax error, command unrecognized".to_owned(),
            SmtpError::OutOfSequence { verb } => {
                format!("Bad sequence of commands: {}", verb.prerequisite())
            }
            SmtpError::Syntax(detail) => format!("Syntax error: {detail}"),
            SmtpError::Exceeded(limit) => limit.to_string(),
            SmtpError::DomainMismatch(_) => "Rejected domain mismatch".to_owned(),
            SmtpError::Transaction(_) => "Requested action aborted: local error".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_mismatch_hides_the_address() {
        let err = SmtpError::from(RelayError::DomainMismatch {
            address: "x@evil.example".to_string(),
        });
        assert_eq!(err.reply_code(), 550);
        assert_eq!(err.reply_text(), "Rejected domain mismatch");
        assert!(err.to_string().contains("x@evil.example"));
    }

    #[test]
    fn test_other_relay_errors_are_local() {
        let err = SmtpError::from(RelayError::NoRecipient);
        assert!(matches!(err, SmtpError::Transaction(_)));
        assert_eq!(err.reply_code(), 451);
    }

    #[test]
    fn test_limit_codes_pass_through() {
        assert_eq!(SmtpError::Exceeded(Limit::Recipients).reply_code(), 452);
        assert_eq!(SmtpError::Exceeded(Limit::TextLine).reply_code(), 500);
    }

    #[test]
    fn test_sequence_reply_names_the_prerequisite() {
        let err = SmtpError::OutOfSequence { verb: Verb::Rcpt };
        assert_eq!(err.reply_code(), 503);
        assert_eq!(err.reply_text(), "Bad sequence of commands: MAIL first");
    }
}
