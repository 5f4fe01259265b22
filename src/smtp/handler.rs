//! Executes parsed commands against a session

use log::debug;

use crate::relay::MailHandler;
use crate::smtp::command::Command;
use crate::smtp::error::SmtpError;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

/// Runs commands for one connection, consulting the role strategy at MAIL
/// and RCPT
pub struct SmtpCommandHandler<'a> {
    hostname: &'a str,
    handler: &'a dyn MailHandler,
}

impl<'a> SmtpCommandHandler<'a> {
    pub fn new(hostname: &'a str, handler: &'a dyn MailHandler) -> Self {
        Self { hostname, handler }
    }

    pub fn process_command(
        &self,
        line: &str,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        let command = Command::parse(line)?;
        let verb = command.verb();
        if !session.permits(verb) {
            return Err(SmtpError::OutOfSequence { verb });
        }

        match command {
            Command::Helo(domain) => {
                let response = SmtpResponse::helo(self.hostname, &domain);
                session.greet(domain);
                Ok(response)
            }
            #[cfg(feature = "ehlo")]
            Command::Ehlo(domain) => {
                let response = SmtpResponse::ehlo(self.hostname, &domain);
                session.greet(domain);
                Ok(response)
            }
            Command::Mail(sender) => {
                session.begin_mail(sender);
                self.handler.accept_sender(&mut session.transaction);
                debug!(
                    "MAIL FROM {} ({:?})",
                    session.transaction.sender, session.transaction.direction
                );
                Ok(SmtpResponse::ok())
            }
            Command::Rcpt(recipient) => {
                session.add_recipient(recipient, |transaction, recipient| {
                    self.handler.admit_recipient(transaction, recipient)
                })?;
                Ok(SmtpResponse::ok())
            }
            Command::Data => {
                session.start_data()?;
                Ok(SmtpResponse::data_start())
            }
            Command::Rset => {
                session.reset();
                Ok(SmtpResponse::ok())
            }
            Command::Noop => Ok(SmtpResponse::ok()),
            Command::Quit => Ok(SmtpResponse::quit(self.hostname)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{Direction, DomainGate, MailTransaction, RelayError, Role};
    use crate::smtp::command::Verb;
    use crate::smtp::session::SmtpState;

    /// Server-role admission, outbound when the sender is at real.example
    struct GateOnly(DomainGate);

    impl MailHandler for GateOnly {
        fn role(&self) -> Role {
            Role::Server
        }

        fn accept_sender(&self, transaction: &mut MailTransaction) {
            if transaction.sender.ends_with("@real.example") {
                transaction.direction = Direction::Outbound;
            }
        }

        fn admit_recipient(
            &self,
            transaction: &mut MailTransaction,
            recipient: String,
        ) -> Result<(), RelayError> {
            self.0.admit(transaction, recipient)
        }

        fn complete(&self, _transaction: &mut MailTransaction) {}
    }

    fn run(lines: &[&str]) -> (SmtpSession, Vec<Result<SmtpResponse, SmtpError>>) {
        let gate = GateOnly(DomainGate::new(Role::Server, "shielded.example"));
        let handler = SmtpCommandHandler::new("mx.shielded.example", &gate);
        let mut session = SmtpSession::new();
        let replies = lines
            .iter()
            .map(|line| handler.process_command(line, &mut session))
            .collect();
        (session, replies)
    }

    fn code(reply: &Result<SmtpResponse, SmtpError>) -> u16 {
        match reply {
            Ok(response) => response.code,
            Err(e) => e.reply_code(),
        }
    }

    #[test]
    fn test_full_envelope() {
        let (session, replies) = run(&[
            "HELO client.local",
            "MAIL FROM:<bob@outside.example>",
            "RCPT TO:<shop@shielded.example>",
            "DATA",
        ]);

        let codes: Vec<u16> = replies.iter().map(code).collect();
        assert_eq!(codes, vec![250, 250, 250, 354]);
        assert_eq!(
            replies[0].as_ref().unwrap().text(),
            "mx.shielded.example Hello client.local"
        );
        assert_eq!(session.state, SmtpState::DataMode);
        assert_eq!(session.transaction.sender, "bob@outside.example");
        assert_eq!(session.transaction.recipients, vec!["shop@shielded.example"]);
    }

    #[test]
    fn test_mail_consults_the_strategy() {
        let (session, _) = run(&["HELO client.local", "MAIL FROM:<alice@real.example>"]);
        assert_eq!(session.transaction.direction, Direction::Outbound);
    }

    #[cfg(feature = "ehlo")]
    #[test]
    fn test_ehlo_greets() {
        let (session, replies) = run(&["EHLO client.local"]);
        let response = replies[0].as_ref().unwrap();
        assert_eq!(response.lines.len(), 4);
        assert_eq!(session.client_domain.as_deref(), Some("client.local"));
        assert!(session.permits(Verb::Mail));
    }

    #[test]
    fn test_domain_mismatch_then_valid_recipient() {
        let (session, replies) = run(&[
            "HELO client.local",
            "MAIL FROM:<bob@outside.example>",
            "RCPT TO:<someone@elsewhere.org>",
            "RCPT TO:<shop@shielded.example>",
        ]);

        assert_eq!(code(&replies[2]), 550);
        assert_eq!(code(&replies[3]), 250);
        assert_eq!(session.transaction.recipients, vec!["shop@shielded.example"]);
    }

    #[test]
    fn test_out_of_sequence() {
        let (_, replies) = run(&[
            "MAIL FROM:<bob@outside.example>",
            "RSET",
            "HELO client.local",
            "RCPT TO:<shop@shielded.example>",
            "DATA",
            "MAIL FROM:<bob@outside.example>",
            "MAIL FROM:<bob@outside.example>",
        ]);

        let codes: Vec<u16> = replies.iter().map(code).collect();
        assert_eq!(codes, vec![503, 503, 250, 503, 503, 250, 503]);
        assert!(matches!(
            replies[3],
            Err(SmtpError::OutOfSequence { verb: Verb::Rcpt })
        ));
    }

    #[test]
    fn test_data_after_only_refused_recipients() {
        let (_, replies) = run(&[
            "HELO client.local",
            "MAIL FROM:<bob@outside.example>",
            "RCPT TO:<a@elsewhere.org>",
            "DATA",
        ]);
        assert_eq!(code(&replies[3]), 503);
    }

    #[test]
    fn test_rset_clears_envelope() {
        let (session, replies) = run(&[
            "HELO client.local",
            "MAIL FROM:<bob@outside.example>",
            "RCPT TO:<shop@shielded.example>",
            "RSET",
        ]);

        assert_eq!(code(&replies[3]), 250);
        assert_eq!(session.state, SmtpState::GreetingReceived);
        assert!(session.transaction.sender.is_empty());
        assert!(session.transaction.recipients.is_empty());
    }

    #[test]
    fn test_noop_and_quit_any_time() {
        let (_, replies) = run(&["NOOP", "QUIT"]);
        assert_eq!(code(&replies[0]), 250);
        let quit = replies[1].as_ref().unwrap();
        assert_eq!(quit.code, 221);
        assert!(quit.closes_connection());
    }

    #[test]
    fn test_parse_errors_surface() {
        let (_, replies) = run(&["VRFY alice", "HELO", "HELO client.local", "MAIL FROM:<@>"]);
        let codes: Vec<u16> = replies.iter().map(code).collect();
        assert_eq!(codes, vec![500, 501, 250, 501]);
    }

    #[test]
    fn test_null_sender_is_accepted() {
        let (session, replies) = run(&[
            "HELO client.local",
            "MAIL FROM:<>",
            "RCPT TO:<shop@shielded.example>",
            "RCPT TO:<>",
            "DATA",
        ]);

        let codes: Vec<u16> = replies.iter().map(code).collect();
        assert_eq!(codes, vec![250, 250, 250, 501, 354]);
        assert!(session.transaction.sender.is_empty());
        assert_eq!(session.transaction.recipients, vec!["shop@shielded.example"]);
    }
}
