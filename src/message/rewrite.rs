//! Envelope and header reconstruction for the shielded mailbox

use chrono::Utc;

use crate::message::codec::{SubjectText, bare_address};
use crate::message::locator::{HeaderIndex, is_continuation, split_lines};
use crate::message::stamp;
use crate::relay::{Direction, RelayError};

/// Product string written to every rewritten message
pub const X_MAILER: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// New envelope plus the message to transmit
#[derive(Debug, Clone, PartialEq)]
pub struct Rewritten {
    pub sender: String,
    pub recipients: Vec<String>,
    pub message: Vec<u8>,
}

/// Rebuilds the header block of messages passing through the shield
#[derive(Debug, Clone)]
pub struct EnvelopeRewriter {
    domain: String,
    mailbox: String,
}

impl EnvelopeRewriter {
    /// `domain` is the shielded domain, `mailbox` the real `user@host`
    /// inbound mail ends up at
    pub fn new(domain: &str, mailbox: &str) -> Self {
        Self {
            domain: domain.to_owned(),
            mailbox: mailbox.to_owned(),
        }
    }

    /// Rewrite `content` for a transaction travelling in `direction`.
    ///
    /// `sender` is the current envelope sender and `recipient` the first
    /// admitted recipient. Inbound mail gets the sender's address embedded
    /// in its Subject and goes to the shielded mailbox; outbound mail goes to
    /// the address recovered from its Subject.
    pub fn rewrite(
        &self,
        content: &[u8],
        direction: Direction,
        sender: &str,
        recipient: &str,
    ) -> Result<Rewritten, RelayError> {
        let lines = split_lines(content);
        let index = HeaderIndex::locate(&lines)?;
        let mut subject = SubjectText::parse(&index.subject_value(&lines));

        let target = match direction {
            Direction::Inbound => {
                subject.embed(&bare_address(sender));
                self.mailbox.clone()
            }
            Direction::Outbound => subject.extract()?,
            Direction::Unknown => return Err(RelayError::DirectionUnresolved),
        };

        let message = self.assemble(&lines, &index, &subject, &target);
        Ok(Rewritten {
            sender: bare_address(recipient),
            recipients: vec![target],
            message,
        })
    }

    fn assemble(
        &self,
        lines: &[&[u8]],
        index: &HeaderIndex,
        subject: &SubjectText,
        recipient: &str,
    ) -> Vec<u8> {
        let crlf = index.terminator.as_bytes();
        let now = Utc::now();
        let mut out: Vec<u8> = Vec::new();
        let push_line = |out: &mut Vec<u8>, line: &[u8]| {
            out.extend_from_slice(line);
            out.extend_from_slice(crlf);
        };

        push_line(&mut out, stamp::message_id(&self.domain).as_bytes());
        push_line(
            &mut out,
            &stamp::received(&self.domain, recipient, now, index.terminator),
        );
        push_line(&mut out, format!("X-Mailer: {X_MAILER}").as_bytes());

        // The public To address becomes the visible sender
        for name in ["From", "Envelope-From"] {
            let first = lines[index.to.start];
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&first["To".len()..]);
            for line in &lines[index.to.start + 1..index.to.end] {
                out.extend_from_slice(line);
            }
        }

        push_line(&mut out, format!("To: {recipient}").as_bytes());

        let mut subject_line = b"Subject: ".to_vec();
        subject_line.extend(subject.to_header_value(index.terminator));
        push_line(&mut out, &subject_line);

        push_line(&mut out, b"Mime-Version: 1.0");
        push_line(
            &mut out,
            format!("Date: {}", stamp::timestamp(now)).as_bytes(),
        );

        let mut keep = false;
        for line in &lines[..index.separator] {
            if !is_continuation(line) {
                keep = is_content_header(line);
            }
            if keep {
                out.extend_from_slice(line);
            }
        }

        for line in &lines[index.separator..] {
            out.extend_from_slice(line);
        }
        out
    }
}

fn is_content_header(line: &[u8]) -> bool {
    const PREFIX: &[u8] = b"content-";
    line.len() > PREFIX.len() && line[..PREFIX.len()].eq_ignore_ascii_case(PREFIX)
}
