//! Replies sent to the client

use std::fmt;

use crate::smtp::error::SmtpError;
#[cfg(feature = "ehlo")]
use crate::smtp::limits::SmtpLimits;

/// A reply code with one or more text lines. Written as a multiline reply
/// when there is more than one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpResponse {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    pub fn ok() -> Self {
        Self::new(250, "OK")
    }

    pub fn greeting(hostname: &str) -> Self {
        Self::new(
            220,
            format!("{hostname} ESMTP {}", env!("CARGO_PKG_NAME")),
        )
    }

    pub fn helo(hostname: &str, client_domain: &str) -> Self {
        Self::new(250, format!("{hostname} Hello {client_domain}"))
    }

    /// Greeting line followed by the advertised extensions
    #[cfg(feature = "ehlo")]
    pub fn ehlo(hostname: &str, client_domain: &str) -> Self {
        Self {
            code: 250,
            lines: vec![
                format!("{hostname} Hello {client_domain}"),
                "PIPELINING".to_owned(),
                format!("SIZE {}", SmtpLimits::MAX_DATA_SIZE),
                "8BITMIME".to_owned(),
            ],
        }
    }

    pub fn data_start() -> Self {
        Self::new(354, "End data with <CR><LF>.<CR><LF>")
    }

    pub fn quit(hostname: &str) -> Self {
        Self::new(221, format!("{hostname} closing connection"))
    }

    pub fn timeout(hostname: &str) -> Self {
        Self::new(421, format!("{hostname} timeout, closing connection"))
    }

    /// First text line
    pub fn text(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    pub fn closes_connection(&self) -> bool {
        matches!(self.code, 221 | 421)
    }
}

impl From<&SmtpError> for SmtpResponse {
    fn from(e: &SmtpError) -> Self {
        Self::new(e.reply_code(), e.reply_text())
    }
}

impl fmt::Display for SmtpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((last, rest)) = self.lines.split_last() else {
            return write!(f, "{}\r\n", self.code);
        };
        for line in rest {
            write!(f, "{}-{line}\r\n", self.code)?;
        }
        write!(f, "{} {last}\r\n", self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        assert_eq!(SmtpResponse::ok().to_string(), "250 OK\r\n");
        assert_eq!(
            SmtpResponse::greeting("mx.shielded.example").to_string(),
            "220 mx.shielded.example ESMTP mailshield\r\n"
        );
        assert_eq!(
            SmtpResponse::quit("mx.shielded.example").text(),
            "mx.shielded.example closing connection"
        );
    }

    #[cfg(feature = "ehlo")]
    #[test]
    fn test_ehlo_is_multiline() {
        let response = SmtpResponse::ehlo("mx.shielded.example", "peer");
        assert_eq!(
            response.to_string(),
            "250-mx.shielded.example Hello peer\r\n\
             250-PIPELINING\r\n\
             250-SIZE 10485760\r\n\
             250 8BITMIME\r\n"
        );
    }

    #[test]
    fn test_from_error() {
        let err = SmtpError::DomainMismatch("x@evil.example".to_string());
        let response = SmtpResponse::from(&err);
        assert_eq!(response.to_string(), "550 Rejected domain mismatch\r\n");
        assert!(!response.closes_connection());
    }

    #[test]
    fn test_closing_replies() {
        assert!(SmtpResponse::quit("h").closes_connection());
        assert!(SmtpResponse::timeout("h").closes_connection());
        assert!(!SmtpResponse::data_start().closes_connection());
    }

    #[test]
    fn test_empty_reply_still_terminates() {
        let response = SmtpResponse {
            code: 250,
            lines: Vec::new(),
        };
        assert_eq!(response.to_string(), "250\r\n");
        assert_eq!(response.text(), "");
    }
}
