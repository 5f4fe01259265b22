//! Size limits from RFC 5321 section 4.5.3

use std::fmt;
use std::time::Duration;

pub struct SmtpLimits;

impl SmtpLimits {
    pub const USER_MAX_LENGTH: usize = 64;

    pub const DOMAIN_MAX_LENGTH: usize = 64;

    /// Reverse-path or forward-path, brackets excluded
    pub const PATH_MAX_LENGTH: usize = 256;

    /// Command line including CRLF
    pub const COMMAND_LINE_MAX_LENGTH: usize = 512;

    pub const REPLY_LINE_MAX_LENGTH: usize = 512;

    /// Data line including its terminator
    pub const TEXT_LINE_MAX_LENGTH: usize = 1000;

    pub const MAX_RECIPIENTS: usize = 100;

    /// Message data held in memory per transaction
    pub const MAX_DATA_SIZE: usize = 10 * 1024 * 1024;

    /// Idle time allowed between client lines
    pub const READ_TIMEOUT: Duration = Duration::from_secs(300);
}

/// The limit a client ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    CommandLine,
    TextLine,
    Path,
    User,
    Domain,
    Recipients,
    MessageSize,
}

impl Limit {
    pub fn max(self) -> usize {
        match self {
            Limit::CommandLine => SmtpLimits::COMMAND_LINE_MAX_LENGTH,
            Limit::TextLine => SmtpLimits::TEXT_LINE_MAX_LENGTH,
            Limit::Path => SmtpLimits::PATH_MAX_LENGTH,
            Limit::User => SmtpLimits::USER_MAX_LENGTH,
            Limit::Domain => SmtpLimits::DOMAIN_MAX_LENGTH,
            Limit::Recipients => SmtpLimits::MAX_RECIPIENTS,
            Limit::MessageSize => SmtpLimits::MAX_DATA_SIZE,
        }
    }

    pub fn reply_code(self) -> u16 {
        match self {
            Limit::CommandLine | Limit::TextLine => 500,
            Limit::Path | Limit::User | Limit::Domain => 501,
            Limit::Recipients => 452,
            Limit::MessageSize => 552,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let max = self.max();
        match self {
            Limit::CommandLine | Limit::TextLine => write!(f, "Line too long (max {max} characters)"),
            Limit::Path => write!(f, "Path too long (max {max} characters)"),
            Limit::User => write!(f, "User name too long (max {max} characters)"),
            Limit::Domain => write!(f, "Domain name too long (max {max} characters)"),
            Limit::Recipients => write!(f, "Too many recipients (max {max})"),
            Limit::MessageSize => write!(f, "Message exceeds fixed maximum size ({max} bytes)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_codes() {
        assert_eq!(Limit::CommandLine.reply_code(), 500);
        assert_eq!(Limit::User.reply_code(), 501);
        assert_eq!(Limit::Recipients.reply_code(), 452);
        assert_eq!(Limit::MessageSize.reply_code(), 552);
    }

    #[test]
    fn test_display_names_the_maximum() {
        assert_eq!(
            Limit::TextLine.to_string(),
            "Line too long (max 1000 characters)"
        );
        assert_eq!(Limit::Recipients.to_string(), "Too many recipients (max 100)");
    }
}
