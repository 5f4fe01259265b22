//! Command line parsing

use std::fmt;

use crate::smtp::error::SmtpError;
use crate::smtp::limits::{Limit, SmtpLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Helo,
    #[cfg(feature = "ehlo")]
    Ehlo,
    Mail,
    Rcpt,
    Data,
    Rset,
    Noop,
    Quit,
}

impl Verb {
    /// What the client has to send before this verb is accepted
    pub fn prerequisite(self) -> &'static str {
        match self {
            Verb::Mail => "HELO first, one transaction at a time",
            Verb::Rcpt => "MAIL first",
            Verb::Data => "RCPT first",
            Verb::Rset => "HELO first",
            _ => "none",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::Helo => "HELO",
            #[cfg(feature = "ehlo")]
            Verb::Ehlo => "EHLO",
            Verb::Mail => "MAIL",
            Verb::Rcpt => "RCPT",
            Verb::Data => "DATA",
            Verb::Rset => "RSET",
            Verb::Noop => "NOOP",
            Verb::Quit => "QUIT",
        };
        f.write_str(name)
    }
}

/// A command line, parsed and with its arguments checked against the limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Helo(String),
    #[cfg(feature = "ehlo")]
    Ehlo(String),
    /// Reverse-path, brackets and ESMTP parameters removed
    Mail(String),
    /// Forward-path, brackets and ESMTP parameters removed
    Rcpt(String),
    Data,
    Rset,
    Noop,
    Quit,
}

impl Command {
    /// Parse one command line without its terminator
    pub fn parse(line: &str) -> Result<Self, SmtpError> {
        // The limit counts the CRLF the caller already stripped
        if line.len() + 2 > SmtpLimits::COMMAND_LINE_MAX_LENGTH {
            return Err(SmtpError::Exceeded(Limit::CommandLine));
        }

        let line = line.trim();
        let (word, arg) = match line.split_once(char::is_whitespace) {
            Some((word, arg)) => (word, arg.trim()),
            None => (line, ""),
        };

        match word.to_ascii_uppercase().as_str() {
            "HELO" => Ok(Command::Helo(domain_arg(arg)?)),
            #[cfg(feature = "ehlo")]
            "EHLO" => Ok(Command::Ehlo(domain_arg(arg)?)),
            "MAIL" => {
                let sender = path_arg(arg, "FROM:", "expected MAIL FROM:<address>")?;
                if !sender.is_empty() {
                    check_mailbox(&sender)?;
                }
                Ok(Command::Mail(sender))
            }
            "RCPT" => {
                let recipient = path_arg(arg, "TO:", "expected RCPT TO:<address>")?;
                check_mailbox(&recipient)?;
                Ok(Command::Rcpt(recipient))
            }
            "DATA" if arg.is_empty() => Ok(Command::Data),
            "DATA" => Err(SmtpError::Syntax("DATA takes no arguments")),
            "RSET" => Ok(Command::Rset),
            "NOOP" => Ok(Command::Noop),
            "QUIT" => Ok(Command::Quit),
            _ => Err(SmtpError::Unrecognized),
        }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Command::Helo(_) => Verb::Helo,
            #[cfg(feature = "ehlo")]
            Command::Ehlo(_) => Verb::Ehlo,
            Command::Mail(_) => Verb::Mail,
            Command::Rcpt(_) => Verb::Rcpt,
            Command::Data => Verb::Data,
            Command::Rset => Verb::Rset,
            Command::Noop => Verb::Noop,
            Command::Quit => Verb::Quit,
        }
    }
}

fn domain_arg(arg: &str) -> Result<String, SmtpError> {
    let domain = arg
        .split_whitespace()
        .next()
        .ok_or(SmtpError::Syntax("domain argument required"))?;
    if domain.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
        return Err(SmtpError::Exceeded(Limit::Domain));
    }
    Ok(domain.to_owned())
}

/// Address inside `FROM:<addr> [params]` or `TO:<addr> [params]`, unchecked
fn path_arg(arg: &str, keyword: &str, usage: &'static str) -> Result<String, SmtpError> {
    let rest = arg
        .get(..keyword.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(keyword))
        .map(|_| &arg[keyword.len()..])
        .ok_or(SmtpError::Syntax(usage))?;

    let address = rest
        .trim_start()
        .strip_prefix('<')
        .and_then(|inner| inner.find('>').map(|end| inner[..end].trim()))
        .ok_or(SmtpError::Syntax("address must be enclosed in angle brackets"))?;

    Ok(address.to_owned())
}

/// `user@domain` within the length limits
fn check_mailbox(address: &str) -> Result<(), SmtpError> {
    if address.is_empty() {
        return Err(SmtpError::Syntax("empty address"));
    }
    if address.len() > SmtpLimits::PATH_MAX_LENGTH {
        return Err(SmtpError::Exceeded(Limit::Path));
    }

    let (user, domain) = address
        .rsplit_once('@')
        .ok_or(SmtpError::Syntax("address must contain @"))?;
    if user.len() > SmtpLimits::USER_MAX_LENGTH {
        return Err(SmtpError::Exceeded(Limit::User));
    }
    if domain.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
        return Err(SmtpError::Exceeded(Limit::Domain));
    }
    if user.is_empty() || domain.is_empty() {
        return Err(SmtpError::Syntax("invalid address"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exceeded(result: Result<Command, SmtpError>) -> Option<Limit> {
        match result {
            Err(SmtpError::Exceeded(limit)) => Some(limit),
            _ => None,
        }
    }

    #[test]
    fn test_verbs_are_case_insensitive() {
        assert_eq!(
            Command::parse("helo client.local").unwrap(),
            Command::Helo("client.local".to_string())
        );
        assert_eq!(Command::parse("Data").unwrap(), Command::Data);
        assert_eq!(Command::parse("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_mail_and_rcpt_paths() {
        assert_eq!(
            Command::parse("MAIL FROM:<a@b.example>").unwrap(),
            Command::Mail("a@b.example".to_string())
        );
        assert_eq!(
            Command::parse("mail from: <a@b.example> BODY=8BITMIME SIZE=120").unwrap(),
            Command::Mail("a@b.example".to_string())
        );
        assert_eq!(
            Command::parse("RCPT TO:<c@d.example>").unwrap(),
            Command::Rcpt("c@d.example".to_string())
        );
    }

    #[test]
    fn test_malformed_paths() {
        for line in [
            "MAIL",
            "MAIL a@b.example",
            "MAIL FROM:a@b.example",
            "MAIL FROM:<a@b.example",
            "RCPT TO:<>",
            "RCPT TO:<nobody>",
            "RCPT TO:<@b.example>",
            "RCPT TO:<a@>",
            "RCPT FROM:<a@b.example>",
        ] {
            assert!(
                matches!(Command::parse(line), Err(SmtpError::Syntax(_))),
                "{line} should be a syntax error"
            );
        }
    }

    #[test]
    fn test_null_reverse_path() {
        assert_eq!(
            Command::parse("MAIL FROM:<>").unwrap(),
            Command::Mail(String::new())
        );
        assert_eq!(
            Command::parse("MAIL FROM: <> SIZE=512").unwrap(),
            Command::Mail(String::new())
        );
        assert!(matches!(
            Command::parse("MAIL FROM:<nobody>"),
            Err(SmtpError::Syntax("address must contain @"))
        ));
        assert!(matches!(
            Command::parse("RCPT TO:<>"),
            Err(SmtpError::Syntax("empty address"))
        ));
    }

    #[test]
    fn test_helo_needs_a_domain() {
        assert!(matches!(
            Command::parse("HELO"),
            Err(SmtpError::Syntax("domain argument required"))
        ));
    }

    #[test]
    fn test_data_takes_no_arguments() {
        assert!(matches!(Command::parse("DATA now"), Err(SmtpError::Syntax(_))));
    }

    #[test]
    fn test_unknown_verb() {
        assert!(matches!(Command::parse("VRFY alice"), Err(SmtpError::Unrecognized)));
        assert!(matches!(Command::parse("\u{fffd} HELO x"), Err(SmtpError::Unrecognized)));
    }

    #[test]
    fn test_length_limits() {
        let long_line = "HELO ".to_string() + &"a".repeat(SmtpLimits::COMMAND_LINE_MAX_LENGTH);
        assert_eq!(exceeded(Command::parse(&long_line)), Some(Limit::CommandLine));

        let long_helo = "HELO ".to_string() + &"a".repeat(SmtpLimits::DOMAIN_MAX_LENGTH + 1);
        assert_eq!(exceeded(Command::parse(&long_helo)), Some(Limit::Domain));

        let long_user = "a".repeat(SmtpLimits::USER_MAX_LENGTH + 1);
        let line = format!("MAIL FROM:<{long_user}@example.com>");
        assert_eq!(exceeded(Command::parse(&line)), Some(Limit::User));

        let long_domain = "a".repeat(SmtpLimits::DOMAIN_MAX_LENGTH + 1);
        let line = format!("RCPT TO:<user@{long_domain}>");
        assert_eq!(exceeded(Command::parse(&line)), Some(Limit::Domain));

        let long_path = "a".repeat(SmtpLimits::PATH_MAX_LENGTH) + "@example.com";
        let line = format!("RCPT TO:<{long_path}>");
        assert_eq!(exceeded(Command::parse(&line)), Some(Limit::Path));
    }

    #[test]
    fn test_quoted_local_part_splits_on_last_at() {
        assert_eq!(
            Command::parse("RCPT TO:<\"a@b\"@shielded.example>").unwrap(),
            Command::Rcpt("\"a@b\"@shielded.example".to_string())
        );
    }
}
