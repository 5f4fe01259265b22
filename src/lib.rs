//! # MailShield
//!
//! MailShield is an SMTP relay that hides a real mailbox behind a public
//! domain. The same binary runs in one of two roles.
//!
//! ## Server role
//!
//! The public exchanger of the shielded domain. Every recipient must be in
//! that domain (`550 Rejected domain mismatch` otherwise).
//!
//! - Mail from an outside correspondent has the sender's address appended to
//!   the Subject as `###sender@outside###` and is forwarded to the real
//!   mailbox.
//! - Mail from the real mailbox host must carry such a token. The token is
//!   stripped and the message goes to the address it named.
//!
//! In both directions the header block is rebuilt so the real address never
//! appears, and the public shielded address becomes the visible sender.
//! Rewritten mail is handed to a private relay.
//!
//! ## Relay role
//!
//! Accepts any recipient and delivers the message unchanged to the MX of the
//! first recipient's domain.
//!
//! ## Delivery semantics
//!
//! Every message is acknowledged with `250 OK` once data ends. Rewriting or
//! delivery failures are logged and the message is dropped; there is no
//! queue and no retry.
//!
//! ```rust,no_run
//! use mailshield::{Config, SmtpServer, relay};
//!
//! let config = Config::load("mailshield.toml".as_ref())?;
//! let handler = relay::from_config(&config)?;
//! SmtpServer::new(config.hostname(), handler).start(&config.listen_addr())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Supported SMTP commands
//!
//! `HELO`, `EHLO` (feature `ehlo`, on by default), `MAIL FROM`, `RCPT TO`,
//! `DATA`, `RSET`, `NOOP`, `QUIT`.
//!
//! ## Size Limits
//!
//! - User names: 64 characters max
//! - Domain names: 64 characters max
//! - Paths: 256 characters max
//! - Command lines: 512 characters max
//! - Text lines: 1000 characters max
//! - Recipients: 100 max per message
//! - Message data: 10MB

pub mod config;
pub mod delivery;
pub mod message;
pub mod relay;
mod smtp;

pub use config::{Config, ConfigError};
pub use relay::{MailHandler, MailTransaction, Role};
pub use smtp::{
    Limit, SmtpError, SmtpLimits, SmtpResponse, SmtpServer, SmtpSession, SmtpState, Verb,
};
