//! SMTP listener

pub mod command;
pub mod error;
pub mod handler;
pub mod limits;
pub mod response;
pub mod server;
pub mod session;

pub use command::Verb;
pub use error::SmtpError;
pub use limits::{Limit, SmtpLimits};
pub use response::SmtpResponse;
pub use server::SmtpServer;
pub use session::{SmtpSession, SmtpState};
