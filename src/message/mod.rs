//! Raw message handling: header discovery, address tokens, rewriting

pub mod codec;
pub mod locator;
pub mod rewrite;
pub mod stamp;

pub use codec::{SubjectText, bare_address};
pub use locator::{HeaderIndex, HeaderSpan, LineTerminator, split_lines};
pub use rewrite::{EnvelopeRewriter, Rewritten, X_MAILER};
