//! Generated header values: ids, trace lines, timestamps

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::message::locator::LineTerminator;

/// Random ASCII letters and digits
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// RFC 2822 date with numeric offset and zone name
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S +0000 (UTC)").to_string()
}

pub fn message_id(domain: &str) -> String {
    format!("Message-ID: <_{}@{domain}>", random_token(36))
}

/// Three-line Received trace folded with a tab
pub fn received(
    domain: &str,
    recipient: &str,
    now: DateTime<Utc>,
    terminator: LineTerminator,
) -> Vec<u8> {
    let lines = [
        format!("Received: from {domain} (unknown [127.0.0.1])"),
        format!("by smtp.{domain} (ESMTP) with SMTP id {}", random_token(12)),
        format!("for <{recipient}>; {}", timestamp(now)),
    ];

    let mut fold = terminator.as_bytes().to_vec();
    fold.push(b'\t');
    lines
        .iter()
        .map(|line| line.as_bytes())
        .collect::<Vec<_>>()
        .join(&fold[..])
}
