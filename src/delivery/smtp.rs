//! SMTP client built on lettre's connection primitives

use std::borrow::Cow;
use std::time::Duration;

use lettre::Address;
use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Data, Mail, Rcpt};
use lettre::transport::smtp::extension::{ClientId, Extension, MailBodyParameter, MailParameter};
use log::debug;

use crate::delivery::{DeliveryError, Refusal, RelayTarget, Transport};

/// Connect, read and write timeout for one submission
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Submits messages over plain SMTP, one connection per transaction
#[derive(Debug, Clone)]
pub struct SmtpClient {
    hello: ClientId,
    timeout: Option<Duration>,
}

impl SmtpClient {
    /// `hello_name` is announced in EHLO
    pub fn new(hello_name: &str) -> Self {
        Self {
            hello: ClientId::Domain(hello_name.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Transport for SmtpClient {
    fn send(
        &self,
        target: &RelayTarget,
        sender: &str,
        recipients: &[String],
        message: &[u8],
    ) -> Result<Vec<Refusal>, DeliveryError> {
        debug!("connecting to {target}");
        let mut connection = SmtpConnection::connect(
            (target.host.as_str(), target.port),
            self.timeout,
            &self.hello,
            None,
            None,
        )?;

        let result = transmit(&mut connection, sender, recipients, message);
        match &result {
            Ok(_) => {
                if let Err(e) = connection.quit() {
                    debug!("QUIT to {target} failed: {e}");
                }
            }
            Err(_) => connection.abort(),
        }
        result
    }
}

fn transmit(
    connection: &mut SmtpConnection,
    sender: &str,
    recipients: &[String],
    message: &[u8],
) -> Result<Vec<Refusal>, DeliveryError> {
    let from = if sender.is_empty() {
        None
    } else {
        Some(parse_address(sender)?)
    };

    let mut parameters = Vec::new();
    if !message.is_ascii() && connection.server_info().supports_feature(Extension::EightBitMime) {
        parameters.push(MailParameter::Body(MailBodyParameter::EightBitMime));
    }
    connection.command(Mail::new(from, parameters))?;

    let mut refused = Vec::new();
    for recipient in recipients {
        let outcome = parse_address(recipient).and_then(|address| {
            connection
                .command(Rcpt::new(address, Vec::new()))
                .map_err(DeliveryError::from)
        });
        if let Err(e) = outcome {
            refused.push(Refusal {
                address: recipient.clone(),
                reason: e.to_string(),
            });
        }
    }

    if refused.len() == recipients.len() {
        return Err(DeliveryError::AllRecipientsRefused(refused));
    }

    connection.command(Data)?;
    connection.message(&data_payload(message))?;
    Ok(refused)
}

/// Message bytes for lettre's DATA writer, which appends `CRLF . CRLF`
/// itself: CRLF line endings, minus one final CRLF
fn data_payload(message: &[u8]) -> Cow<'_, [u8]> {
    match to_crlf(message) {
        Cow::Borrowed(bytes) => Cow::Borrowed(bytes.strip_suffix(b"\r\n").unwrap_or(bytes)),
        Cow::Owned(mut bytes) => {
            if bytes.ends_with(b"\r\n") {
                bytes.truncate(bytes.len() - 2);
            }
            Cow::Owned(bytes)
        }
    }
}

fn parse_address(address: &str) -> Result<Address, DeliveryError> {
    address
        .parse::<Address>()
        .map_err(|source| DeliveryError::Address {
            address: address.to_owned(),
            source,
        })
}

/// SMTP DATA requires CRLF; bare LF line endings are widened on the wire
pub fn to_crlf(message: &[u8]) -> Cow<'_, [u8]> {
    let bare_lf = message
        .iter()
        .enumerate()
        .any(|(i, b)| *b == b'\n' && (i == 0 || message[i - 1] != b'\r'));
    if !bare_lf {
        return Cow::Borrowed(message);
    }

    let mut out = Vec::with_capacity(message.len() + message.len() / 32);
    for (i, b) in message.iter().enumerate() {
        if *b == b'\n' && (i == 0 || message[i - 1] != b'\r') {
            out.push(b'\r');
        }
        out.push(*b);
    }
    Cow::Owned(out)
}
