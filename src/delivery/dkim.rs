//! DKIM signing (rsa-sha256, relaxed header and simple body canonicalization)

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::delivery::DeliveryError;
use crate::message::locator::{LineTerminator, is_continuation, split_lines, trim_terminator};

/// Headers covered by the signature when present
const SIGNED_HEADERS: &[&str] = &[
    "from",
    "to",
    "subject",
    "date",
    "message-id",
    "mime-version",
    "content-type",
    "content-transfer-encoding",
];

/// Width of each folded chunk of the `b=` value
const SIGNATURE_FOLD: usize = 72;

#[derive(Error, Debug)]
pub enum DkimKeyError {
    #[error("cannot read key: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a PKCS#8 or PKCS#1 RSA private key")]
    Pem,
}

pub struct DkimSigner {
    domain: String,
    selector: String,
    key: SigningKey<Sha256>,
}

impl DkimSigner {
    pub fn new(key: RsaPrivateKey, domain: &str, selector: &str) -> Self {
        Self {
            domain: domain.to_owned(),
            selector: selector.to_owned(),
            key: SigningKey::<Sha256>::new(key),
        }
    }

    /// Accepts `BEGIN PRIVATE KEY` and `BEGIN RSA PRIVATE KEY` documents
    pub fn from_pem(pem: &str, domain: &str, selector: &str) -> Result<Self, DkimKeyError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|_| DkimKeyError::Pem)?;
        Ok(Self::new(key, domain, selector))
    }

    pub fn load(path: &Path, domain: &str, selector: &str) -> Result<Self, DkimKeyError> {
        let pem = fs::read_to_string(path)?;
        Self::from_pem(&pem, domain, selector)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Prepend a `DKIM-Signature` header to `message`, using the message's
    /// own line terminator for the new header
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, DeliveryError> {
        let lines = split_lines(message);
        let separator = lines
            .iter()
            .position(|line| trim_terminator(line).is_empty())
            .unwrap_or(lines.len());
        let terminator = lines
            .get(separator)
            .and_then(|line| LineTerminator::of_blank_line(line))
            .unwrap_or(LineTerminator::CrLf);

        let fields = header_fields(&lines[..separator]);
        let body: Vec<u8> = lines.iter().skip(separator + 1).flat_map(|l| l.iter().copied()).collect();
        let body_hash = STANDARD.encode(Sha256::digest(canonical_body(&body)));

        let signed: Vec<(&str, &[u8])> = SIGNED_HEADERS
            .iter()
            .filter_map(|name| {
                fields
                    .iter()
                    .rev()
                    .find(|(field, _)| field.eq_ignore_ascii_case(name))
                    .map(|(_, value)| (*name, value.as_slice()))
            })
            .collect();
        let names: Vec<&str> = signed.iter().map(|(name, _)| *name).collect();

        let tags = format!(
            "v=1; a=rsa-sha256; c=relaxed/simple; d={}; s={}; t={}; h={}; bh={}; b=",
            self.domain,
            self.selector,
            Utc::now().timestamp(),
            names.join(":"),
            body_hash
        );

        let mut input = Vec::new();
        for (name, value) in &signed {
            input.extend_from_slice(&relaxed_header(name, value));
            input.extend_from_slice(b"\r\n");
        }
        input.extend_from_slice(&relaxed_header("dkim-signature", tags.as_bytes()));

        let signature = self
            .key
            .try_sign_with_rng(&mut rand::thread_rng(), &input)?;
        let encoded = STANDARD.encode(signature.to_bytes());

        let mut fold = terminator.as_bytes().to_vec();
        fold.push(b'\t');

        let mut out = Vec::with_capacity(message.len() + tags.len() + encoded.len() + 64);
        out.extend_from_slice(b"DKIM-Signature: ");
        out.extend_from_slice(tags.as_bytes());
        for (i, chunk) in encoded.as_bytes().chunks(SIGNATURE_FOLD).enumerate() {
            if i > 0 {
                out.extend_from_slice(&fold);
            }
            out.extend_from_slice(chunk);
        }
        out.extend_from_slice(terminator.as_bytes());
        out.extend_from_slice(message);
        Ok(out)
    }
}

/// Group header lines into `(name, raw value)` pairs; continuation lines stay
/// attached to their field
fn header_fields(lines: &[&[u8]]) -> Vec<(String, Vec<u8>)> {
    let mut fields: Vec<(String, Vec<u8>)> = Vec::new();
    for line in lines {
        if is_continuation(line) {
            if let Some((_, value)) = fields.last_mut() {
                value.extend_from_slice(line);
            }
            continue;
        }
        if let Some(colon) = line.iter().position(|&b| b == b':') {
            let name = String::from_utf8_lossy(&line[..colon]).trim().to_owned();
            fields.push((name, line[colon + 1..].to_vec()));
        }
    }
    fields
}

/// RFC 6376 relaxed header canonicalization, without the trailing CRLF
fn relaxed_header(name: &str, value: &[u8]) -> Vec<u8> {
    let mut out = name.trim().to_ascii_lowercase().into_bytes();
    out.push(b':');

    let mut pending_space = false;
    for &b in value.iter().filter(|&&b| b != b'\r' && b != b'\n') {
        if b == b' ' || b == b'\t' {
            pending_space = true;
            continue;
        }
        if pending_space && out.last() != Some(&b':') {
            out.push(b' ');
        }
        pending_space = false;
        out.push(b);
    }
    out
}

/// RFC 6376 simple body canonicalization over CRLF lines
fn canonical_body(body: &[u8]) -> Vec<u8> {
    let mut lines: Vec<&[u8]> = split_lines(body).into_iter().map(trim_terminator).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let mut out = Vec::with_capacity(body.len() + lines.len() + 2);
    for line in &lines {
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
    if out.is_empty() {
        out.extend_from_slice(b"\r\n");
    }
    out
}
