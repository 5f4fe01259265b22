//! Address tokens carried inside the Subject header
//!
//! A real address travels as `###address###` appended to the subject text.
//! Subjects written as RFC 2047 base64 encoded-words are decoded before the
//! token is searched or appended, then re-encoded in the same charset.

use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use encoding_rs::{Encoding, UTF_8};
use log::warn;
use regex::bytes::Regex;

use crate::message::locator::LineTerminator;
use crate::relay::RelayError;

/// Longest encoded-word RFC 2047 allows
const ENCODED_WORD_MAX_LENGTH: usize = 75;

/// `=?charset?B?payload?=` at the start of the input
static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^=\?([^?\s]+)\?[bB]\?([A-Za-z0-9+/=]*)\?=").expect("valid encoded-word pattern")
});

static ADDRESS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)###(.+?)###").expect("valid token pattern"));

static ANGLE_ADDRESS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"<([^<>]+)>").expect("valid address pattern"));

/// Wrap an address in token delimiters
pub fn token(address: &str) -> String {
    format!("###{address}###")
}

/// The bare address from `Name <addr>` forms; other input is trimmed
pub fn bare_address(path: &str) -> String {
    match ANGLE_ADDRESS.captures(path) {
        Some(caps) => caps[1].trim().to_string(),
        None => path.trim().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WordEncoding {
    /// Charset label exactly as the sender declared it
    charset: String,
    encoding: &'static Encoding,
    /// Anything after the leading run of encoded-words, kept verbatim
    suffix: Vec<u8>,
}

/// Editable text of a Subject header value
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectText {
    /// Decoded text (UTF-8) when encoded, raw bytes otherwise
    text: Vec<u8>,
    encoding: Option<WordEncoding>,
}

impl SubjectText {
    /// Interpret an unfolded Subject value
    pub fn parse(value: &[u8]) -> Self {
        Self::parse_encoded(value).unwrap_or_else(|| Self {
            text: value.to_vec(),
            encoding: None,
        })
    }

    fn parse_encoded(value: &[u8]) -> Option<Self> {
        let mut rest = trim_start(value);
        let first = ENCODED_WORD.captures(rest)?;
        let charset = String::from_utf8_lossy(&first[1]).into_owned();

        let mut payload = Vec::new();
        // Whitespace between adjacent words is dropped; before anything else
        // it stays in the suffix
        while let Some(caps) = ENCODED_WORD.captures(trim_start(rest)) {
            if !caps[1].eq_ignore_ascii_case(charset.as_bytes()) {
                break;
            }
            payload.extend(BASE64.decode(&caps[2]).ok()?);
            let skipped = rest.len() - trim_start(rest).len();
            rest = &rest[skipped + caps[0].len()..];
        }

        let encoding = encoding_for(&charset);
        let (decoded, _) = encoding.decode_without_bom_handling(&payload);
        Some(Self {
            text: decoded.into_owned().into_bytes(),
            encoding: Some(WordEncoding {
                charset,
                encoding,
                suffix: rest.to_vec(),
            }),
        })
    }

    pub fn is_encoded(&self) -> bool {
        self.encoding.is_some()
    }

    /// Decoded subject text
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Append the token for `address` to the end of the text
    pub fn embed(&mut self, address: &str) {
        self.text.extend_from_slice(token(address).as_bytes());
    }

    /// Remove every address token and return the first one's address
    pub fn extract(&mut self) -> Result<String, RelayError> {
        let mut addresses = ADDRESS_TOKEN
            .captures_iter(&self.text)
            .map(|caps| String::from_utf8_lossy(&caps[1]).trim().to_string());

        let Some(address) = addresses.next() else {
            return Err(RelayError::MalformedSubjectToken {
                subject: String::from_utf8_lossy(&self.text).into_owned(),
            });
        };
        let extra: Vec<String> = addresses.collect();
        if !extra.is_empty() {
            warn!("subject carries extra address tokens, using {address}, ignoring {extra:?}");
        }

        self.text = ADDRESS_TOKEN.replace_all(&self.text, &b""[..]).into_owned();
        Ok(address)
    }

    /// Header value ready to follow `Subject: `. Encoded subjects come out as
    /// encoded-words folded with `terminator` and a space.
    pub fn to_header_value(&self, terminator: LineTerminator) -> Vec<u8> {
        let Some(word) = &self.encoding else {
            return self.text.clone();
        };

        let text = String::from_utf8_lossy(&self.text);
        let mut fold = terminator.as_bytes().to_vec();
        fold.push(b' ');

        let words = encode_words(&text, word);
        let mut value = words.join(&fold[..]);
        value.extend_from_slice(&word.suffix);
        value
    }
}

fn trim_start(value: &[u8]) -> &[u8] {
    let start = value
        .iter()
        .position(|b| *b != b' ' && *b != b'\t')
        .unwrap_or(value.len());
    &value[start..]
}

fn encoding_for(charset: &str) -> &'static Encoding {
    // RFC 2231 language suffix: utf-8*en
    let label = charset.split('*').next().unwrap_or(charset);
    Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8)
}

/// Split `text` into base64 encoded-words of at most 75 characters, never
/// cutting a character in half
fn encode_words(text: &str, word: &WordEncoding) -> Vec<Vec<u8>> {
    let (charset, encoding) = output_charset(word);
    let overhead = "=?".len() + charset.len() + "?B?".len() + "?=".len();
    let budget = ENCODED_WORD_MAX_LENGTH.saturating_sub(overhead) / 4 * 3;

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if current.chars().count() > 1 && encoding.encode(&current).0.len() > budget {
            current.pop();
            chunks.push(encoding.encode(&current).0.into_owned());
            current.clear();
            current.push(c);
        }
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(encoding.encode(&current).0.into_owned());
    }

    chunks
        .iter()
        .map(|chunk| format!("=?{charset}?B?{}?=", BASE64.encode(chunk)).into_bytes())
        .collect()
}

/// encoding_rs cannot produce UTF-16 or replacement output; those fall back
/// to UTF-8 and the label follows
fn output_charset(word: &WordEncoding) -> (&str, &'static Encoding) {
    let output = word.encoding.output_encoding();
    if output == word.encoding {
        (&word.charset, word.encoding)
    } else {
        (output.name(), output)
    }
}
