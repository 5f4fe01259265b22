//! Header discovery over raw message bytes

use crate::relay::RelayError;

/// Line terminator convention, fixed by the header/body separator line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    CrLf,
    Lf,
    Cr,
}

impl LineTerminator {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineTerminator::CrLf => b"\r\n",
            LineTerminator::Lf => b"\n",
            LineTerminator::Cr => b"\r",
        }
    }

    /// Returns the terminator if `line` is a blank separator line
    pub fn of_blank_line(line: &[u8]) -> Option<Self> {
        match line {
            b"\r\n" => Some(LineTerminator::CrLf),
            b"\n" => Some(LineTerminator::Lf),
            b"\r" => Some(LineTerminator::Cr),
            _ => None,
        }
    }
}

/// Physical lines `start..end` making up one header, continuations included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSpan {
    pub start: usize,
    pub end: usize,
}

impl HeaderSpan {
    fn at(line: usize) -> Self {
        Self {
            start: line,
            end: line + 1,
        }
    }
}

/// Where the headers the rewriter needs live inside a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    /// First `To:` header
    pub to: HeaderSpan,
    /// First `Subject:` header
    pub subject: HeaderSpan,
    /// Index of the blank line ending the header block
    pub separator: usize,
    /// Terminator of the blank line
    pub terminator: LineTerminator,
}

#[derive(Clone, Copy)]
enum Tracked {
    To,
    Subject,
}

/// Split `raw` into physical lines, each keeping its terminator. `\r\n`,
/// `\n` and a lone `\r` all end a line.
pub fn split_lines(raw: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < raw.len() {
        let end = match raw[i] {
            b'\n' => i + 1,
            b'\r' if raw.get(i + 1) == Some(&b'\n') => i + 2,
            b'\r' => i + 1,
            _ => {
                i += 1;
                continue;
            }
        };
        lines.push(&raw[start..end]);
        start = end;
        i = end;
    }
    if start < raw.len() {
        lines.push(&raw[start..]);
    }
    lines
}

/// Strip a trailing `\n`, `\r\n` or `\r`
pub fn trim_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub fn is_continuation(line: &[u8]) -> bool {
    matches!(line.first(), Some(b' ') | Some(b'\t'))
}

/// Whether `line` starts the header `name` (ASCII case-insensitive)
pub fn has_name(line: &[u8], name: &str) -> bool {
    let name = name.as_bytes();
    line.len() > name.len()
        && line[..name.len()].eq_ignore_ascii_case(name)
        && line[name.len()] == b':'
}

impl HeaderIndex {
    /// Scan the header block of `lines` once, front to back
    pub fn locate(lines: &[&[u8]]) -> Result<Self, RelayError> {
        let mut to: Option<HeaderSpan> = None;
        let mut subject: Option<HeaderSpan> = None;
        let mut open: Option<Tracked> = None;

        for (i, line) in lines.iter().enumerate() {
            if let Some(terminator) = LineTerminator::of_blank_line(line) {
                return match (to, subject) {
                    (Some(to), Some(subject)) => Ok(Self {
                        to,
                        subject,
                        separator: i,
                        terminator,
                    }),
                    (None, _) => Err(RelayError::MalformedMessage("no To header")),
                    (_, None) => Err(RelayError::MalformedMessage("no Subject header")),
                };
            }

            if is_continuation(line) {
                let span = match open {
                    Some(Tracked::To) => to.as_mut(),
                    Some(Tracked::Subject) => subject.as_mut(),
                    None => None,
                };
                if let Some(span) = span {
                    span.end = i + 1;
                }
                continue;
            }

            open = None;
            if to.is_none() && has_name(line, "To") {
                to = Some(HeaderSpan::at(i));
                open = Some(Tracked::To);
            } else if subject.is_none() && has_name(line, "Subject") {
                subject = Some(HeaderSpan::at(i));
                open = Some(Tracked::Subject);
            }
        }

        Err(RelayError::MalformedMessage("no blank line after headers"))
    }

    /// Logical Subject value: the first line's text after the colon, then
    /// every continuation fragment, all terminators removed
    pub fn subject_value(&self, lines: &[&[u8]]) -> Vec<u8> {
        unfold(lines, self.subject, "Subject")
    }

    /// Logical To value, unfolded the same way
    pub fn to_value(&self, lines: &[&[u8]]) -> Vec<u8> {
        unfold(lines, self.to, "To")
    }
}

fn unfold(lines: &[&[u8]], span: HeaderSpan, name: &str) -> Vec<u8> {
    let first = trim_terminator(lines[span.start]);
    let mut value: Vec<u8> = first[name.len() + 1..]
        .iter()
        .copied()
        .skip_while(|b| *b == b' ' || *b == b'\t')
        .collect();
    for line in &lines[span.start + 1..span.end] {
        value.extend_from_slice(trim_terminator(line));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(raw: &[u8]) -> (Vec<&[u8]>, HeaderIndex) {
        let lines = split_lines(raw);
        let index = HeaderIndex::locate(&lines).unwrap();
        (lines, index)
    }

    #[test]
    fn test_locate_simple_headers() {
        let raw = b"From: x@y\r\nTo: a@b\r\nSubject: hi\r\n\r\nbody\r\n";
        let (lines, index) = index_of(raw);

        assert_eq!(index.to, HeaderSpan { start: 1, end: 2 });
        assert_eq!(index.subject, HeaderSpan { start: 2, end: 3 });
        assert_eq!(index.separator, 3);
        assert_eq!(index.terminator, LineTerminator::CrLf);
        assert_eq!(index.subject_value(&lines), b"hi");
        assert_eq!(index.to_value(&lines), b"a@b");
    }

    #[test]
    fn test_lf_terminator() {
        let raw = b"To: a@b\nSubject: hi\n\nbody\n";
        let (_, index) = index_of(raw);
        assert_eq!(index.terminator, LineTerminator::Lf);
    }

    #[test]
    fn test_cr_terminator() {
        let raw = b"To: a@b\rSubject: hi\r\rbody\r";
        let (lines, index) = index_of(raw);
        assert_eq!(index.terminator, LineTerminator::Cr);
        assert_eq!(index.separator, 2);
        assert_eq!(index.subject_value(&lines), b"hi");
        assert_eq!(lines[3], b"body\r");
    }

    #[test]
    fn test_folded_subject_any_depth() {
        for n in [0usize, 1, 2, 5] {
            let fragments: Vec<String> = (0..n)
                .map(|i| {
                    if i % 2 == 0 {
                        format!(" part{i}")
                    } else {
                        format!("\tpart{i}")
                    }
                })
                .collect();

            let mut raw = b"To: a@b\r\nSubject: head".to_vec();
            for fragment in &fragments {
                raw.extend_from_slice(b"\r\n");
                raw.extend_from_slice(fragment.as_bytes());
            }
            raw.extend_from_slice(b"\r\nX-Other: 1\r\n\r\nbody\r\n");

            let (lines, index) = index_of(&raw);
            let expected = format!("head{}", fragments.concat());
            assert_eq!(index.subject_value(&lines), expected.as_bytes());
            assert_eq!(index.subject.end - index.subject.start, n + 1);
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let raw = b"Subject: one\r\nTo: a@b\r\nSubject: two\r\nTo: c@d\r\n\r\n";
        let (lines, index) = index_of(raw);
        assert_eq!(index.subject_value(&lines), b"one");
        assert_eq!(index.to_value(&lines), b"a@b");
    }

    #[test]
    fn test_case_insensitive_names() {
        let raw = b"to: a@b\r\nSUBJECT: hi\r\n\r\n";
        let (lines, index) = index_of(raw);
        assert_eq!(index.subject_value(&lines), b"hi");
    }

    #[test]
    fn test_similar_names_are_not_matched() {
        let raw = b"Thread-Topic: no\r\nTo-Do: no\r\nTo: a@b\r\nSubject: hi\r\n\r\n";
        let (_, index) = index_of(raw);
        assert_eq!(index.to.start, 2);
    }

    #[test]
    fn test_headers_in_body_are_ignored() {
        let raw = b"To: a@b\r\n\r\nSubject: in body\r\n";
        let lines = split_lines(raw);
        let result = HeaderIndex::locate(&lines);
        assert!(matches!(result, Err(RelayError::MalformedMessage(_))));
    }

    #[test]
    fn test_missing_separator() {
        let raw = b"To: a@b\r\nSubject: hi\r\n";
        let lines = split_lines(raw);
        assert!(matches!(
            HeaderIndex::locate(&lines),
            Err(RelayError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_missing_to() {
        let raw = b"Subject: hi\r\n\r\nbody";
        let lines = split_lines(raw);
        assert!(matches!(
            HeaderIndex::locate(&lines),
            Err(RelayError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_split_lines_keeps_terminators() {
        let lines = split_lines(b"a\r\nb\nc\rd");
        assert_eq!(
            lines,
            vec![&b"a\r\n"[..], &b"b\n"[..], &b"c\r"[..], &b"d"[..]]
        );
        assert_eq!(split_lines(b"x\r\r\n"), vec![&b"x\r"[..], &b"\r\n"[..]]);
    }

    #[test]
    fn test_trim_terminator() {
        assert_eq!(trim_terminator(b"abc\r\n"), b"abc");
        assert_eq!(trim_terminator(b"abc\n"), b"abc");
        assert_eq!(trim_terminator(b"abc\r"), b"abc");
        assert_eq!(trim_terminator(b"abc"), b"abc");
    }
}
