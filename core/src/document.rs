//! Parser for the marker-delimited bibliographic format.
//!
//! ```text
//! .I 1
//! .T
//! experimental investigation of the aerodynamics of a
//! wing in a slipstream .
//! .A
//! brenckman,m.
//! .B
//! j. ae. scs. 25, 1958, 324.
//! .W
//! experimental investigation of the aerodynamics of a ...
//! ```
//!
//! `.I` opens a record and carries its numeric id; `.T`, `.A`, `.B` and `.W`
//! open the title, author, bibliography and body sections.

use crate::error::{IrError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// External document identifier carried by the `.I` marker.
pub type DocId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Author,
    Bibliography,
    #[serde(alias = "contents")]
    Body,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Title, Field::Author, Field::Bibliography, Field::Body];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Bibliography => "bibliography",
            Field::Body => "body",
        }
    }

    fn from_marker(c: char) -> Option<Field> {
        match c {
            'T' => Some(Field::Title),
            'A' => Some(Field::Author),
            'B' => Some(Field::Bibliography),
            'W' => Some(Field::Body),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Ok(Field::Title),
            "author" => Ok(Field::Author),
            "bibliography" => Ok(Field::Bibliography),
            "body" | "contents" => Ok(Field::Body),
            other => Err(IrError::config(format!("unknown field '{other}'"))),
        }
    }
}

/// One parsed record. Sections that never appeared are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub author: String,
    pub bibliography: String,
    pub body: String,
}

impl Document {
    pub fn new(id: DocId) -> Self {
        Self { id, ..Self::default() }
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Author => &self.author,
            Field::Bibliography => &self.bibliography,
            Field::Body => &self.body,
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Author => &mut self.author,
            Field::Bibliography => &mut self.bibliography,
            Field::Body => &mut self.body,
        }
    }

    /// Append one line of section text, joining lines with a single space.
    pub fn append(&mut self, field: Field, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let slot = self.field_mut(field);
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// `.I` followed by something other than an unsigned integer.
    InvalidId(String),
    /// A section marker before any `.I` marker.
    OrphanSection(Field),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidId(raw) => write!(f, "non-numeric document id '{raw}'"),
            ParseErrorKind::OrphanSection(field) => write!(f, "{field} section before any identifier marker"),
        }
    }
}

/// A record that could not be parsed. The record is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source_name}:{line}: {kind}")]
pub struct ParseError {
    pub source_name: String,
    /// 1-based line of the offending marker.
    pub line: usize,
    pub kind: ParseErrorKind,
}

/// Records and per-record failures from one source, in stream order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub documents: Vec<Document>,
    pub errors: Vec<ParseError>,
}

enum Marker<'a> {
    Id(&'a str),
    Section(Field, &'a str),
}

/// A marker is `.X` at the start of a line, followed by whitespace or nothing.
fn classify(line: &str) -> Option<Marker<'_>> {
    let mut chars = line.chars();
    if chars.next()? != '.' {
        return None;
    }
    let tag = chars.next()?;
    let rest = chars.as_str();
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    if tag == 'I' {
        return Some(Marker::Id(rest.trim()));
    }
    Field::from_marker(tag).map(|field| Marker::Section(field, rest))
}

/// Line-at-a-time state machine. Feed lines with [`RecordParser::feed`] and
/// flush the last record with [`RecordParser::finish`].
pub struct RecordParser {
    source_name: String,
    line_no: usize,
    current: Option<Document>,
    section: Option<Field>,
    /// Set after a failure; lines are dropped until the next `.I`.
    skipping: bool,
}

impl RecordParser {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self { source_name: source_name.into(), line_no: 0, current: None, section: None, skipping: false }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError { source_name: self.source_name.clone(), line: self.line_no, kind }
    }

    pub fn feed(&mut self, line: &str, out: &mut ParsedBatch) {
        self.line_no += 1;
        match classify(line) {
            Some(Marker::Id(raw)) => {
                if let Some(doc) = self.current.take() {
                    out.documents.push(doc);
                }
                self.section = None;
                match raw.parse::<DocId>() {
                    Ok(id) => {
                        self.skipping = false;
                        self.current = Some(Document::new(id));
                    }
                    Err(_) => {
                        self.skipping = true;
                        out.errors.push(self.error(ParseErrorKind::InvalidId(raw.to_string())));
                    }
                }
            }
            Some(Marker::Section(field, rest)) => {
                if self.skipping {
                    return;
                }
                match self.current.as_mut() {
                    Some(doc) => {
                        self.section = Some(field);
                        doc.append(field, rest);
                    }
                    None => {
                        self.skipping = true;
                        out.errors.push(self.error(ParseErrorKind::OrphanSection(field)));
                    }
                }
            }
            None => {
                if self.skipping {
                    return;
                }
                if let (Some(doc), Some(field)) = (self.current.as_mut(), self.section) {
                    doc.append(field, line);
                }
            }
        }
    }

    pub fn finish(mut self, out: &mut ParsedBatch) {
        if let Some(doc) = self.current.take() {
            out.documents.push(doc);
        }
    }
}

/// Parse an in-memory line sequence.
pub fn parse_lines<I, S>(source_name: &str, lines: I) -> ParsedBatch
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = RecordParser::new(source_name);
    let mut batch = ParsedBatch::default();
    for line in lines {
        parser.feed(line.as_ref(), &mut batch);
    }
    parser.finish(&mut batch);
    batch
}

pub fn parse_str(source_name: &str, text: &str) -> ParsedBatch {
    parse_lines(source_name, text.lines())
}

/// Parse a buffered stream. Read failures are fatal and name the source.
pub fn read_documents<R: BufRead>(source_name: &str, reader: R) -> Result<ParsedBatch> {
    let mut parser = RecordParser::new(source_name);
    let mut batch = ParsedBatch::default();
    for line in reader.lines() {
        let line = line.map_err(|e| IrError::io(source_name, e))?;
        parser.feed(&line, &mut batch);
    }
    parser.finish(&mut batch);
    for err in &batch.errors {
        tracing::warn!(%err, "skipping malformed record");
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
.I 1
.T
experimental investigation of the aerodynamics of a
wing in a slipstream .
.A
brenckman,m.
.B
j. ae. scs. 25, 1958, 324.
.W
experimental investigation of the aerodynamics of a
wing in a slipstream .
.I 2
.T
simple shear flow past a flat plate in an incompressible fluid of small
viscosity .
.W
simple shear flow past a flat plate .
";

    #[test]
    fn parses_all_sections() {
        let batch = parse_str("cran", SAMPLE);
        assert!(batch.errors.is_empty());
        assert_eq!(batch.documents.len(), 2);
        let d = &batch.documents[0];
        assert_eq!(d.id, 1);
        assert_eq!(d.title, "experimental investigation of the aerodynamics of a wing in a slipstream .");
        assert_eq!(d.author, "brenckman,m.");
        assert_eq!(d.bibliography, "j. ae. scs. 25, 1958, 324.");
        assert!(d.body.starts_with("experimental investigation"));
    }

    #[test]
    fn missing_sections_are_empty() {
        let batch = parse_str("cran", ".I 7\n.W\nonly a body\n");
        let d = &batch.documents[0];
        assert_eq!(d.title, "");
        assert_eq!(d.author, "");
        assert_eq!(d.bibliography, "");
        assert_eq!(d.body, "only a body");
    }

    #[test]
    fn lines_before_first_marker_are_ignored() {
        let batch = parse_str("cran", "preamble\nmore preamble\n.I 3\n.W\ntext\n");
        assert!(batch.errors.is_empty());
        assert_eq!(batch.documents, vec![Document { id: 3, body: "text".into(), ..Document::default() }]);
    }

    #[test]
    fn non_numeric_id_skips_only_that_record() {
        let text = ".I 1\n.W\nfirst\n.I abc\n.T\nlost title\n.W\nlost body\n.I 3\n.W\nthird\n";
        let batch = parse_str("cran", text);
        let ids: Vec<DocId> = batch.documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(batch.documents[0].body, "first");
        assert_eq!(batch.errors.len(), 1);
        assert_eq!(batch.errors[0].line, 4);
        assert_eq!(batch.errors[0].kind, ParseErrorKind::InvalidId("abc".into()));
    }

    #[test]
    fn section_before_any_identifier_is_reported_once() {
        let text = ".T\norphan\n.W\norphan body\n.I 9\n.W\nkept\n";
        let batch = parse_str("cran", text);
        assert_eq!(batch.errors.len(), 1);
        assert_eq!(batch.errors[0].kind, ParseErrorKind::OrphanSection(Field::Title));
        assert_eq!(batch.documents.len(), 1);
        assert_eq!(batch.documents[0].body, "kept");
    }

    #[test]
    fn marker_requires_whitespace_after_tag() {
        let batch = parse_str("cran", ".I 1\n.W\n.Whatever stays in the body\n");
        assert_eq!(batch.documents[0].body, ".Whatever stays in the body");
    }

    #[test]
    fn reparsing_is_idempotent() {
        let a = parse_str("cran", SAMPLE);
        let b = parse_lines("cran", SAMPLE.lines().map(String::from).collect::<Vec<_>>());
        assert_eq!(a, b);
    }

    #[test]
    fn reader_and_str_agree() {
        let from_reader = read_documents("cran", SAMPLE.as_bytes()).unwrap();
        assert_eq!(from_reader, parse_str("cran", SAMPLE));
    }

    #[test]
    fn field_names_parse_with_contents_alias() {
        assert_eq!("contents".parse::<Field>().unwrap(), Field::Body);
        assert_eq!("Title".parse::<Field>().unwrap(), Field::Title);
        assert!("abstract".parse::<Field>().is_err());
    }
}
