//! Batch index construction.
//!
//! Sources are parsed in parallel and their records analyzed in parallel; the
//! analyzed records are then committed one at a time, in source order, through
//! the writer's single commit path. Malformed records are skipped and listed in
//! the [`BuildReport`]. A source that cannot be read fails the whole build, so a
//! half-built index is never returned.

use crate::analyzer::Analyzer;
use crate::document::{read_documents, Document, ParseError};
use crate::error::{IrError, Result};
use crate::index::{FieldOptions, Index, IndexWriter};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Something that yields a readable stream of records.
pub trait DocumentSource: Send + Sync {
    fn name(&self) -> String;
    fn open(&self) -> Result<Box<dyn BufRead + Send + '_>>;
}

pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> Result<Box<dyn BufRead + Send + '_>> {
        let f = File::open(&self.path).map_err(|e| IrError::io(&self.path, e))?;
        Ok(Box::new(BufReader::new(f)))
    }
}

/// In-memory text, mostly for tests and small corpora.
pub struct TextSource {
    pub name: String,
    pub text: String,
}

impl TextSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

impl DocumentSource for TextSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn open(&self) -> Result<Box<dyn BufRead + Send + '_>> {
        Ok(Box::new(self.text.as_bytes()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub sources: usize,
    pub documents: usize,
    pub parse_errors: Vec<ParseError>,
}

/// Parse every source, analyze and commit every record, freeze the index.
pub fn build_index<S: DocumentSource>(
    sources: &[S],
    schema: Vec<FieldOptions>,
    analyzer: Analyzer,
) -> Result<(Index, BuildReport)> {
    let writer = IndexWriter::new(schema, analyzer)?;

    let parsed = sources
        .par_iter()
        .map(|source| -> Result<_> {
            let name = source.name();
            let batch = read_documents(&name, source.open()?)?;
            tracing::debug!(source = %name, documents = batch.documents.len(), "parsed source");
            Ok(batch)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut report = BuildReport { sources: sources.len(), ..BuildReport::default() };
    let mut documents: Vec<Document> = Vec::new();
    for batch in parsed {
        documents.extend(batch.documents);
        report.parse_errors.extend(batch.errors);
    }

    let analyzed: Vec<_> = documents.into_par_iter().map(|doc| writer.analyze(doc)).collect();
    for doc in analyzed {
        writer.commit(doc);
        report.documents += 1;
    }

    let index = writer.finish();
    tracing::info!(
        sources = report.sources,
        documents = report.documents,
        skipped = report.parse_errors.len(),
        "index build complete"
    );
    Ok((index, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Field;
    use crate::index::default_schema;

    #[test]
    fn builds_across_sources_in_order() {
        let sources = vec![
            TextSource::new("a", ".I 1\n.W\nshock wave\n.I 2\n.W\nboundary layer\n"),
            TextSource::new("b", ".I 3\n.T\nwing\n.W\nshock\n"),
        ];
        let (index, report) = build_index(&sources, default_schema(), Analyzer::default()).unwrap();
        assert_eq!(report.sources, 2);
        assert_eq!(report.documents, 3);
        assert!(report.parse_errors.is_empty());
        let ids: Vec<_> = (0..3).map(|d| index.doc_id(d).unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(index.field(Field::Body).unwrap().doc_freq("shock"), 2);
        index.validate().unwrap();
    }

    #[test]
    fn malformed_records_are_reported_not_fatal() {
        let sources = vec![TextSource::new("a", ".I 1\n.W\nkept\n.I one\n.W\nlost\n.I 3\n.W\nkept too\n")];
        let (index, report) = build_index(&sources, default_schema(), Analyzer::default()).unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.parse_errors.len(), 1);
        assert_eq!(report.parse_errors[0].source_name, "a");
        assert_eq!(index.document_count(), 2);
    }

    #[test]
    fn unreadable_source_fails_the_build() {
        let err = build_index(&[FileSource::new("/no/such/corpus")], default_schema(), Analyzer::default()).unwrap_err();
        assert!(matches!(err, IrError::Io { .. }));
        assert!(err.to_string().contains("/no/such/corpus"));
    }
}
