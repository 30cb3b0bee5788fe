use crate::analyzer::{Analyzer, AnalyzerConfig};
use crate::document::{Document, Field};
use crate::error::{IrError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

pub use crate::document::DocId;

pub type TermId = u32;
/// Insertion position of a document. Postings reference documents by this number.
pub type DocOrd = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: DocOrd,
    pub term_freq: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermEntry {
    pub postings: Vec<Posting>, // sorted by doc
    /// Occurrences of the term across the whole field.
    pub collection_freq: u64,
}

impl TermEntry {
    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }
}

fn default_boost() -> f32 {
    1.0
}

fn default_stored() -> bool {
    true
}

/// How one field takes part in indexing and querying.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    pub field: Field,
    /// Query-time weight. A boost of zero indexes the field without searching it.
    #[serde(default = "default_boost")]
    pub boost: f32,
    /// Keep the raw text for display.
    #[serde(default = "default_stored")]
    pub stored: bool,
}

impl FieldOptions {
    pub fn new(field: Field, boost: f32) -> Self {
        Self { field, boost, stored: true }
    }
}

/// `name` or `name=boost`, as given on the command line.
impl FromStr for FieldOptions {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, boost) = match s.split_once('=') {
            Some((name, boost)) => {
                let boost = boost
                    .trim()
                    .parse::<f32>()
                    .map_err(|e| IrError::config(format!("invalid boost '{boost}' for field {name}: {e}")))?;
                (name, boost)
            }
            None => (s, 1.0),
        };
        Ok(FieldOptions::new(name.trim().parse()?, boost))
    }
}

/// The default schema: every section indexed and stored, title and body searched.
pub fn default_schema() -> Vec<FieldOptions> {
    vec![
        FieldOptions::new(Field::Title, 1.0),
        FieldOptions::new(Field::Author, 0.0),
        FieldOptions::new(Field::Bibliography, 0.0),
        FieldOptions::new(Field::Body, 1.0),
    ]
}

/// Collection statistics of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub document_count: u32,
    pub average_field_length: f64,
    pub total_term_occurrences: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldIndex {
    dictionary: HashMap<String, TermId>,
    terms: Vec<TermEntry>,
    doc_lengths: Vec<u32>, // indexed by DocOrd
    total_terms: u64,
}

impl FieldIndex {
    /// Callers must add documents in increasing `doc` order.
    fn add(&mut self, doc: DocOrd, tokens: &[String]) {
        let mut tf: BTreeMap<&str, u32> = BTreeMap::new();
        for token in tokens {
            *tf.entry(token.as_str()).or_insert(0) += 1;
        }
        for (term, freq) in tf {
            let tid = match self.dictionary.get(term) {
                Some(&tid) => tid,
                None => {
                    let tid = self.terms.len() as TermId;
                    self.dictionary.insert(term.to_string(), tid);
                    self.terms.push(TermEntry::default());
                    tid
                }
            };
            let entry = &mut self.terms[tid as usize];
            entry.postings.push(Posting { doc, term_freq: freq });
            entry.collection_freq += freq as u64;
        }
        self.doc_lengths.push(tokens.len() as u32);
        self.total_terms += tokens.len() as u64;
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    pub fn term(&self, term: &str) -> Option<&TermEntry> {
        self.term_id(term).map(|tid| &self.terms[tid as usize])
    }

    pub fn postings(&self, term: &str) -> &[Posting] {
        self.term(term).map(|e| e.postings.as_slice()).unwrap_or(&[])
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.term(term).map_or(0, TermEntry::doc_freq)
    }

    pub fn doc_length(&self, doc: DocOrd) -> u32 {
        self.doc_lengths.get(doc as usize).copied().unwrap_or(0)
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &TermEntry)> {
        self.dictionary.iter().map(move |(term, &tid)| (term.as_str(), &self.terms[tid as usize]))
    }

    pub fn stats(&self) -> FieldStats {
        let n = self.doc_lengths.len() as u32;
        let average_field_length = if n == 0 { 0.0 } else { self.total_terms as f64 / n as f64 };
        FieldStats { document_count: n, average_field_length, total_term_occurrences: self.total_terms }
    }

    fn validate(&self, field: Field, num_docs: usize) -> Result<()> {
        let corrupt = |msg: String| Err(IrError::CorruptIndex(format!("{field}: {msg}")));
        if self.doc_lengths.len() != num_docs {
            return corrupt(format!("{} field lengths for {num_docs} documents", self.doc_lengths.len()));
        }
        if self.dictionary.len() != self.terms.len() {
            return corrupt("dictionary and term table differ in size".into());
        }
        let mut occurrences = 0u64;
        for (term, entry) in self.terms() {
            if entry.postings.is_empty() {
                return corrupt(format!("term '{term}' has no postings"));
            }
            let mut prev: Option<DocOrd> = None;
            let mut sum = 0u64;
            for p in &entry.postings {
                if prev.is_some_and(|d| d >= p.doc) || p.doc as usize >= num_docs || p.term_freq == 0 {
                    return corrupt(format!("bad posting {p:?} for term '{term}'"));
                }
                prev = Some(p.doc);
                sum += p.term_freq as u64;
            }
            if sum != entry.collection_freq {
                return corrupt(format!("collection frequency mismatch for term '{term}'"));
            }
            occurrences += sum;
        }
        let lengths: u64 = self.doc_lengths.iter().map(|&l| l as u64).sum();
        if occurrences != self.total_terms || lengths != self.total_terms {
            return corrupt("total term occurrences mismatch".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocId,
    /// Raw text of the stored fields.
    pub fields: BTreeMap<Field, String>,
}

/// A frozen inverted index. Built once by [`IndexWriter::finish`], then only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    schema: Vec<FieldOptions>,
    analyzer: AnalyzerConfig,
    fields: BTreeMap<Field, FieldIndex>,
    docs: Vec<StoredDocument>,
    by_id: HashMap<DocId, DocOrd>,
}

impl Index {
    pub fn document_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn schema(&self) -> &[FieldOptions] {
        &self.schema
    }

    pub fn analyzer(&self) -> Analyzer {
        Analyzer::new(self.analyzer)
    }

    pub fn field(&self, field: Field) -> Option<&FieldIndex> {
        self.fields.get(&field)
    }

    pub fn field_stats(&self, field: Field) -> Option<FieldStats> {
        self.field(field).map(FieldIndex::stats)
    }

    pub fn doc_id(&self, doc: DocOrd) -> Option<DocId> {
        self.docs.get(doc as usize).map(|d| d.id)
    }

    /// First-inserted document carrying the external id.
    pub fn find(&self, id: DocId) -> Option<DocOrd> {
        self.by_id.get(&id).copied()
    }

    pub fn stored(&self, id: DocId, field: Field) -> Option<&str> {
        let doc = self.find(id)?;
        self.docs[doc as usize].fields.get(&field).map(String::as_str)
    }

    /// Check postings order, frequencies and statistics against each other.
    pub fn validate(&self) -> Result<()> {
        for opts in &self.schema {
            if !self.fields.contains_key(&opts.field) {
                return Err(IrError::CorruptIndex(format!("schema field {} has no postings", opts.field)));
            }
        }
        for (field, fi) in &self.fields {
            fi.validate(*field, self.docs.len())?;
        }
        Ok(())
    }
}

/// Per-field terms of one record, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedDocument {
    pub id: DocId,
    pub terms: BTreeMap<Field, Vec<String>>,
    pub stored: BTreeMap<Field, String>,
}

impl AnalyzedDocument {
    pub fn new(doc: Document, schema: &[FieldOptions], analyzer: &Analyzer) -> Self {
        let mut terms = BTreeMap::new();
        let mut stored = BTreeMap::new();
        for opts in schema {
            let text = doc.field(opts.field);
            terms.insert(opts.field, analyzer.analyze(text));
            if opts.stored {
                stored.insert(opts.field, text.to_string());
            }
        }
        Self { id: doc.id, terms, stored }
    }
}

#[derive(Default)]
struct PendingIndex {
    fields: BTreeMap<Field, FieldIndex>,
    docs: Vec<StoredDocument>,
    by_id: HashMap<DocId, DocOrd>,
}

/// Accumulates documents into an [`Index`].
///
/// Analysis needs only `&self` and can run on any thread. [`IndexWriter::commit`]
/// is the single write path: it takes the lock, assigns the next document
/// number and appends postings, so every postings list stays sorted.
pub struct IndexWriter {
    schema: Vec<FieldOptions>,
    analyzer: Analyzer,
    state: Mutex<PendingIndex>,
}

impl IndexWriter {
    pub fn new(schema: Vec<FieldOptions>, analyzer: Analyzer) -> Result<Self> {
        validate_schema(&schema)?;
        let mut pending = PendingIndex::default();
        for opts in &schema {
            pending.fields.insert(opts.field, FieldIndex::default());
        }
        Ok(Self { schema, analyzer, state: Mutex::new(pending) })
    }

    pub fn analyzer(&self) -> Analyzer {
        self.analyzer
    }

    pub fn analyze(&self, doc: Document) -> AnalyzedDocument {
        AnalyzedDocument::new(doc, &self.schema, &self.analyzer)
    }

    pub fn commit(&self, doc: AnalyzedDocument) -> DocOrd {
        let mut state = self.state.lock();
        let ord = state.docs.len() as DocOrd;
        for opts in &self.schema {
            let tokens = doc.terms.get(&opts.field).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(fi) = state.fields.get_mut(&opts.field) {
                fi.add(ord, tokens);
            }
        }
        if state.by_id.contains_key(&doc.id) {
            tracing::warn!(doc_id = doc.id, "duplicate document id, indexing both records");
        } else {
            state.by_id.insert(doc.id, ord);
        }
        state.docs.push(StoredDocument { id: doc.id, fields: doc.stored });
        ord
    }

    pub fn add_document(&self, doc: Document) -> DocOrd {
        let analyzed = self.analyze(doc);
        self.commit(analyzed)
    }

    pub fn finish(self) -> Index {
        let state = self.state.into_inner();
        Index {
            schema: self.schema,
            analyzer: self.analyzer.config(),
            fields: state.fields,
            docs: state.docs,
            by_id: state.by_id,
        }
    }
}

pub fn validate_schema(schema: &[FieldOptions]) -> Result<()> {
    if schema.is_empty() {
        return Err(IrError::config("no fields configured"));
    }
    for (i, opts) in schema.iter().enumerate() {
        if !opts.boost.is_finite() || opts.boost < 0.0 {
            return Err(IrError::config(format!("invalid boost {} for field {}", opts.boost, opts.field)));
        }
        if schema[..i].iter().any(|o| o.field == opts.field) {
            return Err(IrError::config(format!("field {} configured twice", opts.field)));
        }
    }
    Ok(())
}
