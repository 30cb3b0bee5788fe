use crate::analyzer::Analyzer;
use crate::document::{DocId, Field};
use crate::error::{IrError, Result};
use crate::index::{DocOrd, FieldOptions, Index};
use crate::scoring::{ScoringModel, TermStats};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

/// Characters with meaning in query syntax. `&` and `|` cover `&&` and `||`.
const RESERVED: &[char] = &['\\', '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '/'];

#[derive(Debug, Clone, PartialEq, Error)]
#[error("query {query_id}: {reason} at offset {offset}")]
pub struct QuerySyntaxError {
    pub query_id: String,
    pub offset: usize,
    pub reason: String,
}

/// Backslash-escape every reserved character so the text parses as literals.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// `None` searches every configured field.
    pub field: Option<Field>,
    /// Unescaped literal text, still to be analyzed.
    pub text: String,
    pub boost: f32,
}

/// Parse `[field:]text[^boost]` clauses separated by whitespace.
///
/// Any other unescaped reserved character is an error; so is an unknown field
/// name, a malformed boost or a trailing backslash.
pub fn parse(query_id: &str, input: &str) -> Result<Vec<Clause>, QuerySyntaxError> {
    let err = |offset: usize, reason: String| QuerySyntaxError { query_id: query_id.to_string(), offset, reason };
    let mut clauses = Vec::new();
    let mut chars = input.char_indices().peekable();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let Some(&(start, _)) = chars.peek() else { break };

        let mut text = String::new();
        let mut field = None;
        let mut boost_text: Option<String> = None;
        while let Some((offset, c)) = chars.next_if(|(_, c)| !c.is_whitespace()) {
            if let Some(b) = boost_text.as_mut() {
                b.push(c);
                continue;
            }
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => text.push(escaped),
                    None => return Err(err(offset, "dangling escape".into())),
                },
                ':' if field.is_none() && !text.is_empty() => {
                    let name = std::mem::take(&mut text);
                    let f = name.parse::<Field>().map_err(|_| err(start, format!("unknown field '{name}'")))?;
                    field = Some(f);
                }
                '^' => boost_text = Some(String::new()),
                c if RESERVED.contains(&c) => return Err(err(offset, format!("unsupported operator '{c}'"))),
                c => text.push(c),
            }
        }

        let boost = match boost_text {
            None => 1.0,
            Some(raw) => match raw.parse::<f32>() {
                Ok(b) if b.is_finite() && b >= 0.0 => b,
                _ => return Err(err(start, format!("invalid boost '{raw}'"))),
            },
        };
        if text.is_empty() {
            return Err(err(start, "empty term".into()));
        }
        clauses.push(Clause { field, text, boost });
    }
    Ok(clauses)
}

/// A query as read from a query file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub text: String,
}

impl Query {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub query_id: String,
    pub doc_id: DocId,
    /// 1-based.
    pub rank: usize,
    pub score: f64,
}

/// Ranked lists of the queries that ran, and the queries that did not parse.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<(String, Vec<RankedResult>)>,
    pub failures: Vec<QuerySyntaxError>,
}

/// Scores queries against a frozen index. Holds only shared references and
/// copies, so one engine can serve any number of threads.
#[derive(Debug, Clone)]
pub struct QueryEngine<'a> {
    index: &'a Index,
    analyzer: Analyzer,
    model: ScoringModel,
    fields: Vec<FieldOptions>,
}

impl<'a> QueryEngine<'a> {
    /// Search the index's own searchable fields (boost > 0).
    pub fn new(index: &'a Index, model: ScoringModel) -> Result<Self> {
        let fields = index.schema().iter().copied().filter(|f| f.boost > 0.0).collect();
        Self::with_fields(index, model, fields)
    }

    /// Search `fields` with their boosts. Every field must be indexed.
    pub fn with_fields(index: &'a Index, model: ScoringModel, fields: Vec<FieldOptions>) -> Result<Self> {
        model.validate()?;
        if fields.is_empty() {
            return Err(IrError::config("no searchable fields"));
        }
        for opts in &fields {
            if index.field(opts.field).is_none() {
                return Err(IrError::config(format!("field {} is not indexed", opts.field)));
            }
            if !opts.boost.is_finite() || opts.boost < 0.0 {
                return Err(IrError::config(format!("invalid boost {} for field {}", opts.boost, opts.field)));
            }
        }
        Ok(Self { index, analyzer: index.analyzer(), model, fields })
    }

    pub fn model(&self) -> ScoringModel {
        self.model
    }

    /// Rank free text. Reserved characters are escaped first, so ordinary
    /// punctuation never fails.
    pub fn search(&self, query: &Query, k: usize) -> Result<Vec<RankedResult>, QuerySyntaxError> {
        self.search_raw(&query.id, &escape(query.text.trim()), k)
    }

    /// Rank text written in the `field:term^boost` syntax, without escaping.
    pub fn search_raw(&self, query_id: &str, raw: &str, k: usize) -> Result<Vec<RankedResult>, QuerySyntaxError> {
        let clauses = parse(query_id, raw)?;
        let scores = self.accumulate(&clauses);
        Ok(self.rank(query_id, scores, k))
    }

    /// Run many free-text queries in parallel. Results keep the input order.
    pub fn search_batch(&self, queries: &[Query], k: usize) -> BatchOutcome {
        self.batch(queries, |q| self.search(q, k))
    }

    /// Like [`search_batch`](Self::search_batch), but each query is read in the
    /// `field:term^boost` syntax. Queries that fail to parse are logged and
    /// collected in [`BatchOutcome::failures`].
    pub fn search_batch_raw(&self, queries: &[Query], k: usize) -> BatchOutcome {
        self.batch(queries, |q| self.search_raw(&q.id, q.text.trim(), k))
    }

    fn batch<F>(&self, queries: &[Query], run: F) -> BatchOutcome
    where
        F: Fn(&Query) -> Result<Vec<RankedResult>, QuerySyntaxError> + Sync,
    {
        let ran: Vec<_> = queries.par_iter().map(|q| (q.id.clone(), run(q))).collect();
        let mut outcome = BatchOutcome::default();
        for (id, result) in ran {
            match result {
                Ok(list) => outcome.results.push((id, list)),
                Err(err) => {
                    tracing::warn!(%err, "skipping query");
                    outcome.failures.push(err);
                }
            }
        }
        outcome
    }

    /// Weighted sum of per-field contributions, keyed by document number.
    fn accumulate(&self, clauses: &[Clause]) -> HashMap<DocOrd, f64> {
        let mut scores: HashMap<DocOrd, f64> = HashMap::new();
        for clause in clauses {
            let targets: Vec<(Field, f64)> = match clause.field {
                Some(field) => {
                    let boost = self.fields.iter().find(|o| o.field == field).map_or(1.0, |o| o.boost);
                    if self.index.field(field).is_some() { vec![(field, boost as f64)] } else { vec![] }
                }
                None => self.fields.iter().map(|o| (o.field, o.boost as f64)).collect(),
            };
            for term in self.analyzer.analyze(&clause.text) {
                for &(field, field_boost) in &targets {
                    let Some(fi) = self.index.field(field) else { continue };
                    let Some(entry) = fi.term(&term) else { continue };
                    let stats = fi.stats();
                    let ts = TermStats { doc_freq: entry.doc_freq(), collection_freq: entry.collection_freq };
                    let weight = field_boost * clause.boost as f64;
                    for p in &entry.postings {
                        let s = self.model.score(p.term_freq, ts, &stats, fi.doc_length(p.doc));
                        *scores.entry(p.doc).or_insert(0.0) += s * weight;
                    }
                }
            }
        }
        scores
    }

    /// Descending score, ties by insertion order, cut at `k`.
    fn rank(&self, query_id: &str, scores: HashMap<DocOrd, f64>, k: usize) -> Vec<RankedResult> {
        let mut scored: Vec<(DocOrd, f64)> = scores.into_iter().collect();
        scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scored
            .into_iter()
            .take(k)
            .enumerate()
            .filter_map(|(i, (doc, score))| {
                let doc_id = self.index.doc_id(doc)?;
                Some(RankedResult { query_id: query_id.to_string(), doc_id, rank: i + 1, score })
            })
            .collect()
    }
}
