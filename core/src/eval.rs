use crate::document::DocId;
use crate::error::{IrError, Result};
use crate::query::RankedResult;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Relevant documents per query id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Judgments {
    relevant: HashMap<String, HashSet<DocId>>,
}

impl Judgments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, query_id: impl Into<String>, doc_id: DocId) {
        self.relevant.entry(query_id.into()).or_default().insert(doc_id);
    }

    pub fn relevant(&self, query_id: &str) -> Option<&HashSet<DocId>> {
        self.relevant.get(query_id)
    }

    pub fn num_queries(&self) -> usize {
        self.relevant.len()
    }

    /// Accepts `<q> <doc> <judgment>`, TREC `<q> <iter> <doc> <judgment>`,
    /// or `<q> <doc>`. A document is relevant when its judgment is positive.
    /// Lines that fit none of these are skipped with a warning.
    pub fn parse<R: BufRead>(source_name: &str, reader: R) -> Result<Self> {
        let mut judgments = Judgments::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| IrError::io(source_name, e))?;
            let cols: Vec<&str> = line.split_whitespace().collect();
            let parsed = match cols.as_slice() {
                [] => continue,
                [q, d] => d.parse::<DocId>().ok().map(|d| (*q, d, 1)),
                [q, d, j] => d.parse::<DocId>().ok().zip(j.parse::<i32>().ok()).map(|(d, j)| (*q, d, j)),
                [q, _, d, j] => d.parse::<DocId>().ok().zip(j.parse::<i32>().ok()).map(|(d, j)| (*q, d, j)),
                _ => None,
            };
            match parsed {
                Some((q, d, j)) if j > 0 => judgments.insert(q, d),
                Some(_) => {}
                None => tracing::warn!(source = source_name, line = i + 1, "skipping malformed judgment"),
            }
        }
        Ok(judgments)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path).map_err(|e| IrError::io(path, e))?;
        Self::parse(&path.display().to_string(), BufReader::new(f))
    }
}

/// Average precision of one ranked list. Zero when nothing is judged relevant.
pub fn average_precision(results: &[RankedResult], relevant: Option<&HashSet<DocId>>) -> f64 {
    let Some(relevant) = relevant.filter(|r| !r.is_empty()) else {
        return 0.0;
    };
    let mut seen = 0usize;
    let mut sum = 0.0;
    for (i, r) in results.iter().enumerate() {
        if relevant.contains(&r.doc_id) {
            seen += 1;
            sum += seen as f64 / (i + 1) as f64;
        }
    }
    sum / relevant.len() as f64
}

/// Arithmetic mean, zero for no queries.
pub fn mean_average_precision(ap: &[f64]) -> f64 {
    if ap.is_empty() {
        0.0
    } else {
        ap.iter().sum::<f64>() / ap.len() as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    /// AP of every ranked list, in evaluation order. A query id may repeat.
    pub per_query: Vec<(String, f64)>,
    pub mean_average_precision: f64,
    /// Queries that failed and so stayed out of the mean.
    pub skipped: usize,
}

impl Evaluation {
    /// AP of the first ranked list evaluated for `query_id`.
    pub fn ap(&self, query_id: &str) -> Option<f64> {
        self.per_query.iter().find(|(id, _)| id == query_id).map(|&(_, ap)| ap)
    }
}

/// Evaluate every ranked list. `skipped` counts queries that produced no
/// ranked list at all (syntax failures); they do not enter the mean.
pub fn evaluate<'r, I>(ranked: I, judgments: &Judgments, skipped: usize) -> Evaluation
where
    I: IntoIterator<Item = (&'r str, &'r [RankedResult])>,
{
    let mut per_query: Vec<(String, f64)> = Vec::new();
    let mut seen = HashSet::new();
    for (query_id, results) in ranked {
        if !seen.insert(query_id) {
            tracing::warn!(query_id, "query id evaluated more than once, each list counts");
        }
        let relevant = judgments.relevant(query_id);
        if tracing::enabled!(tracing::Level::DEBUG) {
            for r in results {
                let hit = relevant.is_some_and(|set| set.contains(&r.doc_id));
                tracing::debug!(query_id, rank = r.rank, doc_id = r.doc_id, relevant = hit);
            }
        }
        let ap = average_precision(results, relevant);
        tracing::debug!(query_id, ap, "average precision");
        per_query.push((query_id.to_string(), ap));
    }
    let aps: Vec<f64> = per_query.iter().map(|&(_, ap)| ap).collect();
    Evaluation { mean_average_precision: mean_average_precision(&aps), per_query, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(doc_ids: &[DocId]) -> Vec<RankedResult> {
        doc_ids
            .iter()
            .enumerate()
            .map(|(i, &doc_id)| RankedResult { query_id: "1".into(), doc_id, rank: i + 1, score: 1.0 / (i + 1) as f64 })
            .collect()
    }

    #[test]
    fn average_precision_of_ranks_one_three_five() {
        let results = ranked(&[10, 11, 12, 13, 14]);
        let relevant: HashSet<DocId> = [10, 12, 14].into_iter().collect();
        let ap = average_precision(&results, Some(&relevant));
        let expected = (1.0 + 2.0 / 3.0 + 3.0 / 5.0) / 3.0;
        assert!((ap - expected).abs() < 1e-12);
        assert!((ap - 0.7556).abs() < 1e-4);
    }

    #[test]
    fn unretrieved_relevant_documents_count_against_precision() {
        let results = ranked(&[1, 2]);
        let relevant: HashSet<DocId> = [1, 99].into_iter().collect();
        assert!((average_precision(&results, Some(&relevant)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_or_missing_judgments_give_zero() {
        let results = ranked(&[1, 2]);
        assert_eq!(average_precision(&results, None), 0.0);
        assert_eq!(average_precision(&results, Some(&HashSet::new())), 0.0);
    }

    #[test]
    fn parses_three_four_and_two_column_judgments() {
        let text = "1 184 2\n1 29 -1\n2 0 12 1\n3 7\n\nbad line here with many columns\n4 x 1\n";
        let j = Judgments::parse("qrels", text.as_bytes()).unwrap();
        assert!(j.relevant("1").unwrap().contains(&184));
        assert!(!j.relevant("1").unwrap().contains(&29));
        assert!(j.relevant("2").unwrap().contains(&12));
        assert!(j.relevant("3").unwrap().contains(&7));
        assert!(j.relevant("4").is_none());
        assert_eq!(j.num_queries(), 3);
    }

    #[test]
    fn mean_covers_evaluated_queries_only() {
        let mut j = Judgments::new();
        j.insert("a", 1);
        j.insert("b", 2);
        let a = ranked(&[1]);
        let b = ranked(&[3, 2]);
        let eval = evaluate([("a", a.as_slice()), ("b", b.as_slice())], &j, 1);
        assert_eq!(eval.ap("a"), Some(1.0));
        assert_eq!(eval.ap("b"), Some(0.5));
        assert!((eval.mean_average_precision - 0.75).abs() < 1e-12);
        assert_eq!(eval.skipped, 1);
    }

    #[test]
    fn repeated_query_ids_each_count() {
        let mut j = Judgments::new();
        j.insert("1", 5);
        let hit = ranked(&[5]);
        let miss = ranked(&[6]);
        let eval = evaluate([("1", hit.as_slice()), ("1", miss.as_slice())], &j, 0);
        assert_eq!(eval.per_query, vec![("1".to_string(), 1.0), ("1".to_string(), 0.0)]);
        assert!((eval.mean_average_precision - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(mean_average_precision(&[]), 0.0);
    }
}
