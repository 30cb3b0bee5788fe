//! Query files in, run files out.
//!
//! A run file holds one line per (query, result):
//! `<query id> 0 <doc id> <rank> <score> <run tag>`.

use crate::document::{parse_str, DocId};
use crate::error::{IrError, Result};
use crate::query::{Query, RankedResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

/// Literal written in the iteration column.
pub const ITERATION: &str = "0";

/// Read a query file in any of the accepted layouts:
///
/// * the document marker grammar, query text in the `.W` section;
/// * `<id>\t<text>` lines;
/// * plain lines, numbered from 1.
///
/// With `renumber`, marker-grammar queries get ids 1, 2, ... by position
/// instead of their `.I` value.
pub fn parse_queries(source_name: &str, text: &str, renumber: bool) -> Vec<Query> {
    let first = text.lines().find(|l| !l.trim().is_empty());
    if first.is_some_and(|l| l.starts_with(".I")) {
        let batch = parse_str(source_name, text);
        for err in &batch.errors {
            tracing::warn!(%err, "skipping malformed query record");
        }
        return batch
            .documents
            .into_iter()
            .enumerate()
            .map(|(i, doc)| {
                let id = if renumber { (i + 1).to_string() } else { doc.id.to_string() };
                let text = if doc.body.is_empty() { doc.title } else { doc.body };
                Query::new(id, text)
            })
            .collect();
    }

    let mut queries = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once('\t') {
            Some((id, q)) => queries.push(Query::new(id.trim(), q.trim())),
            None => queries.push(Query::new((i + 1).to_string(), line.trim())),
        }
    }
    queries
}

pub fn load_queries(path: &Path, renumber: bool) -> Result<Vec<Query>> {
    let text = fs::read_to_string(path).map_err(|e| IrError::io(path, e))?;
    Ok(parse_queries(&path.display().to_string(), &text, renumber))
}

pub fn format_line(result: &RankedResult, run_tag: &str) -> String {
    format!("{} {} {} {} {:.6} {}", result.query_id, ITERATION, result.doc_id, result.rank, result.score, run_tag)
}

pub fn write_run<W: Write>(mut out: W, results: &[RankedResult], run_tag: &str) -> std::io::Result<()> {
    for r in results {
        writeln!(out, "{}", format_line(r, run_tag))?;
    }
    Ok(())
}

/// Write a whole batch to `path`, creating parent directories.
pub fn save_run<'r, I>(path: &Path, ranked: I, run_tag: &str) -> Result<usize>
where
    I: IntoIterator<Item = &'r [RankedResult]>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IrError::io(parent, e))?;
    }
    let file = fs::File::create(path).map_err(|e| IrError::io(path, e))?;
    let mut out = std::io::BufWriter::new(file);
    let mut lines = 0;
    for results in ranked {
        write_run(&mut out, results, run_tag).map_err(|e| IrError::io(path, e))?;
        lines += results.len();
    }
    out.flush().map_err(|e| IrError::io(path, e))?;
    Ok(lines)
}

/// Read a run file back into ranked lists keyed by query id. Lines keep file order.
pub fn read_run<R: BufRead>(source_name: &str, reader: R) -> Result<BTreeMap<String, Vec<RankedResult>>> {
    let mut runs: BTreeMap<String, Vec<RankedResult>> = BTreeMap::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| IrError::io(source_name, e))?;
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.is_empty() {
            continue;
        }
        let parsed = match cols.as_slice() {
            [q, _, d, rank, score, ..] => d
                .parse::<DocId>()
                .ok()
                .zip(rank.parse::<usize>().ok())
                .zip(score.parse::<f64>().ok())
                .map(|((doc_id, rank), score)| RankedResult { query_id: q.to_string(), doc_id, rank, score }),
            _ => None,
        };
        match parsed {
            Some(r) => runs.entry(r.query_id.clone()).or_default().push(r),
            None => tracing::warn!(source = source_name, line = i + 1, "skipping malformed run line"),
        }
    }
    Ok(runs)
}
