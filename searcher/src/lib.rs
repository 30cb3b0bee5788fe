//! Batch retrieval over a persisted index: run a query file, write the
//! ranked lists as a run file, and score them against relevance judgments.

use anyhow::{Context, Result};
use ircore::config::EngineConfig;
use ircore::eval::{evaluate, Evaluation, Judgments};
use ircore::index::{FieldOptions, Index};
use ircore::persist::{load_index, load_meta, IndexPaths};
use ircore::query::BatchOutcome;
use ircore::run::{load_queries, read_run, save_run};
use ircore::{Field, Query, QueryEngine, RankedResult};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub struct SearchRequest {
    pub config: EngineConfig,
    pub queries: PathBuf,
    pub qrels: Option<PathBuf>,
    /// Field boosts for this run. Empty falls back to the configured fields,
    /// then to the boosts the index was built with.
    pub fields: Vec<FieldOptions>,
    /// Log the stored title of the first `show` hits of each query.
    pub show: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub model: String,
    pub queries: usize,
    pub failures: usize,
    pub lines_written: usize,
    pub evaluation: Option<Evaluation>,
}

pub fn run_search(req: &SearchRequest) -> Result<SearchSummary> {
    let cfg = &req.config;
    let model = cfg.validate_for_search()?;
    let (Some(index_dir), Some(output)) = (cfg.index_dir.as_deref(), cfg.output.as_deref()) else {
        anyhow::bail!("index_dir and output are required");
    };

    let paths = IndexPaths::new(index_dir);
    let index = load_index(&paths).with_context(|| format!("loading index from {}", index_dir.display()))?;
    match load_meta(&paths) {
        Ok(meta) => tracing::info!(documents = meta.num_docs, created_at = %meta.created_at, "index loaded"),
        Err(err) => tracing::warn!(%err, documents = index.document_count(), "index loaded without metadata"),
    }

    let queries = load_queries(&req.queries, cfg.renumber_queries)?;
    if queries.is_empty() {
        tracing::warn!(path = %req.queries.display(), "query file holds no queries");
    }

    let engine = match search_fields(req) {
        Some(fields) => QueryEngine::with_fields(&index, model, fields)?,
        None => QueryEngine::new(&index, model)?,
    };
    let outcome = if cfg.raw_queries {
        engine.search_batch_raw(&queries, cfg.top_k)
    } else {
        engine.search_batch(&queries, cfg.top_k)
    };
    tracing::info!(model = %model, queries = queries.len(), failed = outcome.failures.len(), "batch searched");

    let lines_written = save_run(output, outcome.results.iter().map(|(_, r)| r.as_slice()), &cfg.run_tag)?;
    tracing::info!(output = %output.display(), lines = lines_written, "run written");

    if req.show > 0 {
        show_hits(&index, &outcome, req.show);
    }

    let evaluation = match &req.qrels {
        Some(path) => {
            let judgments = Judgments::load(path)?;
            let eval = evaluate(
                outcome.results.iter().map(|(id, r)| (id.as_str(), r.as_slice())),
                &judgments,
                outcome.failures.len(),
            );
            log_evaluation(&eval);
            Some(eval)
        }
        None => None,
    };

    Ok(SearchSummary {
        model: model.to_string(),
        queries: queries.len(),
        failures: outcome.failures.len(),
        lines_written,
        evaluation,
    })
}

/// Score a stored run file without touching the index.
///
/// A query that retrieved nothing leaves no lines in the run. Pass the query
/// set to count such queries with AP 0, as the live search does; without it
/// only the queries present in the run are evaluated.
pub fn run_evaluate(run: &Path, qrels: &Path, queries: Option<&[Query]>) -> Result<Evaluation> {
    let f = File::open(run).with_context(|| format!("opening run {}", run.display()))?;
    let mut runs = read_run(&run.display().to_string(), BufReader::new(f))?;
    let judgments = Judgments::load(qrels)?;

    let mut ranked: Vec<(String, Vec<RankedResult>)> = Vec::new();
    if let Some(queries) = queries {
        for q in queries {
            let results = runs.remove(&q.id).unwrap_or_default();
            ranked.push((q.id.clone(), results));
        }
        if !runs.is_empty() {
            tracing::warn!(extra = runs.len(), "run holds queries missing from the query set");
        }
    }
    ranked.extend(runs);

    let eval = evaluate(ranked.iter().map(|(id, r)| (id.as_str(), r.as_slice())), &judgments, 0);
    log_evaluation(&eval);
    Ok(eval)
}

pub fn log_evaluation(eval: &Evaluation) {
    tracing::info!(
        evaluated = eval.per_query.len(),
        skipped = eval.skipped,
        map = eval.mean_average_precision,
        "evaluation complete"
    );
}

/// Flags win over the config file, which wins over the index schema (`None`).
fn search_fields(req: &SearchRequest) -> Option<Vec<FieldOptions>> {
    let fields = if req.fields.is_empty() { req.config.fields.clone()? } else { req.fields.clone() };
    Some(fields.into_iter().filter(|f| f.boost > 0.0).collect())
}

fn show_hits(index: &Index, outcome: &BatchOutcome, show: usize) {
    for (query_id, results) in &outcome.results {
        for r in results.iter().take(show) {
            let title = index.stored(r.doc_id, Field::Title).unwrap_or_default();
            tracing::info!(query_id = %query_id, rank = r.rank, doc_id = r.doc_id, score = r.score, title);
        }
    }
}
