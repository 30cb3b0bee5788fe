use anyhow::Result;
use clap::{Parser, Subcommand};
use ircore::config::EngineConfig;
use ircore::index::FieldOptions;
use ircore::run::load_queries;
use searcher::{run_evaluate, run_search, SearchRequest};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "searcher")]
#[command(about = "Run query batches against an index and evaluate them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank every query in a file and write a run file
    Search {
        /// Index directory
        #[arg(long)]
        index: Option<PathBuf>,
        /// Query file (marker grammar, tab-separated or one query per line)
        #[arg(long)]
        queries: PathBuf,
        /// Run file to write
        #[arg(long)]
        output: Option<PathBuf>,
        /// JSON engine configuration; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Scoring model name or selector 0-4
        #[arg(long)]
        model: Option<String>,
        /// Results kept per query
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        run_tag: Option<String>,
        /// Relevance judgments; when given the run is evaluated
        #[arg(long)]
        qrels: Option<PathBuf>,
        /// Number marker-grammar queries by position
        #[arg(long, default_value_t = false)]
        renumber: bool,
        /// Read queries as `field:term^boost` syntax; malformed ones are skipped
        #[arg(long, default_value_t = false)]
        raw: bool,
        /// Field and boost, e.g. `title=3`; repeat for each searched field
        #[arg(long = "field")]
        fields: Vec<FieldOptions>,
        /// Log titles of the top N hits per query
        #[arg(long, default_value_t = 0)]
        show: usize,
        /// Print the summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Score an existing run file against judgments
    Evaluate {
        #[arg(long)]
        run: PathBuf,
        #[arg(long)]
        qrels: PathBuf,
        /// Query file of the run; queries with no lines then count with AP 0
        #[arg(long)]
        queries: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        renumber: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { index, queries, output, config, model, k, run_tag, qrels, renumber, raw, fields, show, json } => {
            let mut cfg = match config {
                Some(path) => EngineConfig::from_json_file(&path)?,
                None => EngineConfig::default(),
            };
            cfg.index_dir = index.or(cfg.index_dir);
            cfg.output = output.or(cfg.output);
            if let Some(model) = model {
                cfg.model = model;
            }
            if let Some(k) = k {
                cfg.top_k = k;
            }
            if let Some(tag) = run_tag {
                cfg.run_tag = tag;
            }
            cfg.renumber_queries |= renumber;
            cfg.raw_queries |= raw;

            let summary = run_search(&SearchRequest { config: cfg, queries, qrels, fields, show })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("model:   {}", summary.model);
                println!("queries: {} ({} failed)", summary.queries, summary.failures);
                println!("lines:   {}", summary.lines_written);
                if let Some(eval) = &summary.evaluation {
                    println!("MAP:     {:.4}", eval.mean_average_precision);
                }
            }
            Ok(())
        }
        Commands::Evaluate { run, qrels, queries, renumber } => {
            let queries = queries.map(|path| load_queries(&path, renumber)).transpose()?;
            let eval = run_evaluate(&run, &qrels, queries.as_deref())?;
            for (query_id, ap) in &eval.per_query {
                println!("{query_id}\t{ap:.4}");
            }
            println!("MAP\t{:.4}", eval.mean_average_precision);
            Ok(())
        }
    }
}
