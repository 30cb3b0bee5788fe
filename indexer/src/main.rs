use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ircore::build::{build_index, FileSource};
use ircore::config::EngineConfig;
use ircore::index::FieldOptions;
use ircore::persist::{load_meta, save_index, save_meta, IndexPaths, MetaFile};
use ircore::Analyzer;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a fielded inverted index over a bibliographic corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every file under the corpus path and write the index
    Build {
        /// Corpus path (file or directory)
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Output index directory
        #[arg(long)]
        output: Option<PathBuf>,
        /// JSON engine configuration; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Field and boost, e.g. `title=3`; repeat to replace the configured schema
        #[arg(long = "field")]
        fields: Vec<FieldOptions>,
        /// Keep English stopwords
        #[arg(long, default_value_t = false)]
        keep_stopwords: bool,
        /// Index surface forms instead of stems
        #[arg(long, default_value_t = false)]
        no_stem: bool,
    },
    /// Print the metadata of an existing index
    Info {
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { corpus, output, config, fields, keep_stopwords, no_stem } => {
            let mut cfg = match config {
                Some(path) => EngineConfig::from_json_file(&path)?,
                None => EngineConfig::default(),
            };
            cfg.corpus = corpus.or(cfg.corpus);
            cfg.index_dir = output.or(cfg.index_dir);
            if !fields.is_empty() {
                cfg.fields = Some(fields);
            }
            cfg.analyzer.remove_stopwords &= !keep_stopwords;
            cfg.analyzer.stem &= !no_stem;
            run_build(&cfg)
        }
        Commands::Info { index } => {
            let meta = load_meta(&IndexPaths::new(&index))?;
            println!("documents: {}", meta.num_docs);
            println!("fields:    {}", meta.fields.join(", "));
            println!("created:   {}", meta.created_at);
            println!("version:   {}", meta.version);
            Ok(())
        }
    }
}

fn run_build(cfg: &EngineConfig) -> Result<()> {
    cfg.validate_for_indexing()?;
    let (Some(corpus), Some(output)) = (cfg.corpus.as_deref(), cfg.index_dir.as_deref()) else {
        bail!("corpus and output are required");
    };

    let files = corpus_files(corpus)?;
    tracing::info!(corpus = %corpus.display(), files = files.len(), "collected corpus files");
    let sources: Vec<FileSource> = files.into_iter().map(FileSource::new).collect();

    let (index, report) = build_index(&sources, cfg.schema(), Analyzer::new(cfg.analyzer))?;
    for err in &report.parse_errors {
        tracing::warn!(%err, "record skipped");
    }
    for options in index.schema() {
        if let Some(stats) = index.field_stats(options.field) {
            tracing::info!(
                field = %options.field,
                terms = index.field(options.field).map_or(0, |f| f.num_terms()),
                avg_len = stats.average_field_length,
                "field statistics"
            );
        }
    }

    let paths = IndexPaths::new(output);
    save_index(&paths, &index).with_context(|| format!("writing index to {}", output.display()))?;
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    save_meta(&paths, &MetaFile::describe(&index, created_at))?;

    tracing::info!(output = %output.display(), documents = report.documents, "index written");
    Ok(())
}

/// Every regular file under `root`, sorted by path. A plain file is its own corpus.
fn corpus_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        bail!("corpus path {} does not exist", root.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn corpus_files_are_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/two.txt"), ".I 2\n").unwrap();
        fs::write(dir.path().join("a.txt"), ".I 1\n").unwrap();
        let files = corpus_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.txt"), dir.path().join("b/two.txt")]);
    }

    #[test]
    fn single_file_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cran.all.1400");
        fs::write(&file, ".I 1\n").unwrap();
        assert_eq!(corpus_files(&file).unwrap(), vec![file]);
        assert!(corpus_files(&dir.path().join("missing")).is_err());
    }
}
