use crate::analyzer::AnalyzerConfig;
use crate::error::{IrError, Result};
use crate::index::{default_schema, validate_schema, FieldOptions};
use crate::scoring::{ScoringModel, BM25_B, BM25_K1, DIRICHLET_MU, JELINEK_MERCER_LAMBDA};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a build or a search run needs, as one plain value.
///
/// Loaded from JSON; every key is optional. Command-line flags override it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub index_dir: Option<PathBuf>,
    pub corpus: Option<PathBuf>,
    /// Run file destination.
    pub output: Option<PathBuf>,
    /// Model name or integer selector, see [`ScoringModel`]'s `FromStr`.
    pub model: String,
    pub k1: f64,
    pub b: f64,
    pub mu: f64,
    pub lambda: f64,
    /// Indexed fields and their boosts. Unset means the default schema when
    /// building and the index's own boosts when searching.
    pub fields: Option<Vec<FieldOptions>>,
    pub analyzer: AnalyzerConfig,
    pub top_k: usize,
    pub run_tag: String,
    /// Number marker-grammar queries by position rather than by `.I` value.
    pub renumber_queries: bool,
    /// Read queries in the `field:term^boost` syntax instead of escaping them.
    /// Queries that fail to parse are skipped and left out of the mean.
    pub raw_queries: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            corpus: None,
            output: None,
            model: "bm25".into(),
            k1: BM25_K1,
            b: BM25_B,
            mu: DIRICHLET_MU,
            lambda: JELINEK_MERCER_LAMBDA,
            fields: None,
            analyzer: AnalyzerConfig::default(),
            top_k: 50,
            run_tag: "run".into(),
            renumber_queries: false,
            raw_queries: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| IrError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| IrError::config(format!("{}: {e}", path.display())))
    }

    /// Resolve the selector and parameters into a model.
    pub fn scoring_model(&self) -> Result<ScoringModel> {
        let model = match self.model.parse::<ScoringModel>()? {
            ScoringModel::Bm25 { .. } => ScoringModel::Bm25 { k1: self.k1, b: self.b },
            ScoringModel::LmDirichlet { .. } => ScoringModel::LmDirichlet { mu: self.mu },
            ScoringModel::LmJelinekMercer { .. } => ScoringModel::LmJelinekMercer { lambda: self.lambda },
            other => other,
        };
        model.validate()?;
        Ok(model)
    }

    /// Fields to build an index with.
    pub fn schema(&self) -> Vec<FieldOptions> {
        self.fields.clone().unwrap_or_else(default_schema)
    }

    pub fn validate_for_indexing(&self) -> Result<()> {
        require(&self.index_dir, "index_dir")?;
        require(&self.corpus, "corpus")?;
        validate_schema(&self.schema())
    }

    /// Returns the resolved model so it is picked once, before any work.
    pub fn validate_for_search(&self) -> Result<ScoringModel> {
        require(&self.index_dir, "index_dir")?;
        require(&self.output, "output")?;
        if let Some(fields) = &self.fields {
            validate_schema(fields)?;
        }
        if self.top_k == 0 {
            return Err(IrError::config("top_k must be at least 1"));
        }
        if self.run_tag.split_whitespace().count() != 1 {
            return Err(IrError::config(format!("run tag '{}' must be one word", self.run_tag)));
        }
        self.scoring_model()
    }
}

fn require<'a>(value: &'a Option<PathBuf>, name: &str) -> Result<&'a Path> {
    value.as_deref().ok_or_else(|| IrError::config(format!("missing required path '{name}'")))
}
