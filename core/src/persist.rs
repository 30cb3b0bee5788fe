use crate::error::{IrError, Result};
use crate::index::Index;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub fields: Vec<String>,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn describe(index: &Index, created_at: impl Into<String>) -> Self {
        Self {
            num_docs: index.document_count(),
            fields: index.schema().iter().map(|f| f.field.to_string()).collect(),
            created_at: created_at.into(),
            version: FORMAT_VERSION,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn staging(&self) -> PathBuf { self.root.join("index.bin.tmp") }
}

/// Write the index next to its final name, then rename it into place.
pub fn save_index(paths: &IndexPaths, index: &Index) -> Result<()> {
    create_dir_all(&paths.root).map_err(|e| IrError::io(&paths.root, e))?;
    let staging = paths.staging();
    let f = File::create(&staging).map_err(|e| IrError::io(&staging, e))?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, index).map_err(|source| IrError::Codec { path: staging.clone(), source })?;
    w.flush().map_err(|e| IrError::io(&staging, e))?;
    drop(w);
    let target = paths.index();
    fs::rename(&staging, &target).map_err(|e| IrError::io(&target, e))?;
    Ok(())
}

/// Load and re-check an index. A file that fails the postings checks is
/// reported as corrupt rather than returned.
pub fn load_index(paths: &IndexPaths) -> Result<Index> {
    let path = paths.index();
    let f = File::open(&path).map_err(|e| IrError::io(&path, e))?;
    let index: Index =
        bincode::deserialize_from(BufReader::new(f)).map_err(|source| IrError::Codec { path: path.clone(), source })?;
    index.validate()?;
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root).map_err(|e| IrError::io(&paths.root, e))?;
    let path = paths.meta();
    let json = serde_json::to_string_pretty(meta).map_err(|source| IrError::Metadata { path: path.clone(), source })?;
    fs::write(&path, json).map_err(|e| IrError::io(&path, e))?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let text = fs::read_to_string(&path).map_err(|e| IrError::io(&path, e))?;
    let meta: MetaFile = serde_json::from_str(&text).map_err(|source| IrError::Metadata { path: path.clone(), source })?;
    if meta.version != FORMAT_VERSION {
        return Err(IrError::CorruptIndex(format!("unsupported index version {} in {}", meta.version, path.display())));
    }
    Ok(meta)
}
