//! On-disk migration definitions: one TOML file per record.
//!
//! Files are named `<YYYYMMDDHHMMSS>_<slug>.toml` and loaded in file-name
//! order, which is the declaration order the resolver uses for ties.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::record::MigrationRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("migrations directory {} not found; run `sqlmig init` first", .0.display())]
    MissingDir(PathBuf),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize migration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{} already exists", .0.display())]
    Exists(PathBuf),
}

#[derive(Debug, Clone)]
pub struct MigrationStore {
    dir: PathBuf,
}

impl MigrationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory. Returns `true` if it did not exist before.
    pub fn init(&self) -> Result<bool, StoreError> {
        if self.dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        Ok(true)
    }

    /// Load every record, ordered by file name.
    pub fn load(&self) -> Result<Vec<MigrationRecord>, StoreError> {
        Ok(self.load_with_paths()?.into_iter().map(|(_, r)| r).collect())
    }

    pub fn load_with_paths(&self) -> Result<Vec<(PathBuf, MigrationRecord)>, StoreError> {
        if !self.dir.is_dir() {
            return Err(StoreError::MissingDir(self.dir.clone()));
        }

        let io_err = |source| StoreError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let record = read_record(&path)?;
                Ok((path, record))
            })
            .collect()
    }

    /// Write a new record file. Never overwrites an existing file.
    pub fn write(&self, record: &MigrationRecord) -> Result<PathBuf, StoreError> {
        let created = record.created_at.unwrap_or_else(Utc::now);
        let filename = format!("{}_{}.toml", created.format("%Y%m%d%H%M%S"), slug(&record.name));
        let path = self.dir.join(filename);

        let content = format!(
            "# Migration: {}\n\
             # Fill in `sql` (and `rollback`), then run `sqlmig migrate`.\n\n{}",
            record.name,
            toml::to_string_pretty(record)?
        );

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                io::ErrorKind::AlreadyExists => StoreError::Exists(path.clone()),
                _ => StoreError::Io {
                    path: path.clone(),
                    source,
                },
            })?;
        file.write_all(content.as_bytes())
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }
}

fn read_record(path: &Path) -> Result<MigrationRecord, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Lowercase, `[a-z0-9_]` only, runs of other characters collapsed to `_`.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() { "migration".to_string() } else { out }
}
