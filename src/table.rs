//! Loaded tables and their lifecycle.
//!
//! A [`Table`] owns normalized columns together with their indexes; the two
//! are built as a unit and never drift apart. Snapshots persist only the
//! canonical columns; indexes are derived data and are rebuilt on load.
//! [`TableStore`] publishes fully-built tables behind `Arc`, so a reload is
//! an atomic pointer swap and readers never observe a half-loaded table.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result, bail, ensure};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    index::{ColumnIndex, IndexConfig, build_index},
    normalize::NormalizedColumn,
};

/// Bump when the snapshot encoding changes shape.
const SNAPSHOT_VERSION: u32 = 1;

/// One column with its index, kept together for their whole lifetime.
#[derive(Debug, Clone)]
pub struct TableColumn {
    pub data: NormalizedColumn,
    pub index: ColumnIndex,
}

/// An immutable loaded table. Replaced wholesale on reload, never mutated.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<TableColumn>,
    row_count: usize,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<TableColumn>) -> Result<Self> {
        let name = name.into();
        let row_count = columns.first().map_or(0, |c| c.data.len());
        for column in &columns {
            ensure!(
                column.data.len() == row_count,
                "Column '{}' has {} row(s), expected {}",
                column.data.name,
                column.data.len(),
                row_count
            );
        }
        for (i, column) in columns.iter().enumerate() {
            ensure!(
                !columns[..i].iter().any(|c| c.data.name == column.data.name),
                "Duplicate column name '{}'",
                column.data.name
            );
        }
        Ok(Self {
            name,
            columns,
            row_count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.data.name == name)
    }

    /// Persists the canonical columns to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            name: self.name.clone(),
            row_count: self.row_count as u64,
            columns: self.columns.iter().map(|c| c.data.clone()).collect(),
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .context("Failed to encode table snapshot")?;
        fs::write(path, &bytes)
            .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
        debug!(
            "Saved snapshot '{}' ({} columns, {} rows, {} bytes)",
            path.display(),
            snapshot.columns.len(),
            snapshot.row_count,
            bytes.len()
        );
        Ok(())
    }

    /// Loads a snapshot and rebuilds every index under `config`.
    pub fn load(path: &Path, config: &IndexConfig) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        let (snapshot, _): (Snapshot, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .with_context(|| format!("Failed to decode snapshot: {}", path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "Snapshot version {} is not supported (expected {}): {}",
                snapshot.version,
                SNAPSHOT_VERSION,
                path.display()
            );
        }
        let columns = snapshot
            .columns
            .into_iter()
            .map(|data| {
                let index = build_index(&data, config);
                TableColumn { data, index }
            })
            .collect();
        let table = Table::new(snapshot.name, columns)?;
        info!(
            "Loaded snapshot '{}': table '{}', {} column(s), {} row(s)",
            path.display(),
            table.name,
            table.columns.len(),
            table.row_count
        );
        Ok(table)
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    name: String,
    row_count: u64,
    columns: Vec<NormalizedColumn>,
}

/// Named registry of published tables. Publishing replaces the entry under
/// its name in one swap; readers holding the previous `Arc` keep a coherent
/// view until they drop it.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, table: Table) -> Arc<Table> {
        let table = Arc::new(table);
        self.tables
            .write()
            .expect("table registry lock")
            .insert(table.name().to_string(), Arc::clone(&table));
        table
    }

    pub fn get(&self, name: &str) -> Option<Arc<Table>> {
        self.tables
            .read()
            .expect("table registry lock")
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .expect("table registry lock")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().expect("table registry lock").is_empty()
    }
}
