#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// A small ledger exercising every semantic type, used across the
/// integration tests.
pub const LEDGER_CSV: &str = "\
invoice,booked,amount,status,note
INV-00123,13/01/2024,\"$1,234.56\",open,first
INV-00124,02/05/2024,(45.00),closed,second
INV-00125,28/02/2024,1.2K,open,third
INV-00126,07/03/2024,99.95,open,fourth
INV-00127,15/04/2024,,closed,fifth
";
