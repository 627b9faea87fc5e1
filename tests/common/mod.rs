#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Header every canonical export carries, in schema order.
pub const CANONICAL_HEADER: &str = "CustomerName,CustomerId,PartnerId,InvoiceNumber,\
                                    SubscriptionId,ProductId,ProductName,Category,ChargeType,\
                                    ChargeStartDate,ChargeEndDate,Quantity,UnitPrice,\
                                    DiscountPercent,Subtotal,TaxTotal,Total";

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

    /// Writes newline-joined `lines` (plus a trailing newline) as a CSV feed.
    pub fn write_feed(&self, name: &str, lines: &[&str]) -> PathBuf {
        let mut contents = lines.join("\n");
        contents.push('\n');
        self.write(name, &contents)
    }
}
