// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training scalars to a CSV file so learning curves can
// be plotted after (or during) a run. Plays the role a
// TensorBoard summary writer plays in Python training scripts:
// one row per (step, tag, value).
//
// Output file: <tensorboard_filename>/scalars.csv
//
//   step,tag,value
//   25,loss,2.104511
//   25,lr,0.000005
//   438,eval_loss,0.201733
//   438,f1,0.874210
//
// Rows are appended, so several runs into the same directory
// stay in one file.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const SCALARS_FILE: &str = "scalars.csv";

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the directory and write the CSV header if the file is new
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join(SCALARS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "step,tag,value")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log_scalars(&self, step: usize, scalars: &[(&str, f64)]) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        for (tag, value) in scalars {
            writeln!(f, "{},{},{:.6}", step, tag, value)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
