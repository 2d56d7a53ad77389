use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, VaeError};

/// Per-epoch averages, each divided by the number of training images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub seconds: f64,
    pub kl_divergence: f64,
    pub marginal_likelihood: f64,
    pub variational_lower_bound: f64,
}

impl EpochMetrics {
    pub fn is_finite(&self) -> bool {
        self.kl_divergence.is_finite()
            && self.marginal_likelihood.is_finite()
            && self.variational_lower_bound.is_finite()
    }
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {}[{:.2} s]: KL Divergence={:.2} Marginal Likelihood={:.2} Variational Lower Bound={:.2}",
            self.epoch,
            self.seconds,
            self.kl_divergence,
            self.marginal_likelihood,
            self.variational_lower_bound
        )
    }
}

/// Appends one JSON object per line to `metrics.jsonl`.
pub struct MetricsLog {
    path: PathBuf,
    json: BufWriter<File>,
}

impl MetricsLog {
    pub const FILE_NAME: &'static str = "metrics.jsonl";

    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| VaeError::io(dir, e))?;
        let path = dir.join(Self::FILE_NAME);
        let json = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| VaeError::io(&path, e))?;
        Ok(Self {
            path,
            json: BufWriter::new(json),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log<T: Serialize>(&mut self, metrics: &T) -> Result<()> {
        let line = serde_json::to_string(metrics)
            .map_err(|e| VaeError::Metrics(e.to_string()))?;
        writeln!(self.json, "{}", line).map_err(|e| VaeError::io(&self.path, e))?;
        self.json.flush().map_err(|e| VaeError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_line_matches_console_format() {
        let metrics = EpochMetrics {
            epoch: 3,
            seconds: 1.234,
            kl_divergence: 10.0,
            marginal_likelihood: -70.25,
            variational_lower_bound: -80.25,
        };
        assert_eq!(
            metrics.to_string(),
            "Epoch 3[1.23 s]: KL Divergence=10.00 Marginal Likelihood=-70.25 Variational Lower Bound=-80.25"
        );
    }

    #[test]
    fn log_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = MetricsLog::create(dir.path()).unwrap();
        for epoch in 0..2 {
            let metrics = EpochMetrics {
                epoch,
                seconds: 0.5,
                kl_divergence: 1.0,
                marginal_likelihood: -2.0,
                variational_lower_bound: -3.0,
            };
            log.log(&metrics).unwrap();
        }
        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(value["epoch"], 1);
        assert_eq!(value["variational_lower_bound"], -3.0);
    }

    #[test]
    fn unserializable_record_is_a_metrics_error() {
        use std::collections::BTreeMap;

        let dir = tempfile::tempdir().unwrap();
        let mut log = MetricsLog::create(dir.path()).unwrap();
        // JSONのキーは文字列でなければならない
        let record: BTreeMap<(u8, u8), f64> = [((0, 1), 0.5)].into_iter().collect();
        let err = log.log(&record).unwrap_err();
        assert!(matches!(err, VaeError::Metrics(_)), "{}", err);
        assert!(std::fs::read_to_string(log.path()).unwrap().is_empty());
    }
}
