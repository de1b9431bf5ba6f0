/// Severity classifier.
///
/// `SeverityModel` is the narrow seam the pipeline predicts through. The
/// shipped model is a logistic decision function exported as JSON:
///
/// ```json
/// {"feature_names": ["..."], "coefficients": [0.1], "intercept": -0.4, "threshold": 0.5}
/// ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::model::{PipelineError, Severity};
use crate::transform::EncodedBatch;

pub trait SeverityModel: Send + Sync {
    /// One label per encoded row, in row order.
    fn predict(&self, batch: &EncodedBatch) -> Result<Vec<Severity>, PipelineError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSeverityModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LinearSeverityModel {
    pub fn new(
        feature_names: Vec<String>,
        coefficients: Vec<f64>,
        intercept: f64,
        threshold: f64,
    ) -> Result<Self, PipelineError> {
        let model = Self {
            feature_names,
            coefficients,
            intercept,
            threshold,
        };
        model.check_shape()?;
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let model: Self = serde_json::from_str(json)?;
        model.check_shape()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let model = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!(
            "Loaded severity model from {} ({} features)",
            path.display(),
            model.feature_names.len()
        );
        Ok(model)
    }

    fn check_shape(&self) -> Result<(), PipelineError> {
        if self.feature_names.len() != self.coefficients.len() {
            return Err(PipelineError::Schema(format!(
                "model has {} feature names but {} coefficients",
                self.feature_names.len(),
                self.coefficients.len()
            )));
        }
        Ok(())
    }

    /// Probability of a severe outcome for one encoded row.
    pub fn probability(&self, row: &[f64]) -> f64 {
        let z: f64 = self
            .coefficients
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        sigmoid(z)
    }
}

impl SeverityModel for LinearSeverityModel {
    fn predict(&self, batch: &EncodedBatch) -> Result<Vec<Severity>, PipelineError> {
        if batch.feature_names != self.feature_names {
            let first_difference = batch
                .feature_names
                .iter()
                .zip(&self.feature_names)
                .position(|(a, b)| a != b);
            return Err(PipelineError::Schema(match first_difference {
                Some(i) => format!(
                    "feature {} is {} but the model expects {}",
                    i, batch.feature_names[i], self.feature_names[i]
                ),
                None => format!(
                    "batch has {} features but the model expects {}",
                    batch.feature_names.len(),
                    self.feature_names.len()
                ),
            }));
        }

        Ok(batch
            .rows
            .iter()
            .map(|row| {
                if self.probability(row) >= self.threshold {
                    Severity::Severe
                } else {
                    Severity::Minor
                }
            })
            .collect())
    }
}
