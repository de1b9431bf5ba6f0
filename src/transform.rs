/// Feature transformer: frozen scaling and one-hot encoding.
///
/// The artifact is a JSON dump of a fitted preprocessing step:
///
/// ```json
/// {
///   "numeric":     [{"name": "temperature_2m_period_0", "mean": 11.2, "scale": 7.9, "fill_value": 11.0}],
///   "categorical": [{"name": "RoadType", "categories": ["rt432", "rt433", "rt439"]}]
/// }
/// ```
///
/// Output columns are every numeric column in artifact order, followed by
/// `{name}_{category}` for each categorical column and category. Rows must
/// carry exactly the artifact's columns; anything missing or extra is a
/// schema error.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::model::{FeatureRow, PipelineError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub mean: f64,
    pub scale: f64,
    /// Imputation value for missing entries; 0.0 when absent.
    #[serde(default)]
    pub fill_value: Option<f64>,
}

impl NumericColumn {
    fn encode(&self, value: Option<f64>) -> f64 {
        let value = value.unwrap_or(self.fill_value.unwrap_or(0.0));
        let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
        (value - self.mean) / scale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub categories: Vec<String>,
}

/// Numeric rows with the names of their columns.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl Preprocessor {
    pub fn new(numeric: Vec<NumericColumn>, categorical: Vec<CategoricalColumn>) -> Result<Self, PipelineError> {
        let preprocessor = Self { numeric, categorical };
        preprocessor.check_unique_names()?;
        Ok(preprocessor)
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let preprocessor: Self = serde_json::from_str(json)?;
        preprocessor.check_unique_names()?;
        Ok(preprocessor)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let preprocessor = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!(
            "Loaded preprocessor from {} ({} numeric, {} categorical columns)",
            path.display(),
            preprocessor.numeric.len(),
            preprocessor.categorical.len()
        );
        Ok(preprocessor)
    }

    fn check_unique_names(&self) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for name in self.input_columns() {
            if !seen.insert(name) {
                return Err(PipelineError::Schema(format!(
                    "column {} appears twice in the preprocessor",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Input column names, numeric first.
    pub fn input_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.categorical.iter().map(|c| c.name.as_str()))
    }

    /// Output column names in encoding order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for column in &self.categorical {
            for category in &column.categories {
                names.push(format!("{}_{}", column.name, category));
            }
        }
        names
    }

    /// Rejects a row whose columns differ from the artifact's in name or kind.
    fn check_row(&self, index: usize, row: &FeatureRow) -> Result<(), PipelineError> {
        for column in &self.numeric {
            if row.numeric(&column.name).is_none() {
                return Err(PipelineError::Schema(format!(
                    "row {} is missing numeric column {}",
                    index, column.name
                )));
            }
        }
        for column in &self.categorical {
            if row.categorical(&column.name).is_none() {
                return Err(PipelineError::Schema(format!(
                    "row {} is missing categorical column {}",
                    index, column.name
                )));
            }
        }

        let expected = self.numeric.len() + self.categorical.len();
        if row.column_count() != expected {
            let known: HashSet<&str> = self.input_columns().collect();
            let extra: Vec<&str> = row.column_names().filter(|c| !known.contains(c)).collect();
            return Err(PipelineError::Schema(format!(
                "row {} has unexpected columns: {}",
                index,
                extra.join(", ")
            )));
        }

        Ok(())
    }

    pub fn transform(&self, rows: &[FeatureRow]) -> Result<EncodedBatch, PipelineError> {
        let feature_names = self.feature_names();
        let mut encoded = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            self.check_row(i, row)?;

            let mut values = Vec::with_capacity(feature_names.len());
            for column in &self.numeric {
                values.push(column.encode(row.numeric(&column.name).flatten()));
            }
            for column in &self.categorical {
                let value = row.categorical(&column.name);
                if let Some(v) = value
                    && !column.categories.iter().any(|c| c == v)
                {
                    log::debug!("Unknown category {:?} for {}", v, column.name);
                }
                for category in &column.categories {
                    values.push(if value == Some(category.as_str()) { 1.0 } else { 0.0 });
                }
            }

            encoded.push(values);
        }

        Ok(EncodedBatch {
            feature_names,
            rows: encoded,
        })
    }
}
