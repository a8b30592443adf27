use serde::Serialize;
use std::collections::BTreeMap;

/// Per-column statistics returned to the caller, unrounded.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStatistics {
    pub mean: f64,
    pub median: f64,
    pub mode: Vec<f64>,
    pub std_dev: f64,
}

/// Per-column facts handed to the summary generator. Central moments are
/// rounded to two decimals; min/max stay raw.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnFacts {
    pub dtype: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub mode: Vec<f64>,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub has_pie: bool,
}

/// Response envelope for a dataset analysis.
#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    pub summary_report: String,
    pub statistical_metrics: BTreeMap<String, ColumnStatistics>,
    pub visualizations: BTreeMap<String, String>,
}
