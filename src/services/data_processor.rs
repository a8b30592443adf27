use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::error::AppError;
use crate::models::{ColumnFacts, ColumnStatistics};
use crate::services::charts;

/// Columns with at most this many distinct values get a pie chart.
const LOW_CARDINALITY_LIMIT: usize = 10;

/// Cap on the number of points fed to the histogram/line renderers.
const PLOT_SAMPLE_CAP: usize = 1000;

/// Fixed seed so repeated runs over identical input pick identical samples.
const SAMPLE_SEED: u64 = 42;

/// A numeric column after classification: missing values already dropped.
#[derive(Debug)]
pub struct NumericColumn {
    pub name: String,
    pub dtype: String,
    pub values: Vec<f64>,
}

/// The three parallel per-column maps produced by one analysis pass.
#[derive(Debug)]
pub struct ProcessedData {
    pub facts_for_ai: BTreeMap<String, ColumnFacts>,
    pub visualizations: BTreeMap<String, String>,
    pub full_stats: BTreeMap<String, ColumnStatistics>,
}

/// Parse the uploaded bytes, compute statistics and charts for every numeric
/// column, and return the stats/visualization maps. `selected_columns`
/// restricts the table before analysis; an unknown name is a client error.
pub fn process_dataset(
    bytes: &[u8],
    filename: &str,
    selected_columns: Option<&[String]>,
) -> Result<ProcessedData, AppError> {
    let mut df = parse_table(bytes, filename)?;

    if let Some(cols) = selected_columns {
        let names: Vec<&str> = cols.iter().map(|s| s.as_str()).collect();
        df = df
            .select(names)
            .map_err(|e| AppError::InvalidInput(format!("Invalid column selection: {}", e)))?;
    }

    let mut facts_for_ai = BTreeMap::new();
    let mut visualizations = BTreeMap::new();
    let mut full_stats = BTreeMap::new();

    for column in classify_columns(&df)? {
        let values = &column.values;
        let count = values.len();

        let mean = mean(values);
        let median = median(values);
        let std_dev = sample_std_dev(values);
        let modes = top_modes(values);
        let (min, max) = bounds(values);

        let counts = value_counts(values);
        let has_pie = counts.len() <= LOW_CARDINALITY_LIMIT;

        let view = sampling_view(values);
        visualizations.insert(
            format!("{}_hist", column.name),
            charts::histogram(&column.name, &view)?,
        );
        visualizations.insert(
            format!("{}_line", column.name),
            charts::line_plot(&column.name, &view)?,
        );
        if has_pie {
            // The pie reflects the full non-missing sequence, not the sample.
            visualizations.insert(
                format!("{}_pie", column.name),
                charts::pie_chart(&column.name, &counts)?,
            );
        }

        full_stats.insert(
            column.name.clone(),
            ColumnStatistics {
                mean,
                median,
                mode: modes.clone(),
                std_dev,
            },
        );
        facts_for_ai.insert(
            column.name.clone(),
            ColumnFacts {
                dtype: column.dtype,
                count,
                mean: round2(mean),
                median: round2(median),
                mode: modes,
                std_dev: round2(std_dev),
                min,
                max,
                has_pie,
            },
        );
    }

    Ok(ProcessedData {
        facts_for_ai,
        visualizations,
        full_stats,
    })
}

/// Extension-based parser dispatch. Anything other than CSV or Excel is a
/// validation failure.
fn parse_table(bytes: &[u8], filename: &str) -> Result<DataFrame, AppError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") {
        CsvReader::new(Cursor::new(bytes))
            .has_header(true)
            .finish()
            .map_err(|e| AppError::ParseError(format!("Error reading file: {}", e)))
    } else if lower.ends_with(".xls") || lower.ends_with(".xlsx") {
        read_excel(bytes)
    } else {
        Err(AppError::InvalidInput(
            "Unsupported file type. Use CSV or Excel.".to_string(),
        ))
    }
}

fn read_excel(bytes: &[u8]) -> Result<DataFrame, AppError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| AppError::ParseError(format!("Error reading file: {}", e)))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names.first().ok_or_else(|| {
        AppError::ParseError("Error reading file: workbook has no sheets".to_string())
    })?;

    let range = workbook
        .worksheet_range(first)
        .map_err(|e| AppError::ParseError(format!("Error reading file: {}", e)))?;

    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
    excel_to_dataframe(&rows)
}

/// Build a DataFrame from the first worksheet. The first row is the header; a
/// column becomes numeric only when every non-empty cell is an int or float.
fn excel_to_dataframe(rows: &[Vec<Data>]) -> Result<DataFrame, AppError> {
    let Some(header_row) = rows.first() else {
        return Ok(DataFrame::default());
    };

    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let name = cell.to_string();
            if name.trim().is_empty() {
                format!("column_{}", idx)
            } else {
                name
            }
        })
        .collect();

    let mut columns = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let cells: Vec<&Data> = rows[1..]
            .iter()
            .map(|row| row.get(idx).unwrap_or(&Data::Empty))
            .collect();

        let numeric = cells
            .iter()
            .all(|c| matches!(c, Data::Int(_) | Data::Float(_) | Data::Empty))
            && cells.iter().any(|c| !matches!(c, Data::Empty));

        let series = if numeric {
            let nums: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    Data::Int(i) => Some(*i as f64),
                    Data::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            Series::new(header, nums)
        } else {
            let strings: Vec<Option<String>> = cells
                .iter()
                .map(|c| match c {
                    Data::Empty => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Series::new(header, strings)
        };
        columns.push(series);
    }

    DataFrame::new(columns)
        .map_err(|e| AppError::ParseError(format!("Error reading file: {}", e)))
}

/// Explicit classification step: pick the numeric columns, drop their missing
/// values, and skip any column with nothing left. Non-numeric columns are
/// silently ignored.
pub fn classify_columns(df: &DataFrame) -> Result<Vec<NumericColumn>, AppError> {
    let mut columns = Vec::new();

    for series in df.get_columns() {
        if !series.dtype().is_numeric() {
            continue;
        }
        let dtype = series.dtype().to_string();
        let non_null = series.drop_nulls();

        // Float columns can still carry NaN after null dropping; non-finite
        // values count as missing too.
        let values: Vec<f64> = non_null
            .cast(&DataType::Float64)
            .map_err(|e| {
                AppError::Internal(format!("Failed to cast column '{}': {}", series.name(), e))
            })?
            .f64()
            .map_err(|e| {
                AppError::Internal(format!("Failed to read column '{}': {}", series.name(), e))
            })?
            .into_no_null_iter()
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            continue;
        }

        columns.push(NumericColumn {
            name: series.name().to_string(),
            dtype,
            values,
        });
    }

    Ok(columns)
}

/// The sequence actually plotted: everything in original order when small
/// enough, otherwise a seeded random sample of exactly `PLOT_SAMPLE_CAP`.
pub fn sampling_view(values: &[f64]) -> Vec<f64> {
    if values.len() <= PLOT_SAMPLE_CAP {
        return values.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    rand::seq::index::sample(&mut rng, values.len(), PLOT_SAMPLE_CAP)
        .into_iter()
        .map(|i| values[i])
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Unbiased sample standard deviation (denominator n-1); 0.0 for a single
/// value so it survives JSON serialization.
fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

fn bounds(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

/// Distinct values with their frequencies, ascending by value.
fn run_lengths(values: &[f64]) -> Vec<(f64, usize)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut runs: Vec<(f64, usize)> = Vec::new();
    for v in sorted {
        match runs.last_mut() {
            Some((run_value, count)) if *run_value == v => *count += 1,
            _ => runs.push((v, 1)),
        }
    }
    runs
}

/// Up to two most frequent values. Ties beyond two resolve to the smallest
/// values, which keeps the result deterministic.
fn top_modes(values: &[f64]) -> Vec<f64> {
    let runs = run_lengths(values);
    let best = runs.iter().map(|&(_, c)| c).max().unwrap_or(0);
    runs.iter()
        .filter(|&&(_, c)| c == best)
        .map(|&(v, _)| v)
        .take(2)
        .collect()
}

/// Frequencies for the pie chart, largest slice first.
fn value_counts(values: &[f64]) -> Vec<(f64, usize)> {
    let mut runs = run_lengths(values);
    runs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.total_cmp(&b.0)));
    runs
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGE_CSV: &[u8] = b"age,name\n20,a\n20,b\n25,c\n30,d\n,e\n40,f\n";

    #[test]
    fn csv_column_statistics_end_to_end() {
        let processed = process_dataset(AGE_CSV, "people.csv", None).unwrap();

        let facts = processed.facts_for_ai.get("age").unwrap();
        assert_eq!(facts.count, 5);
        assert_eq!(facts.mean, 27.0);
        assert_eq!(facts.median, 25.0);
        assert_eq!(facts.mode, vec![20.0]);
        assert_eq!(facts.min, 20.0);
        assert_eq!(facts.max, 40.0);
        assert!(facts.has_pie);
        // Sample std dev of [20, 20, 25, 30, 40] is sqrt(70).
        assert_eq!(facts.std_dev, 8.37);

        let stats = processed.full_stats.get("age").unwrap();
        assert!((stats.std_dev - 70.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(round2(stats.mean), facts.mean);
        assert_eq!(round2(stats.median), facts.median);
        assert_eq!(round2(stats.std_dev), facts.std_dev);

        let keys: Vec<&str> = processed.visualizations.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["age_hist", "age_line", "age_pie"]);
    }

    #[test]
    fn non_numeric_table_yields_empty_maps() {
        let csv = b"name,city\nalice,lisbon\nbob,porto\n";
        let processed = process_dataset(csv, "people.csv", None).unwrap();

        assert!(processed.facts_for_ai.is_empty());
        assert!(processed.visualizations.is_empty());
        assert!(processed.full_stats.is_empty());
    }

    #[test]
    fn all_missing_numeric_column_is_skipped() {
        let df = DataFrame::new(vec![
            Series::new("empty", vec![None::<f64>, None, None]),
            Series::new("age", vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap();

        let columns = classify_columns(&df).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "age");
    }

    #[test]
    fn nan_values_count_as_missing() {
        let csv = b"x\n1.0\nNaN\n2.0\n";
        let processed = process_dataset(csv, "data.csv", None).unwrap();

        let facts = processed.facts_for_ai.get("x").unwrap();
        assert_eq!(facts.count, 2);
        assert_eq!(facts.mean, 1.5);
        assert_eq!(facts.median, 1.5);
        assert_eq!(facts.min, 1.0);
        assert_eq!(facts.max, 2.0);
        assert!(facts.std_dev.is_finite());

        let stats = processed.full_stats.get("x").unwrap();
        assert!(stats.mean.is_finite());
        assert!(stats.std_dev.is_finite());
    }

    #[test]
    fn all_nan_numeric_column_is_skipped() {
        let df = DataFrame::new(vec![
            Series::new("noise", vec![f64::NAN, f64::NAN]),
            Series::new("age", vec![1.0, 2.0]),
        ])
        .unwrap();

        let columns = classify_columns(&df).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "age");
    }

    #[test]
    fn high_cardinality_column_has_no_pie() {
        let rows: String = (0..20).map(|i| format!("{}\n", i)).collect();
        let csv = format!("value\n{}", rows);
        let processed = process_dataset(csv.as_bytes(), "data.csv", None).unwrap();

        assert!(processed.visualizations.contains_key("value_hist"));
        assert!(processed.visualizations.contains_key("value_line"));
        assert!(!processed.visualizations.contains_key("value_pie"));
        assert!(!processed.facts_for_ai.get("value").unwrap().has_pie);
    }

    #[test]
    fn ten_distinct_values_is_still_low_cardinality() {
        let rows: String = (0..10).map(|i| format!("{}\n", i)).collect();
        let csv = format!("value\n{}", rows);
        let processed = process_dataset(csv.as_bytes(), "data.csv", None).unwrap();

        assert!(processed.visualizations.contains_key("value_pie"));
    }

    #[test]
    fn unsupported_extension_is_invalid_input() {
        let err = process_dataset(b"plain text", "notes.txt", None).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn malformed_csv_is_parse_error() {
        let err = process_dataset(b"a,b\n1,2,3,4\n", "bad.csv", None).unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[test]
    fn unknown_selected_column_is_invalid_input() {
        let cols = vec!["height".to_string()];
        let err = process_dataset(AGE_CSV, "people.csv", Some(&cols)).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn selection_restricts_columns() {
        let csv = b"age,score\n20,1\n25,2\n30,3\n";
        let cols = vec!["score".to_string()];
        let processed = process_dataset(csv, "data.csv", Some(&cols)).unwrap();

        assert!(processed.full_stats.contains_key("score"));
        assert!(!processed.full_stats.contains_key("age"));
    }

    #[test]
    fn sampling_preserves_small_columns_in_order() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        assert_eq!(sampling_view(&values), values);
    }

    #[test]
    fn sampling_is_deterministic_for_large_columns() {
        let values: Vec<f64> = (0..5000).map(|i| i as f64).collect();
        let first = sampling_view(&values);
        let second = sampling_view(&values);

        assert_eq!(first.len(), 1000);
        assert_eq!(first, second);
    }

    #[test]
    fn mode_ties_resolve_ascending() {
        let values = [3.0, 3.0, 1.0, 1.0, 2.0, 2.0];
        assert_eq!(top_modes(&values), vec![1.0, 2.0]);
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn std_dev_of_single_value_is_zero() {
        assert_eq!(sample_std_dev(&[5.0]), 0.0);
    }

    #[test]
    fn excel_mixed_column_is_not_numeric() {
        let rows = vec![
            vec![Data::String("id".into()), Data::String("label".into())],
            vec![Data::Int(1), Data::String("x".into())],
            vec![Data::Float(2.5), Data::Int(7)],
        ];
        let df = excel_to_dataframe(&rows).unwrap();

        let columns = classify_columns(&df).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[0].values, vec![1.0, 2.5]);
    }
}
