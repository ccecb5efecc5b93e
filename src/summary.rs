use crate::error::ExportError;
use crate::table::{float_values, CleanTable, Tabular};
use polars::prelude::*;

pub const SUMMARY_FILE_NAME: &str = "statistical_summary.csv";
pub const SUMMARY_MIME: &str = "text/csv";

/// Descriptive statistics of one numeric column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    /// Sample std (ddof 1) and linearly interpolated quartiles.
    fn from_series(series: &Series) -> PolarsResult<Self> {
        let values = float_values(series)?;
        let quartile = |q| values.quantile(q, QuantileInterpolOptions::Linear);
        Ok(Self {
            column: series.name().to_string(),
            count: values.len() - values.null_count(),
            mean: values.mean(),
            std: values.std(1),
            min: values.min(),
            q25: quartile(0.25)?,
            median: quartile(0.5)?,
            q75: quartile(0.75)?,
            max: values.max(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummaryReport {
    pub rows: Vec<ColumnSummary>,
    /// Missing values per column, every column included.
    pub null_counts: Vec<(String, usize)>,
}

impl SummaryReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_nulls(&self) -> usize {
        self.null_counts.iter().map(|(_, n)| n).sum()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let pick = |f: fn(&ColumnSummary) -> Option<f64>| -> Vec<Option<f64>> {
            self.rows.iter().map(f).collect()
        };
        DataFrame::new(vec![
            Series::new(
                "column",
                self.rows.iter().map(|r| r.column.clone()).collect::<Vec<_>>(),
            ),
            Series::new(
                "count",
                self.rows.iter().map(|r| r.count as u64).collect::<Vec<_>>(),
            ),
            Series::new("mean", pick(|r| r.mean)),
            Series::new("std", pick(|r| r.std)),
            Series::new("min", pick(|r| r.min)),
            Series::new("25%", pick(|r| r.q25)),
            Series::new("50%", pick(|r| r.median)),
            Series::new("75%", pick(|r| r.q75)),
            Series::new("max", pick(|r| r.max)),
        ])
    }

    pub fn null_counts_dataframe(&self) -> PolarsResult<DataFrame> {
        df!(
            "column" => self.null_counts.iter().map(|(c, _)| c.clone()).collect::<Vec<_>>(),
            "nulls" => self.null_counts.iter().map(|(_, n)| *n as u64).collect::<Vec<_>>()
        )
    }
}

pub fn summarize(table: &CleanTable) -> PolarsResult<SummaryReport> {
    let rows = table
        .numeric_columns()
        .iter()
        .map(|column| ColumnSummary::from_series(table.data().column(column)?))
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok(SummaryReport {
        rows,
        null_counts: table.missing_counts()?,
    })
}

/// Statistics as CSV, one row per numeric column.
pub fn export(summary: &SummaryReport) -> Result<Vec<u8>, ExportError> {
    let mut df = summary.to_dataframe()?;
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df)?;
    Ok(buf)
}
