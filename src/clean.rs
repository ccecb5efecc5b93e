use crate::error::ImputationError;
use crate::table::{float_values, CleanTable, ColumnKind, RawTable, Tabular};
use log::{debug, info};
use polars::prelude::*;

/// Fill value for a text column that has no observed value at all.
pub const PLACEHOLDER: &str = "Unknown";

const COUNT_COLUMN: &str = "__count";

#[derive(Clone, Debug, PartialEq)]
pub enum ImputeRule {
    Median(f64),
    Mode(String),
    BoolMode(bool),
    Placeholder,
    /// Numeric column of an empty table.
    Untouched,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnStatistics {
    pub column: String,
    pub kind: ColumnKind,
    pub missing: usize,
    pub rule: ImputeRule,
}

pub fn column_statistics(table: &RawTable) -> Result<Vec<ColumnStatistics>, ImputationError> {
    table
        .data()
        .get_columns()
        .iter()
        .map(statistics_for)
        .collect()
}

fn statistics_for(series: &Series) -> Result<ColumnStatistics, ImputationError> {
    let column = series.name().to_string();
    let kind = ColumnKind::of(series.dtype());
    let (missing, rule) = match kind {
        ColumnKind::Numeric => {
            let values = float_values(series)?;
            let missing = values.null_count();
            let rule = match values.median() {
                Some(median) => ImputeRule::Median(median),
                None if missing > 0 => {
                    return Err(ImputationError::NoObservedValues { column });
                }
                None => ImputeRule::Untouched,
            };
            (missing, rule)
        }
        ColumnKind::NonNumeric => (series.null_count(), mode_rule(series)?),
    };
    Ok(ColumnStatistics {
        column,
        kind,
        missing,
        rule,
    })
}

fn mode_rule(series: &Series) -> Result<ImputeRule, ImputationError> {
    if series.null_count() == series.len() {
        return Ok(ImputeRule::Placeholder);
    }
    if series.dtype() == &DataType::Boolean {
        let flags = series.bool()?;
        let trues = flags.into_iter().flatten().filter(|v| *v).count();
        let falses = flags.len() - flags.null_count() - trues;
        return Ok(ImputeRule::BoolMode(trues > falses));
    }
    let text = as_text(series)?;
    let name = text.name().to_string();
    // Most frequent first; ties go to the smallest value.
    let ranked = text
        .into_frame()
        .lazy()
        .filter(col(&name).is_not_null())
        .group_by([col(&name)])
        .agg([len().alias(COUNT_COLUMN)])
        .sort_by_exprs(
            [col(COUNT_COLUMN), col(&name)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(1)
        .collect()?;
    let mode = ranked.column(&name)?.str()?.get(0).map(str::to_string);
    Ok(mode.map(ImputeRule::Mode).unwrap_or(ImputeRule::Placeholder))
}

fn as_text(series: &Series) -> Result<Series, ImputationError> {
    if series.dtype() == &DataType::String {
        return Ok(series.clone());
    }
    series
        .cast(&DataType::String)
        .map_err(|_| ImputationError::UnsupportedType {
            column: series.name().to_string(),
            dtype: series.dtype().to_string(),
        })
}

/// Imputes every missing value. Consumes the raw table so it can only run once.
pub fn clean(table: RawTable) -> Result<CleanTable, ImputationError> {
    let statistics = column_statistics(&table)?;
    let mut df = table.into_inner();
    let mut filled = 0;
    for stat in statistics.iter().filter(|s| s.missing > 0) {
        let replacement = impute(df.column(&stat.column)?, &stat.rule)?;
        df.with_column(replacement)?;
        debug!(
            "filled {} missing values in `{}` with {:?}",
            stat.missing, stat.column, stat.rule
        );
        filled += stat.missing;
    }
    info!(
        "filled {filled} missing values across {} columns",
        statistics.iter().filter(|s| s.missing > 0).count()
    );
    Ok(CleanTable::new(df))
}

fn impute(series: &Series, rule: &ImputeRule) -> Result<Series, ImputationError> {
    let out = match rule {
        ImputeRule::Median(median) => float_values(series)?
            .fill_null_with_values(*median)?
            .into_series(),
        ImputeRule::BoolMode(mode) => series.bool()?.fill_null_with_values(*mode)?.into_series(),
        ImputeRule::Mode(mode) => as_text(series)?
            .str()?
            .as_binary()
            .fill_null_with_values(mode.as_bytes())?
            .cast(&DataType::String)?,
        ImputeRule::Placeholder => Series::new(series.name(), vec![PLACEHOLDER; series.len()]),
        ImputeRule::Untouched => series.clone(),
    };
    Ok(out)
}
