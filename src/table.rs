use polars::prelude::*;

/// How a column is treated by the cleaner, the summary and the charts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    NonNumeric,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_numeric() {
            ColumnKind::Numeric
        } else {
            ColumnKind::NonNumeric
        }
    }
}

/// Read access shared by raw and cleaned tables.
pub trait Tabular {
    fn data(&self) -> &DataFrame;

    fn shape(&self) -> (usize, usize) {
        self.data().shape()
    }

    fn column_names(&self) -> Vec<String> {
        self.data()
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn columns(&self) -> Vec<(String, ColumnKind)> {
        self.data()
            .get_columns()
            .iter()
            .map(|s| (s.name().to_string(), ColumnKind::of(s.dtype())))
            .collect()
    }

    fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        self.data()
            .column(column)
            .ok()
            .map(|s| ColumnKind::of(s.dtype()))
    }

    /// Numeric column names in column order.
    fn numeric_columns(&self) -> Vec<String> {
        self.columns()
            .into_iter()
            .filter(|(_, kind)| *kind == ColumnKind::Numeric)
            .map(|(name, _)| name)
            .collect()
    }

    /// Nulls, plus NaN for numeric columns.
    fn missing_count(&self, column: &str) -> PolarsResult<usize> {
        let series = self.data().column(column)?;
        match ColumnKind::of(series.dtype()) {
            ColumnKind::Numeric => Ok(float_values(series)?.null_count()),
            ColumnKind::NonNumeric => Ok(series.null_count()),
        }
    }

    fn missing_counts(&self) -> PolarsResult<Vec<(String, usize)>> {
        self.column_names()
            .into_iter()
            .map(|name| {
                let count = self.missing_count(&name)?;
                Ok((name, count))
            })
            .collect()
    }

    /// Observed (non-missing) values of a numeric column.
    fn numeric_values(&self, column: &str) -> PolarsResult<Vec<f64>> {
        let series = self.data().column(column)?;
        Ok(float_values(series)?.into_iter().flatten().collect())
    }
}

/// A freshly parsed table. Must go through the cleaner before anything reads it.
#[derive(Clone, Debug)]
pub struct RawTable {
    data: DataFrame,
}

impl RawTable {
    pub fn new(data: DataFrame) -> Self {
        Self { data }
    }

    pub(crate) fn into_inner(self) -> DataFrame {
        self.data
    }
}

impl Tabular for RawTable {
    fn data(&self) -> &DataFrame {
        &self.data
    }
}

/// A table with every missing value imputed. Only the cleaner builds one.
#[derive(Clone, Debug)]
pub struct CleanTable {
    data: DataFrame,
}

impl CleanTable {
    pub(crate) fn new(data: DataFrame) -> Self {
        Self { data }
    }

    pub fn to_csv_bytes(&self) -> PolarsResult<Vec<u8>> {
        let mut df = self.data.clone();
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(&mut df)?;
        Ok(buf)
    }

    pub fn preview(&self, rows: usize) -> DataFrame {
        self.data.head(Some(rows))
    }
}

impl Tabular for CleanTable {
    fn data(&self) -> &DataFrame {
        &self.data
    }
}

/// The column cast to f64, with NaN folded into null.
pub(crate) fn float_values(series: &Series) -> PolarsResult<Float64Chunked> {
    let cast = series.cast(&DataType::Float64)?;
    let values: Float64Chunked = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values.with_name(series.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawTable {
        let df = df!(
            "age" => &[Some(30i64), None, Some(40)],
            "score" => &[Some(1.5f64), Some(f64::NAN), None],
            "city" => &[Some("Paris"), None, Some("Rome")]
        )
        .unwrap();
        RawTable::new(df)
    }

    #[test]
    fn kinds_follow_dtypes() {
        let table = sample();
        assert_eq!(
            table.columns(),
            vec![
                ("age".to_string(), ColumnKind::Numeric),
                ("score".to_string(), ColumnKind::Numeric),
                ("city".to_string(), ColumnKind::NonNumeric),
            ]
        );
        assert_eq!(table.numeric_columns(), vec!["age", "score"]);
        assert_eq!(table.kind_of("missing"), None);
    }

    #[test]
    fn nan_counts_as_missing() {
        let table = sample();
        assert_eq!(table.missing_count("score").unwrap(), 2);
        assert_eq!(table.missing_count("age").unwrap(), 1);
        assert_eq!(table.missing_count("city").unwrap(), 1);
        assert_eq!(table.numeric_values("score").unwrap(), vec![1.5]);
    }
}
