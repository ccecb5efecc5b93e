//! Fixed chart battery for numeric columns, rendered to in-memory PNGs.
//!
//! Charts are drawn with plotters into an RGB buffer, then encoded with the
//! `image` crate. Text uses the sans-serif face bundled with egui, registered
//! once with plotters so rendering works without system fonts.

use crate::error::RenderError;
use crate::table::{CleanTable, Tabular};
use log::{debug, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::borrow::Cow;
use std::io::Cursor;
use std::sync::OnceLock;

pub const HISTOGRAM_BINS: usize = 10;
pub const CHART_WIDTH: u32 = 640;
pub const CHART_HEIGHT: u32 = 480;
pub const CHART_MIME: &str = "image/png";

const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const FONT_FAMILY: &str = "sans-serif";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    Histogram,
    Boxplot,
    Scatter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChartSpec {
    Histogram(String),
    Boxplot(String),
    Scatter { x: String, y: String },
}

impl ChartSpec {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartSpec::Histogram(_) => ChartKind::Histogram,
            ChartSpec::Boxplot(_) => ChartKind::Boxplot,
            ChartSpec::Scatter { .. } => ChartKind::Scatter,
        }
    }

    pub fn title(&self) -> String {
        match self {
            ChartSpec::Histogram(col) => format!("Histogram of {col}"),
            ChartSpec::Boxplot(col) => format!("Boxplot of {col}"),
            ChartSpec::Scatter { x, y } => format!("{y} vs {x}"),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            ChartSpec::Histogram(col) => format!("histogram_{}.png", file_safe(col)),
            ChartSpec::Boxplot(col) => format!("boxplot_{}.png", file_safe(col)),
            ChartSpec::Scatter { x, y } => {
                format!("scatter_{}_vs_{}.png", file_safe(x), file_safe(y))
            }
        }
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct ChartArtifact {
    pub spec: ChartSpec,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl ChartArtifact {
    pub fn file_name(&self) -> String {
        self.spec.file_name()
    }
}

/// Rendered charts plus the ones whose rendering failed.
#[derive(Debug, Default)]
pub struct ChartBattery {
    pub artifacts: Vec<ChartArtifact>,
    pub failures: Vec<(ChartSpec, RenderError)>,
}

impl ChartBattery {
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.failures.is_empty()
    }

    /// Attempted charts of a kind, rendered or failed.
    pub fn count(&self, kind: ChartKind) -> usize {
        self.artifacts
            .iter()
            .map(|a| &a.spec)
            .chain(self.failures.iter().map(|(spec, _)| spec))
            .filter(|spec| spec.kind() == kind)
            .count()
    }
}

/// Histogram and boxplot per numeric column, then one scatter per unordered pair.
pub fn plan(table: &CleanTable) -> Vec<ChartSpec> {
    let numeric = table.numeric_columns();
    let mut specs = Vec::with_capacity(numeric.len() * 2);
    for col in &numeric {
        specs.push(ChartSpec::Histogram(col.clone()));
        specs.push(ChartSpec::Boxplot(col.clone()));
    }
    for (i, x) in numeric.iter().enumerate() {
        for y in &numeric[i + 1..] {
            specs.push(ChartSpec::Scatter {
                x: x.clone(),
                y: y.clone(),
            });
        }
    }
    specs
}

pub fn generate(table: &CleanTable) -> ChartBattery {
    let mut battery = ChartBattery::default();
    for spec in plan(table) {
        match render(table, &spec) {
            Ok(artifact) => battery.artifacts.push(artifact),
            Err(e) => {
                warn!("{} not rendered: {e}", spec.file_name());
                battery.failures.push((spec, e));
            }
        }
    }
    debug!(
        "rendered {} charts, {} failed",
        battery.artifacts.len(),
        battery.failures.len()
    );
    battery
}

pub fn render(table: &CleanTable, spec: &ChartSpec) -> Result<ChartArtifact, RenderError> {
    let mut rgb = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut rgb, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        draw(&root, table, spec)?;
        root.present().map_err(|e| backend_error(spec, e))?;
    }
    Ok(ChartArtifact {
        spec: spec.clone(),
        width: CHART_WIDTH,
        height: CHART_HEIGHT,
        png: encode_png(rgb, CHART_WIDTH, CHART_HEIGHT)?,
    })
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    table: &CleanTable,
    spec: &ChartSpec,
) -> Result<(), RenderError> {
    let title = spec.title();
    match spec {
        ChartSpec::Histogram(col) => {
            let values = non_empty(table, col)?;
            ensure_font()?;
            draw_histogram(root, &title, col, &values)
        }
        ChartSpec::Boxplot(col) => {
            let values = non_empty(table, col)?;
            ensure_font()?;
            draw_boxplot(root, &title, col, &values)
        }
        ChartSpec::Scatter { x, y } => {
            let xs = non_empty(table, x)?;
            let ys = non_empty(table, y)?;
            ensure_font()?;
            draw_scatter(
                root,
                &title,
                (x.as_str(), xs.as_slice()),
                (y.as_str(), ys.as_slice()),
            )
        }
    }
    .map_err(|e| backend_error(spec, e))
}

fn backend_error<E>(spec: &ChartSpec, e: DrawingAreaErrorKind<E>) -> RenderError
where
    E: std::error::Error + Send + Sync,
{
    RenderError::Backend {
        chart: spec.file_name(),
        message: e.to_string(),
    }
}

/// Observed values of `column`. Infinite values cannot be placed on an axis.
fn non_empty(table: &CleanTable, column: &str) -> Result<Vec<f64>, RenderError> {
    let values = table.numeric_values(column)?;
    if values.is_empty() {
        return Err(RenderError::EmptyColumn {
            column: column.to_string(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(RenderError::NonFinite {
            column: column.to_string(),
        });
    }
    Ok(values)
}

fn bounds(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width bins over [min, max]; the last bin is closed on both ends.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<Bin> {
    let Some((lo, hi)) = bounds(values) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let width = (hi - lo) / bins as f64;
    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: lo + width * i as f64,
            end: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();
    for v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

fn draw_histogram<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    column: &str,
    values: &[f64],
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let bins = histogram_bins(values, HISTOGRAM_BINS);
    let lo = bins.first().map_or(0.0, |b| b.start);
    let hi = bins.last().map_or(1.0, |b| b.end);
    let top = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64 * 1.05;

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0f64..top)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(column)
        .y_desc("count")
        .draw()?;
    chart.draw_series(bins.iter().map(|b| {
        Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], SKY_BLUE.filled())
    }))?;
    chart.draw_series(bins.iter().map(|b| {
        Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], BLACK.stroke_width(1))
    }))?;
    Ok(())
}

fn draw_boxplot<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    column: &str,
    values: &[f64],
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let quartiles = Quartiles::new(values);
    let [fence_low, _, _, _, fence_high] = quartiles.values();
    let (min, max) = bounds(values).unwrap_or((0.0, 1.0));
    let (low, high) = (fence_low.min(min as f32), fence_high.max(max as f32));
    let pad = ((high - low) * 0.1).max(0.5);
    let outliers: Vec<f32> = values
        .iter()
        .map(|&v| v as f32)
        .filter(|&v| v < fence_low || v > fence_high)
        .collect();

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0i32..1i32).into_segmented(), (low - pad)..(high + pad))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(1)
        .x_desc(column)
        .draw()?;
    chart.draw_series(std::iter::once(
        Boxplot::new_vertical(SegmentValue::CenterOf(0), &quartiles)
            .width(80)
            .style(BLACK),
    ))?;
    chart.draw_series(
        outliers
            .iter()
            .map(|&v| Circle::new((SegmentValue::CenterOf(0), v), 3, BLACK)),
    )?;
    Ok(())
}

fn draw_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    (x_name, xs): (&str, &[f64]),
    (y_name, ys): (&str, &[f64]),
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (x_lo, x_hi) = padded(xs);
    let (y_lo, y_hi) = padded(ys);

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;
    chart
        .configure_mesh()
        .x_desc(x_name)
        .y_desc(y_name)
        .draw()?;
    chart.draw_series(
        xs.iter()
            .zip(ys)
            .map(|(&x, &y)| Circle::new((x, y), 3, BLUE.filled())),
    )?;
    Ok(())
}

fn padded(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = bounds(values).unwrap_or((0.0, 1.0));
    let pad = ((hi - lo) * 0.05).max(0.5);
    (lo - pad, hi + pad)
}

fn encode_png(rgb: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let img = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| RenderError::Encode("pixel buffer has the wrong size".to_string()))?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

static FONT: OnceLock<Result<(), String>> = OnceLock::new();

fn ensure_font() -> Result<(), RenderError> {
    FONT.get_or_init(|| {
        let definitions = egui::FontDefinitions::default();
        let data = definitions
            .font_data
            .get("Ubuntu-Light")
            .ok_or_else(|| "bundled font is missing".to_string())?;
        let bytes: &'static [u8] = match &data.font {
            Cow::Borrowed(bytes) => *bytes,
            Cow::Owned(bytes) => Box::leak(bytes.clone().into_boxed_slice()),
        };
        register_font(FONT_FAMILY, FontStyle::Normal, bytes)
            .map_err(|_| "bundled font could not be parsed".to_string())
    })
    .clone()
    .map_err(RenderError::Font)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::clean;
    use crate::ingest;
    use crate::table::RawTable;
    use polars::prelude::*;

    fn table(df: DataFrame) -> CleanTable {
        clean(RawTable::new(df)).unwrap()
    }

    #[test]
    fn plan_covers_unordered_pairs_once() {
        let t = table(
            df!(
                "a" => &[1.0f64, 2.0],
                "name" => &["x", "y"],
                "b" => &[3i64, 4],
                "c" => &[5.0f64, 6.0]
            )
            .unwrap(),
        );
        let specs = plan(&t);
        let count = |kind| specs.iter().filter(|s| s.kind() == kind).count();
        assert_eq!(count(ChartKind::Histogram), 3);
        assert_eq!(count(ChartKind::Boxplot), 3);
        assert_eq!(count(ChartKind::Scatter), 3);
        let pairs: Vec<_> = specs
            .iter()
            .filter_map(|s| match s {
                ChartSpec::Scatter { x, y } => Some((x.as_str(), y.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(pairs, vec![("a", "b"), ("a", "c"), ("b", "c")]);
    }

    #[test]
    fn single_numeric_column_has_no_scatter() {
        let t = table(df!("a" => &[1.0f64, 2.0], "s" => &["x", "y"]).unwrap());
        let specs = plan(&t);
        assert_eq!(
            specs,
            vec![
                ChartSpec::Histogram("a".into()),
                ChartSpec::Boxplot("a".into())
            ]
        );
    }

    #[test]
    fn no_numeric_columns_no_charts() {
        let t = table(df!("s" => &["x", "y"]).unwrap());
        assert!(plan(&t).is_empty());
        assert!(generate(&t).is_empty());
    }

    #[test]
    fn file_names_follow_columns() {
        assert_eq!(
            ChartSpec::Histogram("age".into()).file_name(),
            "histogram_age.png"
        );
        assert_eq!(ChartSpec::Boxplot("a/b".into()).file_name(), "boxplot_a_b.png");
        let scatter = ChartSpec::Scatter {
            x: "age".into(),
            y: "income".into(),
        };
        assert_eq!(scatter.file_name(), "scatter_age_vs_income.png");
        assert_eq!(scatter.title(), "income vs age");
    }

    #[test]
    fn ten_bins_cover_every_value() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let bins = histogram_bins(&values, HISTOGRAM_BINS);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 101);
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[9].end, 100.0);
        assert_eq!(bins[9].count, 11);
    }

    #[test]
    fn constant_column_still_bins() {
        let bins = histogram_bins(&[7.0, 7.0, 7.0], HISTOGRAM_BINS);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].start, 6.5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn battery_accounts_for_every_planned_chart() {
        let t = table(
            df!(
                "a" => &[1.0f64, 2.0, 4.0],
                "b" => &[3i64, 1, 2]
            )
            .unwrap(),
        );
        let battery = generate(&t);
        assert!(battery.failures.is_empty(), "{:?}", battery.failures);
        assert_eq!(battery.artifacts.len(), plan(&t).len());
        assert_eq!(battery.count(ChartKind::Histogram), 2);
        assert_eq!(battery.count(ChartKind::Boxplot), 2);
        assert_eq!(battery.count(ChartKind::Scatter), 1);
        for artifact in &battery.artifacts {
            assert!(artifact.png.starts_with(b"\x89PNG\r\n\x1a\n"));
            assert_eq!((artifact.width, artifact.height), (CHART_WIDTH, CHART_HEIGHT));
        }
    }

    #[test]
    fn infinite_values_fail_instead_of_hanging() {
        let t = clean(ingest::read_csv_bytes(b"a\n1\ninf\n4\n").unwrap()).unwrap();
        for spec in [ChartSpec::Histogram("a".into()), ChartSpec::Boxplot("a".into())] {
            let err = render(&t, &spec).unwrap_err();
            assert!(matches!(err, RenderError::NonFinite { .. }));
        }
        let battery = generate(&t);
        assert!(battery.artifacts.is_empty());
        assert_eq!(battery.failures.len(), 2);
    }

    #[test]
    fn one_bad_column_does_not_stop_the_others() {
        let t = clean(ingest::read_csv_bytes(b"a,b\n1,2\ninf,3\n4,5\n").unwrap()).unwrap();
        let battery = generate(&t);
        let failed: Vec<String> = battery
            .failures
            .iter()
            .map(|(spec, _)| spec.file_name())
            .collect();
        assert_eq!(
            failed,
            vec!["histogram_a.png", "boxplot_a.png", "scatter_a_vs_b.png"]
        );
        let rendered: Vec<String> = battery.artifacts.iter().map(|a| a.file_name()).collect();
        assert_eq!(rendered, vec!["histogram_b.png", "boxplot_b.png"]);
    }

    #[test]
    fn empty_table_reports_empty_column() {
        let t = table(df!("a" => Vec::<f64>::new()).unwrap());
        let err = render(&t, &ChartSpec::Histogram("a".into())).unwrap_err();
        assert!(matches!(err, RenderError::EmptyColumn { .. }));
    }
}
