//! Renders one line chart per category into a single multi-page PDF.
//!
//! Building the chart data (`charts`) is kept apart from drawing it (`render`) so that the
//! per-category and per-region layout can be checked without parsing a PDF.

use crate::model::{Region, SpendingTable};
use crate::{utils, Result};
use anyhow::{anyhow, bail, Context};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Rgb,
};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The name of the document written to the output directory.
pub const PDF_NAME: &str = "aws-spending-by-region.pdf";

// A4 landscape (mm)
const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const PLOT_LEFT: f32 = 30.0;
const PLOT_RIGHT: f32 = PAGE_W - 55.0;
const PLOT_BOTTOM: f32 = 30.0;
const PLOT_TOP: f32 = PAGE_H - 28.0;
const TITLE_SIZE: f32 = 14.0;
const LABEL_SIZE: f32 = 9.0;
const TICK_SIZE: f32 = 7.0;
const Y_TICKS: usize = 5;
const MAX_X_LABELS: usize = 8;
const MARKER: f32 = 0.5;

/// Matplotlib's "Paired" colormap, dark shades first.
const PALETTE: &[(f32, f32, f32)] = &[
    (0.122, 0.471, 0.706),
    (0.890, 0.102, 0.110),
    (0.200, 0.627, 0.173),
    (1.000, 0.498, 0.000),
    (0.416, 0.239, 0.604),
    (0.694, 0.349, 0.157),
    (0.651, 0.808, 0.890),
    (0.984, 0.604, 0.600),
    (0.698, 0.875, 0.541),
    (0.992, 0.749, 0.435),
    (0.792, 0.698, 0.839),
    (0.800, 0.800, 0.400),
];

/// One page of the document: amount over time for one category, one line per region.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub category: String,
    pub metric: String,
    pub title: String,
    pub y_label: String,
    /// Bucket start dates, sorted. Every series has one value per date.
    pub dates: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub region: Region,
    pub color: (f32, f32, f32),
    pub values: Vec<f64>,
}

/// Builds the charts for the categories in `keep`: one per category and metric. Colors are
/// assigned per region so that a region looks the same on every page.
///
/// When the table holds both the pseudo region `all` and real regions, each category and metric
/// gets two charts instead: the account total on its own, then the real regions.
pub fn charts(table: &SpendingTable, keep: &BTreeSet<String>) -> Result<Vec<Chart>> {
    let regions = table.regions();
    let colors: BTreeMap<Region, (f32, f32, f32)> = regions
        .iter()
        .enumerate()
        .map(|(i, region)| (region.clone(), PALETTE[i % PALETTE.len()]))
        .collect();
    let (total, regional): (Vec<Region>, Vec<Region>) =
        regions.iter().cloned().partition(Region::is_total);
    let split = !total.is_empty() && !regional.is_empty();
    let metrics = table.metrics();

    let mut charts = Vec::new();
    for category in keep {
        for metric in &metrics {
            if table.rows(category, metric).next().is_none() {
                continue;
            }
            let unit = table.unit(category, metric)?;
            let dates: Vec<String> = table
                .rows(category, metric)
                .map(|r| r.start_date.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let suffix = if metrics.len() > 1 {
                format!(" ({metric})")
            } else {
                String::new()
            };
            let pages = if split {
                vec![
                    (
                        format!("AWS cost group {category} for all regions{suffix}"),
                        total.as_slice(),
                    ),
                    (
                        format!("AWS cost group {category} by region{suffix}"),
                        regional.as_slice(),
                    ),
                ]
            } else {
                vec![(format!("AWS cost group {category}{suffix}"), regions.as_slice())]
            };

            for (title, page_regions) in pages {
                let series = series(table, category, metric, &dates, page_regions, &colors);
                charts.push(Chart {
                    category: category.clone(),
                    metric: metric.clone(),
                    title,
                    y_label: format!("Amount ({unit})"),
                    dates: dates.clone(),
                    series,
                });
            }
        }
    }
    Ok(charts)
}

/// One line per region in `regions` that has rows for `category` and `metric`.
fn series(
    table: &SpendingTable,
    category: &str,
    metric: &str,
    dates: &[String],
    regions: &[Region],
    colors: &BTreeMap<Region, (f32, f32, f32)>,
) -> Vec<Series> {
    let index: BTreeMap<&str, usize> = dates
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();

    let mut series = Vec::new();
    for region in regions {
        let mut values = vec![0.0; dates.len()];
        let mut present = false;
        for row in table
            .rows(category, metric)
            .filter(|r| &r.region == region)
        {
            if let Some(&i) = index.get(row.start_date.as_str()) {
                values[i] += row.amount.to_f64();
                present = true;
            }
        }
        if present {
            let color = colors.get(region).copied().unwrap_or(PALETTE[0]);
            series.push(Series {
                region: region.clone(),
                color,
                values,
            });
        }
    }
    series
}

/// Draws every chart on its own page and returns the PDF bytes.
pub fn render(charts: &[Chart]) -> Result<Vec<u8>> {
    if charts.is_empty() {
        bail!("There are no charts to render");
    }
    let mut pdf = PdfWriter::new("AWS spending by region")?;
    for chart in charts {
        debug!("Drawing {}", chart.title);
        let layer = pdf.next_page();
        pdf.draw_chart(&layer, chart);
    }
    pdf.to_bytes()
}

/// Renders `charts` and writes them to `PDF_NAME` in `outdir`, creating `outdir` if needed.
pub async fn save(charts: &[Chart], outdir: &Path) -> Result<PathBuf> {
    let bytes = render(charts)?;
    utils::make_dir(outdir).await?;
    let path = outdir.join(PDF_NAME);
    utils::write(&path, bytes).await?;
    Ok(path)
}

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.len() as f32 * size * 0.18
}

fn rgb((r, g, b): (f32, f32, f32)) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn line(points: &[(f32, f32)], is_closed: bool) -> Line {
    Line {
        points: points
            .iter()
            .map(|&(x, y)| (Point::new(Mm(x), Mm(y)), false))
            .collect(),
        is_closed,
    }
}

/// A "nice" tick spacing (1, 2 or 5 times a power of ten) close to `raw`.
fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 || !raw.is_finite() {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let norm = raw / magnitude;
    let nice = if norm <= 1.0 {
        1.0
    } else if norm <= 2.0 {
        2.0
    } else if norm <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// The y axis range and tick positions for `values`. The range always includes zero.
fn y_axis(values: impl Iterator<Item = f64>) -> (f64, f64, Vec<f64>) {
    let (mut lo, mut hi) = values.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if (hi - lo).abs() < f64::EPSILON {
        hi = lo + 1.0;
    }
    let step = nice_step((hi - lo) / Y_TICKS as f64);
    lo = (lo / step).floor() * step;
    hi = (hi / step).ceil() * step;
    let count = ((hi - lo) / step).round() as usize;
    let ticks = (0..=count).map(|i| lo + i as f64 * step).collect();
    (lo, hi, ticks)
}

/// Shortens an hourly timestamp such as `2023-01-01T05:00:00Z` to `2023-01-01 05:00`.
fn date_label(date: &str) -> String {
    let label = date.replace('T', " ");
    label.chars().take(16).collect()
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    first: Option<(PdfPageIndex, PdfLayerIndex)>,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("Unable to load PDF font: {e:?}"))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("Unable to load PDF font: {e:?}"))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            first: Some((page, layer)),
        })
    }

    /// The document starts with one blank page; later charts each get a new one.
    fn next_page(&mut self) -> PdfLayerReference {
        let (page, layer) = match self.first.take() {
            Some(first) => first,
            None => self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1"),
        };
        self.doc.get_page(page).get_layer(layer)
    }

    fn text(&self, layer: &PdfLayerReference, s: &str, x: f32, y: f32, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        layer.use_text(s, size, Mm(x), Mm(y), font);
    }

    fn draw_chart(&self, layer: &PdfLayerReference, chart: &Chart) {
        let black = rgb((0.0, 0.0, 0.0));
        let grey = rgb((0.85, 0.85, 0.85));

        layer.set_fill_color(black.clone());
        self.text(layer, &chart.title, PLOT_LEFT, PAGE_H - 15.0, TITLE_SIZE, true);
        self.text(layer, &chart.y_label, PLOT_LEFT, PLOT_TOP + 4.0, LABEL_SIZE, false);

        let (lo, hi, ticks) = y_axis(chart.series.iter().flat_map(|s| s.values.iter().copied()));
        let to_y = |v: f64| PLOT_BOTTOM + ((v - lo) / (hi - lo)) as f32 * (PLOT_TOP - PLOT_BOTTOM);
        let n = chart.dates.len();
        let to_x = |i: usize| {
            if n <= 1 {
                (PLOT_LEFT + PLOT_RIGHT) / 2.0
            } else {
                PLOT_LEFT + i as f32 / (n - 1) as f32 * (PLOT_RIGHT - PLOT_LEFT)
            }
        };

        // Grid and y tick labels
        layer.set_outline_thickness(0.3);
        for tick in &ticks {
            let y = to_y(*tick);
            layer.set_outline_color(grey.clone());
            layer.add_line(line(&[(PLOT_LEFT, y), (PLOT_RIGHT, y)], false));
            let label = format_num::format_num!(",.2", *tick);
            let w = approx_text_width(&label, TICK_SIZE);
            self.text(layer, &label, PLOT_LEFT - 2.0 - w, y - 1.0, TICK_SIZE, false);
        }

        // x tick labels, thinned out so they do not overlap
        let every = n.div_ceil(MAX_X_LABELS).max(1);
        for (i, date) in chart.dates.iter().enumerate().step_by(every) {
            let label = date_label(date);
            let w = approx_text_width(&label, TICK_SIZE);
            self.text(layer, &label, to_x(i) - w / 2.0, PLOT_BOTTOM - 6.0, TICK_SIZE, false);
        }

        // Axes
        layer.set_outline_color(black);
        layer.set_outline_thickness(0.6);
        layer.add_line(line(
            &[
                (PLOT_LEFT, PLOT_TOP),
                (PLOT_LEFT, PLOT_BOTTOM),
                (PLOT_RIGHT, PLOT_BOTTOM),
            ],
            false,
        ));

        // One line per region, with a small square marker on each point, plus its legend entry
        let mut legend_y = PLOT_TOP - 4.0;
        for series in &chart.series {
            let color = rgb(series.color);
            layer.set_outline_color(color.clone());
            layer.set_outline_thickness(0.8);
            let points: Vec<(f32, f32)> = series
                .values
                .iter()
                .enumerate()
                .map(|(i, v)| (to_x(i), to_y(*v)))
                .collect();
            if points.len() > 1 {
                layer.add_line(line(&points, false));
            }
            layer.set_outline_thickness(0.4);
            for (x, y) in &points {
                layer.add_line(line(
                    &[
                        (x - MARKER, y - MARKER),
                        (x + MARKER, y - MARKER),
                        (x + MARKER, y + MARKER),
                        (x - MARKER, y + MARKER),
                    ],
                    true,
                ));
            }

            layer.set_outline_thickness(1.2);
            layer.add_line(line(
                &[(PLOT_RIGHT + 6.0, legend_y + 1.0), (PLOT_RIGHT + 14.0, legend_y + 1.0)],
                false,
            ));
            layer.set_fill_color(color);
            self.text(
                layer,
                series.region.as_str(),
                PLOT_RIGHT + 16.0,
                legend_y,
                LABEL_SIZE,
                false,
            );
            legend_y -= 6.0;
        }
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| anyhow!("Unable to render PDF: {e:?}"))?;
        buf.into_inner()
            .map_err(|e| anyhow!(e.to_string()))
            .context("Unable to flush PDF data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::aggregate::tests::snapshot;
    use crate::model::record;
    use tempfile::TempDir;

    fn keep(categories: &[&str]) -> BTreeSet<String> {
        categories.iter().map(|s| s.to_string()).collect()
    }

    /// Counts the page objects (`/Type /Page`, not `/Type /Pages`) in a PDF.
    fn page_count(pdf: &[u8]) -> usize {
        let needle = b"/Type";
        let mut count = 0;
        let mut i = 0;
        while i + needle.len() <= pdf.len() {
            if &pdf[i..i + needle.len()] != needle {
                i += 1;
                continue;
            }
            let mut j = i + needle.len();
            while j < pdf.len() && pdf[j].is_ascii_whitespace() {
                j += 1;
            }
            let rest = &pdf[j..];
            if rest.starts_with(b"/Page")
                && !rest.get(5).is_some_and(|b| b.is_ascii_alphanumeric())
            {
                count += 1;
            }
            i = j;
        }
        count
    }

    #[test]
    fn test_one_chart_per_category_one_line_per_region() {
        let a = snapshot(
            "us-east-1",
            &[("2023-01-01", "svc1", "3"), ("2023-01-02", "svc2", "9")],
        );
        let b = snapshot("us-west-2", &[("2023-01-01", "svc1", "3")]);
        let table = aggregate(&[a, b]);
        let charts = charts(&table, &keep(&["svc1"])).unwrap();

        assert_eq!(charts.len(), 1);
        let chart = &charts[0];
        assert_eq!(chart.title, "AWS cost group svc1");
        assert_eq!(chart.y_label, "Amount (USD)");
        assert_eq!(chart.dates, vec!["2023-01-01", "2023-01-02"]);
        let regions: Vec<&str> = chart.series.iter().map(|s| s.region.as_str()).collect();
        assert_eq!(regions, vec!["us-east-1", "us-west-2"]);
        assert_eq!(chart.series[0].values, vec![3.0, 0.0]);
        assert_ne!(chart.series[0].color, chart.series[1].color);
    }

    #[test]
    fn test_total_region_gets_its_own_chart() {
        let a = snapshot("us-east-1", &[("2023-01-01", "svc1", "3")]);
        let b = snapshot("us-west-2", &[("2023-01-01", "svc1", "4")]);
        let total = snapshot("all", &[("2023-01-01", "svc1", "7")]);
        let charts = charts(&aggregate(&[a, b, total]), &keep(&["svc1"])).unwrap();

        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].title, "AWS cost group svc1 for all regions");
        let regions: Vec<&str> = charts[0].series.iter().map(|s| s.region.as_str()).collect();
        assert_eq!(regions, vec!["all"]);
        assert_eq!(charts[0].series[0].values, vec![7.0]);

        assert_eq!(charts[1].title, "AWS cost group svc1 by region");
        let regions: Vec<&str> = charts[1].series.iter().map(|s| s.region.as_str()).collect();
        assert_eq!(regions, vec!["us-east-1", "us-west-2"]);
        assert_ne!(charts[0].series[0].color, charts[1].series[0].color);
    }

    #[test]
    fn test_total_region_alone_keeps_one_chart() {
        let total = snapshot("all", &[("2023-01-01", "svc1", "7")]);
        let charts = charts(&aggregate(&[total]), &keep(&["svc1"])).unwrap();
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].title, "AWS cost group svc1");
    }

    #[test]
    fn test_metric_in_title_when_split() {
        let mut regional = record("us-east-1", "svc1", "2023-01-01", "3");
        regional.metric = "UnblendedCost".to_string();
        let table = SpendingTable::new(vec![
            record("us-east-1", "svc1", "2023-01-01", "3"),
            record("all", "svc1", "2023-01-01", "3"),
            regional,
        ]);
        let titles: Vec<String> = charts(&table, &keep(&["svc1"]))
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(
            titles,
            vec![
                "AWS cost group svc1 for all regions (AmortizedCost)",
                "AWS cost group svc1 by region (AmortizedCost)",
                "AWS cost group svc1 for all regions (UnblendedCost)",
                "AWS cost group svc1 by region (UnblendedCost)",
            ]
        );
    }

    #[test]
    fn test_render_one_page_per_chart() {
        let a = snapshot(
            "a",
            &[
                ("2023-01-01", "svc1", "6"),
                ("2023-01-02", "svc2", "8"),
                ("2023-01-03", "svc3", "9"),
            ],
        );
        let table = aggregate(&[a]);
        let one = charts(&table, &keep(&["svc1"])).unwrap();
        let three = charts(&table, &keep(&["svc1", "svc2", "svc3"])).unwrap();
        assert_eq!(three.len(), 3);

        assert_eq!(page_count(&render(&one).unwrap()), 1);
        assert_eq!(page_count(&render(&three).unwrap()), 3);
    }

    #[test]
    fn test_region_colors_stable_across_charts() {
        let a = snapshot("a", &[("2023-01-01", "svc1", "3"), ("2023-01-01", "svc2", "3")]);
        let b = snapshot("b", &[("2023-01-01", "svc1", "3"), ("2023-01-01", "svc2", "3")]);
        let charts = charts(&aggregate(&[a, b]), &keep(&["svc1", "svc2"])).unwrap();
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].series[1].color, charts[1].series[1].color);
    }

    #[test]
    fn test_mixed_units_rejected() {
        let mut other = record("a", "svc1", "2023-01-02", "1");
        other.unit = "GB".to_string();
        let table = SpendingTable::new(vec![record("a", "svc1", "2023-01-01", "1"), other]);
        assert!(charts(&table, &keep(&["svc1"])).is_err());
    }

    #[test]
    fn test_unknown_category_has_no_chart() {
        let table = SpendingTable::new(vec![record("a", "svc1", "2023-01-01", "10")]);
        assert!(charts(&table, &keep(&["nope"])).unwrap().is_empty());
    }

    #[test]
    fn test_y_axis() {
        let (lo, hi, ticks) = y_axis([0.5, 7.2, 3.0].into_iter());
        assert_eq!(lo, 0.0);
        assert!(hi >= 7.2);
        assert_eq!(ticks.first().copied(), Some(0.0));
        assert_eq!(ticks.last().copied(), Some(hi));

        let (lo, hi, _) = y_axis([0.0, 0.0].into_iter());
        assert_eq!(lo, 0.0);
        assert!((hi - 1.0).abs() < 1e-9);

        let (lo, _, _) = y_axis([-2.5, 4.0].into_iter());
        assert!(lo <= -2.5);
    }

    #[test]
    fn test_nice_step() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert!(close(nice_step(0.13), 0.2));
        assert!(close(nice_step(3.0), 5.0));
        assert!(close(nice_step(70.0), 100.0));
        assert!(close(nice_step(0.0), 1.0));
    }

    #[test]
    fn test_date_label() {
        assert_eq!(date_label("2023-01-01"), "2023-01-01");
        assert_eq!(date_label("2023-01-01T05:00:00Z"), "2023-01-01 05:00");
    }

    #[test]
    fn test_render_empty_is_error() {
        assert!(render(&[]).is_err());
    }

    #[tokio::test]
    async fn test_save_multi_page_pdf() {
        let a = snapshot("a", &[("2023-01-01", "svc1", "6"), ("2023-01-02", "svc2", "8")]);
        let charts = charts(&aggregate(&[a]), &keep(&["svc1", "svc2"])).unwrap();
        let dir = TempDir::new().unwrap();
        let outdir = dir.path().join("img");
        let path = save(&charts, &outdir).await.unwrap();
        assert_eq!(path, outdir.join(PDF_NAME));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(page_count(&bytes), 2);
    }
}
