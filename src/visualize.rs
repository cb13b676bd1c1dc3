// SVG figures for the overview, each evaluation run and the feature importances

use std::path::Path;

use anyhow::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::csv_reader::Transaction;
use crate::evaluation::EvaluationReport;
use crate::importance::FeatureImportance;
use crate::profile::mean_by_label;

const HISTOGRAM_BINS: usize = 50;
const BAR_WIDTH: f64 = 0.4;
const KDE_POINTS: usize = 200;

/// Diverging red/grey palette, grey end first.
const RED_GREY: [RGBColor; 6] = [
    RGBColor(77, 77, 77),
    RGBColor(135, 135, 135),
    RGBColor(224, 224, 224),
    RGBColor(253, 219, 199),
    RGBColor(214, 96, 77),
    RGBColor(178, 24, 43),
];

#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub regular: RGBColor,
    pub fraud: RGBColor,
    pub palette: [RGBColor; 6],
    pub font: String,
    pub title_size: u32,
    pub grid: bool,
}

impl ChartStyle {
    pub fn white_grid() -> Self {
        ChartStyle {
            regular: RED_GREY[0],
            fraud: RED_GREY[5],
            palette: RED_GREY,
            font: "sans-serif".to_string(),
            title_size: 24,
            grid: true,
        }
    }

    pub fn white() -> Self {
        ChartStyle {
            grid: false,
            ..Self::white_grid()
        }
    }

    fn gradient(&self, t: f64) -> RGBColor {
        let t = t.clamp(0.0, 1.0) * (self.palette.len() - 1) as f64;
        let lower = (t.floor() as usize).min(self.palette.len() - 2);
        let frac = t - lower as f64;
        let (a, b) = (self.palette[lower], self.palette[lower + 1]);
        let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
        RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
    }
}

/// Formats an amount as `$1,234.56`.
pub fn dollars(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u128;
    let digits = (cents / 100).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

fn percent(value: f64) -> String {
    format!("{:.4}%", value * 100.0)
}

/// Label for an integer key point, empty anywhere else.
fn category_label(labels: &[String], value: f64) -> String {
    let index = value.round();
    if (value - index).abs() > 1e-9 || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

// Label budget that makes plotters place one key point on each integer of
// `-0.5..n - 0.5`
fn category_key_points(n: usize) -> usize {
    n + 1
}

// Per-type [regular, fraud] counts in order of first appearance
fn type_counts(transactions: &[Transaction]) -> Vec<(String, [usize; 2])> {
    let mut counts: Vec<(String, [usize; 2])> = Vec::new();
    for tx in transactions {
        let label = tx.tx_type.label();
        let slot = match counts.iter().position(|(name, _)| name == label) {
            Some(pos) => pos,
            None => {
                counts.push((label.to_string(), [0, 0]));
                counts.len() - 1
            }
        };
        counts[slot].1[usize::from(tx.fraud)] += 1;
    }
    counts
}

struct LogHistogram {
    edges: Vec<f64>,
    counts: [Vec<usize>; 2],
    // natural logs of the amounts per label, for the density overlay
    logs: [Vec<f64>; 2],
}

impl LogHistogram {
    fn build(transactions: &[Transaction], bins: usize) -> Self {
        let positive: Vec<(f64, bool)> = transactions
            .iter()
            .filter_map(|tx| tx.amount.filter(|&a| a > 0.0).map(|a| (a, tx.fraud)))
            .collect();
        let lo = positive.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let hi = positive.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = match (lo.is_finite(), hi > lo) {
            (false, _) => (1.0, 10.0),
            (true, false) => (lo, lo * 10.0),
            (true, true) => (lo, hi),
        };

        let span = (hi / lo).ln();
        let edges = (0..=bins)
            .map(|k| lo * (span * k as f64 / bins as f64).exp())
            .collect();
        let mut counts = [vec![0; bins], vec![0; bins]];
        let mut logs = [Vec::new(), Vec::new()];
        for (amount, fraud) in positive {
            let bin = ((amount / lo).ln() / span * bins as f64).floor() as usize;
            counts[usize::from(fraud)][bin.min(bins - 1)] += 1;
            logs[usize::from(fraud)].push(amount.ln());
        }
        LogHistogram { edges, counts, logs }
    }

    // Gaussian KDE of one label's log amounts with Scott's bandwidth, scaled to
    // counts per bin so it overlays the bars. Empty below two distinct values.
    fn density_curve(&self, hue: usize, points: usize) -> Vec<(f64, f64)> {
        let logs = &self.logs[hue];
        let n = logs.len() as f64;
        if logs.len() < 2 || points < 2 {
            return Vec::new();
        }
        let mean = logs.iter().sum::<f64>() / n;
        let var = logs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let bandwidth = var.sqrt() * n.powf(-0.2);
        if bandwidth <= 0.0 {
            return Vec::new();
        }

        let (ln_lo, ln_hi) = (self.lo().ln(), self.hi().ln());
        let bin_width = (ln_hi - ln_lo) / (self.edges.len() - 1) as f64;
        let norm = n * bin_width / (bandwidth * (2.0 * std::f64::consts::PI).sqrt());
        (0..points)
            .map(|k| {
                let at = ln_lo + (ln_hi - ln_lo) * k as f64 / (points - 1) as f64;
                let kernel: f64 = logs
                    .iter()
                    .map(|v| (-0.5 * ((at - v) / bandwidth).powi(2)).exp())
                    .sum();
                (at.exp(), norm * kernel / n)
            })
            .collect()
    }

    fn lo(&self) -> f64 {
        self.edges[0]
    }

    fn hi(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    fn max_count(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

/// Counts and the histogram use the first `preview_rows` rows; the means use
/// every row.
pub fn render_overview(
    transactions: &[Transaction],
    preview_rows: usize,
    path: &Path,
    size: (u32, u32),
    style: &ChartStyle,
) -> Result<()> {
    let preview = &transactions[..preview_rows.min(transactions.len())];
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(
        "Number of Transactions per Type & Amount Distribution",
        (style.font.as_str(), style.title_size),
    )?;
    let panels = root.split_evenly((2, 1));

    draw_type_counts(&panels[0], preview, style)?;
    let means = [
        mean_by_label(transactions, 0, false),
        mean_by_label(transactions, 0, true),
    ];
    draw_amount_histogram(&panels[1], preview, means, style)?;

    root.present()?;
    Ok(())
}

fn draw_type_counts<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    transactions: &[Transaction],
    style: &ChartStyle,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let counts = type_counts(transactions);
    let labels: Vec<String> = counts.iter().map(|(name, _)| name.clone()).collect();
    let n = counts.len().max(1);
    let top = counts
        .iter()
        .flat_map(|(_, c)| c.iter().copied())
        .max()
        .unwrap_or(1)
        .max(1);

    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(
            -0.5f64..n as f64 - 0.5,
            (1f64..top as f64 * 2.0).log_scale(),
        )?;

    let x_formatter = |v: &f64| category_label(&labels, *v);
    let y_formatter = |v: &f64| format!("{v:.0}");
    let mut mesh = chart.configure_mesh();
    mesh.x_desc("Type")
        .y_desc("Number of Observations")
        .x_labels(category_key_points(n))
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .label_style((style.font.as_str(), 14));
    if !style.grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    for (hue, (name, color)) in [("Regular", style.regular), ("Fraud", style.fraud)]
        .into_iter()
        .enumerate()
    {
        let offset = hue as f64 * BAR_WIDTH - BAR_WIDTH;
        chart
            .draw_series(counts.iter().enumerate().filter(|(_, (_, c))| c[hue] > 0).map(
                |(i, (_, c))| {
                    let left = i as f64 + offset;
                    Rectangle::new(
                        [(left, 1.0), (left + BAR_WIDTH, c[hue] as f64)],
                        color.filled(),
                    )
                },
            ))?
            .label(name)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((style.font.as_str(), 14))
        .draw()?;
    Ok(())
}

fn draw_amount_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    transactions: &[Transaction],
    means: [Option<f64>; 2],
    style: &ChartStyle,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let hist = LogHistogram::build(transactions, HISTOGRAM_BINS);
    let (lo, hi) = (hist.lo(), hist.hi());
    let y_top = hist.max_count().max(1) as f64 * 1.1;

    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d((lo..hi).log_scale(), 0f64..y_top)?;

    let plain = |v: &f64| format!("{v:.0}");
    let mut mesh = chart.configure_mesh();
    mesh.x_desc("Amount")
        .y_desc("Number of Observations")
        .x_label_formatter(&plain)
        .y_label_formatter(&plain)
        .label_style((style.font.as_str(), 14));
    if !style.grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    let colors = [style.regular, style.fraud];
    for (hue, (name, color)) in ["Regular", "Fraud"].into_iter().zip(colors).enumerate() {
        let edges = &hist.edges;
        chart
            .draw_series(hist.counts[hue].iter().enumerate().filter(|&(_, &c)| c > 0).map(
                |(bin, &c)| {
                    Rectangle::new(
                        [(edges[bin], 0.0), (edges[bin + 1], c as f64)],
                        color.mix(0.35).filled(),
                    )
                },
            ))?
            .label(name)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        chart.draw_series(LineSeries::new(
            hist.density_curve(hue, KDE_POINTS),
            color.stroke_width(2),
        ))?;
    }

    let italic = (style.font.as_str(), 14)
        .into_font()
        .style(FontStyle::Italic)
        .color(&BLACK);
    let at_fraction = |fx: f64, fy: f64| (lo * (hi / lo).powf(fx), y_top * fy);
    let captions = [
        ("regular", means[0], colors[0], 0.5),
        ("fraudulent", means[1], colors[1], 0.3),
    ];
    for (kind, mean, color, fy) in captions {
        let Some(mean) = mean else { continue };
        if mean >= lo && mean <= hi {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(mean, 0.0), (mean, y_top)],
                color.stroke_width(2),
            )))?;
        }
        chart.draw_series([
            Text::new("Mean Amount".to_string(), at_fraction(0.1, fy + 0.06), italic.clone()),
            Text::new(
                format!("for {kind} transactions: {}", dollars(mean)),
                at_fraction(0.1, fy),
                italic.clone(),
            ),
        ])?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((style.font.as_str(), 14))
        .draw()?;
    Ok(())
}

/// ROC curve on the left, normalized confusion matrix on the right, with the
/// run's ROC-AUC and F1 in the title.
pub fn render_roc_confusion(
    report: &EvaluationReport,
    path: &Path,
    size: (u32, u32),
    style: &ChartStyle,
) -> Result<()> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let title = (style.font.as_str(), style.title_size);
    let root = root
        .titled("ROC AUC Score & Confusion Matrix", title)?
        .titled(&format!("ROC AUC Score: {}", percent(report.roc_auc)), title)?
        .titled(&format!("F1-Score: {}", percent(report.f1)), title)?;
    let panels = root.split_evenly((1, 2));

    let mut roc = ChartBuilder::on(&panels[0])
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..1f64, 0f64..1f64)?;
    let mut mesh = roc.configure_mesh();
    mesh.x_desc("Fallout")
        .y_desc("Sensitivity")
        .label_style((style.font.as_str(), 14));
    if !style.grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;
    roc.draw_series(LineSeries::new(
        vec![(0.0, 0.0), (1.0, 1.0)],
        style.regular.stroke_width(1),
    ))?;
    roc.draw_series(LineSeries::new(
        report.roc.fpr.iter().copied().zip(report.roc.tpr.iter().copied()),
        style.fraud.stroke_width(2),
    ))?;

    draw_confusion(&panels[1], report, style)?;
    root.present()?;
    Ok(())
}

fn draw_confusion<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    report: &EvaluationReport,
    style: &ChartStyle,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let cells = report.confusion.normalized();
    let labels = vec!["False".to_string(), "True".to_string()];
    let peak = cells.iter().flatten().copied().fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..1.5f64, -0.5f64..1.5f64)?;

    // Row 0 (actual regular) is drawn on top.
    let x_formatter = |v: &f64| category_label(&labels, *v);
    let y_formatter = |v: &f64| category_label(&labels, 1.0 - *v);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Predicted label")
        .y_desc("True label")
        .x_labels(category_key_points(2))
        .y_labels(category_key_points(2))
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .label_style((style.font.as_str(), 14))
        .draw()?;

    let centered = Pos::new(HPos::Center, VPos::Center);
    for (row, values) in cells.iter().enumerate() {
        for (col, &value) in values.iter().enumerate() {
            let t = if peak > 0.0 { value / peak } else { 0.0 };
            let fill = style.gradient(t);
            let (x, y) = (col as f64, 1.0 - row as f64);
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                fill.filled(),
            )))?;

            let luminance =
                0.299 * fill.0 as f64 + 0.587 * fill.1 as f64 + 0.114 * fill.2 as f64;
            let ink = if luminance < 140.0 { WHITE } else { BLACK };
            let font = TextStyle::from((style.font.as_str(), 18).into_font())
                .color(&ink)
                .pos(centered);
            chart.draw_series(std::iter::once(Text::new(
                percent(value),
                (x, y),
                font,
            )))?;
        }
    }
    Ok(())
}

/// Horizontal bars of the given importances, strongest on top.
pub fn render_feature_importance(
    importances: &[FeatureImportance],
    path: &Path,
    size: (u32, u32),
    style: &ChartStyle,
) -> Result<()> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Main Feature Importances", (style.font.as_str(), style.title_size))?;

    let n = importances.len().max(1);
    // Bar 0 sits on the top row.
    let labels: Vec<String> = importances.iter().rev().map(|f| f.feature.clone()).collect();
    let top = importances
        .iter()
        .map(|f| f.value)
        .fold(0.0, f64::max)
        .max(1.0)
        * 1.05;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(220)
        .build_cartesian_2d(0f64..top, -0.5f64..n as f64 - 0.5)?;

    let y_formatter = |v: &f64| category_label(&labels, *v);
    let mut mesh = chart.configure_mesh();
    mesh.x_desc("Values")
        .y_desc("Features")
        .y_labels(category_key_points(n))
        .y_label_formatter(&y_formatter)
        .label_style((style.font.as_str(), 14));
    if !style.grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    chart.draw_series(importances.iter().enumerate().map(|(rank, imp)| {
        let y = (n - 1 - rank) as f64;
        let t = if n > 1 { 1.0 - rank as f64 / (n - 1) as f64 } else { 1.0 };
        Rectangle::new(
            [(0.0, y - BAR_WIDTH), (imp.value, y + BAR_WIDTH)],
            style.gradient(t).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_reader::read_transactions_from;
    use crate::evaluation::{apply_threshold, evaluate};
    use ndarray::array;

    fn sample() -> Vec<Transaction> {
        let csv = "type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud\n\
                   TRANSFER,181.0,C1,181.0,0.0,C2,0.0,0.0,1,0\n\
                   CASH_OUT,181.0,C3,181.0,0.0,C4,21182.0,0.0,1,0\n\
                   PAYMENT,9839.64,C5,170136.0,160296.36,M6,0.0,0.0,0,0\n\
                   PAYMENT,1864.28,C7,21249.0,19384.72,M8,0.0,0.0,0,0\n\
                   CASH_IN,229133.94,C9,15325.0,0.0,C10,5083.0,51513.44,0,0\n";
        read_transactions_from(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_dollars_groups_thousands() {
        assert_eq!(dollars(0.0), "$0.00");
        assert_eq!(dollars(181.0), "$181.00");
        assert_eq!(dollars(1234.5), "$1,234.50");
        assert_eq!(dollars(1_234_567.891), "$1,234,567.89");
        assert_eq!(dollars(-42.1), "-$42.10");
    }

    #[test]
    fn test_type_counts_keep_first_appearance() {
        let counts = type_counts(&sample());
        let names: Vec<&str> = counts.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Transfer", "Cash Out", "Payment", "Cash In"]);
        assert_eq!(counts[0].1, [0, 1]);
        assert_eq!(counts[2].1, [2, 0]);
    }

    #[test]
    fn test_log_histogram_covers_every_positive_amount() {
        let hist = LogHistogram::build(&sample(), 10);
        let total: usize = hist.counts.iter().flatten().sum();
        assert_eq!(total, 5);
        assert_eq!(hist.counts[1].iter().sum::<usize>(), 2);
        assert_eq!(hist.lo(), 181.0);
        assert!((hist.hi() - 229133.94).abs() < 1e-6);
    }

    #[test]
    fn test_density_curve_matches_histogram_area() {
        let csv_head = "type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,\
                        oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud\n";
        let mut csv = csv_head.to_string();
        for i in 0..100 {
            let amount = 10f64.powf(1.0 + 2.0 * i as f64 / 99.0);
            csv.push_str(&format!("PAYMENT,{amount},C{i},0.0,0.0,M{i},0.0,0.0,0,0\n"));
        }
        let hist = LogHistogram::build(&read_transactions_from(csv.as_bytes()).unwrap(), 20);
        let curve = hist.density_curve(0, 200);
        assert_eq!(curve.len(), 200);
        assert!((curve[0].0 - hist.lo()).abs() < 1e-6);
        assert!((curve[199].0 - hist.hi()).abs() < 1e-6);

        // Area under the curve in bin units is the row count minus the tails
        // past the data range.
        let bin_width = (hist.hi() / hist.lo()).ln() / 20.0;
        let step = (hist.hi() / hist.lo()).ln() / 199.0;
        let area: f64 = curve.windows(2).map(|w| (w[0].1 + w[1].1) / 2.0 * step).sum();
        let rows = area / bin_width;
        assert!(rows > 80.0 && rows < 100.0, "rows {rows}");

        // no fraud rows means no overlay
        assert!(hist.density_curve(1, 200).is_empty());
    }

    #[test]
    fn test_gradient_endpoints() {
        let style = ChartStyle::white();
        assert_eq!(style.gradient(0.0), style.palette[0]);
        assert_eq!(style.gradient(1.0), style.palette[5]);
        assert!(!style.grid);
    }

    #[test]
    fn test_category_axes_put_a_key_point_on_every_category() {
        use plotters::coord::ranged1d::Ranged;
        use plotters::coord::types::RangedCoordf64;

        for n in [1usize, 2, 5, 15] {
            let axis: RangedCoordf64 = (-0.5..n as f64 - 0.5).into();
            let points = axis.key_points(category_key_points(n));
            assert_eq!(points.len(), n, "categories {n}: {points:?}");
            for (i, p) in points.iter().enumerate() {
                assert!((p - i as f64).abs() < 1e-9, "categories {n}: {points:?}");
            }
        }
    }

    #[test]
    fn test_category_label_only_on_integers() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_label(&labels, 1.0), "b");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, 2.0), "");
        assert_eq!(category_label(&labels, -1.0), "");
    }

    #[test]
    fn test_figures_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let style = ChartStyle::white_grid();

        let overview = dir.path().join("overview.svg");
        render_overview(&sample(), 100_000, &overview, (800, 800), &style).unwrap();

        let y = array![false, false, true, true];
        let scores = array![0.1, 0.6, 0.35, 0.8];
        let pred = apply_threshold(scores.view(), 0.5);
        let report = evaluate("baseline", y.view(), pred.view(), scores.view()).unwrap();
        let roc = dir.path().join("roc_baseline.svg");
        render_roc_confusion(&report, &roc, (1000, 500), &ChartStyle::white()).unwrap();

        let importances = vec![
            FeatureImportance {
                code: "f0".to_string(),
                feature: "Amount".to_string(),
                value: 12.0,
            },
            FeatureImportance {
                code: "f3".to_string(),
                feature: "Destination Before".to_string(),
                value: 5.0,
            },
        ];
        let bars = dir.path().join("feature_importance.svg");
        render_feature_importance(&importances, &bars, (1000, 400), &style).unwrap();

        for path in [overview, roc, bars] {
            let svg = std::fs::read_to_string(&path).unwrap();
            assert!(svg.contains("<svg"), "{}", path.display());
        }
        let svg = std::fs::read_to_string(dir.path().join("roc_baseline.svg")).unwrap();
        assert!(svg.contains("ROC AUC Score: 75.0000%"));
    }
}
