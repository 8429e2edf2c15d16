//! PNG bar charts of the distribution tables and the monthly split.
//!
//! Layout mirrors the analysis folders: one stacked chart per time part under
//! `reszletes/`, a 2x2 summary with a legend panel per grouping under
//! `osszesitett/`, and `havi_orai_otthoni.png` at the top level.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use thiserror::Error;

use crate::report::{DistributionRow, Grouping, MonthlySplit, TimePart};

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("drawing failed: {0}")]
    Draw(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Draw(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;

const FONT_FAMILY: &str = "sans-serif";
const FONT_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
];

/// Registers the first readable font; `PM_CHART_FONT` takes precedence.
static TEXT_ENABLED: Lazy<bool> = Lazy::new(|| {
    let candidates = env::var_os("PM_CHART_FONT")
        .map(PathBuf::from)
        .into_iter()
        .chain(FONT_PATHS.iter().map(PathBuf::from));
    for path in candidates {
        let Ok(bytes) = fs::read(&path) else {
            continue;
        };
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
            tracing::debug!(font = %path.display(), "chart font registered");
            return true;
        }
    }
    tracing::warn!("no chart font found, charts are drawn without labels");
    false
});

const CATEGORY_COLORS: [(&str, RGBColor); 6] = [
    ("Orai", RGBColor(0xFF, 0xD7, 0x00)),
    ("Hazi", RGBColor(0xFF, 0x8C, 0x00)),
    ("Admin", RGBColor(0x2E, 0x8B, 0x57)),
    ("Szamonkeres", RGBColor(0xDC, 0x14, 0x3C)),
    ("Extra", RGBColor(0x93, 0x70, 0xDB)),
    ("Egyéb", RGBColor(0x70, 0x80, 0x90)),
];

const WORK_MODE_COLORS: [(&str, RGBColor); 2] = [
    ("Órai", RGBColor(0xFF, 0xD7, 0x00)),
    ("Otthoni", RGBColor(0x41, 0x69, 0xE1)),
];

const THREE_WAY_COLORS: [(&str, RGBColor); 3] = [
    ("Otthoni", RGBColor(0x41, 0x69, 0xE1)),
    ("Órai – nem számonkérés", RGBColor(0xFF, 0xD7, 0x00)),
    ("Órai – számonkérés", RGBColor(0xDC, 0x14, 0x3C)),
];

const CHARTED_PARTS: [TimePart; 3] = [TimePart::Month, TimePart::IsoWeek, TimePart::Hour];

fn palette(grouping: Grouping) -> &'static [(&'static str, RGBColor)] {
    match grouping {
        Grouping::Category => &CATEGORY_COLORS,
        Grouping::WorkMode => &WORK_MODE_COLORS,
        Grouping::ThreeWay => &THREE_WAY_COLORS,
    }
}

fn summary_file(grouping: Grouping) -> &'static str {
    match grouping {
        Grouping::Category => "osszegzo_kategoriak_legenda.png",
        Grouping::WorkMode => "osszegzo_orai_otthoni_legenda.png",
        Grouping::ThreeWay => "osszegzo_3kategoria_legenda.png",
    }
}

/// Per-part detail chart; the three-way split only appears in the summary.
fn detail_file(grouping: Grouping, part: TimePart) -> Option<String> {
    match grouping {
        Grouping::Category => Some(format!("esemenyek_{}_kategoriak.png", part.as_str())),
        Grouping::WorkMode => Some(format!("orai_otthoni_{}.png", part.as_str())),
        Grouping::ThreeWay => None,
    }
}

/// Bar heights per bucket, one series per palette entry, bottom to top.
struct Stack {
    buckets: Vec<u32>,
    series: Vec<(&'static str, RGBColor, Vec<usize>)>,
}

impl Stack {
    fn build(rows: &[DistributionRow], part: TimePart, palette: &[(&'static str, RGBColor)]) -> Self {
        let rows: Vec<&DistributionRow> = rows.iter().filter(|r| r.time_part == part.as_str()).collect();
        let mut buckets: Vec<u32> = rows.iter().map(|r| r.bucket).collect();
        buckets.sort_unstable();
        buckets.dedup();

        let series = palette
            .iter()
            .map(|&(label, color)| {
                let counts: Vec<usize> = buckets
                    .iter()
                    .map(|&bucket| {
                        rows.iter()
                            .filter(|r| r.bucket == bucket && r.label == label)
                            .map(|r| r.count)
                            .sum::<usize>()
                    })
                    .collect();
                (label, color, counts)
            })
            .collect();
        Stack { buckets, series }
    }

    fn tallest(&self) -> usize {
        (0..self.buckets.len())
            .map(|i| self.series.iter().map(|(_, _, counts)| counts[i]).sum::<usize>())
            .max()
            .unwrap_or(0)
    }
}

fn bucket_label(buckets: &[u32], x: f64) -> String {
    let index = x.floor();
    if index < 0.0 || (x - index - 0.5).abs() > 0.25 {
        return String::new();
    }
    buckets.get(index as usize).map(u32::to_string).unwrap_or_default()
}

fn draw_stack(area: &DrawingArea<BitMapBackend<'_>, Shift>, title: &str, x_desc: &str, stack: &Stack) -> Result<()> {
    let width = stack.buckets.len().max(1) as f64;
    let top = (stack.tallest().max(1) as f64) * 1.1;

    let mut builder = ChartBuilder::on(area);
    builder.margin(10);
    if *TEXT_ENABLED {
        builder
            .caption(title, (FONT_FAMILY, 22))
            .x_label_area_size(35)
            .y_label_area_size(50);
    }
    let mut chart = builder.build_cartesian_2d(0f64..width, 0f64..top)?;
    if *TEXT_ENABLED {
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(stack.buckets.len().max(1) * 2)
            .x_label_formatter(&|x| bucket_label(&stack.buckets, *x))
            .x_desc(x_desc)
            .y_desc("Események száma")
            .draw()?;
    }

    let mut base = vec![0usize; stack.buckets.len()];
    for (_, color, counts) in &stack.series {
        let bars = counts.iter().enumerate().filter(|(_, count)| **count > 0).map(|(i, &count)| {
            let x = i as f64;
            Rectangle::new(
                [(x + 0.1, base[i] as f64), (x + 0.9, (base[i] + count) as f64)],
                color.filled(),
            )
        });
        chart.draw_series(bars)?;
        for (i, count) in counts.iter().enumerate() {
            base[i] += count;
        }
    }
    Ok(())
}

fn draw_legend(area: &DrawingArea<BitMapBackend<'_>, Shift>, palette: &[(&str, RGBColor)]) -> Result<()> {
    for (row, (label, color)) in palette.iter().enumerate() {
        let y = 40 + row as i32 * 36;
        area.draw(&Rectangle::new([(40, y), (64, y + 24)], color.filled()))?;
        if *TEXT_ENABLED {
            area.draw(&Text::new(label.to_string(), (76, y + 4), (FONT_FAMILY, 20)))?;
        }
    }
    Ok(())
}

fn render_detail(path: &Path, title: &str, part: TimePart, stack: &Stack) -> Result<()> {
    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    draw_stack(&root, title, part.as_str(), stack)?;
    root.present()?;
    Ok(())
}

fn render_summary(path: &Path, grouping: Grouping, rows: &[DistributionRow]) -> Result<()> {
    let root = BitMapBackend::new(path, (1600, 1000)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));
    for (panel, part) in panels.iter().zip(CHARTED_PARTS) {
        let stack = Stack::build(rows, part, palette(grouping));
        draw_stack(panel, &format!("Események / {}", part.as_str()), part.as_str(), &stack)?;
    }
    if let Some(legend) = panels.get(3) {
        draw_legend(legend, palette(grouping))?;
    }
    root.present()?;
    Ok(())
}

fn render_monthly(path: &Path, monthly: &[MonthlySplit]) -> Result<()> {
    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let width = monthly.len().max(1) as f64;
    let tallest = monthly.iter().map(|m| m.in_class.max(m.at_home)).max().unwrap_or(0);
    let top = (tallest.max(1) as f64) * 1.1;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(10);
    if *TEXT_ENABLED {
        builder
            .caption("Órai és otthoni események havonta", (FONT_FAMILY, 24))
            .x_label_area_size(35)
            .y_label_area_size(50);
    }
    let mut chart = builder.build_cartesian_2d(0f64..width, 0f64..top)?;
    if *TEXT_ENABLED {
        let months: Vec<&str> = monthly.iter().map(|m| m.month.as_str()).collect();
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(monthly.len().max(1) * 2)
            .x_label_formatter(&|x| {
                let index = x.floor();
                if index < 0.0 || (x - index - 0.5).abs() > 0.25 {
                    return String::new();
                }
                months.get(index as usize).map(|m| m.to_string()).unwrap_or_default()
            })
            .x_desc("hónap")
            .y_desc("Események száma")
            .draw()?;
    }

    let [(_, in_class), (_, at_home)] = WORK_MODE_COLORS;
    for (i, month) in monthly.iter().enumerate() {
        let x = i as f64;
        chart.draw_series([
            Rectangle::new([(x + 0.1, 0.0), (x + 0.48, month.in_class as f64)], in_class.filled()),
            Rectangle::new([(x + 0.52, 0.0), (x + 0.9, month.at_home as f64)], at_home.filled()),
        ])?;
    }
    root.present()?;
    Ok(())
}

/// Renders every chart under `out_dir` and returns the written files.
pub fn render_charts(
    distributions: &[(Grouping, Vec<DistributionRow>)],
    monthly: &[MonthlySplit],
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let summary_dir = out_dir.join("osszesitett");
    let detail_dir = out_dir.join("reszletes");
    fs::create_dir_all(&summary_dir)?;
    fs::create_dir_all(&detail_dir)?;

    let mut files = Vec::new();
    for (grouping, rows) in distributions {
        for part in CHARTED_PARTS {
            let Some(name) = detail_file(*grouping, part) else {
                continue;
            };
            let path = detail_dir.join(name);
            let stack = Stack::build(rows, part, palette(*grouping));
            render_detail(&path, &format!("Események / {}", part.as_str()), part, &stack)?;
            files.push(path);
        }

        let path = summary_dir.join(summary_file(*grouping));
        render_summary(&path, *grouping, rows)?;
        files.push(path);
    }

    let path = out_dir.join("havi_orai_otthoni.png");
    render_monthly(&path, monthly)?;
    files.push(path);

    tracing::info!(charts = files.len(), out = %out_dir.display(), "charts rendered");
    Ok(files)
}
