//! Directly-follows graph over an event log: frequencies, median durations,
//! start and end activities, exported as CSV and Graphviz DOT.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use graphviz_rust::cmd::{CommandArg, Format};
use graphviz_rust::dot_generator::*;
use graphviz_rust::dot_structures::*;
use graphviz_rust::exec;
use graphviz_rust::printer::{DotPrinter, PrinterContext};
use serde::Serialize;

use crate::error::Result;
use crate::event_log::EventLog;

pub const MAX_DRAWN_EDGES: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DfgEdge {
    pub source: String,
    pub target: String,
    pub frequency: usize,
    pub median_seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dfg {
    /// Sorted by frequency (descending), then source and target.
    pub edges: Vec<DfgEdge>,
    pub start_activities: BTreeMap<String, usize>,
    pub end_activities: BTreeMap<String, usize>,
}

fn median(values: &mut [i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let middle = values.len() / 2;
    if values.len() % 2 == 1 {
        values[middle]
    } else {
        (values[middle - 1] + values[middle]) / 2
    }
}

impl Dfg {
    pub fn from_log(log: &EventLog) -> Self {
        let mut durations: BTreeMap<(&str, &str), Vec<i64>> = BTreeMap::new();
        let mut dfg = Dfg::default();

        for trace in &log.traces {
            if let (Some(first), Some(last)) = (trace.events.first(), trace.events.last()) {
                *dfg.start_activities.entry(first.activity.clone()).or_insert(0) += 1;
                *dfg.end_activities.entry(last.activity.clone()).or_insert(0) += 1;
            }
            for pair in trace.events.windows(2) {
                let seconds = (pair[1].timestamp - pair[0].timestamp).num_seconds().max(0);
                durations
                    .entry((pair[0].activity.as_str(), pair[1].activity.as_str()))
                    .or_default()
                    .push(seconds);
            }
        }

        dfg.edges = durations
            .into_iter()
            .map(|((source, target), mut seconds)| DfgEdge {
                source: source.to_string(),
                target: target.to_string(),
                frequency: seconds.len(),
                median_seconds: median(&mut seconds),
            })
            .collect();
        dfg.edges.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });
        dfg
    }

    /// Frequency view: the `limit` most frequent edges plus start/end markers.
    pub fn to_graph(&self, limit: usize) -> Graph {
        let drawn = &self.edges[..self.edges.len().min(limit)];
        let mut activities: BTreeMap<&str, String> = BTreeMap::new();
        for edge in drawn {
            activities.entry(edge.source.as_str()).or_default();
            activities.entry(edge.target.as_str()).or_default();
        }
        for name in self.start_activities.keys().chain(self.end_activities.keys()) {
            activities.entry(name.as_str()).or_default();
        }
        for (index, id) in activities.values_mut().enumerate() {
            *id = format!("n{index}");
        }

        let mut g = graph!(di id!("dfg"));
        g.add_stmt(stmt!(attr!("rankdir", "LR")));
        g.add_stmt(stmt!(GraphAttributes::Node(vec![
            attr!("shape", "box"),
            attr!("style", "rounded")
        ])));
        for (marker, color) in [(START_NODE, "green"), (END_NODE, "orange")] {
            g.add_stmt(stmt!(node!(marker;
                attr!("shape", "circle"),
                Attribute(id!("label"), quoted("")),
                attr!("style", "filled"),
                attr!("fillcolor", color)
            )));
        }
        for (name, id) in &activities {
            g.add_stmt(stmt!(node!(id; Attribute(id!("label"), quoted(name)))));
        }

        for (name, count) in &self.start_activities {
            let target = &activities[name.as_str()];
            g.add_stmt(stmt!(edge!(node_id!(START_NODE) => node_id!(target);
                Attribute(id!("label"), quoted(&count.to_string()))
            )));
        }
        for edge in drawn {
            let source = &activities[edge.source.as_str()];
            let target = &activities[edge.target.as_str()];
            let width = format!("{:.1}", pen_width(edge.frequency, drawn));
            g.add_stmt(stmt!(edge!(node_id!(source) => node_id!(target);
                Attribute(id!("label"), quoted(&edge.frequency.to_string())),
                attr!("penwidth", width)
            )));
        }
        for (name, count) in &self.end_activities {
            let source = &activities[name.as_str()];
            g.add_stmt(stmt!(edge!(node_id!(source) => node_id!(END_NODE);
                Attribute(id!("label"), quoted(&count.to_string()))
            )));
        }
        g
    }

    pub fn to_dot(&self, limit: usize) -> String {
        self.to_graph(limit).print(&mut PrinterContext::default())
    }
}

const START_NODE: &str = "start";
const END_NODE: &str = "end";

/// Double-quoted DOT identifier.
fn quoted(text: &str) -> Id {
    Id::Escaped(format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")))
}

fn pen_width(frequency: usize, drawn: &[DfgEdge]) -> f64 {
    let max = drawn.iter().map(|e| e.frequency).max().unwrap_or(1).max(1);
    1.0 + 4.0 * frequency as f64 / max as f64
}

/// Lays the graph out with the `dot` binary. Missing Graphviz is not an error.
pub fn render_png(graph: Graph, path: &Path) -> bool {
    let output = path.to_string_lossy().into_owned();
    match exec(
        graph,
        &mut PrinterContext::default(),
        vec![CommandArg::Format(Format::Png), CommandArg::Output(output)],
    ) {
        Ok(_) if path.exists() => true,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "graphviz produced no image");
            false
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "graphviz unavailable, skipping PNG");
            false
        }
    }
}

/// Writes `dfg_edges.csv`, `dfg_frequency.dot` and, when Graphviz is installed,
/// `dfg_frequency.png` into `out_dir`.
pub fn write_dfg(dfg: &Dfg, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;

    let csv_path = out_dir.join("dfg_edges.csv");
    let mut writer = csv::Writer::from_path(&csv_path)?;
    for edge in &dfg.edges {
        writer.serialize(edge)?;
    }
    writer.flush()?;

    let graph = dfg.to_graph(MAX_DRAWN_EDGES);
    let dot_path = out_dir.join("dfg_frequency.dot");
    fs::write(&dot_path, graph.print(&mut PrinterContext::default()))?;
    let mut files = vec![csv_path, dot_path];

    let png_path = out_dir.join("dfg_frequency.png");
    if render_png(graph, &png_path) {
        files.push(png_path);
    }

    tracing::info!(
        edges = dfg.edges.len(),
        drawn = dfg.edges.len().min(MAX_DRAWN_EDGES),
        out = %out_dir.display(),
        "directly-follows graph written"
    );
    Ok(files)
}
