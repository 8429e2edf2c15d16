//! Process discovery and conformance through an external backend.
//!
//! Mining algorithms and conformance metrics are not computed here. A
//! [`DiscoveryBackend`] returns the model and metric values; this module ranks
//! the metric strategies, records every attempt and applies the structural
//! fallbacks when the backend cannot answer.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::error::Result;
use crate::event_log::EventLog;
use crate::export::save_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Miner {
    Alpha,
    Heuristics,
    Inductive,
    Fuzzy,
}

impl Miner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Miner::Alpha => "alpha",
            Miner::Heuristics => "heuristics",
            Miner::Inductive => "inductive",
            Miner::Fuzzy => "fuzzy",
        }
    }

    /// Fuzzy models are graphs, not Petri nets; no replay metrics apply.
    pub fn yields_petri_net(&self) -> bool {
        !matches!(self, Miner::Fuzzy)
    }
}

impl fmt::Display for Miner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristics Miner thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinerParams {
    pub dependency_threshold: f64,
    pub and_threshold: f64,
    pub loop_two_threshold: f64,
}

impl Default for MinerParams {
    fn default() -> Self {
        Self {
            dependency_threshold: 0.5,
            and_threshold: 0.65,
            loop_two_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub name: String,
    /// `None` for silent (tau) transitions.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyNode {
    pub node: String,
    pub significance: Option<f64>,
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyEdge {
    pub source: String,
    pub target: String,
    pub significance: Option<f64>,
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuzzyGraph {
    #[serde(default)]
    pub nodes: Vec<FuzzyNode>,
    #[serde(default)]
    pub edges: Vec<FuzzyEdge>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessModel {
    #[serde(default)]
    pub places: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub arcs: Vec<Flow>,
    #[serde(default)]
    pub fuzzy: Option<FuzzyGraph>,
    /// Places marked at the start; empty means every place without inputs.
    #[serde(default)]
    pub initial_marking: Vec<String>,
    /// Places marked at the end; empty means every place without outputs.
    #[serde(default)]
    pub final_marking: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub places: usize,
    pub transitions: usize,
    pub arcs: usize,
    pub visible_transitions: usize,
    pub silent_transitions: usize,
}

impl ProcessModel {
    pub fn info(&self) -> ModelInfo {
        let visible = self.transitions.iter().filter(|t| t.label.is_some()).count();
        ModelInfo {
            places: self.places.len(),
            transitions: self.transitions.len(),
            arcs: self.arcs.len(),
            visible_transitions: visible,
            silent_transitions: self.transitions.len() - visible,
        }
    }

    pub fn visible_labels(&self) -> BTreeSet<&str> {
        self.transitions
            .iter()
            .filter_map(|t| t.label.as_deref())
            .collect()
    }

    pub fn initial_places(&self) -> Vec<&str> {
        if !self.initial_marking.is_empty() {
            return self.initial_marking.iter().map(String::as_str).collect();
        }
        self.places
            .iter()
            .filter(|place| !self.arcs.iter().any(|arc| &arc.target == *place))
            .map(String::as_str)
            .collect()
    }

    pub fn final_places(&self) -> Vec<&str> {
        if !self.final_marking.is_empty() {
            return self.final_marking.iter().map(String::as_str).collect();
        }
        self.places
            .iter()
            .filter(|place| !self.arcs.iter().any(|arc| &arc.source == *place))
            .map(String::as_str)
            .collect()
    }

    /// `1 / (1 + arcs / (places + transitions))`, undefined for an empty net.
    pub fn structural_simplicity(&self) -> Option<f64> {
        if self.places.is_empty() || self.transitions.is_empty() {
            return None;
        }
        let nodes = (self.places.len() + self.transitions.len()) as f64;
        Some(1.0 / (1.0 + self.arcs.len() as f64 / nodes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Fitness,
    Precision,
    Generalization,
    Simplicity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TokenBased,
    AlignmentBased,
    AlignEtconformance,
    EtconformanceToken,
    Generalization,
    ReplayCoverage,
    ArcDegree,
    Structural,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::TokenBased => "token_based",
            Strategy::AlignmentBased => "alignment_based",
            Strategy::AlignEtconformance => "align_etconformance",
            Strategy::EtconformanceToken => "etconformance_token",
            Strategy::Generalization => "generalization",
            Strategy::ReplayCoverage => "replay_coverage",
            Strategy::ArcDegree => "arc_degree",
            Strategy::Structural => "structural",
        }
    }
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Fitness,
        MetricKind::Precision,
        MetricKind::Generalization,
        MetricKind::Simplicity,
    ];

    /// Strategies in the order they are tried.
    pub fn strategies(&self) -> &'static [Strategy] {
        match self {
            MetricKind::Fitness => &[Strategy::TokenBased, Strategy::AlignmentBased],
            MetricKind::Precision => &[Strategy::AlignEtconformance, Strategy::EtconformanceToken],
            MetricKind::Generalization => &[Strategy::Generalization, Strategy::ReplayCoverage],
            MetricKind::Simplicity => &[Strategy::ArcDegree, Strategy::Structural],
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            MetricKind::Fitness | MetricKind::Precision => 0.0,
            MetricKind::Generalization | MetricKind::Simplicity => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Fitness => "fitness",
            MetricKind::Precision => "precision",
            MetricKind::Generalization => "generalization",
            MetricKind::Simplicity => "simplicity",
        }
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend command could not be run: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("backend protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("backend exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("strategy {0} is not supported by this backend")]
    Unsupported(&'static str),

    #[error("metric value {0} is outside [0, 1]")]
    OutOfRange(f64),

    #[error("model has no labelled transitions")]
    NoLabels,

    #[error("model has no places or transitions")]
    EmptyNet,
}

/// The log handed to a backend: the serialized file plus its parsed form.
#[derive(Debug, Clone, Copy)]
pub struct LogInput<'a> {
    pub xes_path: &'a Path,
    pub log: &'a EventLog,
}

pub trait DiscoveryBackend {
    fn discover(
        &self,
        input: LogInput<'_>,
        miner: Miner,
        params: &MinerParams,
    ) -> std::result::Result<ProcessModel, BackendError>;

    fn metric(
        &self,
        input: LogInput<'_>,
        model: &ProcessModel,
        strategy: Strategy,
    ) -> std::result::Result<f64, BackendError>;

    /// Labels of transitions fired while replaying the log.
    fn activated_transitions(
        &self,
        input: LogInput<'_>,
        model: &ProcessModel,
    ) -> std::result::Result<BTreeSet<String>, BackendError>;
}

/// Runs an external program per request: one JSON object on stdin, one on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

#[derive(Deserialize)]
struct MetricReply {
    value: f64,
}

#[derive(Deserialize)]
struct ActivatedReply {
    activated: BTreeSet<String>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a `PM_BACKEND` value on whitespace.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    fn call<T: DeserializeOwned>(&self, request: &serde_json::Value) -> std::result::Result<T, BackendError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&serde_json::to_vec(request)?) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.chars().take(500).collect(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl DiscoveryBackend for CommandBackend {
    fn discover(
        &self,
        input: LogInput<'_>,
        miner: Miner,
        params: &MinerParams,
    ) -> std::result::Result<ProcessModel, BackendError> {
        self.call(&json!({
            "op": "discover",
            "xes": input.xes_path.display().to_string(),
            "miner": miner,
            "params": params,
        }))
    }

    fn metric(
        &self,
        input: LogInput<'_>,
        model: &ProcessModel,
        strategy: Strategy,
    ) -> std::result::Result<f64, BackendError> {
        let reply: MetricReply = self.call(&json!({
            "op": "metric",
            "xes": input.xes_path.display().to_string(),
            "strategy": strategy,
            "model": model,
        }))?;
        Ok(reply.value)
    }

    fn activated_transitions(
        &self,
        input: LogInput<'_>,
        model: &ProcessModel,
    ) -> std::result::Result<BTreeSet<String>, BackendError> {
        let reply: ActivatedReply = self.call(&json!({
            "op": "activated_transitions",
            "xes": input.xes_path.display().to_string(),
            "model": model,
        }))?;
        Ok(reply.activated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricAttempt {
    pub metric: MetricKind,
    pub strategy: Strategy,
    pub value: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricOutcome {
    pub value: f64,
    /// `None` when every strategy failed and the default was used.
    pub source: Option<Strategy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub fitness: MetricOutcome,
    pub precision: MetricOutcome,
    pub generalization: MetricOutcome,
    pub simplicity: MetricOutcome,
    pub f_score: f64,
    pub attempts: Vec<MetricAttempt>,
}

impl QualityReport {
    pub fn values(&self) -> [(&'static str, f64); 5] {
        [
            ("fitness", self.fitness.value),
            ("precision", self.precision.value),
            ("generalization", self.generalization.value),
            ("simplicity", self.simplicity.value),
            ("f_score", self.f_score),
        ]
    }
}

/// Harmonic mean of fitness and precision; 0 unless both are positive.
pub fn f_score(fitness: f64, precision: f64) -> f64 {
    if fitness > 0.0 && precision > 0.0 {
        2.0 * fitness * precision / (fitness + precision)
    } else {
        0.0
    }
}

fn run_strategy(
    backend: &dyn DiscoveryBackend,
    input: LogInput<'_>,
    model: &ProcessModel,
    strategy: Strategy,
) -> std::result::Result<f64, BackendError> {
    let value = match strategy {
        Strategy::ReplayCoverage => {
            let labels = model.visible_labels();
            if labels.is_empty() {
                return Err(BackendError::NoLabels);
            }
            let activated = backend.activated_transitions(input, model)?;
            let covered = labels.iter().filter(|l| activated.contains(**l)).count();
            covered as f64 / labels.len() as f64
        }
        Strategy::Structural => model.structural_simplicity().ok_or(BackendError::EmptyNet)?,
        _ => backend.metric(input, model, strategy)?,
    };

    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(BackendError::OutOfRange(value))
    }
}

fn evaluate_metric(
    backend: &dyn DiscoveryBackend,
    input: LogInput<'_>,
    model: &ProcessModel,
    metric: MetricKind,
    attempts: &mut Vec<MetricAttempt>,
) -> MetricOutcome {
    for &strategy in metric.strategies() {
        match run_strategy(backend, input, model, strategy) {
            Ok(value) => {
                tracing::info!(metric = metric.as_str(), strategy = strategy.as_str(), value, "metric computed");
                attempts.push(MetricAttempt {
                    metric,
                    strategy,
                    value: Some(value),
                    error: None,
                });
                return MetricOutcome {
                    value,
                    source: Some(strategy),
                };
            }
            Err(err) => {
                tracing::warn!(
                    metric = metric.as_str(),
                    strategy = strategy.as_str(),
                    error = %err,
                    "metric strategy failed"
                );
                attempts.push(MetricAttempt {
                    metric,
                    strategy,
                    value: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let value = metric.default_value();
    tracing::warn!(metric = metric.as_str(), value, "all strategies failed, using default");
    MetricOutcome { value, source: None }
}

/// Tries each metric's strategies in rank order; never fails.
pub fn evaluate_metrics(
    backend: &dyn DiscoveryBackend,
    input: LogInput<'_>,
    model: &ProcessModel,
) -> QualityReport {
    let mut attempts = Vec::new();
    let [fitness, precision, generalization, simplicity] = MetricKind::ALL
        .map(|metric| evaluate_metric(backend, input, model, metric, &mut attempts));

    QualityReport {
        f_score: f_score(fitness.value, precision.value),
        fitness,
        precision,
        generalization,
        simplicity,
        attempts,
    }
}

#[derive(Debug, Serialize)]
pub struct LogSummary {
    pub traces: usize,
    pub events: usize,
}

#[derive(Debug, Serialize)]
pub struct MetricsDocument<'a> {
    pub xes_path: String,
    pub miner: Miner,
    pub log: LogSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<&'a MinerParams>,
    pub fitness: f64,
    pub precision: f64,
    pub generalization: f64,
    pub simplicity: f64,
    pub f_score: f64,
    pub model_info: ModelInfo,
    pub attempts: &'a [MetricAttempt],
}

impl<'a> MetricsDocument<'a> {
    pub fn new(
        input: LogInput<'_>,
        miner: Miner,
        params: &'a MinerParams,
        model: &ProcessModel,
        report: &'a QualityReport,
    ) -> Self {
        Self {
            xes_path: input.xes_path.display().to_string(),
            miner,
            log: LogSummary {
                traces: input.log.case_count(),
                events: input.log.event_count(),
            },
            parameters: (miner == Miner::Heuristics).then_some(params),
            fitness: report.fitness.value,
            precision: report.precision.value,
            generalization: report.generalization.value,
            simplicity: report.simplicity.value,
            f_score: report.f_score,
            model_info: model.info(),
            attempts: &report.attempts,
        }
    }
}

/// Writes `<miner>_metrics.json` and `<miner>_metrics.csv`.
pub fn write_metrics(doc: &MetricsDocument<'_>, report: &QualityReport, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let json_path = out_dir.join(format!("{}_metrics.json", doc.miner));
    save_json(doc, &json_path)?;

    let csv_path = out_dir.join(format!("{}_metrics.csv", doc.miner));
    let mut writer = csv::Writer::from_path(&csv_path)?;
    writer.write_record(["metric", "value"])?;
    for (name, value) in report.values() {
        writer.write_record([name, value.to_string().as_str()])?;
    }
    writer.flush()?;

    Ok(vec![json_path, csv_path])
}

/// Writes `fuzzy_nodes.csv`, `fuzzy_edges.csv` and `fuzzy_params.json`.
pub fn write_fuzzy_tables(graph: &FuzzyGraph, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;

    let nodes_path = out_dir.join("fuzzy_nodes.csv");
    let mut nodes = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&nodes_path)?;
    nodes.write_record(["node", "significance", "correlation"])?;
    for node in &graph.nodes {
        nodes.serialize(node)?;
    }
    nodes.flush()?;

    let edges_path = out_dir.join("fuzzy_edges.csv");
    let mut edges = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&edges_path)?;
    edges.write_record(["source", "target", "significance", "correlation"])?;
    for edge in &graph.edges {
        edges.serialize(edge)?;
    }
    edges.flush()?;

    let params_path = out_dir.join("fuzzy_params.json");
    save_json(&graph.params, &params_path)?;

    Ok(vec![nodes_path, edges_path, params_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockBackend {
        model: ProcessModel,
        values: HashMap<Strategy, f64>,
        activated: Option<BTreeSet<String>>,
    }

    impl DiscoveryBackend for MockBackend {
        fn discover(
            &self,
            _input: LogInput<'_>,
            _miner: Miner,
            _params: &MinerParams,
        ) -> std::result::Result<ProcessModel, BackendError> {
            Ok(self.model.clone())
        }

        fn metric(
            &self,
            _input: LogInput<'_>,
            _model: &ProcessModel,
            strategy: Strategy,
        ) -> std::result::Result<f64, BackendError> {
            self.values
                .get(&strategy)
                .copied()
                .ok_or(BackendError::Unsupported(strategy.as_str()))
        }

        fn activated_transitions(
            &self,
            _input: LogInput<'_>,
            _model: &ProcessModel,
        ) -> std::result::Result<BTreeSet<String>, BackendError> {
            self.activated.clone().ok_or(BackendError::Unsupported("replay"))
        }
    }

    fn net() -> ProcessModel {
        let transition = |name: &str, label: Option<&str>| Transition {
            name: name.to_string(),
            label: label.map(str::to_string),
        };
        let flow = |s: &str, t: &str| Flow {
            source: s.to_string(),
            target: t.to_string(),
        };
        ProcessModel {
            places: vec!["start".into(), "p1".into(), "end".into()],
            transitions: vec![
                transition("t1", Some("Orai")),
                transition("t2", Some("Hazi")),
                transition("tau", None),
            ],
            arcs: vec![
                flow("start", "t1"),
                flow("t1", "p1"),
                flow("p1", "t2"),
                flow("t2", "end"),
                flow("p1", "tau"),
                flow("tau", "end"),
            ],
            ..ProcessModel::default()
        }
    }

    fn input(log: &EventLog) -> LogInput<'_> {
        LogInput {
            xes_path: Path::new("log.xes"),
            log,
        }
    }

    #[test]
    fn model_info_counts_silent_transitions() {
        let info = net().info();
        assert_eq!(info.places, 3);
        assert_eq!(info.transitions, 3);
        assert_eq!(info.visible_transitions, 2);
        assert_eq!(info.silent_transitions, 1);
        assert_eq!(info.arcs, 6);
    }

    #[test]
    fn markings_default_to_source_and_sink_places() {
        let mut model = net();
        assert_eq!(model.initial_places(), vec!["start"]);
        assert_eq!(model.final_places(), vec!["end"]);

        model.final_marking = vec!["p1".into()];
        assert_eq!(model.final_places(), vec!["p1"]);
    }

    #[test]
    fn first_successful_strategy_wins() {
        let backend = MockBackend {
            model: net(),
            values: HashMap::from([
                (Strategy::TokenBased, 0.9),
                (Strategy::AlignmentBased, 0.1),
                (Strategy::AlignEtconformance, 0.6),
                (Strategy::Generalization, 0.7),
                (Strategy::ArcDegree, 0.8),
            ]),
            activated: None,
        };
        let log = EventLog::default();
        let report = evaluate_metrics(&backend, input(&log), &net());
        assert_eq!(report.fitness.value, 0.9);
        assert_eq!(report.fitness.source, Some(Strategy::TokenBased));
        assert_eq!(report.precision.value, 0.6);
        assert_eq!(report.attempts.len(), 4);
        assert!((report.f_score - 0.72).abs() < 1e-9);
    }

    #[test]
    fn fallbacks_run_in_rank_order() {
        let backend = MockBackend {
            model: net(),
            values: HashMap::from([(Strategy::EtconformanceToken, 0.4)]),
            activated: Some(BTreeSet::from(["Orai".to_string()])),
        };
        let log = EventLog::default();
        let report = evaluate_metrics(&backend, input(&log), &net());

        assert_eq!(report.fitness, MetricOutcome { value: 0.0, source: None });
        assert_eq!(report.precision.source, Some(Strategy::EtconformanceToken));
        assert_eq!(report.generalization.value, 0.5);
        assert_eq!(report.generalization.source, Some(Strategy::ReplayCoverage));
        assert_eq!(report.simplicity.source, Some(Strategy::Structural));
        assert!((report.simplicity.value - 0.5).abs() < 1e-9);
        assert_eq!(report.f_score, 0.0);

        let failed: Vec<Strategy> = report
            .attempts
            .iter()
            .filter(|a| a.error.is_some())
            .map(|a| a.strategy)
            .collect();
        assert_eq!(
            failed,
            vec![
                Strategy::TokenBased,
                Strategy::AlignmentBased,
                Strategy::AlignEtconformance,
                Strategy::Generalization,
                Strategy::ArcDegree,
            ]
        );
    }

    fn attempted(report: &QualityReport) -> Vec<(Strategy, bool)> {
        report
            .attempts
            .iter()
            .map(|a| (a.strategy, a.value.is_some()))
            .collect()
    }

    #[test]
    fn second_strategy_rescues_each_metric() {
        let backend = MockBackend {
            model: net(),
            values: HashMap::from([(Strategy::AlignmentBased, 0.8), (Strategy::EtconformanceToken, 0.4)]),
            activated: Some(BTreeSet::from(["Orai".to_string(), "Hazi".to_string()])),
        };
        let log = EventLog::default();
        let report = evaluate_metrics(&backend, input(&log), &net());

        assert_eq!(
            report.fitness,
            MetricOutcome {
                value: 0.8,
                source: Some(Strategy::AlignmentBased)
            }
        );
        assert_eq!(
            report.precision,
            MetricOutcome {
                value: 0.4,
                source: Some(Strategy::EtconformanceToken)
            }
        );
        assert_eq!(
            report.generalization,
            MetricOutcome {
                value: 1.0,
                source: Some(Strategy::ReplayCoverage)
            }
        );
        assert_eq!(report.simplicity.source, Some(Strategy::Structural));
        assert!((report.simplicity.value - 0.5).abs() < 1e-9);
        assert!((report.f_score - 0.64 / 1.2).abs() < 1e-9);

        assert_eq!(
            attempted(&report),
            vec![
                (Strategy::TokenBased, false),
                (Strategy::AlignmentBased, true),
                (Strategy::AlignEtconformance, false),
                (Strategy::EtconformanceToken, true),
                (Strategy::Generalization, false),
                (Strategy::ReplayCoverage, true),
                (Strategy::ArcDegree, false),
                (Strategy::Structural, true),
            ]
        );
        let metrics: Vec<MetricKind> = report.attempts.iter().map(|a| a.metric).collect();
        assert_eq!(metrics[..2], [MetricKind::Fitness; 2]);
        assert_eq!(metrics[6..], [MetricKind::Simplicity; 2]);
    }

    #[test]
    fn each_metric_defaults_when_every_strategy_fails() {
        let backend = MockBackend {
            model: ProcessModel::default(),
            values: HashMap::new(),
            activated: None,
        };
        let log = EventLog::default();
        let report = evaluate_metrics(&backend, input(&log), &ProcessModel::default());

        assert_eq!(report.fitness, MetricOutcome { value: 0.0, source: None });
        assert_eq!(report.precision, MetricOutcome { value: 0.0, source: None });
        assert_eq!(report.generalization, MetricOutcome { value: 0.5, source: None });
        assert_eq!(report.simplicity, MetricOutcome { value: 0.5, source: None });
        assert_eq!(report.f_score, 0.0);

        let expected: Vec<(Strategy, bool)> = MetricKind::ALL
            .iter()
            .flat_map(|metric| metric.strategies().iter().map(|&s| (s, false)))
            .collect();
        assert_eq!(attempted(&report), expected);
        assert_eq!(report.attempts.len(), 8);
        assert!(report.attempts.iter().all(|a| a.error.is_some()));
    }

    #[test]
    fn empty_net_falls_back_to_defaults() {
        let backend = MockBackend {
            model: ProcessModel::default(),
            values: HashMap::from([(Strategy::TokenBased, 1.7)]),
            activated: Some(BTreeSet::new()),
        };
        let log = EventLog::default();
        let report = evaluate_metrics(&backend, input(&log), &ProcessModel::default());
        assert_eq!(report.fitness.value, 0.0);
        assert_eq!(report.generalization.value, 0.5);
        assert_eq!(report.simplicity.value, 0.5);
        assert!(report.attempts[0].error.as_deref().unwrap_or("").contains("outside"));
    }

    #[test]
    fn f_score_is_harmonic_mean() {
        assert_eq!(f_score(0.0, 0.8), 0.0);
        assert!((f_score(0.5, 0.5) - 0.5).abs() < 1e-12);
        assert!((f_score(1.0, 0.5) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn metrics_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend {
            model: net(),
            values: HashMap::from([(Strategy::TokenBased, 1.0), (Strategy::AlignEtconformance, 1.0)]),
            activated: None,
        };
        let log = EventLog::default();
        let params = MinerParams::default();
        let model = backend.discover(input(&log), Miner::Heuristics, &params).unwrap();
        let report = evaluate_metrics(&backend, input(&log), &model);
        let doc = MetricsDocument::new(input(&log), Miner::Heuristics, &params, &model, &report);

        let paths = write_metrics(&doc, &report, dir.path()).unwrap();
        assert!(paths[0].ends_with("heuristics_metrics.json"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(json["miner"], "heuristics");
        assert_eq!(json["parameters"]["and_threshold"], 0.65);
        assert_eq!(json["model_info"]["places"], 3);

        let csv = fs::read_to_string(&paths[1]).unwrap();
        assert!(csv.starts_with("metric,value\n"));
        assert!(csv.contains("f_score,1\n"));
    }

    #[test]
    fn fuzzy_tables_keep_missing_values_blank() {
        let dir = tempfile::tempdir().unwrap();
        let graph = FuzzyGraph {
            nodes: vec![FuzzyNode {
                node: "Orai".into(),
                significance: Some(1.0),
                correlation: None,
            }],
            edges: vec![FuzzyEdge {
                source: "Orai".into(),
                target: "Hazi".into(),
                significance: Some(0.25),
                correlation: Some(0.5),
            }],
            params: serde_json::Map::new(),
        };
        write_fuzzy_tables(&graph, dir.path()).unwrap();

        let nodes = fs::read_to_string(dir.path().join("fuzzy_nodes.csv")).unwrap();
        assert_eq!(nodes, "node,significance,correlation\nOrai,1.0,\n");
        let edges = fs::read_to_string(dir.path().join("fuzzy_edges.csv")).unwrap();
        assert!(edges.ends_with("Orai,Hazi,0.25,0.5\n"));
        assert!(dir.path().join("fuzzy_params.json").exists());
    }

    #[test]
    fn command_line_is_split_on_whitespace() {
        let backend = CommandBackend::from_command_line("python3 -m pm_backend --json").unwrap();
        assert_eq!(backend.program, "python3");
        assert_eq!(backend.args, vec!["-m", "pm_backend", "--json"]);
        assert!(CommandBackend::from_command_line("   ").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_backend_speaks_json_over_stdio() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("backend.sh");
        fs::write(
            &script,
            "cat > /dev/null\necho '{\"places\":[\"p\"],\"transitions\":[{\"name\":\"t\",\"label\":\"Orai\"}],\"arcs\":[]}'\n",
        )
        .unwrap();
        let backend = CommandBackend::new("sh", vec![script.display().to_string()]);
        let log = EventLog::default();
        let model = backend
            .discover(input(&log), Miner::Alpha, &MinerParams::default())
            .unwrap();
        assert_eq!(model.places, vec!["p"]);
        assert_eq!(model.visible_labels().len(), 1);

        let failing = CommandBackend::new("sh", vec!["-c".into(), "echo boom >&2; exit 3".into()]);
        match failing.metric(input(&log), &model, Strategy::TokenBased) {
            Err(BackendError::Failed { code, stderr }) => {
                assert_eq!(code, 3);
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected backend failure, got {other:?}"),
        }
    }
}
