//! Stage entry points. Each stage reads the previous stage's artifacts from
//! [`ProjectPaths`] and writes its own.

use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{assign_categories, attach_week_plan, week_catalog, UNKNOWN_WEEK};
use crate::charts::render_charts;
use crate::cleaning::{apply_exclusions, apply_time_window, ExclusionRules};
use crate::config::{ProjectPaths, Settings};
use crate::dfg::{write_dfg, Dfg};
use crate::discovery::{
    evaluate_metrics, write_fuzzy_tables, write_metrics, DiscoveryBackend, LogInput, Miner, MinerParams,
    MetricsDocument, QualityReport,
};
use crate::error::{PipelineError, Result};
use crate::event_log::{ActivitySource, EventLog};
use crate::export::{save_csv, save_json, save_table};
use crate::extract::add_extracted_ids;
use crate::ingest::{load_raw_rows, read_headers, read_table};
use crate::models::{Category, EventRow, LoopFreeRow, RawEventRow, WeekCatalogEntry};
use crate::pnml::write_pnml_file;
use crate::report::{basic_stats, build_report, distribution, monthly_split, Grouping};
use crate::schedule::{label_rows, reclassify_exam_to_admin};
use crate::slicing::{add_time_parts, build_slices, drop_consecutive_repeats, split_users, Slice};
use crate::temporal::parse_hu_timestamp;
use crate::weekly::{weekly_counts, weekly_events};
use crate::xes::{export_xes, read_log};

pub const REMAINING_EXPORT: &str = "df_remaining_export.csv";
pub const NO_LOOPS_EXPORT: &str = "df_remaining_no_loops.csv";
pub const WEEK_CATALOG_EXPORT: &str = "event_week_catalog.csv";
pub const ALL_EVENTS_XES: &str = "event_log_remaining_ALL.xes";

const PREPROCESS_HINT: &str = "run `lms-pm preprocess` first";
const EVENT_LOGS_HINT: &str = "run `lms-pm event-logs` first";

/// Everything the preprocessing stage derives from the raw export.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub remaining: Vec<EventRow>,
    pub excluded_rows: usize,
    pub catalog: Vec<WeekCatalogEntry>,
    pub slices: Vec<Slice>,
    pub no_loops: Vec<LoopFreeRow>,
    pub reclassified: usize,
}

/// Pure preprocessing: parse, filter, label, slice, reclassify.
pub fn prepare(raw: Vec<RawEventRow>, settings: &Settings) -> Prepared {
    let rows: Vec<EventRow> = raw
        .into_iter()
        .map(|raw| {
            let timestamp = parse_hu_timestamp(&raw.time_raw);
            EventRow::from_raw(raw, timestamp)
        })
        .collect();
    let unparsed = rows.iter().filter(|row| row.timestamp.is_none()).count();
    if unparsed > 0 {
        tracing::warn!(unparsed, "timestamps did not match the localized format");
    }

    let rows = apply_time_window(rows, &settings.window);
    let rows = add_extracted_ids(rows);
    let rows = apply_exclusions(rows, ExclusionRules::standard());
    let rows = assign_categories(rows);

    let (excluded, remaining) = split_users(rows, &settings.excluded_users);
    let remaining = add_time_parts(remaining);
    let remaining = label_rows(remaining, &settings.schedule);
    let remaining = attach_week_plan(remaining);
    let catalog = week_catalog(&remaining);

    let slices = build_slices(&remaining);

    let mut remaining = remaining;
    let reclassified = reclassify_exam_to_admin(&mut remaining, &settings.schedule);
    let no_loops = drop_consecutive_repeats(&remaining);

    Prepared {
        remaining,
        excluded_rows: excluded.len(),
        catalog,
        slices,
        no_loops,
        reclassified,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub input: PathBuf,
    pub raw_rows: usize,
    pub remaining_rows: usize,
    pub excluded_rows: usize,
    pub reclassified: usize,
    pub loop_free_rows: usize,
}

pub fn run_preprocess(paths: &ProjectPaths, settings: &Settings, input: Option<&Path>) -> Result<PreprocessSummary> {
    let input = settings.input_path(input)?;
    let raw = load_raw_rows(&input, &settings.columns)?;
    let raw_rows = raw.len();

    let prepared = prepare(raw, settings);

    save_csv(&prepared.catalog, &paths.processed_file(WEEK_CATALOG_EXPORT))?;
    save_table(&prepared.no_loops, &paths.processed_file(NO_LOOPS_EXPORT))?;
    save_table(&prepared.remaining, &paths.processed_file(REMAINING_EXPORT))?;
    for slice in &prepared.slices {
        save_csv(&slice.rows, &paths.processed_file(&format!("{}.csv", slice.name)))?;
    }

    tracing::info!(
        rows = prepared.remaining.len(),
        out = %paths.processed.display(),
        "preprocessing finished"
    );
    Ok(PreprocessSummary {
        input,
        raw_rows,
        remaining_rows: prepared.remaining.len(),
        excluded_rows: prepared.excluded_rows,
        reclassified: prepared.reclassified,
        loop_free_rows: prepared.no_loops.len(),
    })
}

fn load_remaining(paths: &ProjectPaths, input: Option<&Path>) -> Result<(PathBuf, Vec<EventRow>)> {
    let path = input
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.processed_file(REMAINING_EXPORT));
    let rows = read_table(&path, &["timestamp", "user_id", "category"], PREPROCESS_HINT)?;
    Ok((path, rows))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenLog {
    pub path: PathBuf,
    pub cases: usize,
    pub events: usize,
}

fn write_log(log: &EventLog, path: PathBuf) -> Result<WrittenLog> {
    if log.is_empty() {
        tracing::warn!(path = %path.display(), "event log has no traces");
    }
    export_xes(log, &path)?;
    Ok(WrittenLog {
        cases: log.case_count(),
        events: log.event_count(),
        path,
    })
}

/// Builds every XES variant plus the weekly CSV tables.
pub fn run_event_logs(paths: &ProjectPaths, input: Option<&Path>) -> Result<Vec<WrittenLog>> {
    let (_, rows) = load_remaining(paths, input)?;
    let mut written = Vec::new();

    let all = EventLog::from_rows(&rows, ActivitySource::Category);
    written.push(write_log(&all, paths.xes_file(ALL_EVENTS_XES))?);

    let no_exam: Vec<EventRow> = rows
        .iter()
        .filter(|row| row.category != Category::Exam)
        .cloned()
        .collect();
    let no_exam = EventLog::from_rows(&no_exam, ActivitySource::Category);
    written.push(write_log(&no_exam, paths.xes_file("event_log_remaining_NO_EXAM.xes"))?);

    let weekly_with_category = weekly_events(&rows, true);
    save_csv(&weekly_with_category, &paths.processed_file("weekly_events_with_category.csv"))?;
    written.push(write_log(
        &EventLog::from_weekly(&weekly_with_category),
        paths.xes_file("event_log_weekly_with_category.xes"),
    )?);

    let weekly = weekly_events(&rows, false);
    save_csv(&weekly, &paths.processed_file("weekly_events.csv"))?;
    written.push(write_log(&EventLog::from_weekly(&weekly), paths.xes_file("event_log_weekly.xes"))?);

    save_csv(
        &weekly_counts(&rows),
        &paths.processed_file("weekly_counts_user_week_category.csv"),
    )?;

    match read_table::<LoopFreeRow>(
        &paths.processed_file(NO_LOOPS_EXPORT),
        &["timestamp", "category", "user_id"],
        PREPROCESS_HINT,
    ) {
        Ok(no_loops) => written.push(write_log(
            &EventLog::from_loop_free(&no_loops),
            paths.xes_file("event_log_remaining_NO_LOOPS.xes"),
        )?),
        Err(PipelineError::MissingArtifact { path, hint }) => {
            tracing::warn!(path = %path.display(), %hint, "loop-free table not found, skipping its event log");
        }
        Err(err) => return Err(err),
    }

    let known_weeks: Vec<EventRow> = rows
        .iter()
        .filter(|row| row.curriculum_week.as_deref().is_some_and(|week| week != UNKNOWN_WEEK))
        .cloned()
        .collect();
    written.push(write_log(
        &EventLog::from_rows(&known_weeks, ActivitySource::CurriculumWeek),
        paths.xes_file("event_log_TANTERVIHET_KNOWN_ONLY.xes"),
    )?);

    Ok(written)
}

/// Statistics, distribution tables and the markdown report.
pub fn run_analysis(paths: &ProjectPaths, input: Option<&Path>, out: Option<&Path>) -> Result<PathBuf> {
    let (source, rows) = load_remaining(paths, input)?;
    let out_dir = out.map(Path::to_path_buf).unwrap_or_else(|| paths.figures.clone());
    fs::create_dir_all(&out_dir)?;

    let stats = basic_stats(&rows, read_headers(&source)?.len());
    save_json(&stats, &out_dir.join("basic_stats.json"))?;

    let mut tables = Vec::new();
    let mut distributions = Vec::new();
    for grouping in Grouping::ALL {
        let name = format!("distribution_{}.csv", grouping.file_stem());
        let table = distribution(&rows, grouping);
        save_csv(&table, &out_dir.join(&name))?;
        tables.push(name);
        distributions.push((grouping, table));
    }

    let monthly = monthly_split(&rows);
    save_csv(&monthly, &out_dir.join("monthly_work_mode.csv"))?;
    tables.push("monthly_work_mode.csv".to_string());

    for chart in render_charts(&distributions, &monthly, &out_dir)? {
        let name = chart.strip_prefix(&out_dir).unwrap_or(&chart);
        tables.push(name.display().to_string());
    }

    let report = build_report(&source.display().to_string(), &stats, &monthly, &tables);
    let report_path = out_dir.join("analysis_report.md");
    fs::write(&report_path, report)?;

    tracing::info!(path = %report_path.display(), "analysis report written");
    Ok(report_path)
}

fn load_log(paths: &ProjectPaths, xes: Option<&Path>) -> Result<(PathBuf, EventLog)> {
    let path = xes
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.xes_file(ALL_EVENTS_XES));
    if !path.exists() {
        return Err(PipelineError::MissingArtifact {
            path,
            hint: EVENT_LOGS_HINT.to_string(),
        });
    }
    let log = read_log(&path)?;
    tracing::info!(
        path = %path.display(),
        traces = log.case_count(),
        events = log.event_count(),
        "event log loaded"
    );
    Ok((path, log))
}

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub miner: Miner,
    pub xes: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub params: MinerParams,
    pub skip_metrics: bool,
}

#[derive(Debug, Clone)]
pub struct DiscoverySummary {
    pub out_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub quality: Option<QualityReport>,
}

pub fn run_discovery(
    paths: &ProjectPaths,
    options: &DiscoverOptions,
    backend: &dyn DiscoveryBackend,
) -> Result<DiscoverySummary> {
    let (xes_path, log) = load_log(paths, options.xes.as_deref())?;
    let input = LogInput {
        xes_path: &xes_path,
        log: &log,
    };
    let out_dir = options
        .out
        .clone()
        .unwrap_or_else(|| paths.figures.join(options.miner.as_str()));

    let model = backend.discover(input, options.miner, &options.params)?;
    let info = model.info();
    tracing::info!(
        miner = %options.miner,
        places = info.places,
        transitions = info.transitions,
        arcs = info.arcs,
        "model discovered"
    );

    let model_path = out_dir.join(format!("{}_model.json", options.miner));
    save_json(&model, &model_path)?;
    let mut files = vec![model_path];

    if options.miner.yields_petri_net() && !model.places.is_empty() {
        let pnml_path = out_dir.join(format!("{}_petri.pnml", options.miner));
        write_pnml_file(&model, options.miner.as_str(), &pnml_path)?;
        files.push(pnml_path);
    }

    if let Some(graph) = &model.fuzzy {
        files.extend(write_fuzzy_tables(graph, &out_dir)?);
    }

    let quality = if options.skip_metrics || !options.miner.yields_petri_net() {
        None
    } else {
        let report = evaluate_metrics(backend, input, &model);
        let doc = MetricsDocument::new(input, options.miner, &options.params, &model, &report);
        files.extend(write_metrics(&doc, &report, &out_dir)?);
        Some(report)
    };

    Ok(DiscoverySummary {
        out_dir,
        files,
        quality,
    })
}

pub fn run_dfg(paths: &ProjectPaths, xes: Option<&Path>, out: Option<&Path>) -> Result<(Dfg, Vec<PathBuf>)> {
    let (_, log) = load_log(paths, xes)?;
    let out_dir = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.figures.join("dfg"));
    let dfg = Dfg::from_log(&log);
    let files = write_dfg(&dfg, &out_dir)?;
    Ok((dfg, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::discovery::{BackendError, ProcessModel, Strategy, Transition};
    use crate::models::WorkMode;
    use crate::pnml::read_pnml;

    fn raw(context: &str, time: &str, ip: Option<&str>) -> RawEventRow {
        RawEventRow {
            description: "The user with id '42' viewed the course module with course module id '7'.".to_string(),
            context: context.to_string(),
            time_raw: time.to_string(),
            ip: ip.map(str::to_string),
            event_name: Some("Kurzusmodul megtekintve".to_string()),
        }
    }

    fn scenario() -> Vec<RawEventRow> {
        vec![
            raw("Fájl: Klasszifikáció", "2025. március 19., 9:00:00", Some("146.110.20.1")),
            raw("Fájl: zh-A", "2025. március 19., 9:00:00", Some("146.110.20.1")),
            raw("Fájl: zh-A", "2025. március 22., 10:00:00", Some("84.1.2.3")),
        ]
    }

    fn settings() -> Settings {
        Settings::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn end_to_end_categories_and_reclassification() {
        let prepared = prepare(scenario(), &settings());
        let categories: Vec<Category> = prepared.remaining.iter().map(|r| r.category).collect();
        assert_eq!(categories, vec![Category::InClass, Category::Exam, Category::Admin]);
        assert_eq!(prepared.reclassified, 1);
        assert_eq!(prepared.remaining[2].work_mode, Some(WorkMode::AtHome));
        assert!(prepared.remaining.iter().all(|r| r.user_id == Some(42)));

        let weekly = weekly_events(&prepared.remaining, true);
        let activities: BTreeSet<&str> = weekly.iter().map(|e| e.activity.as_str()).collect();
        assert_eq!(weekly.len(), 3);
        assert_eq!(
            activities,
            BTreeSet::from(["W12-2025 | Admin", "W12-2025 | Orai", "W12-2025 | Szamonkeres"])
        );
        assert_eq!(weekly_events(&prepared.remaining, false).len(), 1);
    }

    #[test]
    fn unparseable_and_out_of_window_rows_are_dropped() {
        let mut rows = scenario();
        rows.push(raw("Fájl: zh-A", "not a date", None));
        rows.push(raw("Fájl: zh-A", "2024. március 19., 9:00:00", None));
        let prepared = prepare(rows, &settings());
        assert_eq!(prepared.remaining.len(), 3);
        assert!(prepared.remaining.iter().all(|r| r.timestamp.is_some()));
    }

    #[test]
    fn staff_accounts_are_split_off() {
        let mut rows = scenario();
        rows.push(RawEventRow {
            description: "The user with id '605' viewed the course.".to_string(),
            ..raw("Fájl: zh-A", "2025. március 19., 9:00:00", None)
        });
        let prepared = prepare(rows, &settings());
        assert_eq!(prepared.excluded_rows, 1);
        assert_eq!(prepared.remaining.len(), 3);
    }

    struct FixedBackend;

    impl DiscoveryBackend for FixedBackend {
        fn discover(
            &self,
            _input: LogInput<'_>,
            _miner: Miner,
            _params: &MinerParams,
        ) -> std::result::Result<ProcessModel, BackendError> {
            Ok(ProcessModel {
                places: vec!["p".into()],
                transitions: vec![Transition {
                    name: "t".into(),
                    label: Some("Orai".into()),
                }],
                ..ProcessModel::default()
            })
        }

        fn metric(
            &self,
            _input: LogInput<'_>,
            _model: &ProcessModel,
            strategy: Strategy,
        ) -> std::result::Result<f64, BackendError> {
            Err(BackendError::Unsupported(strategy.as_str()))
        }

        fn activated_transitions(
            &self,
            _input: LogInput<'_>,
            _model: &ProcessModel,
        ) -> std::result::Result<BTreeSet<String>, BackendError> {
            Ok(BTreeSet::from(["Orai".to_string()]))
        }
    }

    #[test]
    fn stages_chain_through_project_paths() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        paths.ensure().unwrap();

        let input = paths.raw.join("export.csv");
        let mut writer = csv::Writer::from_path(&input).unwrap();
        writer
            .write_record(["Idő", "Eseménykörnyezet", "Leírás", "IP-cím", "Esemény neve"])
            .unwrap();
        for row in scenario() {
            writer
                .write_record([
                    row.time_raw.as_str(),
                    row.context.as_str(),
                    row.description.as_str(),
                    row.ip.as_deref().unwrap_or(""),
                    "",
                ])
                .unwrap();
        }
        writer.flush().unwrap();

        let summary = run_preprocess(&paths, &settings(), Some(&input)).unwrap();
        assert_eq!(summary.remaining_rows, 3);
        assert_eq!(summary.reclassified, 1);
        assert!(paths.processed_file(REMAINING_EXPORT).exists());
        assert!(paths.processed_file("df_extra_with_exam_only.csv").exists());

        let logs = run_event_logs(&paths, None).unwrap();
        assert_eq!(logs.len(), 6);
        let all = read_log(&paths.xes_file(ALL_EVENTS_XES)).unwrap();
        assert_eq!(all.case_count(), 1);
        assert_eq!(all.event_count(), 3);

        let report = run_analysis(&paths, None, None).unwrap();
        let text = fs::read_to_string(report).unwrap();
        assert!(text.contains("Distinct subjects: 1"));
        assert!(text.contains("havi_orai_otthoni.png"));
        let summary = paths.figures.join("osszesitett").join("osszegzo_kategoriak_legenda.png");
        assert!(fs::metadata(summary).unwrap().len() > 0);
        assert!(paths.figures.join("reszletes").join("orai_otthoni_óra.png").exists());

        let options = DiscoverOptions {
            miner: Miner::Alpha,
            xes: None,
            out: None,
            params: MinerParams::default(),
            skip_metrics: false,
        };
        let discovery = run_discovery(&paths, &options, &FixedBackend).unwrap();
        let quality = discovery.quality.unwrap();
        assert_eq!(quality.fitness.value, 0.0);
        assert_eq!(quality.generalization.value, 1.0);
        assert!(paths.figures.join("alpha").join("alpha_metrics.csv").exists());
        let net = read_pnml(&paths.figures.join("alpha").join("alpha_petri.pnml")).unwrap();
        assert_eq!(net.initial_marking, vec!["p"]);
        assert_eq!(net.transitions[0].label.as_deref(), Some("Orai"));

        let (dfg, files) = run_dfg(&paths, None, None).unwrap();
        assert_eq!(dfg.edges.len(), 2);
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn missing_upstream_artifacts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        assert!(matches!(
            run_event_logs(&paths, None),
            Err(PipelineError::MissingArtifact { .. })
        ));
        assert!(matches!(
            run_dfg(&paths, None, None),
            Err(PipelineError::MissingArtifact { .. })
        ));
    }
}
