//! End-to-end runs of the anonymization pipeline over small directory trees.

use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

use veil_cli::config::PipelineConfig;
use veil_cli::pipeline::Pipeline;
use veil_ingest::{read_lines, write_lines};
use veil_map::{MapError, MappingStore, fingerprint};
use veil_model::{IdentifierKind, IssueType, TableFormat};
use veil_transform::AutoDecider;

const SEED: u64 = 11;

fn write(root: &Path, relative: &str, lines: &[String]) {
    write_lines(&root.join(relative), lines).expect("write input");
}

fn report(team: &str, run: &str, topic: &str, text: &str) -> String {
    json!({
        "metadata": {"team_id": team, "run_id": run, "topic_id": topic},
        "responses": [{"text": text}]
    })
    .to_string()
}

fn metadata(org: &str, runtag: &str, priority: &str) -> String {
    json!({
        "org": org,
        "runtag": runtag,
        "email": "lead@example.org",
        "std-priority": priority
    })
    .to_string()
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempdir().expect("tempdir"),
        }
    }

    fn input(&self) -> std::path::PathBuf {
        self.dir.path().join("input")
    }

    fn output(&self) -> std::path::PathBuf {
        self.dir.path().join("output")
    }

    fn db(&self) -> std::path::PathBuf {
        self.dir.path().join("mapping.db")
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::new(self.input(), self.output(), self.db()).with_seed(Some(SEED))
    }

    fn run(&self, config: PipelineConfig) -> Pipeline {
        let mut pipeline = Pipeline::open(config, Box::new(AutoDecider)).expect("open");
        pipeline.run().expect("run");
        pipeline
    }

    fn output_files(&self, relative: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.output().join(relative))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[test]
fn run_file_is_renamed_and_fingerprinted() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "hello")]);

    let pipeline = ws.run(ws.config());
    let mapping = pipeline.session().mapping();
    let pseudonym = mapping.get_run("run1").expect("lookup").expect("mapped");

    assert_eq!(ws.output_files("runs/task1"), vec![pseudonym.clone()]);
    assert_eq!(
        mapping.reverse(IdentifierKind::Run, &pseudonym).expect("reverse"),
        Some("run1".to_string())
    );
    let stored = mapping
        .lookup_fingerprint(&fingerprint("t1", "hello"))
        .expect("lookup")
        .expect("fingerprint stored");
    assert_eq!(stored.original_run, "run1");
    assert_eq!(stored.original_team, "team1");

    let written =
        read_lines(&ws.output().join("runs/task1").join(&pseudonym)).expect("read output");
    let record: Value = serde_json::from_str(&written[0]).expect("json");
    assert_eq!(record["metadata"]["run_id"], Value::String(pseudonym));
    assert_ne!(record["metadata"]["team_id"], "team1");

    let stats = pipeline.stats();
    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.lines_processed, 1);
    assert_eq!(stats.fingerprints, 1);
    assert_eq!(stats.errors, 0);
}

#[test]
fn eval_file_uses_the_filename_run() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "hello")]);
    write(
        &ws.input(),
        "eval/task1/run1.judge",
        &[
            "t1 Q0 doc1 1 2.50 stale-name".to_string(),
            "t1 Q0 doc2 2 1.25 stale-name".to_string(),
        ],
    );

    let pipeline = ws.run(ws.config());
    let pseudonym = pipeline
        .session()
        .mapping()
        .get_run("run1")
        .expect("lookup")
        .expect("mapped");
    let renamed = format!("{pseudonym}.judge");
    assert_eq!(ws.output_files("eval/task1"), vec![renamed.clone()]);

    let lines = read_lines(&ws.output().join("eval/task1").join(&renamed)).expect("read output");
    for line in &lines {
        assert!(!line.contains("stale-name"));
        assert!(!line.contains("run1"));
        assert_eq!(line.split('\t').nth(5), Some(pseudonym.as_str()));
    }
    assert_eq!(
        pipeline.session().mapping().get_run("stale-name").expect("lookup"),
        None
    );
}

#[test]
fn eval_without_known_run_is_skipped() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "hello")]);
    write(&ws.input(), "eval/task1/ghost.judge", &["map t1 0.5".to_string()]);

    let pipeline = ws.run(ws.config());
    let issue = pipeline
        .issues()
        .issues()
        .iter()
        .find(|issue| issue.issue_type == IssueType::UnmatchedIdentifier)
        .expect("unmatched issue");
    assert_eq!(issue.file_path, "eval/task1/ghost.judge");
    assert_eq!(pipeline.stats().files_skipped, 1);
    assert!(ws.output_files("eval/task1").is_empty());
    assert!(!pipeline.issues().has_errors());
}

#[test]
fn declared_format_and_judge_suffix_are_used() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/my.run", &[report("team1", "my.run", "t1", "hi")]);
    write(
        &ws.input(),
        "eval/task1/my.run.nist.edit",
        &["my.run  7  ndcg  0.4".to_string(), "my.run  8  ndcg  0.6".to_string()],
    );
    let config = ws
        .config()
        .with_judge_suffixes("task1", vec!["nist.edit".to_string()])
        .with_format("task1/my.run.nist.edit", TableFormat::IrMeasures);

    let pipeline = ws.run(config);
    let pseudonym = pipeline
        .session()
        .mapping()
        .get_run("my.run")
        .expect("lookup")
        .expect("mapped");
    let renamed = format!("{pseudonym}.nist.edit");
    let lines = read_lines(&ws.output().join("eval/task1").join(renamed)).expect("read output");
    assert_eq!(lines[0], format!("{pseudonym}\t7\tndcg\t0.4"));
}

#[test]
fn metadata_is_anonymized_and_emails_redacted() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "hello")]);
    write(&ws.input(), "metadata/task1/meta.jsonl", &[metadata("team1", "run1", "1")]);

    let pipeline = ws.run(ws.config());
    let mapping = pipeline.session().mapping();
    let lines = read_lines(&ws.output().join("metadata/task1/meta.jsonl")).expect("read output");
    let record: Value = serde_json::from_str(&lines[0]).expect("json");
    let team = mapping.get_team("team1").expect("lookup").expect("team");
    let run = mapping.get_run("run1").expect("lookup").expect("run");
    assert_eq!(record["org"], Value::String(team));
    assert_eq!(record["runtag"], Value::String(run));
    assert_eq!(record["email"], "[REDACTED]");
    assert_eq!(pipeline.issues().emails().len(), 1);
}

#[test]
fn priority_filter_keeps_matching_runs() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "a")]);
    write(&ws.input(), "runs/task1/run2", &[report("team1", "run2", "t1", "b")]);
    write(
        &ws.input(),
        "metadata/task1/meta.jsonl",
        &[metadata("team1", "run1", "1 (top)"), metadata("team1", "run2", "2")],
    );

    let pipeline = ws.run(ws.config().with_priority(Some("1 (top)".to_string())));
    assert_eq!(pipeline.stats().files_filtered, 1);
    assert_eq!(ws.output_files("runs/task1").len(), 1);
    assert_eq!(pipeline.session().mapping().get_run("run2").expect("lookup"), None);

    let lines = read_lines(&ws.output().join("metadata/task1/meta.jsonl")).expect("read output");
    assert_eq!(lines.len(), 1);
}

#[test]
fn gzip_inputs_stay_compressed() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1.gz", &[report("team1", "run1", "t1", "hello")]);

    let pipeline = ws.run(ws.config());
    let pseudonym = pipeline
        .session()
        .mapping()
        .get_run("run1")
        .expect("lookup")
        .expect("mapped");
    let output = ws.output().join("runs/task1").join(format!("{pseudonym}.gz"));
    let lines = read_lines(&output).expect("read gz output");
    assert_eq!(lines.len(), 1);
}

#[test]
fn dry_run_writes_nothing() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "hello")]);
    write(&ws.input(), "metadata/task1/meta.jsonl", &[metadata("team1", "run1", "1")]);

    let pipeline = ws.run(ws.config().with_dry_run(true));
    assert!(!ws.output().exists());
    assert!(!ws.db().exists());
    assert_eq!(pipeline.stats().files_processed, 0);
    assert_eq!(pipeline.stats().runs, 0);
}

#[test]
fn reruns_reuse_mappings_and_reject_another_seed() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "hello")]);

    let first = ws.run(ws.config());
    let pseudonym = first.session().mapping().get_run("run1").expect("lookup");
    drop(first);

    write(&ws.input(), "runs/task1/run2", &[report("team1", "run2", "t1", "bye")]);
    let second = ws.run(ws.config());
    assert_eq!(second.session().mapping().get_run("run1").expect("lookup"), pseudonym);
    assert_eq!(second.stats().runs, 2);
    drop(second);

    let config = PipelineConfig::new(ws.input(), ws.output(), ws.db()).with_seed(Some(SEED + 1));
    let error = Pipeline::open(config, Box::new(AutoDecider))
        .err()
        .expect("seed mismatch");
    assert!(matches!(error.downcast_ref::<MapError>(), Some(MapError::SeedMismatch { .. })));

    let store = MappingStore::open(ws.db(), None).expect("reopen");
    assert_eq!(store.seed(), SEED);
}

#[test]
fn missing_input_is_fatal() {
    let ws = Workspace::new();
    let mut pipeline = Pipeline::open(ws.config(), Box::new(AutoDecider)).expect("open");
    assert!(pipeline.run().is_err());
}

#[test]
fn eval_with_partial_header_is_still_written() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "hello")]);
    write(
        &ws.input(),
        "eval/task1/run1.judge",
        &[
            "measure topic value".to_string(),
            "map 101 0.25".to_string(),
            "P_10 101 0.4".to_string(),
        ],
    );

    let pipeline = ws.run(ws.config());
    let pseudonym = pipeline
        .session()
        .mapping()
        .get_run("run1")
        .expect("lookup")
        .expect("mapped");
    let renamed = format!("{pseudonym}.judge");
    assert_eq!(ws.output_files("eval/task1"), vec![renamed.clone()]);
    assert!(
        pipeline
            .issues()
            .issues()
            .iter()
            .all(|issue| issue.issue_type != IssueType::UnknownFormat)
    );

    let lines = read_lines(&ws.output().join("eval/task1").join(renamed)).expect("read output");
    assert_eq!(lines, vec!["measure\ttopic\tvalue", "map\t101\t0.25", "P_10\t101\t0.4"]);
}

#[test]
fn declared_format_keeps_the_header_row() {
    let ws = Workspace::new();
    write(&ws.input(), "runs/task1/run1", &[report("team1", "run1", "t1", "hello")]);
    write(
        &ws.input(),
        "eval/task1/run1.scores",
        &[
            "run_id topic_id metric value".to_string(),
            "run1 101 map 0.2".to_string(),
        ],
    );
    let config = ws
        .config()
        .with_format("task1/run1.scores", TableFormat::IrMeasures);

    let pipeline = ws.run(config);
    let pseudonym = pipeline
        .session()
        .mapping()
        .get_run("run1")
        .expect("lookup")
        .expect("mapped");
    let output = ws.output().join("eval/task1").join(format!("{pseudonym}.scores"));
    let lines = read_lines(&output).expect("read output");
    assert_eq!(lines[0], "run_id topic_id metric value");
    assert_eq!(lines[1], format!("{pseudonym}\t101\tmap\t0.2"));
}
