//! Tests for task directory discovery.

use std::fs;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use veil_ingest::{
    IngestError, classify_table, list_task_dirs, list_task_files, read_lines, resolve_eval_name,
};
use veil_model::TableFormat;

fn temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("veil_ingest_{stamp}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn touch(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write file");
    path
}

#[test]
fn lists_tasks_and_files_in_name_order() {
    let root = temp_dir();
    fs::create_dir_all(root.join("task-b")).expect("task b");
    fs::create_dir_all(root.join("task-a")).expect("task a");
    touch(&root, "stray.txt", "x");

    let tasks = list_task_dirs(&root).expect("tasks");
    let names: Vec<_> = tasks
        .iter()
        .map(|path| path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["task-a", "task-b"]);

    let task = root.join("task-a");
    touch(&task, "run2", "{}");
    touch(&task, "run1", "{}");
    touch(&task, ".hidden", "{}");
    touch(&task, "run3.partial", "{}");
    let files = list_task_files(&task).expect("files");
    let names: Vec<_> = files
        .iter()
        .map(|path| path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["run1", "run2"]);
}

#[test]
fn missing_root_has_no_tasks() {
    let root = temp_dir().join("absent");
    assert!(list_task_dirs(&root).expect("tasks").is_empty());
    assert!(matches!(
        list_task_files(&root),
        Err(IngestError::DirectoryNotFound { .. })
    ));
}

#[test]
fn sample_feeds_classifier() {
    let root = temp_dir();
    let path = touch(
        &root,
        "ranking",
        "# produced by a ranker\n101 Q0 d1 1 3.2 myrun\n101 Q0 d2 2 2.9 myrun\n",
    );
    let hint = classify_table(&read_lines(&path).expect("read"));
    assert_eq!(hint.format, TableFormat::Ranking);
}

proptest! {
    #[test]
    fn known_run_prefix_is_recovered(
        run in "[a-z][a-z0-9_-]{0,8}(\\.[a-z0-9]{1,4})?",
        judge in "[a-z]{1,6}",
    ) {
        let file_name = format!("{run}.{judge}");
        let name = resolve_eval_name(&file_name, [run.as_str()], &[]).expect("resolved");
        prop_assert_eq!(&name.run, &run);
        prop_assert_eq!(name.rename("kab"), format!("kab.{judge}"));
    }

    #[test]
    fn classifier_accepts_arbitrary_lines(
        lines in proptest::collection::vec("[ -~\t]{0,40}", 0..12),
    ) {
        let hint = classify_table(&lines);
        let widest = lines.iter().map(|line| line.split_whitespace().count()).max().unwrap_or(0);
        prop_assert!(hint.run_id_columns.iter().all(|column| *column < widest.max(1)));
    }
}
