//! Task directory listing and evaluation filename resolution.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IngestError, Result};

/// Immediate subdirectories of `root`, sorted by name.
///
/// A missing root yields no tasks.
pub fn list_task_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    list_entries(root, |path| path.is_dir())
}

/// Regular files directly inside `dir`, sorted by name.
///
/// Hidden files and partially written outputs are skipped.
pub fn list_task_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound { path: dir.to_path_buf() });
    }
    list_entries(dir, |path| {
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
        if name.starts_with('.') || name.ends_with(".partial") {
            debug!(file = name, "skipping hidden or partial file");
            return false;
        }
        path.is_file()
    })
}

fn list_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).map_err(|source| IngestError::io("read directory", dir, source))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| IngestError::io("read directory", dir, source))?
            .path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// A run identifier recovered from an evaluation filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalName {
    /// Original run identifier.
    pub run: String,
    /// Remainder of the name after the run identifier, including the dot.
    pub suffix: String,
}

impl EvalName {
    /// The filename with the run identifier replaced.
    pub fn rename(&self, pseudonym: &str) -> String {
        format!("{pseudonym}{}", self.suffix)
    }
}

/// Finds the run an evaluation file belongs to.
///
/// Names look like `<run>.<judge>`, and both parts may contain dots. A
/// declared judge suffix wins; otherwise the longest known run identifier
/// that is a whole-name or dot-delimited prefix is chosen.
pub fn resolve_eval_name<'a, I>(
    file_name: &str,
    known_runs: I,
    judge_suffixes: &[String],
) -> Option<EvalName>
where
    I: IntoIterator<Item = &'a str>,
{
    for judge in judge_suffixes {
        let dotted = format!(".{judge}");
        if let Some(run) = file_name.strip_suffix(dotted.as_str())
            && !run.is_empty()
        {
            return Some(EvalName {
                run: run.to_string(),
                suffix: dotted,
            });
        }
    }

    known_runs
        .into_iter()
        .filter(|run| !run.is_empty())
        .filter(|run| {
            file_name == *run
                || file_name
                    .strip_prefix(*run)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
        .max_by_key(|run| run.len())
        .map(|run| EvalName {
            run: run.to_string(),
            suffix: file_name[run.len()..].to_string(),
        })
}
