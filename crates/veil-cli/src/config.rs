//! Pipeline configuration and the optional TOML file behind `--config`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use veil_model::TableFormat;

/// Everything the pipeline needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// SQLite database shared by the mapping and repair stores.
    pub mapping_db: PathBuf,
    pub runs_dir: String,
    pub eval_dir: String,
    pub metadata_dir: String,
    pub interactive: bool,
    pub dry_run: bool,
    /// Keep only runs whose metadata `std-priority` equals this value.
    pub priority: Option<String>,
    pub seed: Option<u64>,
    /// Format overrides keyed by `task/file` relative to the eval directory.
    pub formats: BTreeMap<String, TableFormat>,
    /// Declared judge suffixes per task.
    pub judge_suffixes: BTreeMap<String, Vec<String>>,
}

impl PipelineConfig {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        mapping_db: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            mapping_db: mapping_db.into(),
            runs_dir: "runs".to_string(),
            eval_dir: "eval".to_string(),
            metadata_dir: "metadata".to_string(),
            interactive: false,
            dry_run: false,
            priority: None,
            seed: None,
            formats: BTreeMap::new(),
            judge_suffixes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_dirs(
        mut self,
        runs: impl Into<String>,
        eval: impl Into<String>,
        metadata: impl Into<String>,
    ) -> Self {
        self.runs_dir = runs.into();
        self.eval_dir = eval.into();
        self.metadata_dir = metadata.into();
        self
    }

    #[must_use]
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Option<String>) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the seed; `None` keeps a seed taken from a config file.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.seed = seed;
        }
        self
    }

    #[must_use]
    pub fn with_format(mut self, relative_path: impl Into<String>, format: TableFormat) -> Self {
        self.formats.insert(relative_path.into(), format);
        self
    }

    #[must_use]
    pub fn with_judge_suffixes(mut self, task: impl Into<String>, suffixes: Vec<String>) -> Self {
        self.judge_suffixes.insert(task.into(), suffixes);
        self
    }

    /// Merges values from a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if a format tag is not recognized.
    pub fn with_file(mut self, file: FileConfig) -> Result<Self> {
        if file.seed.is_some() {
            self.seed = file.seed;
        }
        for (path, tag) in file.formats {
            let format: TableFormat = tag
                .parse()
                .with_context(|| format!("format override for {path}"))?;
            self.formats.insert(path, format);
        }
        for (task, settings) in file.tasks {
            self.judge_suffixes.insert(task, settings.judge_suffixes);
        }
        Ok(self)
    }

    pub fn runs_root(&self) -> PathBuf {
        self.input_dir.join(&self.runs_dir)
    }

    pub fn eval_root(&self) -> PathBuf {
        self.input_dir.join(&self.eval_dir)
    }

    pub fn metadata_root(&self) -> PathBuf {
        self.input_dir.join(&self.metadata_dir)
    }

    pub fn judge_suffixes_for(&self, task: &str) -> &[String] {
        self.judge_suffixes.get(task).map_or(&[], Vec::as_slice)
    }
}

/// Contents of a `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub seed: Option<u64>,
    /// `task/file` relative to the eval directory, to a format tag.
    pub formats: BTreeMap<String, String>,
    pub tasks: BTreeMap<String, TaskConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    pub judge_suffixes: Vec<String>,
}

/// Reads and parses a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse config {}", path.display()))
}
