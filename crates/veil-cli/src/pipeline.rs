//! Pipeline stages for anonymizing a dataset directory.
//!
//! Stages run in a fixed order so every identifier is first seen in its
//! authoritative source:
//!
//! 1. **Priorities**: metadata is scanned for `std-priority` when a filter is set
//! 2. **Runs**: report records (or run tables) whose filename is the run id
//! 3. **Eval**: score tables named `<run>.<judge>`, translated with existing mappings only
//! 4. **Metadata**: `org` and `runtag` fields, plus email scanning

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info, info_span, warn};

use veil_ingest::{
    EvalName, classify_table, list_task_dirs, list_task_files, looks_like_records, read_lines,
    resolve_eval_name, split_gz_name, write_lines_atomic,
};
use veil_map::{MappingStore, RepairStore};
use veil_model::{Confidence, DataIssue, FormatHint, IssueType, TableFormat};
use veil_transform::{
    Decider, IssueCollector, Location, MetadataTransformer, RecordTransformer, Session, TableLayout,
    TableTransformer, TranslationPolicy, metadata_runtag,
};

use crate::config::PipelineConfig;
use crate::logging::redact_value;
use crate::types::PipelineStats;

/// Metadata field holding a run's priority.
const PRIORITY_FIELD: &str = "std-priority";

pub struct Pipeline {
    config: PipelineConfig,
    session: Session,
    records: RecordTransformer,
    metadata: MetadataTransformer,
    tables: TableTransformer,
    /// Original run id to its metadata priority.
    priorities: HashMap<String, String>,
    /// Run ids taken from filenames in the runs directory.
    seen_runs: BTreeSet<String>,
    stats: PipelineStats,
}

/// One input file with its task and display path.
struct InputFile<'a> {
    task: &'a str,
    path: &'a Path,
    name: String,
    /// Path relative to the input root, used in issues.
    display: String,
}

impl<'a> InputFile<'a> {
    fn new(category: &str, task: &'a str, path: &'a Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let display = format!("{category}/{task}/{name}");
        Self {
            task,
            path,
            name,
            display,
        }
    }

    fn location(&self, line: Option<usize>) -> Location<'_> {
        Location::new(self.task, &self.display, line)
    }
}

impl Pipeline {
    /// Opens the stores and prepares a session.
    ///
    /// Dry runs never create the database: an existing one is read, otherwise
    /// an in-memory store stands in.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be opened or its seed differs from the
    /// configured one.
    pub fn open(config: PipelineConfig, decider: Box<dyn Decider>) -> Result<Self> {
        let (mapping, repairs) = if config.dry_run && !config.mapping_db.exists() {
            (MappingStore::open_in_memory(config.seed)?, RepairStore::open_in_memory()?)
        } else {
            if let Some(parent) = config.mapping_db.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create directory {}", parent.display()))?;
            }
            let mapping = MappingStore::open(&config.mapping_db, config.seed)?;
            let repairs = RepairStore::open(&config.mapping_db)
                .with_context(|| format!("open repair rules in {}", config.mapping_db.display()))?;
            (mapping, repairs)
        };
        debug!(seed = mapping.seed(), "mapping store ready");
        let session = Session::new(mapping, repairs).with_decider(decider, config.interactive);
        Ok(Self {
            config,
            session,
            records: RecordTransformer::new(),
            metadata: MetadataTransformer::new(),
            tables: TableTransformer::new(),
            priorities: HashMap::new(),
            seen_runs: BTreeSet::new(),
            stats: PipelineStats::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn issues(&self) -> &IssueCollector {
        self.session.issues()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Runs every stage and returns the final counters.
    ///
    /// # Errors
    ///
    /// Fails on a missing input directory, an exhausted pseudonym pool,
    /// database errors and unwritable outputs. Problems within a line,
    /// record or file are recorded as issues instead.
    pub fn run(&mut self) -> Result<PipelineStats> {
        let input = self.config.input_dir.clone();
        if !input.is_dir() {
            bail!("input directory not found: {}", input.display());
        }
        let span = info_span!(
            "anonymize",
            input = %input.display(),
            output = %self.config.output_dir.display(),
            dry_run = self.config.dry_run
        );
        let _guard = span.enter();

        if self.config.priority.is_some() {
            self.scan_priorities()?;
        }

        let runs_root = self.config.runs_root();
        if runs_root.is_dir() {
            let start = Instant::now();
            let processed = self.stats.files_processed;
            info_span!("records").in_scope(|| self.process_runs(&runs_root))?;
            info!(
                files = self.stats.files_processed - processed,
                duration_ms = start.elapsed().as_millis(),
                "runs stage complete"
            );
        }

        let eval_root = self.config.eval_root();
        if eval_root.is_dir() {
            let start = Instant::now();
            let processed = self.stats.files_processed;
            info_span!("eval").in_scope(|| self.process_eval(&eval_root))?;
            info!(
                files = self.stats.files_processed - processed,
                duration_ms = start.elapsed().as_millis(),
                "eval stage complete"
            );
        }

        let metadata_root = self.config.metadata_root();
        if metadata_root.is_dir() {
            let start = Instant::now();
            let processed = self.stats.files_processed;
            info_span!("metadata").in_scope(|| self.process_metadata(&metadata_root))?;
            info!(
                files = self.stats.files_processed - processed,
                duration_ms = start.elapsed().as_millis(),
                "metadata stage complete"
            );
        }

        let mapping = self.session.mapping().stats()?;
        self.stats.teams = mapping.teams;
        self.stats.runs = mapping.runs;
        self.stats.fingerprints = mapping.fingerprints;
        self.stats.errors = self.session.issues().error_count();
        self.stats.warnings = self.session.issues().warning_count();
        Ok(self.stats)
    }

    /// Writes the issue report.
    ///
    /// # Errors
    ///
    /// Fails if the report cannot be written.
    pub fn write_error_report(&self, path: &Path) -> Result<()> {
        self.session
            .issues()
            .write_report(path)
            .with_context(|| format!("write issue report {}", path.display()))
    }

    fn scan_priorities(&mut self) -> Result<()> {
        let root = self.config.metadata_root();
        if !root.is_dir() {
            warn!("priority filter set but no metadata directory found");
            return Ok(());
        }
        for task_dir in list_task_dirs(&root)? {
            for path in list_task_files(&task_dir)? {
                let lines = match read_lines(&path) {
                    Ok(lines) => lines,
                    Err(error) => {
                        warn!(%error, "metadata file unreadable while scanning priorities");
                        continue;
                    }
                };
                for line in &lines {
                    let Ok(record) = serde_json::from_str::<Value>(line) else {
                        continue;
                    };
                    if let Some(run) = scalar_text(record.get("runtag")) {
                        let priority = scalar_text(record.get(PRIORITY_FIELD)).unwrap_or_default();
                        self.priorities.insert(run, priority);
                    }
                }
            }
        }
        info!(runs = self.priorities.len(), "priority map built from metadata");
        Ok(())
    }

    fn passes_priority(&self, run: &str) -> bool {
        match &self.config.priority {
            None => true,
            Some(wanted) => self.priorities.get(run).is_some_and(|priority| priority == wanted),
        }
    }

    fn output_dir(&self, category: &str, task: &str) -> PathBuf {
        self.config.output_dir.join(category).join(task)
    }

    /// Reads a whole file, recording a parse error when it is unreadable.
    fn read_input(&mut self, file: &InputFile<'_>) -> Option<Vec<String>> {
        match read_lines(file.path) {
            Ok(lines) => Some(lines),
            Err(error) => {
                self.session.issues_mut().add(DataIssue::new(
                    IssueType::ParseError,
                    file.display.as_str(),
                    format!("Could not read file: {error}"),
                ));
                self.stats.files_skipped += 1;
                None
            }
        }
    }

    fn process_runs(&mut self, root: &Path) -> Result<()> {
        let category = self.config.runs_dir.clone();
        for task_dir in list_task_dirs(root)? {
            let task = dir_name(&task_dir);
            for path in list_task_files(&task_dir)? {
                let file = InputFile::new(&category, &task, &path);
                let span = info_span!("process_file", task = %task, kind = "run");
                span.in_scope(|| self.process_run_file(&category, &file))?;
            }
        }
        Ok(())
    }

    fn process_run_file(&mut self, category: &str, file: &InputFile<'_>) -> Result<()> {
        let (run, compressed) = split_gz_name(&file.name);
        let run = run.to_string();
        self.seen_runs.insert(run.clone());

        if !self.passes_priority(&run) {
            info!(file = redact_value(&file.display), "filtered by priority");
            self.stats.files_filtered += 1;
            return Ok(());
        }
        let Some(lines) = self.read_input(file) else {
            return Ok(());
        };
        let is_records = looks_like_records(&lines);

        if self.config.dry_run {
            info!(
                file = redact_value(&file.display),
                kind = if is_records { "records" } else { "table" },
                lines = lines.len(),
                "dry run: would anonymize"
            );
            return Ok(());
        }

        let output = if is_records {
            self.transform_records(file, &lines, &run)?
        } else {
            let hint = classify_table(&lines);
            debug!(format = %hint.format, reason = %hint.reason, "run file is tabular");
            let layout = TableLayout {
                run_columns: hint.run_id_columns,
                header: hint.header,
            };
            self.tables
                .transform(
                    &mut self.session,
                    &lines,
                    &layout,
                    TranslationPolicy::CreateMissing,
                    Some(&run),
                    &file.display,
                )?
                .lines
        };

        let pseudonym = self.session.mapping_mut().get_or_create_run(&run)?;
        let name = output_name(&pseudonym, compressed);
        let target = self.output_dir(category, file.task).join(&name);
        write_lines_atomic(&target, &output)
            .with_context(|| format!("write {}", target.display()))?;

        self.stats.files_processed += 1;
        self.stats.lines_processed += output.len();
        info!(
            file = redact_value(&file.display),
            output = %name,
            lines = output.len(),
            "anonymized run file"
        );
        Ok(())
    }

    fn transform_records(
        &mut self,
        file: &InputFile<'_>,
        lines: &[String],
        run: &str,
    ) -> Result<Vec<String>> {
        let mut output = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let location = file.location(Some(index + 1));
            let Some(record) = self
                .records
                .transform_line(&mut self.session, line, location, Some(run))?
            else {
                continue;
            };
            if let Some(fingerprint) = &record.fingerprint
                && !self.session.mapping().store_fingerprint(fingerprint)?
            {
                debug!(fingerprint = %fingerprint.fingerprint, "fingerprint already stored");
            }
            output.push(record.line);
        }
        Ok(output)
    }

    fn process_eval(&mut self, root: &Path) -> Result<()> {
        let category = self.config.eval_dir.clone();
        let mut known: BTreeSet<String> = self
            .session
            .mapping()
            .get_all_run_mappings()?
            .into_keys()
            .collect();
        known.extend(self.seen_runs.iter().cloned());

        for task_dir in list_task_dirs(root)? {
            let task = dir_name(&task_dir);
            let suffixes = self.config.judge_suffixes_for(&task).to_vec();
            for path in list_task_files(&task_dir)? {
                let file = InputFile::new(&category, &task, &path);
                let (stem, compressed) = split_gz_name(&file.name);
                let resolved = resolve_eval_name(stem, known.iter().map(String::as_str), &suffixes);
                let span = info_span!("process_file", task = %task, kind = "eval");
                span.in_scope(|| match resolved {
                    Some(name) => self.process_eval_file(&category, &file, &name, compressed),
                    None => {
                        let message = "No known run identifier matches this filename";
                        self.record_unmatched(&file, message);
                        Ok(())
                    }
                })?;
            }
        }
        Ok(())
    }

    fn process_eval_file(
        &mut self,
        category: &str,
        file: &InputFile<'_>,
        name: &EvalName,
        compressed: bool,
    ) -> Result<()> {
        if !self.passes_priority(&name.run) {
            info!(file = redact_value(&file.display), "filtered by priority");
            self.stats.files_filtered += 1;
            return Ok(());
        }
        let Some(lines) = self.read_input(file) else {
            return Ok(());
        };

        let override_key = format!("{}/{}", file.task, file.name);
        let detected = classify_table(&lines);
        let hint = match self.config.formats.get(&override_key) {
            Some(format) => FormatHint::declared(*format).with_header(detected.header),
            None => self.choose_format(file, detected),
        };
        if hint.format == TableFormat::Unknown && hint.run_id_columns.is_empty() {
            self.session.issues_mut().add(
                DataIssue::new(
                    IssueType::UnknownFormat,
                    file.display.as_str(),
                    format!("No run identifier columns: {}", hint.reason),
                )
                .with_context("confidence", hint.confidence.as_str()),
            );
            self.stats.files_skipped += 1;
            return Ok(());
        }

        if self.config.dry_run {
            info!(
                file = redact_value(&file.display),
                format = %hint.format,
                confidence = hint.confidence.as_str(),
                "dry run: would anonymize"
            );
            return Ok(());
        }

        let Some(pseudonym) = self.session.mapping().get_run(&name.run)? else {
            self.record_unmatched(file, "Run identifier from filename has no mapping");
            return Ok(());
        };
        let layout = TableLayout {
            run_columns: hint.run_id_columns,
            header: hint.header,
        };
        let output = self.tables.transform(
            &mut self.session,
            &lines,
            &layout,
            TranslationPolicy::RequireExisting,
            Some(&name.run),
            &file.display,
        )?;
        if !output.unknown.is_empty() {
            warn!(
                file = redact_value(&file.display),
                count = output.unknown.len(),
                "identifiers without a mapping were left unchanged"
            );
        }

        let renamed = output_name(&name.rename(&pseudonym), compressed);
        let target = self.output_dir(category, file.task).join(&renamed);
        write_lines_atomic(&target, &output.lines)
            .with_context(|| format!("write {}", target.display()))?;

        self.stats.files_processed += 1;
        self.stats.lines_processed += output.lines.len();
        info!(
            file = redact_value(&file.display),
            output = %renamed,
            format = %hint.format,
            rows = output.rows,
            "anonymized eval file"
        );
        Ok(())
    }

    /// Confirms a sniffed format with the user when the classifier is unsure.
    fn choose_format(&mut self, file: &InputFile<'_>, hint: FormatHint) -> FormatHint {
        if !self.session.interactive() || hint.confidence == Confidence::High {
            return hint;
        }
        let mut choices = vec![hint.format];
        choices.extend(TableFormat::KNOWN.into_iter().filter(|format| *format != hint.format));
        let labels: Vec<String> = choices
            .iter()
            .map(|format| format!("{format} ({})", format.description()))
            .collect();
        let prompt = format!(
            "Format of {} is uncertain ({}). Which layout is it?",
            redact_value(&file.display),
            hint.reason
        );
        match self.session.decide(&prompt, &labels) {
            0 => hint,
            choice => FormatHint::declared(choices[choice]).with_header(hint.header),
        }
    }

    fn record_unmatched(&mut self, file: &InputFile<'_>, message: &str) {
        self.session.issues_mut().add(
            DataIssue::new(IssueType::UnmatchedIdentifier, file.display.as_str(), message)
                .with_context("file_name", file.name.as_str()),
        );
        self.stats.files_skipped += 1;
    }

    fn process_metadata(&mut self, root: &Path) -> Result<()> {
        let category = self.config.metadata_dir.clone();
        for task_dir in list_task_dirs(root)? {
            let task = dir_name(&task_dir);
            for path in list_task_files(&task_dir)? {
                let file = InputFile::new(&category, &task, &path);
                let span = info_span!("process_file", task = %task, kind = "metadata");
                span.in_scope(|| self.process_metadata_file(&category, &file))?;
            }
        }
        Ok(())
    }

    fn process_metadata_file(&mut self, category: &str, file: &InputFile<'_>) -> Result<()> {
        let Some(lines) = self.read_input(file) else {
            return Ok(());
        };
        if self.config.dry_run {
            info!(
                file = redact_value(&file.display),
                lines = lines.len(),
                "dry run: would anonymize"
            );
            return Ok(());
        }

        let mut output = Vec::with_capacity(lines.len());
        let mut filtered = 0usize;
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if self.config.priority.is_some() && serde_json::from_str::<Value>(line).is_ok() {
                let run = metadata_runtag(line).unwrap_or_default();
                if !self.passes_priority(&run) {
                    filtered += 1;
                    continue;
                }
            }
            let location = file.location(Some(index + 1));
            if let Some(record) = self.metadata.transform_line(&mut self.session, line, location)? {
                output.push(record);
            }
        }

        let target = self.output_dir(category, file.task).join(&file.name);
        write_lines_atomic(&target, &output)
            .with_context(|| format!("write {}", target.display()))?;
        self.stats.files_processed += 1;
        self.stats.lines_processed += output.len();
        info!(
            file = redact_value(&file.display),
            lines = output.len(),
            filtered,
            "anonymized metadata file"
        );
        Ok(())
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn output_name(base: &str, compressed: bool) -> String {
    if compressed {
        format!("{base}.gz")
    } else {
        base.to_string()
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
