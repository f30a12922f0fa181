use anyhow::{Result, bail};
use tracing::info;

use veil_cli::config::{PipelineConfig, load_file_config};
use veil_cli::lookup::{MappingDump, reverse_lookup};
use veil_cli::pipeline::Pipeline;
use veil_cli::prompt::TerminalDecider;
use veil_cli::types::AnonymizeResult;
use veil_map::MappingStore;
use veil_transform::{AutoDecider, Decider};

use crate::cli::{AnonymizeArgs, MappingFormatArg, ReverseLookupArgs, ShowMappingArgs};
use crate::summary::print_mapping_tables;

pub fn run_anonymize(args: &AnonymizeArgs) -> Result<AnonymizeResult> {
    let mut config = PipelineConfig::new(&args.input, &args.output, &args.mapping);
    if let Some(path) = &args.config {
        config = config.with_file(load_file_config(path)?)?;
    }
    let config = config
        .with_dirs(&args.runs_dir, &args.eval_dir, &args.metadata_dir)
        .with_interactive(!args.no_interactive)
        .with_dry_run(args.dry_run)
        .with_priority(args.priority.clone())
        .with_seed(args.seed);

    let decider: Box<dyn Decider> = if config.interactive {
        Box::new(TerminalDecider::stdio())
    } else {
        Box::new(AutoDecider)
    };
    let mut pipeline = Pipeline::open(config, decider)?;
    let stats = pipeline.run()?;

    let issues = pipeline.issues();
    let error_report = if args.dry_run || issues.is_empty() {
        None
    } else {
        let path = args
            .error_report
            .clone()
            .unwrap_or_else(|| args.output.join("errors.jsonl"));
        pipeline.write_error_report(&path)?;
        info!(path = %path.display(), issues = issues.issues().len(), "issue report written");
        Some(path)
    };

    Ok(AnonymizeResult {
        output_dir: args.output.clone(),
        mapping_db: args.mapping.clone(),
        dry_run: args.dry_run,
        stats,
        issue_counts: issues.summary(),
        emails_found: issues.emails().len(),
        error_report,
        has_errors: issues.has_errors() && !args.allow_errors,
    })
}

pub fn run_show_mapping(args: &ShowMappingArgs) -> Result<()> {
    let store = open_existing(args.mapping.as_path())?;
    let dump = MappingDump::load(&store)?;
    match args.format {
        MappingFormatArg::Table => print_mapping_tables(&dump),
        MappingFormatArg::Json => println!("{}", dump.to_json()?),
        MappingFormatArg::Csv => print!("{}", dump.to_csv()?),
    }
    Ok(())
}

/// Prints the match; returns false when nothing matched.
pub fn run_reverse_lookup(args: &ReverseLookupArgs) -> Result<bool> {
    let store = open_existing(args.mapping.as_path())?;
    match reverse_lookup(&store, &args.value)? {
        Some(found) => {
            println!("{}", found.render(&args.value));
            Ok(true)
        }
        None => {
            eprintln!("No mapping found for: {}", args.value);
            Ok(false)
        }
    }
}

fn open_existing(path: &std::path::Path) -> Result<MappingStore> {
    if !path.is_file() {
        bail!("mapping database not found: {}", path.display());
    }
    Ok(MappingStore::open(path, None)?)
}
