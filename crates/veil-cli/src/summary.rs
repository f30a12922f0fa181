use std::collections::BTreeMap;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use veil_cli::lookup::MappingDump;
use veil_cli::types::AnonymizeResult;
use veil_model::IssueType;

pub fn print_anonymize_summary(result: &AnonymizeResult) {
    if result.dry_run {
        println!("Dry run: no files or mappings were written");
    } else {
        println!("Output: {}", result.output_dir.display());
    }
    println!("Mapping DB: {}", result.mapping_db.display());
    if let Some(path) = &result.error_report {
        println!("Issue report: {}", path.display());
    }

    let stats = &result.stats;
    let mut table = Table::new();
    table.set_header(vec![header_cell("Metric"), header_cell("Count")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let rows = [
        ("Files processed", stats.files_processed),
        ("Lines processed", stats.lines_processed),
        ("Files filtered", stats.files_filtered),
        ("Files skipped", stats.files_skipped),
        ("Teams mapped", stats.teams),
        ("Runs mapped", stats.runs),
        ("Fingerprints", stats.fingerprints),
        ("Emails found", result.emails_found),
    ];
    for (label, count) in rows {
        table.add_row(vec![Cell::new(label), count_cell(count, Color::Green)]);
    }
    table.add_row(vec![
        Cell::new("Errors").add_attribute(Attribute::Bold),
        count_cell(stats.errors, Color::Red).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Warnings").add_attribute(Attribute::Bold),
        count_cell(stats.warnings, Color::Yellow).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    print_issue_table(&result.issue_counts);
}

fn print_issue_table(counts: &BTreeMap<IssueType, usize>) {
    if counts.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Issue"), header_cell("Severity"), header_cell("Count")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    align_column(&mut table, 2, CellAlignment::Right);
    for (issue_type, count) in counts {
        let (severity, color) = if issue_type.is_error() {
            ("ERROR", Color::Red)
        } else {
            ("WARN", Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(issue_type.as_str()),
            Cell::new(severity).fg(color),
            count_cell(*count, color),
        ]);
    }
    println!();
    println!("Issues:");
    println!("{table}");
}

pub fn print_mapping_tables(dump: &MappingDump) {
    for (title, mappings) in [("Team Mappings", &dump.teams), ("Run Mappings", &dump.runs)] {
        println!("{title}:");
        let mut table = Table::new();
        table.set_header(vec![header_cell("Original"), header_cell("Anonymized")]);
        apply_table_style(&mut table);
        if mappings.is_empty() {
            table.add_row(vec![dim_cell("(none)"), dim_cell("-")]);
        }
        for (original, pseudonym) in mappings {
            table.add_row(vec![Cell::new(original), Cell::new(pseudonym).fg(Color::Blue)]);
        }
        println!("{table}");
        println!();
    }

    let stats = &dump.stats;
    let mut table = Table::new();
    table.set_header(vec![header_cell("Statistic"), header_cell("Count")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (label, count) in [
        ("Teams mapped", stats.teams),
        ("Runs mapped", stats.runs),
        ("Fingerprints", stats.fingerprints),
        ("Invalidated names", stats.invalidated_names),
        ("Teams remaining", stats.teams_remaining),
        ("Runs remaining", stats.runs_remaining),
    ] {
        table.add_row(vec![Cell::new(label), Cell::new(count)]);
    }
    println!("Statistics:");
    println!("{table}");
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
