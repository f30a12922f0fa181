//! Heuristic format sniffing for tabular evaluation files.
//!
//! Classification looks at up to [`SAMPLE_ROWS`] data rows. A header row
//! naming run columns, or both topic and metric columns, decides the format
//! directly; otherwise the most common column count decides it, with a few
//! value checks on the first row of that width.

use veil_model::{Confidence, FormatHint, TableFormat};

/// Data rows inspected when classifying.
pub const SAMPLE_ROWS: usize = 10;

const RUN_HEADERS: &[&str] = &["run_id", "runtag", "run", "runid", "system"];
const TOPIC_HEADERS: &[&str] = &[
    "topic_id",
    "request_id",
    "query_id",
    "narrative_id",
    "topicid",
    "queryid",
];
const METRIC_HEADERS: &[&str] = &["metric", "measure", "eval_metric"];

/// Lines that carry data: not blank and not `#` comments.
pub fn is_data_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// Whether the content looks like one JSON object per line.
pub fn looks_like_records<S: AsRef<str>>(lines: &[S]) -> bool {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.starts_with('{'))
}

pub fn classify_table<S: AsRef<str>>(lines: &[S]) -> FormatHint {
    let rows: Vec<Vec<&str>> = lines
        .iter()
        .map(|line| line.as_ref())
        .filter(|line| is_data_line(line))
        .take(SAMPLE_ROWS)
        .map(|line| line.split_whitespace().collect())
        .collect();

    let Some(first_row) = rows.first() else {
        return FormatHint::new(TableFormat::Unknown, Confidence::Low, "No data rows");
    };
    if let Some(hint) = classify_header(first_row) {
        return hint;
    }

    let width = modal_width(&rows);
    let sample = rows
        .iter()
        .find(|row| row.len() == width)
        .map_or(&[][..], Vec::as_slice);

    match width {
        3 => FormatHint::new(
            TableFormat::TrecEval,
            Confidence::High,
            "3 columns: metric topic value",
        ),
        4 if is_integer(sample[1]) => FormatHint::new(
            TableFormat::IrMeasures,
            Confidence::Medium,
            "4 columns with an integer topic in column 1",
        ),
        4 if is_integer(sample[2]) => FormatHint::new(
            TableFormat::Tot,
            Confidence::Medium,
            "4 columns with an integer in column 2",
        ),
        4 => FormatHint::new(
            TableFormat::Tot,
            Confidence::Low,
            "4 columns without integer fields",
        ),
        6 if sample[1] == "Q0" && is_float(sample[4]) => FormatHint::new(
            TableFormat::Ranking,
            Confidence::Medium,
            "6 columns with Q0 marker and numeric score",
        ),
        6 if sample[1] == "Q0" => FormatHint::new(
            TableFormat::Ranking,
            Confidence::Low,
            "6 columns with Q0 marker, non-numeric score",
        ),
        6 => FormatHint::new(
            TableFormat::Unknown,
            Confidence::Low,
            "6 columns without Q0 marker",
        )
        .with_columns(vec![5]),
        n => FormatHint::new(
            TableFormat::Unknown,
            Confidence::Low,
            format!("Unusual column count: {n}"),
        ),
    }
}

/// The `runid all <name>` line some evaluation tools emit.
pub fn is_runid_row(tokens: &[&str]) -> bool {
    tokens.len() == 3 && tokens[0].eq_ignore_ascii_case("runid")
}

fn classify_header(tokens: &[&str]) -> Option<FormatHint> {
    if is_runid_row(tokens) || tokens.iter().any(|token| is_float(token)) {
        return None;
    }
    let lowered: Vec<String> = tokens.iter().map(|token| token.to_ascii_lowercase()).collect();
    let in_group = |group: &[&str]| lowered.iter().any(|token| group.contains(&token.as_str()));
    let run_columns: Vec<usize> = lowered
        .iter()
        .enumerate()
        .filter(|(_, token)| RUN_HEADERS.contains(&token.as_str()))
        .map(|(index, _)| index)
        .collect();
    let has_topic = in_group(TOPIC_HEADERS);
    let has_metric = in_group(METRIC_HEADERS);

    let format = if !run_columns.is_empty() {
        if has_metric {
            TableFormat::IrMeasures
        } else {
            TableFormat::Ranking
        }
    } else if has_topic && has_metric {
        TableFormat::TrecEval
    } else {
        return None;
    };
    let reason = format!("Header detected: {}", tokens.join(", "));
    let hint = FormatHint::new(format, Confidence::High, reason);
    let hint = if run_columns.is_empty() {
        hint
    } else {
        hint.with_columns(run_columns)
    };
    Some(hint.with_header(true))
}

/// Most frequent row width; ties go to the width seen first.
fn modal_width(rows: &[Vec<&str>]) -> usize {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for row in rows {
        match counts.iter_mut().find(|(width, _)| *width == row.len()) {
            Some((_, count)) => *count += 1,
            None => counts.push((row.len(), 1)),
        }
    }
    counts
        .iter()
        .fold(None, |best: Option<(usize, usize)>, &(width, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((width, count)),
        })
        .map_or(0, |(width, _)| width)
}

fn is_integer(token: &str) -> bool {
    token.parse::<i64>().is_ok()
}

fn is_float(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}
