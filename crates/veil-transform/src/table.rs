//! Whitespace-delimited tables with run identifiers in known columns.

use std::collections::BTreeSet;

use tracing::warn;
use veil_ingest::{is_data_line, is_runid_row};
use veil_map::MappingStore;

use crate::error::Result;
use crate::session::Session;

/// How identifiers without an existing mapping are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationPolicy {
    /// Issue a new pseudonym.
    CreateMissing,
    /// Keep the value and report it as unknown.
    RequireExisting,
}

/// Which cells of a table hold run identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    pub run_columns: Vec<usize>,
    /// The first data row is a header and is copied unchanged.
    pub header: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOutput {
    pub lines: Vec<String>,
    /// Data rows rewritten (headers, blanks and comments excluded).
    pub rows: usize,
    /// Identifiers left untranslated, in first-seen order.
    pub unknown: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TableTransformer;

impl TableTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Rewrites run identifiers in `lines`.
    ///
    /// With `authority`, every identifier cell and the `runid` line take the
    /// pseudonym of that run, whatever the cell held. Data rows are
    /// re-joined with tabs; blank and `#` lines are copied as-is.
    pub fn transform<S: AsRef<str>>(
        &self,
        session: &mut Session,
        lines: &[S],
        layout: &TableLayout,
        policy: TranslationPolicy,
        authority: Option<&str>,
        file: &str,
    ) -> Result<TableOutput> {
        let mut rewriter = Rewriter {
            mapping: &mut session.mapping,
            policy,
            authority: None,
            stale: BTreeSet::new(),
            unknown: Vec::new(),
        };
        if let Some(run) = authority {
            match translate(rewriter.mapping, run, policy)? {
                Some(pseudonym) => rewriter.authority = Some((run.to_string(), pseudonym)),
                None => rewriter.unknown.push(run.to_string()),
            }
        }

        let mut output = TableOutput::default();
        let mut header_pending = layout.header;
        for line in lines {
            let line = line.as_ref();
            if !is_data_line(line) {
                output.lines.push(line.to_string());
                continue;
            }
            if header_pending {
                header_pending = false;
                output.lines.push(line.to_string());
                continue;
            }

            let mut tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            let borrowed: Vec<&str> = tokens.iter().map(String::as_str).collect();
            if is_runid_row(&borrowed) {
                tokens[2] = rewriter.rewrite(&tokens[2])?;
            } else {
                for &column in &layout.run_columns {
                    if let Some(cell) = tokens.get(column) {
                        let replacement = rewriter.rewrite(cell)?;
                        tokens[column] = replacement;
                    }
                }
            }
            output.rows += 1;
            output.lines.push(tokens.join("\t"));
        }

        if !rewriter.stale.is_empty() {
            warn!(
                file,
                distinct = rewriter.stale.len(),
                "run identifiers in content differ from filename; using filename"
            );
        }
        output.unknown = rewriter.unknown;
        Ok(output)
    }
}

struct Rewriter<'a> {
    mapping: &'a mut MappingStore,
    policy: TranslationPolicy,
    /// Original run from the filename and its pseudonym.
    authority: Option<(String, String)>,
    stale: BTreeSet<String>,
    unknown: Vec<String>,
}

impl Rewriter<'_> {
    fn rewrite(&mut self, cell: &str) -> Result<String> {
        if let Some((original, pseudonym)) = &self.authority {
            if cell != original && cell != pseudonym {
                self.stale.insert(cell.to_string());
            }
            return Ok(pseudonym.clone());
        }
        match translate(self.mapping, cell, self.policy)? {
            Some(pseudonym) => Ok(pseudonym),
            None => {
                if !self.unknown.iter().any(|known| known == cell) {
                    self.unknown.push(cell.to_string());
                }
                Ok(cell.to_string())
            }
        }
    }
}

fn translate(
    mapping: &mut MappingStore,
    value: &str,
    policy: TranslationPolicy,
) -> Result<Option<String>> {
    if let Some(pseudonym) = mapping.get_run(value)? {
        return Ok(Some(pseudonym));
    }
    match policy {
        TranslationPolicy::CreateMissing => Ok(Some(mapping.get_or_create_run(value)?)),
        TranslationPolicy::RequireExisting => Ok(None),
    }
}
