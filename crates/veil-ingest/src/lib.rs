//! Discovery, sniffing and line I/O for evaluation data trees.
//!
//! Inputs are laid out as `<category>/<task>/<file>`; every file is read
//! line by line, transparently decompressing `.gz`.

pub mod classify;
pub mod discovery;
pub mod error;
pub mod io;

pub use classify::{SAMPLE_ROWS, classify_table, is_data_line, is_runid_row, looks_like_records};
pub use discovery::{EvalName, list_task_dirs, list_task_files, resolve_eval_name};
pub use error::{IngestError, Result};
pub use io::{is_gzip, read_lines, split_gz_name, write_lines, write_lines_atomic};
