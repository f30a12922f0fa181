//! Line-oriented reading and writing of plain and gzip files.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::{IngestError, Result};

const GZ_SUFFIX: &str = ".gz";

pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Splits `name.gz` into `("name", true)`; other names are returned whole.
pub fn split_gz_name(file_name: &str) -> (&str, bool) {
    match file_name.strip_suffix(GZ_SUFFIX) {
        Some(stem) if !stem.is_empty() => (stem, true),
        _ => (file_name, false),
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|source| IngestError::io("open", path, source))?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Reads every line, without line terminators.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let reader = open_reader(path)?;
    reader
        .lines()
        .map(|line| line.map(strip_cr).map_err(|source| IngestError::io("read", path, source)))
        .collect()
}

/// Writes lines with `\n` terminators, compressing when the path ends in `.gz`.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    write_lines_to(path, lines, is_gzip(path))
}

/// Writes to a temporary sibling and renames it into place.
pub fn write_lines_atomic<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!("{name}.partial"));
    write_lines_to(&temp, lines, is_gzip(path))?;
    fs::rename(&temp, path).map_err(|source| IngestError::io("rename", path, source))
}

fn write_lines_to<S: AsRef<str>>(path: &Path, lines: &[S], compress: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| IngestError::io("create", parent, source))?;
    }
    let file = File::create(path).map_err(|source| IngestError::io("create", path, source))?;
    let write_err = |source: std::io::Error| IngestError::io("write", path, source);
    if compress {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_all_lines(&mut encoder, lines).map_err(write_err)?;
        let mut inner = encoder.finish().map_err(write_err)?;
        inner.flush().map_err(write_err)?;
    } else {
        let mut writer = BufWriter::new(file);
        write_all_lines(&mut writer, lines).map_err(write_err)?;
        writer.flush().map_err(write_err)?;
    }
    Ok(())
}

fn write_all_lines<W: Write, S: AsRef<str>>(writer: &mut W, lines: &[S]) -> std::io::Result<()> {
    for line in lines {
        writer.write_all(line.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

fn strip_cr(mut line: String) -> String {
    if line.ends_with('\r') {
        line.pop();
    }
    line
}
