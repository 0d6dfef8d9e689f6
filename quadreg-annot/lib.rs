//! Quadrilateral annotation files: plain text, one corner per data line.
//!
//! Format: two numeric fields per line separated by a single delimiter
//! character (space by default), in corner order A, B, C, D. Lines starting
//! with `#` are comments, blank lines are skipped, and a line starting with
//! a space is rejected as ambiguous. Exactly four data lines are required.

use std::fmt::Write as _;
use std::path::Path;

use quadreg_core::{Quad, Real};

pub const DEFAULT_DELIMITER: char = ' ';

#[derive(Debug)]
pub enum AnnotError {
    CannotOpenFile { path: String, source: std::io::Error },
    MalformedLine { line: usize },
    WrongPointCount { found: usize },
    CannotWriteFile { path: String, source: std::io::Error },
}

impl std::fmt::Display for AnnotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotError::CannotOpenFile { path, source } => {
                write!(f, "Cannot open annotation file {}: {}", path, source)
            }
            AnnotError::MalformedLine { line } => {
                write!(f, "Malformed annotation line {}", line)
            }
            AnnotError::WrongPointCount { found } => {
                write!(f, "Expected exactly 4 corner points, found {}", found)
            }
            AnnotError::CannotWriteFile { path, source } => {
                write!(f, "Cannot write annotation file {}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for AnnotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnnotError::CannotOpenFile { source, .. } => Some(source),
            AnnotError::CannotWriteFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type AnnotResult<T> = Result<T, AnnotError>;

/// Parses annotation text into a quad, corner order A, B, C, D.
pub fn parse_annot_str<F: Real>(content: &str, delim: char) -> AnnotResult<Quad<F>> {
    let mut flat = [F::zero(); 8];
    let mut found = 0usize;

    for (index, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        // leading whitespace is ambiguous with the field delimiter
        if line.starts_with(' ') {
            return Err(AnnotError::MalformedLine { line: index + 1 });
        }
        if line.starts_with('#') {
            continue;
        }

        let mut fields = line.split(delim);
        let x = parse_field::<F>(fields.next(), index)?;
        let y = parse_field::<F>(fields.next(), index)?;
        // trailing fields are ignored

        if found < 4 {
            flat[2 * found] = x;
            flat[2 * found + 1] = y;
        }
        found += 1;
    }

    if found != 4 {
        return Err(AnnotError::WrongPointCount { found });
    }
    Ok(Quad::from_flat(&flat))
}

fn parse_field<F: Real>(field: Option<&str>, index: usize) -> AnnotResult<F> {
    let text = field.ok_or(AnnotError::MalformedLine { line: index + 1 })?;
    let value: f64 = text
        .trim_end()
        .parse()
        .map_err(|_| AnnotError::MalformedLine { line: index + 1 })?;
    Ok(<F as Real>::from_f64(value))
}

/// Reads and parses an annotation file with the default delimiter.
pub fn parse_annot_file<F: Real>(path: impl AsRef<Path>) -> AnnotResult<Quad<F>> {
    parse_annot_file_with_delim(path, DEFAULT_DELIMITER)
}

pub fn parse_annot_file_with_delim<F: Real>(
    path: impl AsRef<Path>,
    delim: char,
) -> AnnotResult<Quad<F>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| AnnotError::CannotOpenFile {
        path: path.display().to_string(),
        source,
    })?;
    parse_annot_str(&content, delim)
}

/// Formats a quad in the annotation file layout.
pub fn format_annot<F: Real>(quad: &Quad<F>, delim: char) -> String {
    let mut out = String::from("# quadrilateral corners A B C D (x y)\n");
    for p in &quad.pts {
        let _ = writeln!(out, "{}{}{}", p[0].to_f64(), delim, p[1].to_f64());
    }
    out
}

/// Writes a quad as an annotation file with the default delimiter.
pub fn write_annot_file<F: Real>(path: impl AsRef<Path>, quad: &Quad<F>) -> AnnotResult<()> {
    let path = path.as_ref();
    std::fs::write(path, format_annot(quad, DEFAULT_DELIMITER)).map_err(|source| {
        AnnotError::CannotWriteFile {
            path: path.display().to_string(),
            source,
        }
    })
}
