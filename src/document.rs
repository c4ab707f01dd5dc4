use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Line terminator detected in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Line-oriented content of one file
///
/// Lines are stored without terminators; the terminator that followed
/// each line is kept alongside it, so `to_text` rebuilds the exact input
/// text for an unmodified document, mixed endings included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
    endings: Vec<LineEnding>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl Document {
    /// Split text into lines
    ///
    /// New lines get the ending of the first line break; the empty text
    /// has no lines.
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut endings = Vec::new();
        let mut trailing_newline = false;

        for piece in text.split_inclusive('\n') {
            let (line, ending) = match piece.strip_suffix('\n') {
                Some(line) => match line.strip_suffix('\r') {
                    Some(line) => (line, LineEnding::CrLf),
                    None => (line, LineEnding::Lf),
                },
                None => (piece, LineEnding::Lf),
            };
            trailing_newline = piece.ends_with('\n');
            lines.push(line.to_string());
            endings.push(ending);
        }

        let line_ending = match (endings.first(), lines.len()) {
            (Some(&ending), count) if count > 1 || trailing_newline => ending,
            _ => LineEnding::Lf,
        };
        if !trailing_newline {
            if let Some(last) = endings.last_mut() {
                *last = line_ending;
            }
        }

        Self {
            lines,
            endings,
            line_ending,
            trailing_newline,
        }
    }

    /// Build a document from lines, using LF endings and a trailing newline
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        let trailing_newline = !lines.is_empty();
        Self {
            endings: vec![LineEnding::Lf; lines.len()],
            lines,
            line_ending: LineEnding::Lf,
            trailing_newline,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Ending given to lines added by edits
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Replace the lines in `range` (zero-indexed) and return the removed ones
    pub(crate) fn splice(
        &mut self,
        range: std::ops::Range<usize>,
        replacement: Vec<String>,
    ) -> Vec<String> {
        let endings = vec![self.line_ending; replacement.len()];
        self.endings.splice(range.clone(), endings);
        let removed: Vec<String> = self.lines.splice(range, replacement).collect();
        if self.lines.is_empty() {
            self.trailing_newline = false;
        } else if removed.is_empty() && self.lines.len() == 1 {
            // first line of a previously empty document
            self.trailing_newline = true;
        }
        removed
    }

    /// Join the lines back into text
    pub fn to_text(&self) -> String {
        let last = self.lines.len().saturating_sub(1);
        let mut text = String::new();
        for (idx, (line, ending)) in self.lines.iter().zip(&self.endings).enumerate() {
            text.push_str(line);
            if idx < last || self.trailing_newline {
                text.push_str(ending.as_str());
            }
        }
        text
    }

    /// BLAKE3 hash of the document text (hex-encoded)
    pub fn checksum(&self) -> String {
        checksum(&self.to_text())
    }
}

/// BLAKE3 hash of `text` (hex-encoded)
pub fn checksum(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Content of a file read into memory
#[derive(Debug, Clone)]
pub struct FileContent {
    /// Path the file was read from
    pub path: String,
    /// Parsed document
    pub document: Document,
    /// BLAKE3 hash of the raw content (hex-encoded)
    pub checksum: String,
}

/// Error types for file operations
#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid UTF-8 in file: {0}")]
    InvalidUtf8(String),
}

/// Read a file from disk with UTF-8 validation
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<FileContent, FileError> {
    let path_ref = path.as_ref();

    if !path_ref.exists() {
        return Err(FileError::NotFound(path_ref.display().to_string()));
    }

    let bytes = fs::read(path_ref)?;
    let content = String::from_utf8(bytes)
        .map_err(|_| FileError::InvalidUtf8(path_ref.display().to_string()))?;

    Ok(FileContent {
        path: path_ref.display().to_string(),
        checksum: checksum(&content),
        document: Document::parse(&content),
    })
}
