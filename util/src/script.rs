//! # Autonomous script loading
//!
//! Scripts are plain text files of at most a fixed number of lines. Each line is blank, a comment
//! starting with [`COMMENT_MARKER`], or a command token followed by parameters separated by
//! whitespace, commas, brackets or parentheses.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lines whose first non-whitespace character is this are ignored.
pub const COMMENT_MARKER: char = '#';

/// Token delimiters: whitespace and `,[]()`.
const DELIMITERS: &str = r"[\s,\[\]()]+";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A loaded script.
#[derive(Debug, Clone)]
pub struct Script {
    path: Option<PathBuf>,
    lines: Vec<String>,
    delimiters: Regex,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script has {0} lines, the maximum is {1}")]
    TooManyLines(usize, usize),

    #[error("Invalid delimiter pattern: {0}")]
    InvalidDelimiters(regex::Error),
}

/// A classified script line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    Blank,
    Comment,
    Tokens(Vec<&'a str>),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Script {
    /// Load a script from the given path.
    pub fn load<P: AsRef<Path>>(path: P, max_lines: usize) -> Result<Self, ScriptError> {
        let path = PathBuf::from(path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let text = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => return Err(ScriptError::ScriptLoadError(e)),
        };

        let mut script = Self::from_text(&text, max_lines)?;
        script.path = Some(path);
        Ok(script)
    }

    /// Build a script from text already in memory.
    pub fn from_text(text: &str, max_lines: usize) -> Result<Self, ScriptError> {
        let lines: Vec<String> = text.lines().map(String::from).collect();

        if lines.len() > max_lines {
            return Err(ScriptError::TooManyLines(lines.len(), max_lines));
        }

        Ok(Self {
            path: None,
            lines,
            delimiters: Regex::new(DELIMITERS).map_err(ScriptError::InvalidDelimiters)?,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Raw text of the line at `idx`.
    pub fn text(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    /// Classify and tokenise the line at `idx`.
    pub fn line(&self, idx: usize) -> Option<Line<'_>> {
        self.text(idx).map(|t| self.classify(t))
    }

    fn classify<'a>(&self, text: &'a str) -> Line<'a> {
        let trimmed = text.trim_start();

        if trimmed.starts_with(COMMENT_MARKER) {
            return Line::Comment;
        }

        let tokens: Vec<&str> = self
            .delimiters
            .split(trimmed)
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() {
            Line::Blank
        } else {
            Line::Tokens(tokens)
        }
    }
}
