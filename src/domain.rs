use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

pub const HELP_TEXT: &str = "\
Navigation
  ←↓↑→ / hjkl     move cursor
  PgUp / PgDn     page up / down
  g / G           first / last row
  0 / $           first / last column

Table
  o               sort by column (again to flip)
  s / S           sort ascending / descending
  Enter           edit cell / toggle checkbox
  Space           toggle checkbox of the row
  v               highlight row
  r               reload file (drops edits)

Editing
  Enter           commit
  Esc             cancel

General
  ?               help
  Esc             close popup
  q               quit";

#[derive(Debug, Clone, Setters)]
pub struct TVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub sort_column: i32,
    pub sort_ascending: bool,
    pub editable_columns: Vec<i32>,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            sort_column: 1,
            sort_ascending: true,
            editable_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveToFirstColumn,
    MoveToLastColumn,
    SortAscending,
    SortDescending,
    ToggleSort,
    Activate,
    ToggleCheckbox,
    ToggleHighlight,
    Reload,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug)]
pub enum TVError {
    IoError(Error),
    XmlError(roxmltree::Error),
    LoggingFailed(String),
    InvalidPath(String),
}

impl fmt::Display for TVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVError::IoError(e) => write!(f, "I/O error: {e}"),
            TVError::XmlError(e) => write!(f, "invalid XML: {e}"),
            TVError::LoggingFailed(msg) => write!(f, "failed to set up logging: {msg}"),
            TVError::InvalidPath(msg) => write!(f, "invalid path: {msg}"),
        }
    }
}

impl std::error::Error for TVError {}

impl From<Error> for TVError {
    fn from(err: Error) -> Self {
        TVError::IoError(err)
    }
}

impl From<roxmltree::Error> for TVError {
    fn from(err: roxmltree::Error) -> Self {
        TVError::XmlError(err)
    }
}
