use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::engine::{SortKey, TableOptions};

#[derive(Debug, Error)]
pub enum DMError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("invalid json dataset: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("unknown file type: {}", .0.display())]
    UnknownFileType(PathBuf),
    #[error("dataset contains no records")]
    EmptyDataset,
    #[error("duplicate column id \"{0}\"")]
    DuplicateColumn(String),
    #[error("unknown column id \"{0}\"")]
    UnknownColumn(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub default_sort: SortKey,
    pub page_size: usize,
    pub min_rows: usize,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 32,
            default_sort: SortKey::ascending("valuation"),
            page_size: 10,
            min_rows: 0,
        }
    }
}

impl TVConfig {
    pub fn table_options(&self) -> TableOptions {
        TableOptions::default()
            .with_default_sort(self.default_sort.clone())
            .with_page_size(self.page_size)
            .with_min_rows(self.min_rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    Filter,
    ClearFilter,
    ClearAllFilters,
    SortAscending,
    SortDescending,
    ResetSort,
    CopyCell,
    CopyRow,
    Help,
    Enter,
    Exit,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Navigation
  j / Down        next row        k / Up       previous row
  l / Right       next column     h / Left     previous column
  n / PgDn        next page       p / PgUp     previous page
  g               first page      G            last page

Filter and sort
  f or /          filter selected column (Enter to apply, Esc to cancel)
  x               clear filter of selected column
  X               clear all filters
  s / S           sort selected column ascending / descending
  r               reset to the default sort

Other
  Enter           show record      Esc         back
  c               copy cell        C           copy row
  ?               this help        q           quit

Numeric columns keep rows whose value is greater than the typed number.
Text columns keep rows containing the typed text, ignoring case.";
