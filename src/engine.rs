use derive_setters::Setters;
use rayon::prelude::*;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::column::{CellValue, ColumnSpec, RenderedCell, Schema};
use crate::domain::DMError;
use crate::record::{CompanyRecord, Dataset};

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

impl FromStr for SortKey {
    type Err = DMError;

    /// Accepts `id`, `id:asc` or `id:desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, direction) = match s.split_once(':') {
            Some((c, d)) => (c.trim(), d.trim().to_ascii_lowercase()),
            None => (s.trim(), String::from("asc")),
        };
        if column.is_empty() {
            return Err(DMError::InvalidOption(format!("empty sort column in {s:?}")));
        }
        match direction.as_str() {
            "asc" => Ok(SortKey::ascending(column)),
            "desc" => Ok(SortKey::descending(column)),
            other => Err(DMError::InvalidOption(format!(
                "unknown sort direction {other:?}, expected asc or desc"
            ))),
        }
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TableOptions {
    pub default_sort: SortKey,
    pub page_size: usize,
    /// Short pages are padded with empty rows up to this count. 0 disables padding.
    pub min_rows: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            default_sort: SortKey::ascending("valuation"),
            page_size: 10,
            min_rows: 0,
        }
    }
}

impl TableOptions {
    pub fn validate(&self, schema: &Schema) -> Result<(), DMError> {
        if self.page_size == 0 {
            return Err(DMError::InvalidOption("page size must be at least 1".into()));
        }
        schema.require(&self.default_sort.column)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

/// User controlled part of the view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableState {
    filters: Vec<ColumnFilter>,
    sort: Option<SortKey>,
    page: usize,
}

impl TableState {
    /// Replaces the filter of a column. An empty value removes it.
    pub fn set_filter(&mut self, column: &str, value: &str) {
        self.page = 0;
        if value.is_empty() {
            self.clear_filter(column);
            return;
        }
        match self.filters.iter_mut().find(|f| f.column == column) {
            Some(filter) => filter.value = value.to_string(),
            None => self.filters.push(ColumnFilter {
                column: column.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn clear_filter(&mut self, column: &str) {
        self.page = 0;
        self.filters.retain(|f| f.column != column);
    }

    pub fn clear_filters(&mut self) {
        self.page = 0;
        self.filters.clear();
    }

    pub fn filter(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.column == column)
            .map(|f| f.value.as_str())
    }

    pub fn filters(&self) -> &[ColumnFilter] {
        &self.filters
    }

    pub fn set_sort(&mut self, sort: Option<SortKey>) {
        self.sort = sort;
    }

    pub fn sort(&self) -> Option<&SortKey> {
        self.sort.as_ref()
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    pub fn page(&self) -> usize {
        self.page
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub id: &'static str,
    pub label: &'static str,
    pub filter: Option<String>,
    /// `Some(descending)` on the column the rows are sorted by.
    pub sorted: Option<bool>,
    pub numeric: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    /// Index into the dataset, `None` for padding rows.
    pub record: Option<usize>,
    pub cells: Vec<RenderedCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTable {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<RenderedRow>,
    /// Zero based.
    pub page: usize,
    pub total_pages: usize,
    pub matched: usize,
    pub total: usize,
}

pub fn page_count(matched: usize, page_size: usize) -> usize {
    matched.div_ceil(page_size.max(1)).max(1)
}

/// Indices of the records passing every active filter, in dataset order.
pub fn filter_rows(records: &[CompanyRecord], schema: &Schema, filters: &[ColumnFilter]) -> Vec<usize> {
    let active: Vec<(&ColumnSpec, &str)> = filters
        .iter()
        .filter(|f| !f.value.is_empty())
        .filter_map(|f| schema.get(&f.column).map(|c| (c, f.value.as_str())))
        .collect();
    if active.is_empty() {
        return (0..records.len()).collect();
    }
    (0..records.len())
        .into_par_iter()
        .filter(|&idx| {
            active
                .iter()
                .all(|(column, value)| column.matches(value, &records[idx]))
        })
        .collect()
}

/// Stable sort of row indices; equal keys keep their current order.
pub fn sort_rows(records: &[CompanyRecord], column: &ColumnSpec, descending: bool, rows: &mut [usize]) {
    let mut indexed_rows: Vec<(usize, CellValue)> = rows
        .iter()
        .map(|&idx| (idx, column.value(&records[idx])))
        .collect();
    if descending {
        indexed_rows.sort_by(|(_, a), (_, b)| b.compare(a));
    } else {
        indexed_rows.sort_by(|(_, a), (_, b)| a.compare(b));
    }
    for (slot, (idx, _)) in rows.iter_mut().zip(indexed_rows) {
        *slot = idx;
    }
}

/// Filtered and sorted row indices for a state.
pub fn view_rows(
    records: &[CompanyRecord],
    schema: &Schema,
    options: &TableOptions,
    state: &TableState,
) -> Vec<usize> {
    let mut rows = filter_rows(records, schema, state.filters());
    let sort = state.sort().unwrap_or(&options.default_sort);
    if let Some(column) = schema.get(&sort.column) {
        sort_rows(records, column, sort.descending, &mut rows);
    }
    rows
}

/// Renders one page of the table. Filtering and sorting never touch `records`.
///
/// Fails on options [`TableOptions::validate`] rejects and on a sort column
/// that is not in `schema`.
pub fn render(
    records: &[CompanyRecord],
    schema: &Schema,
    options: &TableOptions,
    state: &TableState,
) -> Result<RenderedTable, DMError> {
    options.validate(schema)?;
    if let Some(sort) = state.sort() {
        schema.require(&sort.column)?;
    }
    let rows = view_rows(records, schema, options, state);
    Ok(render_rows(records, schema, options, state, &rows))
}

fn render_rows(
    records: &[CompanyRecord],
    schema: &Schema,
    options: &TableOptions,
    state: &TableState,
    rows: &[usize],
) -> RenderedTable {
    let sort = state.sort().unwrap_or(&options.default_sort);
    let headers = schema
        .columns()
        .iter()
        .map(|c| HeaderCell {
            id: c.id,
            label: c.label,
            filter: state.filter(c.id).map(str::to_string),
            sorted: (c.id == sort.column).then_some(sort.descending),
            numeric: c.numeric,
        })
        .collect();

    let total_pages = page_count(rows.len(), options.page_size);
    let page = state.page().min(total_pages - 1);
    let begin = std::cmp::min(page * options.page_size, rows.len());
    let end = std::cmp::min(begin + options.page_size, rows.len());

    let mut rendered: Vec<RenderedRow> = rows[begin..end]
        .iter()
        .map(|&idx| RenderedRow {
            record: Some(idx),
            cells: schema
                .columns()
                .iter()
                .map(|c| c.render(&records[idx]))
                .collect(),
        })
        .collect();
    while rendered.len() < options.min_rows {
        rendered.push(RenderedRow {
            record: None,
            cells: vec![RenderedCell::plain(""); schema.len()],
        });
    }

    RenderedTable {
        headers,
        rows: rendered,
        page,
        total_pages,
        matched: rows.len(),
        total: records.len(),
    }
}

/// A dataset under a schema with its current filter, sort and page.
/// The filtered and sorted rows are cached and rebuilt on every state change.
pub struct TableView {
    dataset: Dataset,
    schema: Schema,
    options: TableOptions,
    state: TableState,
    rows: Arc<Vec<usize>>, // View row index to dataset index
}

impl TableView {
    pub fn new(dataset: Dataset, schema: Schema, options: TableOptions) -> Result<Self, DMError> {
        options.validate(&schema)?;
        debug!("Table options: {:?}", options);
        let mut table = Self {
            dataset,
            schema,
            options,
            state: TableState::default(),
            rows: Arc::new(Vec::new()),
        };
        table.refresh();
        Ok(table)
    }

    fn refresh(&mut self) {
        let start_time = Instant::now();
        self.rows = Arc::new(view_rows(
            self.dataset.records(),
            &self.schema,
            &self.options,
            &self.state,
        ));
        // Keep the current page valid for the new row set.
        let last = self.total_pages() - 1;
        if self.state.page() > last {
            self.state.set_page(last);
        }
        trace!(
            "View rebuilt: {} of {} rows, page {}/{} in {}us",
            self.rows.len(),
            self.dataset.len(),
            self.state.page() + 1,
            self.total_pages(),
            start_time.elapsed().as_micros()
        );
    }

    pub fn render(&self) -> RenderedTable {
        render_rows(
            self.dataset.records(),
            &self.schema,
            &self.options,
            &self.state,
            &self.rows,
        )
    }

    pub fn set_filter(&mut self, column: &str, value: &str) -> Result<(), DMError> {
        self.schema.require(column)?;
        self.state.set_filter(column, value);
        self.refresh();
        Ok(())
    }

    pub fn clear_filter(&mut self, column: &str) {
        self.state.clear_filter(column);
        self.refresh();
    }

    pub fn clear_filters(&mut self) {
        self.state.clear_filters();
        self.refresh();
    }

    pub fn sort_by(&mut self, column: &str, descending: bool) -> Result<(), DMError> {
        self.schema.require(column)?;
        self.state.set_sort(Some(SortKey {
            column: column.to_string(),
            descending,
        }));
        self.refresh();
        Ok(())
    }

    pub fn reset_sort(&mut self) {
        self.state.set_sort(None);
        self.refresh();
    }

    pub fn current_sort(&self) -> &SortKey {
        self.state.sort().unwrap_or(&self.options.default_sort)
    }

    /// Moves to a zero based page, clamped to the last page.
    pub fn set_page(&mut self, page: usize) {
        self.state.set_page(std::cmp::min(page, self.total_pages() - 1));
    }

    pub fn next_page(&mut self) -> bool {
        let page = self.state.page();
        self.set_page(page + 1);
        self.state.page() != page
    }

    pub fn prev_page(&mut self) -> bool {
        let page = self.state.page();
        self.set_page(page.saturating_sub(1));
        self.state.page() != page
    }

    pub fn first_page(&mut self) {
        self.set_page(0);
    }

    pub fn last_page(&mut self) {
        self.set_page(self.total_pages() - 1);
    }

    pub fn page(&self) -> usize {
        self.state.page()
    }

    pub fn total_pages(&self) -> usize {
        page_count(self.rows.len(), self.options.page_size)
    }

    /// Dataset indices shown on the current page.
    pub fn page_rows(&self) -> &[usize] {
        let begin = std::cmp::min(self.state.page() * self.options.page_size, self.rows.len());
        let end = std::cmp::min(begin + self.options.page_size, self.rows.len());
        &self.rows[begin..end]
    }

    /// Record at a position of the current page.
    pub fn page_record(&self, row: usize) -> Option<&CompanyRecord> {
        self.page_rows()
            .get(row)
            .map(|&idx| &self.dataset.records()[idx])
    }

    pub fn rows(&self) -> Arc<Vec<usize>> {
        Arc::clone(&self.rows)
    }

    pub fn matched_records(&self) -> impl Iterator<Item = &CompanyRecord> {
        self.rows.iter().map(|&idx| &self.dataset.records()[idx])
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}
