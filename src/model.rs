use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

use crate::column::Schema;
use crate::domain::{CMDMode, DMError, HELP_TEXT, Message, TVConfig};
use crate::engine::{RenderedTable, TableView};
use crate::inputter::{InputResult, Inputter};
use crate::record::Dataset;
use crate::stats::Statistics;

/// How long a status message stays on the command line.
pub const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

struct RecordView {
    position: usize, // Index into TableView.rows
    curser_row: usize,
}

/// One field of the record view.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub label: String,
    pub value: String,
}

pub struct UIData {
    pub name: String,
    pub table: RenderedTable,
    pub stats: Statistics,
    pub filtered_stats: Statistics,
    pub selected_row: usize,
    pub selected_column: usize,
    pub record: Option<Vec<RecordField>>,
    pub record_position: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_column: String,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    /// The status message, or nothing once it is older than [`STATUS_MESSAGE_TIMEOUT`].
    pub fn visible_status(&self, now: Instant) -> &str {
        if now.saturating_duration_since(self.last_status_message_update) < STATUS_MESSAGE_TIMEOUT {
            &self.status_message
        } else {
            ""
        }
    }
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    table: TableView,
    stats: Statistics,
    filtered_stats: Statistics,
    curser_row: usize,
    curser_column: usize,
    record_view: RecordView,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &TVConfig, dataset: Dataset, schema: Schema) -> Result<Self, DMError> {
        let options = config.table_options();
        let stats = Statistics::of(dataset.records());
        let table = TableView::new(dataset, schema, options)?;
        let uidata = UIData {
            name: table.dataset().name().to_string(),
            table: table.render(),
            stats,
            filtered_stats: stats,
            selected_row: 0,
            selected_column: 0,
            record: None,
            record_position: 0,
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_column: String::new(),
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };

        let mut model = Self {
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            table,
            stats,
            filtered_stats: stats,
            curser_row: 0,
            curser_column: 0,
            record_view: RecordView {
                position: 0,
                curser_row: 0,
            },
            uidata,
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.set_status_message(format!(
            "Loaded {} companies, press ? for help",
            model.stats.companies
        ));
        model.update_uidata();
        Ok(model)
    }

    /// Applies a filter before the UI starts, e.g. from the command line.
    pub fn apply_filter(&mut self, column: &str, value: &str) -> Result<(), DMError> {
        self.table.set_filter(column, value)?;
        self.after_table_change();
        Ok(())
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn table(&self) -> &TableView {
        &self.table
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    /// Key events go to the line editor untouched while it is active.
    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DMError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);

        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_table_selection_up(),
                Message::MoveDown => self.move_table_selection_down(),
                Message::MoveLeft => self.move_table_selection_left(),
                Message::MoveRight => self.move_table_selection_right(),
                Message::NextPage => self.change_page(|t| {
                    t.next_page();
                }),
                Message::PrevPage => self.change_page(|t| {
                    t.prev_page();
                }),
                Message::FirstPage => self.change_page(TableView::first_page),
                Message::LastPage => self.change_page(TableView::last_page),
                Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                Message::ClearFilter => self.clear_current_filter(),
                Message::ClearAllFilters => {
                    self.table.clear_filters();
                    self.after_table_change();
                    self.set_status_message("Cleared all filters");
                }
                Message::SortAscending => self.sort_current_column(false)?,
                Message::SortDescending => self.sort_current_column(true)?,
                Message::ResetSort => {
                    self.table.reset_sort();
                    self.after_table_change();
                    self.set_status_message("Default sort restored");
                }
                Message::CopyCell => self.copy_table_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::Help => self.show_help(),
                Message::Enter => self.enter(),
                _ => (),
            },
            Modus::RECORD => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => {
                    self.record_view.curser_row = self.record_view.curser_row.saturating_sub(1)
                }
                Message::MoveDown => {
                    let last = self
                        .record_fields(self.record_view.position)
                        .map_or(0, |f| f.len().saturating_sub(1));
                    self.record_view.curser_row =
                        std::cmp::min(self.record_view.curser_row + 1, last);
                }
                Message::MoveLeft | Message::PrevPage => self.previous_record(),
                Message::MoveRight | Message::NextPage => self.next_record(),
                Message::CopyCell => self.copy_record_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::Help => self.show_help(),
                Message::Exit => self.exit(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.exit(),
                _ => (),
            },
            Modus::CMDINPUT => match msg {
                Message::RawKey(key) => self.raw_input(key)?,
                _ => (),
            },
        }

        self.update_uidata();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        if self.table.page_rows().is_empty() {
            self.set_status_message("No record to show");
            return;
        }
        self.record_view = RecordView {
            position: self.table.page() * self.table.options().page_size + self.curser_row,
            curser_row: 0,
        };
        self.previous_modus = self.modus;
        self.modus = Modus::RECORD;
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::RECORD => {
                // Keep the table cursor on the record that was shown last.
                let page_size = self.table.options().page_size;
                self.table.set_page(self.record_view.position / page_size);
                self.curser_row = self.record_view.position % page_size;
                self.clamp_curser();
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
            Modus::TABLE | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn current_column_id(&self) -> &'static str {
        self.table.schema().columns()[self.curser_column].id
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;

        self.input.clear();
        let current = self
            .table
            .state()
            .filter(self.current_column_id())
            .unwrap_or_default()
            .to_string();
        self.input.set(&current);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) -> Result<(), DMError> {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input()?;
            }
        }
        Ok(())
    }

    fn handle_cmd_input(&mut self) -> Result<(), DMError> {
        trace!("Handle cmd input {:?}", self.last_input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_mode = self.cmd_mode.take();
        if self.last_input.canceled {
            self.set_status_message("Canceled");
            return Ok(());
        }

        match cmd_mode {
            Some(CMDMode::Filter) => {
                let column = self.current_column_id();
                let value = self.last_input.input.clone();
                self.table.set_filter(column, &value)?;
                self.after_table_change();
                if value.is_empty() {
                    self.set_status_message(format!("Cleared filter on {column}"));
                } else {
                    self.set_status_message(format!(
                        "Filter {column}: {value:?}, {} matches",
                        self.table.rows().len()
                    ));
                }
            }
            None => info!("Cmd mode is none!"),
        }
        Ok(())
    }

    fn clear_current_filter(&mut self) {
        let column = self.current_column_id();
        if self.table.state().filter(column).is_some() {
            self.table.clear_filter(column);
            self.after_table_change();
            self.set_status_message(format!("Cleared filter on {column}"));
        }
    }

    fn sort_current_column(&mut self, descending: bool) -> Result<(), DMError> {
        let column = self.current_column_id();
        self.table.sort_by(column, descending)?;
        self.after_table_change();
        let direction = if descending { "descending" } else { "ascending" };
        self.set_status_message(format!("Sorted by {column} {direction}"));
        Ok(())
    }

    fn change_page(&mut self, change: impl FnOnce(&mut TableView)) {
        change(&mut self.table);
        self.clamp_curser();
    }

    fn after_table_change(&mut self) {
        self.filtered_stats = Statistics::of(self.table.matched_records());
        self.clamp_curser();
    }

    fn clamp_curser(&mut self) {
        let rows = self.table.page_rows().len();
        self.curser_row = std::cmp::min(self.curser_row, rows.saturating_sub(1));
    }

    fn move_table_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.table.prev_page() {
            // Continue at the bottom of the previous page
            self.curser_row = self.table.page_rows().len().saturating_sub(1);
        }
    }

    fn move_table_selection_down(&mut self) {
        if self.curser_row + 1 < self.table.page_rows().len() {
            self.curser_row += 1;
        } else if self.table.next_page() {
            self.curser_row = 0;
        }
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    fn move_table_selection_right(&mut self) {
        if self.curser_column + 1 < self.table.schema().len() {
            self.curser_column += 1;
        }
    }

    fn previous_record(&mut self) {
        self.record_view.position = self.record_view.position.saturating_sub(1);
    }

    fn next_record(&mut self) {
        if self.record_view.position + 1 < self.table.rows().len() {
            self.record_view.position += 1;
        }
    }

    fn record_fields(&self, position: usize) -> Option<Vec<RecordField>> {
        let rows = self.table.rows();
        let record = &self.table.dataset().records()[*rows.get(position)?];
        let mut fields: Vec<RecordField> = self
            .table
            .schema()
            .columns()
            .iter()
            .map(|c| RecordField {
                label: c.label.to_string(),
                value: c.value(record).as_text(),
            })
            .collect();
        if record.company.has_link() {
            fields.push(RecordField {
                label: "Link".to_string(),
                value: record.company.link.clone(),
            });
        }
        Some(fields)
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_table_cell(&mut self) {
        let Some(record) = self.table.page_record(self.curser_row) else {
            return;
        };
        let cell = self.table.schema().columns()[self.curser_column]
            .value(record)
            .as_text();
        self.copy_to_clipboard(cell, "cell");
    }

    fn copy_record_cell(&mut self) {
        let Some(fields) = self.record_fields(self.record_view.position) else {
            return;
        };
        if let Some(field) = fields.get(self.record_view.curser_row) {
            self.copy_to_clipboard(field.value.clone(), "cell");
        }
    }

    fn copy_table_row(&mut self) {
        let record = match self.modus {
            Modus::RECORD => self
                .table
                .rows()
                .get(self.record_view.position)
                .map(|&idx| &self.table.dataset().records()[idx]),
            _ => self.table.page_record(self.curser_row),
        };
        let Some(record) = record else {
            return;
        };
        let content = self
            .table
            .schema()
            .columns()
            .iter()
            .map(|c| Model::wrap_cell_content(&c.value(record).as_text()))
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(content, "row");
    }

    fn copy_to_clipboard(&mut self, content: String, what: &str) {
        trace!("Copy {what}: {content}");
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            return;
        };
        match clipboard.set_text(content) {
            Ok(_) => self.set_status_message(format!("Copied {what} to clipboard")),
            Err(e) => {
                warn!("Error copying to clipboard: {e:?}");
                self.set_status_message("Copy failed");
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn update_uidata(&mut self) {
        let record = match self.modus {
            Modus::RECORD => self.record_fields(self.record_view.position),
            Modus::POPUP if self.previous_modus == Modus::RECORD => {
                self.record_fields(self.record_view.position)
            }
            _ => None,
        };
        let cmd_column = if self.active_cmdinput {
            self.table.schema().columns()[self.curser_column].label.to_string()
        } else {
            String::new()
        };

        self.uidata = UIData {
            name: self.table.dataset().name().to_string(),
            table: self.table.render(),
            stats: self.stats,
            filtered_stats: self.filtered_stats,
            selected_row: if self.modus == Modus::RECORD {
                self.record_view.curser_row
            } else {
                self.curser_row
            },
            selected_column: self.curser_column,
            record,
            record_position: self.record_view.position,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput: self.last_input.clone(),
            cmd_column,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Company, CompanyRecord};
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn dataset(n: usize) -> Dataset {
        let records = (0..n)
            .map(|i| CompanyRecord {
                company: Company {
                    name: format!("Company {i:02}"),
                    link: String::new(),
                },
                valuation: i as f64,
                founder: format!("Founder {i}"),
                industry: if i % 2 == 0 { "Fintech" } else { "E-commerce" }.into(),
                founded: 1990 + i as i64,
                status: if i % 4 == 0 { "Public" } else { "Private" }.into(),
            })
            .collect();
        Dataset::new("test", records).unwrap()
    }

    fn model(n: usize) -> Model {
        Model::init(&TVConfig::default(), dataset(n), Schema::companies()).unwrap()
    }

    fn send(model: &mut Model, msg: Message) {
        model.update(Some(msg)).unwrap();
    }

    fn type_keys(model: &mut Model, text: &str) {
        for chr in text.chars() {
            send(model, Message::RawKey(KeyEvent::new(KeyCode::Char(chr), KeyModifiers::NONE)));
        }
    }

    fn enter_key() -> Message {
        Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
    }

    #[test]
    fn initial_view_is_first_page_in_default_sort() {
        let model = model(25);
        let ui = model.get_uidata();
        assert_eq!(ui.table.rows.len(), 10);
        assert_eq!(ui.table.total_pages, 3);
        assert_eq!(ui.table.rows[0].cells[0].text, "Company 00");
        assert_eq!(ui.stats.companies, 25);
        assert_eq!(ui.stats.public_companies, 7);
    }

    #[test]
    fn filter_through_command_input() {
        let mut model = model(25);
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::Filter);
        assert!(model.raw_keyevents());
        type_keys(&mut model, "20");
        send(&mut model, enter_key());

        assert!(!model.raw_keyevents());
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(model.table().state().filter("valuation"), Some("20"));
        let ui = model.get_uidata();
        assert_eq!(ui.table.matched, 4);
        assert_eq!(ui.filtered_stats.companies, 4);
        assert_eq!(ui.table.rows[0].cells[0].text, "Company 21");
    }

    #[test]
    fn filter_input_starts_with_current_value_and_escape_keeps_it() {
        let mut model = model(25);
        model.apply_filter("company", "1").unwrap();
        send(&mut model, Message::Filter);
        assert_eq!(model.get_uidata().cmdinput.input, "1");

        send(&mut model, Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(model.table().state().filter("company"), Some("1"));
    }

    #[test]
    fn paging_moves_cursor_across_pages() {
        let mut model = model(25);
        for _ in 0..10 {
            send(&mut model, Message::MoveDown);
        }
        assert_eq!(model.table().page(), 1);
        assert_eq!(model.get_uidata().selected_row, 0);

        send(&mut model, Message::MoveUp);
        assert_eq!(model.table().page(), 0);
        assert_eq!(model.get_uidata().selected_row, 9);

        send(&mut model, Message::LastPage);
        assert_eq!(model.table().page(), 2);
        // Last page has 5 rows, cursor is clamped.
        assert_eq!(model.get_uidata().selected_row, 4);
        send(&mut model, Message::NextPage);
        assert_eq!(model.table().page(), 2);
    }

    #[test]
    fn sort_selected_column() {
        let mut model = model(25);
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::SortDescending);
        assert_eq!(model.get_uidata().table.rows[0].cells[0].text, "Company 24");
        assert_eq!(model.get_uidata().table.headers[1].sorted, Some(true));

        send(&mut model, Message::ResetSort);
        assert_eq!(model.get_uidata().table.rows[0].cells[0].text, "Company 00");
    }

    #[test]
    fn record_view_walks_filtered_rows() {
        let mut model = model(25);
        model.apply_filter("status", "public").unwrap();
        send(&mut model, Message::Enter);
        assert_eq!(model.modus(), Modus::RECORD);
        let fields = model.get_uidata().record.clone().unwrap();
        assert_eq!(fields[0].value, "Company 00");
        assert_eq!(fields[5].value, "Public");

        send(&mut model, Message::MoveRight);
        assert_eq!(model.get_uidata().record.as_ref().unwrap()[0].value, "Company 04");

        send(&mut model, Message::Exit);
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(model.get_uidata().selected_row, 1);
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = model(3);
        send(&mut model, Message::Help);
        assert!(model.get_uidata().show_popup);
        send(&mut model, Message::Exit);
        assert!(!model.get_uidata().show_popup);
        assert_eq!(model.modus(), Modus::TABLE);
    }

    #[test]
    fn status_message_fades_after_timeout() {
        let mut model = model(3);
        send(&mut model, Message::SortDescending);
        let ui = model.get_uidata();
        let shown = ui.last_status_message_update;
        assert_eq!(ui.visible_status(shown), "Sorted by company descending");
        assert_eq!(
            ui.visible_status(shown + STATUS_MESSAGE_TIMEOUT - Duration::from_millis(1)),
            "Sorted by company descending"
        );
        assert_eq!(ui.visible_status(shown + STATUS_MESSAGE_TIMEOUT), "");
    }

    #[test]
    fn quit_from_table() {
        let mut model = model(3);
        send(&mut model, Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn clear_filters() {
        let mut model = model(25);
        model.apply_filter("industry", "fin").unwrap();
        model.apply_filter("company", "2").unwrap();
        assert_eq!(model.table().rows().len(), 5);
        send(&mut model, Message::ClearAllFilters);
        assert_eq!(model.table().rows().len(), 25);
        assert!(model.apply_filter("nope", "x").is_err());
    }

    #[test]
    fn csv_wrapping_of_row_cells() {
        assert_eq!(Model::wrap_cell_content("Acme"), "Acme");
        assert_eq!(Model::wrap_cell_content("Ma Yun"), "\"Ma Yun\"");
        assert_eq!(Model::wrap_cell_content("a\"b"), "\"a\"\"b\"");
    }
}
