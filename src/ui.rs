use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::column::{CellStyle, RenderedCell};
use crate::domain::TVConfig;
use crate::engine::RenderedTable;
use crate::model::UIData;
use crate::plain::sort_marker;

pub const CMDLINE_HEIGH: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

pub struct TableUI {
    max_column_width: usize,
    table_state: TableState,
}

impl TableUI {
    pub fn new(config: &TVConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
            table_state: TableState::default(),
        }
    }

    pub fn draw(&mut self, uidata: &UIData, frame: &mut Frame) {
        let [title_area, table_area, pager_area, cmdline_area] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(TABLE_HEADER_HEIGHT + 2),
                Constraint::Length(1),
                Constraint::Length(CMDLINE_HEIGH),
            ])
            .areas(frame.area());

        self.draw_title(uidata, frame, title_area);
        match &uidata.record {
            Some(_) => self.draw_record(uidata, frame, table_area),
            None => self.draw_table(uidata, frame, table_area),
        }
        self.draw_pager(uidata, frame, pager_area);
        self.draw_cmdline(uidata, frame, cmdline_area);

        if uidata.show_popup {
            self.draw_popup(&uidata.popup_message, frame);
        }
    }

    fn draw_title(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let stats = &uidata.stats;
        let mut spans = vec![
            " Dentmakers Index ".bold().reversed(),
            format!(" {} ", uidata.name).into(),
            format!("{} companies", stats.companies).yellow(),
            " · ".into(),
            stats.total_valuation_text().yellow(),
            " total valuation · ".into(),
            format!("{} public", stats.public_companies).yellow(),
        ];
        if uidata.filtered_stats.companies != stats.companies {
            let filtered = &uidata.filtered_stats;
            spans.push(
                format!(
                    "  [filtered: {} · {} · {} public]",
                    filtered.companies,
                    filtered.total_valuation_text(),
                    filtered.public_companies
                )
                .cyan(),
            );
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn column_widths(&self, table: &RenderedTable) -> Vec<Constraint> {
        table
            .headers
            .iter()
            .enumerate()
            .map(|(cidx, header)| {
                let header_width = header.label.chars().count() + sort_marker(header).chars().count();
                let filter_width = header.filter.as_ref().map_or(0, |f| f.chars().count() + 2);
                let width = table
                    .rows
                    .iter()
                    .filter_map(|r| r.cells.get(cidx))
                    .map(|c| c.text.chars().count())
                    .chain([header_width, filter_width])
                    .max()
                    .unwrap_or(0)
                    + COLUMN_WIDTH_MARGIN;
                Constraint::Length(std::cmp::min(width, self.max_column_width) as u16)
            })
            .collect()
    }

    fn styled_cell(cell: &RenderedCell) -> Cell<'_> {
        let text = cell.text.as_str();
        match cell.style {
            CellStyle::Link => Cell::from(text).style(
                Style::new()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::UNDERLINED),
            ),
            CellStyle::Emphasis => Cell::from(text).bold(),
            CellStyle::Number => Cell::from(Line::from(text).alignment(Alignment::Right)),
            CellStyle::Plain => Cell::from(text),
        }
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let table = &uidata.table;
        if table.rows.is_empty() {
            let empty = Paragraph::new("No companies match the current filters")
                .centered()
                .block(Block::bordered().border_set(border::PLAIN));
            frame.render_widget(empty, area);
            return;
        }

        let header = Row::new(table.headers.iter().map(|h| {
            let label = Line::from(format!("{}{}", h.label, sort_marker(h))).bold();
            let filter = match &h.filter {
                Some(f) => Line::from(format!("= {f}")).yellow(),
                None => Line::from("").dark_gray(),
            };
            let text = Text::from(vec![label, filter]);
            if h.numeric {
                Cell::from(text.alignment(Alignment::Right))
            } else {
                Cell::from(text)
            }
        }))
        .height(TABLE_HEADER_HEIGHT);

        let rows = table
            .rows
            .iter()
            .map(|r| Row::new(r.cells.iter().map(Self::styled_cell)));

        let widget = Table::new(rows, self.column_widths(table))
            .header(header)
            .column_spacing(1)
            .block(Block::bordered().border_set(border::PLAIN))
            .row_highlight_style(Style::new().bg(Color::DarkGray))
            .cell_highlight_style(Style::new().reversed());

        self.table_state.select(Some(uidata.selected_row));
        self.table_state.select_column(Some(uidata.selected_column));
        frame.render_stateful_widget(widget, area, &mut self.table_state);
    }

    fn draw_record(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let fields = uidata.record.as_deref().unwrap_or_default();
        let label_width = fields
            .iter()
            .map(|f| f.label.chars().count())
            .max()
            .unwrap_or(0)
            + COLUMN_WIDTH_MARGIN;

        let rows = fields.iter().map(|f| {
            Row::new(vec![
                Cell::from(f.label.as_str()).bold(),
                Cell::from(f.value.as_str()),
            ])
        });
        let title = format!(
            " Record {}/{} ",
            uidata.record_position + 1,
            uidata.table.matched
        );
        let widget = Table::new(rows, [Constraint::Length(label_width as u16), Constraint::Fill(1)])
            .block(Block::bordered().title(title).border_set(border::PLAIN))
            .row_highlight_style(Style::new().bg(Color::DarkGray));

        self.table_state.select(Some(uidata.selected_row));
        self.table_state.select_column(None);
        frame.render_stateful_widget(widget, area, &mut self.table_state);
    }

    fn draw_pager(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let table = &uidata.table;
        let line = Line::from(vec![
            "<p ".dark_gray(),
            format!("Page {} of {}", table.page + 1, table.total_pages).bold(),
            " n>".dark_gray(),
            format!("  {} of {} companies", table.matched, table.total).into(),
        ]);
        frame.render_widget(Paragraph::new(line).centered(), area);
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prefix = format!("Filter {}: ", uidata.cmd_column);
            let cursor_x = area.x as usize + prefix.chars().count() + uidata.cmdinput.curser_pos;
            let line = Line::from(vec![
                Span::from(prefix).yellow().bold(),
                Span::from(uidata.cmdinput.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            frame.set_cursor_position((
                std::cmp::min(cursor_x, (area.x + area.width.saturating_sub(1)) as usize) as u16,
                area.y,
            ));
        } else {
            let line = Line::from(vec![
                Span::from(uidata.visible_status(Instant::now())),
                Span::from("  ? help  q quit").dark_gray(),
            ]);
            frame.render_widget(Paragraph::new(line), area);
        }
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let area = centered_rect(frame.area(), 80, 24);
        frame.render_widget(Clear, area);
        let popup = Paragraph::new(message)
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title(Line::from(" Help ").bold().centered())
                    .title_bottom(Line::from(" <Esc> close ").centered())
                    .border_set(border::THICK),
            );
        frame.render_widget(popup, area);
    }
}

/// Rectangle of at most `width` x `height` in the middle of `area`.
fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = std::cmp::min(width, area.width);
    let height = std::cmp::min(height, area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Schema;
    use crate::model::Model;
    use crate::record::Dataset;
    use ratatui::{Terminal, backend::TestBackend};

    #[test]
    fn centered_rect_fits_area() {
        let area = Rect::new(0, 0, 40, 10);
        let rect = centered_rect(area, 80, 24);
        assert_eq!(rect, area);
        let rect = centered_rect(Rect::new(0, 0, 100, 30), 80, 24);
        assert_eq!(rect, Rect::new(10, 3, 80, 24));
    }

    #[test]
    fn draws_table_page() {
        let config = TVConfig::default();
        let model = Model::init(&config, Dataset::embedded().unwrap(), Schema::companies()).unwrap();
        let mut ui = TableUI::new(&config);
        let mut terminal = Terminal::new(TestBackend::new(140, 20)).unwrap();
        terminal.draw(|f| ui.draw(model.get_uidata(), f)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(content.contains("Dentmakers Index"));
        assert!(content.contains("Valuation($B)"));
        assert!(content.contains("Page 1 of"));
    }
}
