use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table},
};

use crate::document::ColumnKind;
use crate::model::{ColumnView, Model, UIData};

pub const STATUSLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const COLUMN_SPACING: usize = 1;

const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);
const SORT_ASCENDING_SYMBOL: &str = "▲";
const SORT_DESCENDING_SYMBOL: &str = "▼";

const HEADER_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);
const ALTERNATE_ROW_STYLE: Style = Style::new().bg(Color::Indexed(236));
const HIGHLIGHTED_ROW_STYLE: Style = Style::new().fg(Color::Black).bg(Color::LightBlue);
const SELECTED_ROW_STYLE: Style = Style::new().add_modifier(Modifier::BOLD);
const SELECTED_CELL_STYLE: Style = Style::new().add_modifier(Modifier::REVERSED);
const EDIT_STYLE: Style = Style::new().fg(Color::Black).bg(Color::Yellow);
const STALE_MESSAGE_STYLE: Style = Style::new().fg(Color::DarkGray);

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_table(uidata, frame, table_area);
        self.draw_statusline(uidata, frame, status_area);
        if uidata.show_popup {
            self.draw_popup(&uidata.popup_message, frame, frame.area());
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(uidata.table.iter().map(header_cell)).style(HEADER_STYLE);

        let nvisible = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nvisible).map(|ridx| {
            let abs_row = uidata.abs_selected_row + ridx - uidata.selected_row;
            let mut style = if uidata.highlighted.get(ridx).copied().unwrap_or(false) {
                HIGHLIGHTED_ROW_STYLE
            } else if abs_row % 2 == 1 {
                ALTERNATE_ROW_STYLE
            } else {
                Style::new()
            };
            if ridx == uidata.selected_row {
                style = style.patch(SELECTED_ROW_STYLE);
            }

            let cells = uidata.table.iter().enumerate().map(|(cidx, column)| {
                let text = column.data[ridx].as_str();
                let cell = match column.kind {
                    ColumnKind::Checkbox => Cell::from(Line::from(text).centered()),
                    _ => Cell::from(text),
                };
                if ridx == uidata.selected_row && cidx == uidata.selected_column {
                    cell.style(SELECTED_CELL_STYLE)
                } else {
                    cell
                }
            });
            Row::new(cells).style(style)
        });

        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(COLUMN_SPACING as u16);
        frame.render_widget(table, area);
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if let Some((column, edit)) = &uidata.editing {
            let prefix = format!(" {column}: ");
            let before_curser: String = edit.input.chars().take(edit.curser_pos).collect();
            let x = area.x as usize + Span::raw(prefix.as_str()).width() + Span::raw(before_curser).width();
            let line = Line::from(vec![
                Span::styled(prefix, EDIT_STYLE),
                Span::raw(edit.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            frame.set_cursor_position((x.min(u16::MAX as usize) as u16, area.y));
            return;
        }

        let position = if uidata.nrows == 0 {
            "empty".to_string()
        } else {
            format!("{}/{}", uidata.abs_selected_row + 1, uidata.nrows)
        };
        let message_style = if uidata.last_status_message_update.elapsed() > STATUS_MESSAGE_TIMEOUT {
            STALE_MESSAGE_STYLE
        } else {
            Style::new()
        };
        let line = Line::from(vec![
            Span::styled(format!(" {} ", uidata.name), HEADER_STYLE),
            Span::raw(format!("[{position}] ")),
            Span::styled(uidata.status_message.as_str(), message_style),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame, area: Rect) {
        let width = message
            .lines()
            .map(|l| Span::raw(l).width())
            .max()
            .unwrap_or(0)
            + 4;
        let height = message.lines().count() + 2;
        let popup = centered_rect(area, width as u16, height as u16);

        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(message).block(Block::bordered().title(" Help ")),
            popup,
        );
    }
}

fn header_cell(column: &ColumnView) -> Cell<'_> {
    match column.sort {
        Some(true) => Cell::from(format!("{} {SORT_ASCENDING_SYMBOL}", column.name)),
        Some(false) => Cell::from(format!("{} {SORT_DESCENDING_SYMBOL}", column.name)),
        None => Cell::from(column.name.as_str()),
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
