use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use ratatui::crossterm::event::KeyEvent;
use ratatui::text::Span;
use tracing::{debug, info, trace};

use crate::document::{ColumnKind, TableDocument};
use crate::domain::{HELP_TEXT, Message, TVConfig, TVError};
use crate::editor::{EditResult, Editor};
use crate::ui::{COLUMN_SPACING, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT};

const CHECKBOX_CHECKED: &str = "[x]";
const CHECKBOX_UNCHECKED: &str = "[ ]";
// Room for the sort indicator behind a header name
const SORT_INDICATOR_WIDTH: usize = 2;

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    EDIT,
    POPUP,
}

#[derive(Clone, Debug)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub kind: ColumnKind,
    pub sort: Option<bool>, // Some(ascending) if the table is sorted by this column
    pub data: Vec<String>,
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub highlighted: Vec<bool>, // One entry per visible row
    pub nrows: usize,           // Total number of rows in the table
    pub selected_row: usize,    // Relative to the visible rows
    pub selected_column: usize, // Relative to the visible columns
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub editing: Option<(String, EditResult)>,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            highlighted: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            editing: None,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width,
            table_height: ui_height.saturating_sub(STATUSLINE_HEIGHT + TABLE_HEADER_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: TVConfig,
    path: Option<PathBuf>,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    document: TableDocument,
    column_widths: Vec<usize>, // Render width per column, same order as the document columns
    curser_row: usize,         // Absolute row index
    curser_column: usize,      // Absolute column index
    offset_row: usize,
    offset_column: usize,
    sort: Option<(i32, bool)>,
    highlighted: BTreeSet<usize>,
    editor: Editor,
    editing: Option<(i32, usize)>, // Column id and row of the cell being edited
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &TVConfig, ui_width: usize, ui_height: usize) -> Self {
        let mut model = Self {
            config: config.clone(),
            path: None,
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            document: TableDocument::new(config.editable_columns.clone()),
            column_widths: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            sort: None,
            highlighted: BTreeSet::new(),
            editor: Editor::default(),
            editing: None,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            status_message: "Started xtv!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.update_table_data();
        model
    }

    /// Load the table at `path`, replacing whatever is shown.
    ///
    /// A file that cannot be loaded leaves the current table in place.
    pub fn load(&mut self, path: Option<PathBuf>) -> bool {
        let start_time = Instant::now();
        if !self.document.load(path.as_deref()) {
            let message = match path.as_deref() {
                Some(p) => format!("Could not load {}", p.display()),
                None => "No file to load".to_string(),
            };
            self.set_status_message(message);
            self.update_table_data();
            return false;
        }

        self.path = path;
        self.status = Status::READY;
        self.curser_row = 0;
        self.curser_column = 0;
        self.offset_row = 0;
        self.offset_column = 0;
        self.highlighted.clear();
        self.compute_column_widths();

        let (column_id, ascending) = (self.config.sort_column, self.config.sort_ascending);
        if self.document.column(column_id).is_some() {
            self.document.sort_by(column_id, ascending);
            self.sort = Some((column_id, ascending));
        } else {
            debug!("Default sort column {column_id} does not exist");
            self.sort = None;
        }

        let duration = start_time.elapsed().as_millis();
        info!("Loading data took {duration}ms ...");
        self.set_status_message(format!(
            "Loaded {} rows in {duration}ms ...",
            self.document.row_count()
        ));
        self.update_table_data();
        true
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    /// True while keys should go to the cell editor unmapped.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::EDIT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::MovePageUp => self.move_selection_up(self.page_size()),
                    Message::MovePageDown => self.move_selection_down(self.page_size()),
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => {
                        self.select_row(self.document.row_count().saturating_sub(1))
                    }
                    Message::MoveToFirstColumn => self.select_column(0),
                    Message::MoveToLastColumn => {
                        self.select_column(self.column_widths.len().saturating_sub(1))
                    }
                    Message::SortAscending => self.sort_current_column(true),
                    Message::SortDescending => self.sort_current_column(false),
                    Message::ToggleSort => self.toggle_sort(),
                    Message::Activate => self.activate(),
                    Message::ToggleCheckbox => self.toggle_checkbox(),
                    Message::ToggleHighlight => self.toggle_highlight(),
                    Message::Reload => self.reload(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::EDIT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        self.update_table_data();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn current_column(&self) -> Option<(i32, ColumnKind)> {
        self.document
            .columns()
            .get(self.curser_column)
            .map(|c| (c.id, c.kind))
    }

    fn activate(&mut self) {
        let Some((column_id, kind)) = self.current_column() else {
            return;
        };
        if self.curser_row >= self.document.row_count() {
            return;
        }
        match kind {
            ColumnKind::EditableText => {
                let text = self.document.cell_text(column_id, self.curser_row);
                self.editor.start(text);
                self.editing = Some((column_id, self.curser_row));
                self.previous_modus = self.modus;
                self.modus = Modus::EDIT;
                trace!("Editing cell {}:{}", self.curser_row, column_id);
            }
            ColumnKind::Checkbox => self.toggle_checkbox(),
            ColumnKind::PlainText => {
                let name = self.document.column_name_for(column_id).to_string();
                self.set_status_message(format!("Column \"{name}\" is read only"));
            }
        }
    }

    fn raw_input(&mut self, key: KeyEvent) {
        let result = self.editor.read(key);
        if !result.finished {
            return;
        }
        if let Some((column_id, row)) = self.editing.take() {
            if result.canceled {
                self.set_status_message("Edit canceled");
            } else {
                self.document.set_cell_text(column_id, row, &result.input);
                self.compute_column_widths();
                let name = self.document.column_name_for(column_id).to_string();
                self.set_status_message(format!("Updated \"{name}\" of row {}", row + 1));
            }
        }
        self.editor.clear();
        self.modus = self.previous_modus;
        self.previous_modus = Modus::EDIT;
    }

    fn toggle_checkbox(&mut self) {
        let row = self.curser_row;
        if row >= self.document.row_count() {
            return;
        }
        let value = if self.document.selection(row) != 0 { 0 } else { 1 };
        self.document.set_selection(row, value);
        trace!("Row {row} selection set to {value}");
    }

    fn toggle_highlight(&mut self) {
        let row = self.curser_row;
        if row >= self.document.row_count() {
            return;
        }
        if !self.highlighted.remove(&row) {
            self.highlighted.insert(row);
        }
    }

    fn sort_current_column(&mut self, ascending: bool) {
        let Some((column_id, _)) = self.current_column() else {
            return;
        };
        let start_time = Instant::now();
        self.document.sort_by(column_id, ascending);
        self.sort = Some((column_id, ascending));

        let name = self.document.column_name_for(column_id).to_string();
        let direction = if ascending { "ascending" } else { "descending" };
        trace!("Sorting took {}ms", start_time.elapsed().as_millis());
        self.set_status_message(format!("Sorted by \"{name}\" {direction}"));
    }

    // Same column flips the direction, a new column starts ascending
    fn toggle_sort(&mut self) {
        let Some((column_id, _)) = self.current_column() else {
            return;
        };
        let ascending = match self.sort {
            Some((sorted_id, ascending)) if sorted_id == column_id => !ascending,
            _ => true,
        };
        self.sort_current_column(ascending);
    }

    fn reload(&mut self) {
        let Some(path) = self.path.clone() else {
            self.set_status_message("No file to reload");
            return;
        };
        if !self.document.load(Some(&path)) {
            self.set_status_message(format!("Could not reload {}", path.display()));
            return;
        }
        self.status = Status::READY;
        self.highlighted.clear();
        self.compute_column_widths();
        if let Some((column_id, ascending)) = self.sort {
            self.document.sort_by(column_id, ascending);
        }
        self.select_row(self.curser_row);
        self.select_column(self.curser_column);
        self.set_status_message(format!("Reloaded {}", path.display()));
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
        }
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.select_row(self.curser_row);
        self.select_column(self.curser_column);
    }

    // -------------------- Curser movement ---------------------- //

    fn page_size(&self) -> usize {
        self.uilayout.table_height.max(1)
    }

    fn move_selection_up(&mut self, size: usize) {
        self.select_row(self.curser_row.saturating_sub(size));
    }

    fn move_selection_down(&mut self, size: usize) {
        self.select_row(self.curser_row.saturating_add(size));
    }

    fn move_selection_left(&mut self) {
        self.select_column(self.curser_column.saturating_sub(1));
    }

    fn move_selection_right(&mut self) {
        self.select_column(self.curser_column.saturating_add(1));
    }

    // Moves the curser to `row`, clamped to the table, and scrolls it into view.
    fn select_row(&mut self, row: usize) {
        let nrows = self.document.row_count();
        self.curser_row = row.min(nrows.saturating_sub(1));

        let height = self.page_size();
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }
    }

    fn select_column(&mut self, column: usize) {
        let ncolumns = self.column_widths.len();
        self.curser_column = column.min(ncolumns.saturating_sub(1));

        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
        while self.offset_column < self.curser_column
            && !self.is_fully_visible(self.curser_column)
        {
            self.offset_column += 1;
        }
    }

    fn is_fully_visible(&self, column: usize) -> bool {
        self.visible_columns()
            .iter()
            .any(|&(idx, width)| idx == column && width == self.column_widths[idx])
    }

    // ------------------------ UI data ------------------------- //

    fn compute_column_widths(&mut self) {
        let max_width = self.config.max_column_width;
        self.column_widths = self
            .document
            .columns()
            .iter()
            .map(|column| {
                let content = self.document.auto_size_width(column.id) as usize;
                let header = Span::raw(column.name.as_str()).width() + SORT_INDICATOR_WIDTH;
                let width = content.max(header);
                match column.kind {
                    ColumnKind::Checkbox => width,
                    _ => width.min(max_width),
                }
            })
            .collect();
    }

    /// Columns that fit into the table starting at the column offset. The last
    /// one can be cut short to fill the remaining width.
    fn visible_columns(&self) -> Vec<(usize, usize)> {
        let table_width = self.uilayout.table_width;
        let mut visible = Vec::new();
        let mut used = 0;
        for (idx, &width) in self
            .column_widths
            .iter()
            .enumerate()
            .skip(self.offset_column)
        {
            if used + width <= table_width {
                visible.push((idx, width));
                used += width + COLUMN_SPACING;
            } else {
                if used < table_width {
                    visible.push((idx, table_width - used));
                }
                break;
            }
        }
        visible
    }

    fn update_table_data(&mut self) {
        let nrows = self.document.row_count();
        let rbegin = self.offset_row.min(nrows);
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, nrows);

        let visible = self.visible_columns();
        let columns = self.document.columns();
        let table: Vec<ColumnView> = visible
            .iter()
            .filter_map(|&(idx, width)| columns.get(idx).map(|c| (c, width)))
            .map(|(column, width)| {
                let data = (rbegin..rend)
                    .map(|row| match column.kind {
                        ColumnKind::Checkbox => checkbox_symbol(self.document.selection(row)),
                        _ => self.document.cell_text(column.id, row).to_string(),
                    })
                    .collect();
                ColumnView {
                    name: column.name.clone(),
                    width,
                    kind: column.kind,
                    sort: self
                        .sort
                        .and_then(|(id, ascending)| (id == column.id).then_some(ascending)),
                    data,
                }
            })
            .collect();

        let selected_column = visible
            .iter()
            .position(|&(idx, _)| idx == self.curser_column)
            .unwrap_or(0);

        let editing = self.editing.map(|(column_id, _)| {
            (
                self.document.column_name_for(column_id).to_string(),
                self.editor.get(),
            )
        });

        let name = self
            .document
            .path()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();

        self.uidata = UIData {
            name,
            table,
            highlighted: (rbegin..rend).map(|r| self.highlighted.contains(&r)).collect(),
            nrows,
            selected_row: self.curser_row.saturating_sub(rbegin),
            selected_column,
            abs_selected_row: self.curser_row,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            editing,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }
}

fn checkbox_symbol(selection: i32) -> String {
    if selection != 0 {
        CHECKBOX_CHECKED.to_string()
    } else {
        CHECKBOX_UNCHECKED.to_string()
    }
}
