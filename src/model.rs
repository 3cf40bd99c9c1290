use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, instrument, trace};
use tracing_error::SpanTrace;

use crate::domain::{CMDMode, Column, HELP_TEXT, Message, ViewerConfig};
use crate::inputter::{InputResult, Inputter};
use crate::loader;
use crate::table::{RecordTable, SortOrder, TableModel};
use crate::ui::{
    COLUMN_WIDTH_MARGIN, SEARCHBAR_HEIGHT, STATUSLINE_HEIGHT, TABLE_BORDER, TABLE_HEADER_HEIGHT,
};

const DEFAULT_NAME: &str = "call history viewer";

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub index: ColumnView,
    pub show_index: bool,
    pub nrows: usize,      // Visible rows after filtering
    pub total_rows: usize, // Loaded rows
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_title: String,
    pub popup_message: String,
    pub popup_is_error: bool,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub filter: String,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: DEFAULT_NAME.to_string(),
            table: Vec::new(),
            index: ColumnView::default(),
            show_index: false,
            nrows: 0,
            total_rows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_title: String::new(),
            popup_message: String::new(),
            popup_is_error: false,
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            filter: String::new(),
            status_message: String::new(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_height = ui_height.saturating_sub(
            SEARCHBAR_HEIGHT + TABLE_HEADER_HEIGHT + TABLE_BORDER + STATUSLINE_HEIGHT,
        );

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

struct Popup {
    title: String,
    message: String,
    is_error: bool,
}

pub struct Model {
    config: ViewerConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    table: RecordTable,
    file_path: Option<PathBuf>,
    column_widths: Vec<usize>,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    show_index: bool,
    popup: Option<Popup>,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>, // Created on first copy
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
}

impl Model {
    pub fn init(config: &ViewerConfig, ui_width: usize, ui_height: usize) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            table: RecordTable::new(),
            file_path: None,
            column_widths: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            show_index: false,
            popup: None,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Press o to open a call log, ? for help".to_string(),
        };
        model.update_column_widths();
        model.update_uidata();
        model
    }

    /// Replace the table with the calls from `path`.
    ///
    /// The table is emptied before parsing, so a failed load leaves no stale rows behind.
    #[instrument(skip(self))]
    pub fn open_file(&mut self, path: PathBuf) {
        self.table.clear();
        self.file_path = Some(path.clone());
        self.status = Status::EMPTY;

        let start_time = Instant::now();
        match loader::load(&path) {
            Ok(records) => {
                let nrecords = records.len();
                self.table.set_rows(records);
                self.status = Status::READY;
                self.set_status_message(format!(
                    "Loaded {} calls in {}ms",
                    nrecords,
                    start_time.elapsed().as_millis()
                ));
            }
            Err(e) => {
                error!("Loading {} failed: {e}", path.display());
                debug!("{}", SpanTrace::capture());
                self.show_popup("Error", format!("Error loading XML: {e}"), true);
                self.set_status_message("Loading failed");
            }
        }

        self.update_column_widths();
        self.move_table_selection_beginning();
        self.update_uidata();
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) {
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_table_selection_down(1),
                Message::MoveUp => self.move_table_selection_up(1),
                Message::MoveLeft => self.move_table_selection_left(),
                Message::MoveRight => self.move_table_selection_right(),
                Message::MovePageUp => self.move_table_selection_up(self.page_size()),
                Message::MovePageDown => self.move_table_selection_down(self.page_size()),
                Message::MoveBeginning => self.move_table_selection_beginning(),
                Message::MoveEnd => self.move_table_selection_end(),
                Message::OpenFile => self.enter_cmd_mode(CMDMode::OpenFile),
                Message::Search => self.enter_cmd_mode(CMDMode::Search),
                Message::Sort => self.sort_current_column(),
                Message::Enter => self.show_record(),
                Message::Exit => self.clear_filter(),
                Message::ToggleIndex => self.toggle_table_index(),
                Message::CopyCell => self.copy_table_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::Help => self.show_popup("Help", HELP_TEXT.to_string(), false),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::RawKey(_) => (),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.close_popup(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::CMDINPUT => match message {
                Message::RawKey(key) => self.raw_input(key),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }
        self.update_uidata();
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.clamp_selection();
    }

    fn page_size(&self) -> usize {
        std::cmp::max(self.uilayout.table_height, 1)
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn show_popup(&mut self, title: &str, message: String, is_error: bool) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup = Some(Popup {
            title: title.to_string(),
            message,
            is_error,
        });
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.popup = None;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;

        self.input.clear();
        match mode {
            CMDMode::Search => self.input.set(self.table.filter_text().unwrap_or_default()),
            CMDMode::OpenFile => {
                if let Some(path) = &self.file_path {
                    self.input.set(&path.to_string_lossy());
                }
            }
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.cmd_mode == Some(CMDMode::Search) {
            // Filter while typing, escape clears the input and with it the filter
            self.table.set_filter(Some(&self.last_input.input));
            self.clamp_selection();
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        let canceled = self.last_input.canceled;
        match self.cmd_mode.take() {
            Some(CMDMode::Search) => {
                if let Some(filter) = self.table.filter_text() {
                    info!("Filter {:?} matches {} rows", filter, self.table.len());
                    self.set_status_message(format!(
                        "{} of {} calls match",
                        self.table.len(),
                        self.table.total()
                    ));
                }
            }
            Some(CMDMode::OpenFile) => {
                if canceled || cmd_input.trim().is_empty() {
                    trace!("Open file canceled");
                } else {
                    match shellexpand::full(cmd_input.trim()) {
                        Ok(path) => self.open_file(PathBuf::from(path.into_owned())),
                        Err(e) => {
                            error!("Cannot expand {cmd_input:?}: {e}");
                            let message = format!("Cannot open {cmd_input}: {e}");
                            self.show_popup("Error", message, true);
                        }
                    }
                }
            }
            None => {
                info!("Cmd mode is none!")
            }
        }
    }

    fn clear_filter(&mut self) {
        if self.table.filter_text().is_some() {
            self.table.set_filter(None);
            self.clamp_selection();
            self.set_status_message("Search cleared");
        }
    }

    fn sort_current_column(&mut self) {
        let Some(column) = Column::from_index(self.curser_column) else {
            return;
        };
        // Keep the selected record selected
        let selected = self.table.model_index(self.offset_row + self.curser_row);
        self.table.toggle_sort(column);

        let row = selected
            .and_then(|midx| {
                (0..self.table.len()).find(|&v| self.table.model_index(v) == Some(midx))
            })
            .unwrap_or(0);
        self.select_row(row);
        if let Some(key) = self.table.sort_key() {
            let order = match key.order {
                SortOrder::Ascending => "ascending",
                SortOrder::Descending => "descending",
            };
            self.set_status_message(format!("Sorted by {} ({order})", column.header()));
        }
    }

    fn show_record(&mut self) {
        let row = self.offset_row + self.curser_row;
        let (Some(record), Some(midx)) = (self.table.get(row), self.table.model_index(row)) else {
            return;
        };
        let header_width = Column::ALL
            .iter()
            .map(|c| c.header().len())
            .max()
            .unwrap_or(0);
        let message = Column::ALL
            .iter()
            .map(|c| format!("{:<header_width$}  {}", c.header(), record.cell(*c)))
            .collect::<Vec<String>>()
            .join("\n");
        self.show_popup(&format!("Record {}", midx + 1), message, false);
    }

    fn toggle_table_index(&mut self) {
        self.show_index = !self.show_index;
    }

    fn copy_table_cell(&mut self) {
        let row = self.offset_row + self.curser_row;
        let cell = match (self.table.get(row), Column::from_index(self.curser_column)) {
            (Some(record), Some(column)) => record.cell(column).into_owned(),
            _ => return,
        };
        trace!("Cell content: {}", cell);
        self.set_clipboard(cell, "cell");
    }

    fn copy_table_row(&mut self) {
        let Some(record) = self.table.get(self.offset_row + self.curser_row) else {
            return;
        };
        let row_content = Column::ALL
            .iter()
            .map(|c| record.cell(*c))
            .collect::<Vec<_>>()
            .join("\t");
        self.set_clipboard(row_content, "row");
    }

    fn set_clipboard(&mut self, content: String, what: &str) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Clipboard unavailable: {:?}", e);
                    self.set_status_message(format!("Clipboard unavailable: {e}"));
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => {
                    trace!("Copied {what} content to clipboard.");
                    self.set_status_message(format!("Copied {what}"));
                }
                Err(e) => {
                    error!("Error copying to clipboard: {:?}", e);
                    self.set_status_message(format!("Copy failed: {e}"));
                }
            }
        }
    }

    fn select_row(&mut self, row: usize) {
        let height = self.page_size();
        if row < self.offset_row {
            self.offset_row = row;
        } else if row >= self.offset_row + height {
            self.offset_row = row + 1 - height;
        }
        self.curser_row = row - self.offset_row;
        trace!("Select row {} (offset {})", row, self.offset_row);
    }

    // Keep the selection inside the visible rows after they changed
    fn clamp_selection(&mut self) {
        if self.table.is_empty() {
            self.offset_row = 0;
            self.curser_row = 0;
            return;
        }
        let nrows = self.table.len();
        let row = std::cmp::min(self.offset_row + self.curser_row, nrows - 1);
        self.offset_row = std::cmp::min(self.offset_row, nrows.saturating_sub(self.page_size()));
        self.select_row(row);
    }

    fn move_table_selection_beginning(&mut self) {
        self.offset_row = 0;
        self.curser_row = 0;
    }

    fn move_table_selection_end(&mut self) {
        if let Some(last) = self.table.len().checked_sub(1) {
            self.select_row(last);
        }
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let row = (self.offset_row + self.curser_row).saturating_sub(size);
        self.select_row(row);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        if let Some(last) = self.table.len().checked_sub(1) {
            let row = std::cmp::min(self.offset_row + self.curser_row + size, last);
            self.select_row(row);
        }
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    fn move_table_selection_right(&mut self) {
        if self.curser_column < Column::ALL.len() - 1 {
            self.curser_column += 1;
        }
    }

    // -------------------- View building ---------------------- //

    fn update_column_widths(&mut self) {
        let max_column_width = self.config.max_column_width;
        self.column_widths = Column::ALL
            .iter()
            .map(|&column| {
                let max_width = self
                    .table
                    .rows()
                    .iter()
                    .map(|r| r.display_cell(column).chars().count())
                    .max()
                    .unwrap_or(0);
                calculate_column_width(column.header(), max_width, max_column_width)
            })
            .collect();
    }

    fn build_index(&self, rbegin: usize, rend: usize) -> ColumnView {
        let data = (rbegin..rend)
            .filter_map(|v| self.table.model_index(v))
            .map(|idx| (idx + 1).to_string())
            .collect::<Vec<String>>();
        let width = std::cmp::max(self.table.total().to_string().len(), 1);
        ColumnView {
            name: "#".to_string(),
            width,
            data,
        }
    }

    fn update_uidata(&mut self) {
        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, self.table.len());
        let sort_key = self.table.sort_key();

        let table = Column::ALL
            .iter()
            .zip(self.column_widths.iter())
            .map(|(&column, &width)| {
                let marker = match sort_key {
                    Some(key) if key.column == column => match key.order {
                        SortOrder::Ascending => " ▲",
                        SortOrder::Descending => " ▼",
                    },
                    _ => "",
                };
                ColumnView {
                    name: format!("{}{}", column.header(), marker),
                    width,
                    data: self
                        .table
                        .iter()
                        .skip(rbegin)
                        .take(rend.saturating_sub(rbegin))
                        .map(|r| r.display_cell(column).into_owned())
                        .collect(),
                }
            })
            .collect();

        let (show_popup, popup_title, popup_message, popup_is_error) = match &self.popup {
            Some(p) => (true, p.title.clone(), p.message.clone(), p.is_error),
            None => (false, String::new(), String::new(), false),
        };

        self.uidata = UIData {
            name: self
                .file_path
                .as_ref()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str())
                .unwrap_or(DEFAULT_NAME)
                .to_string(),
            table,
            index: self.build_index(rbegin, rend),
            show_index: self.show_index,
            nrows: self.table.len(),
            total_rows: self.table.total(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            abs_selected_row: self.offset_row + self.curser_row,
            show_popup,
            popup_title,
            popup_message,
            popup_is_error,
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            filter: self.table.filter_text().unwrap_or_default().to_string(),
            status_message: self.status_message.clone(),
        };
    }
}

fn calculate_column_width(header: &str, max_width: usize, max_column_width: usize) -> usize {
    // Room for the sort marker behind the header
    let width = std::cmp::max(header.chars().count() + 2, max_width) + COLUMN_WIDTH_MARGIN;
    std::cmp::min(width, max_column_width)
}
