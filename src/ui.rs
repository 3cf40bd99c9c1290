use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState, Wrap,
    },
};

use crate::domain::{CMDMode, Column};
use crate::model::{ColumnView, Model, UIData};

pub const SEARCHBAR_HEIGHT: usize = 3;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER: usize = 2;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 2;

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [search_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(SEARCHBAR_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_searchbar(uidata, frame, search_area);
        self.draw_table(uidata, frame, table_area);
        self.draw_statusline(uidata, frame, status_area);
        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_searchbar(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let title = Line::from(format!(" {} ", uidata.name).bold());
        let instructions = Line::from(vec![
            " Open ".into(),
            "<O>".blue().bold(),
            " Search ".into(),
            "</>".blue().bold(),
            " Help ".into(),
            "<?> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.left_aligned())
            .title(instructions.right_aligned())
            .border_set(border::ROUNDED);

        let (label, text) = match (uidata.active_cmdinput, uidata.cmd_mode) {
            (true, Some(CMDMode::OpenFile)) => ("open: ", uidata.cmdinput.input.as_str()),
            (true, Some(CMDMode::Search)) => ("search: ", uidata.cmdinput.input.as_str()),
            _ => ("search: ", uidata.filter.as_str()),
        };
        let label_style = if uidata.active_cmdinput {
            Style::new().yellow().bold()
        } else {
            Style::new().dark_gray()
        };
        let line = Line::from(vec![Span::styled(label, label_style), Span::raw(text)]);

        let inner = block.inner(area);
        frame.render_widget(Paragraph::new(line).block(block), area);

        if uidata.active_cmdinput {
            let x = inner.x + (label.len() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y));
        }
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let block = Block::bordered().border_set(border::PLAIN);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(inner);

        let mut columns: Vec<&ColumnView> = Vec::with_capacity(uidata.table.len() + 1);
        if uidata.show_index {
            columns.push(&uidata.index);
        }
        columns.extend(uidata.table.iter());

        let header = Row::new(
            columns
                .iter()
                .map(|c| Cell::from(c.name.clone()))
                .collect::<Vec<_>>(),
        )
        .style(Style::new().bold().underlined())
        .height(TABLE_HEADER_HEIGHT as u16);

        let nrows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            Row::new(
                columns
                    .iter()
                    .enumerate()
                    .map(|(cidx, c)| {
                        let cell = Cell::from(c.data[ridx].clone());
                        if uidata.show_index && cidx == 0 {
                            cell.dark_gray()
                        } else {
                            cell
                        }
                    })
                    .collect::<Vec<_>>(),
            )
        });
        let widths = columns
            .iter()
            .map(|c| Constraint::Length(c.width as u16))
            .collect::<Vec<_>>();

        let index_offset = usize::from(uidata.show_index);
        let selected_column =
            Column::from_index(uidata.selected_column).map(|c| c.index() + index_offset);

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(Style::new().bg(Color::DarkGray))
            .cell_highlight_style(Style::new().reversed());

        self.table_state.select(if nrows > 0 {
            Some(uidata.selected_row)
        } else {
            None
        });
        self.table_state.select_column(selected_column);
        // Rows are already windowed by the model
        *self.table_state.offset_mut() = 0;
        frame.render_stateful_widget(table, table_area, &mut self.table_state);

        if uidata.nrows == 0 {
            let message = if uidata.total_rows == 0 {
                "No calls loaded"
            } else {
                "No calls match the search"
            };
            let [_, message_area] = Layout::vertical([
                Constraint::Length(TABLE_HEADER_HEIGHT as u16 + 1),
                Constraint::Length(1),
            ])
            .areas(table_area);
            frame.render_widget(Paragraph::new(message).dark_gray().centered(), message_area);
        }

        let mut scrollbar_state =
            ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let counts = if uidata.nrows == uidata.total_rows {
            format!(" {} calls ", uidata.total_rows)
        } else {
            format!(" {}/{} calls ", uidata.nrows, uidata.total_rows)
        };
        let [message_area, counts_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(counts.chars().count() as u16),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(format!(" {}", uidata.status_message)).italic(),
            message_area,
        );
        frame.render_widget(
            Paragraph::new(counts).style(Style::new().black().on_yellow()),
            counts_area,
        );
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let lines = uidata.popup_message.lines().count() as u16;
        let width = uidata
            .popup_message
            .lines()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
            .max(uidata.popup_title.chars().count()) as u16;
        let area = popup_area(frame.area(), width + 4, lines + 2);

        let border_style = if uidata.popup_is_error {
            Style::new().red().bold()
        } else {
            Style::new().blue()
        };
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", uidata.popup_title)).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::THICK)
            .border_style(border_style);

        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.as_str())
                .wrap(Wrap { trim: false })
                .block(block),
            area,
        );
    }
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .areas(area);
    area
}
