use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

pub const HELP_TEXT: &str = "\
o          open file
/          search (filters while typing)
Esc        clear search
Up/Down    move selection (k/j)
PgUp/PgDn  move one page
g/G        first/last row
Left/Right select column (h/l)
s          sort by selected column
Enter      show record
i          toggle record number
y/Y        copy cell/row
?          this help
q          quit";

/// Call direction as encoded by the `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallType {
    Incoming,
    Outgoing,
    Missed,
    #[default]
    Unknown,
}

impl CallType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "1" => CallType::Incoming,
            "2" => CallType::Outgoing,
            "3" => CallType::Missed,
            _ => CallType::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallType::Incoming => "Incoming",
            CallType::Outgoing => "Outgoing",
            CallType::Missed => "Missed",
            CallType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallRecord {
    pub number: String,
    pub duration: String,
    pub readable_date: String,
    pub call_type: CallType,
    pub contact_name: String,
}

impl CallRecord {
    /// Text shown in the table for the given column.
    pub fn cell(&self, column: Column) -> Cow<'_, str> {
        match column {
            Column::Number => Cow::Borrowed(&self.number),
            Column::Duration => Cow::Borrowed(&self.duration),
            Column::ReadableDate => Cow::Borrowed(&self.readable_date),
            Column::Type => Cow::Borrowed(self.call_type.label()),
            Column::ContactName => Cow::Borrowed(&self.contact_name),
        }
    }

    /// Cell text as rendered in a single table line, line breaks shown as ` ↵ `.
    pub fn display_cell(&self, column: Column) -> Cow<'_, str> {
        let cell = self.cell(column);
        if cell.contains(['\r', '\n']) {
            Cow::Owned(cell.replace("\r\n", " ↵ ").replace('\n', " ↵ "))
        } else {
            cell
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Number,
    Duration,
    ReadableDate,
    Type,
    ContactName,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Number,
        Column::Duration,
        Column::ReadableDate,
        Column::Type,
        Column::ContactName,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::Number => "number",
            Column::Duration => "duration",
            Column::ReadableDate => "readable date",
            Column::Type => "type",
            Column::ContactName => "contact name",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Column::Number => 0,
            Column::Duration => 1,
            Column::ReadableDate => 2,
            Column::Type => 3,
            Column::ContactName => 4,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Column::ALL.get(idx).copied()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Duration)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ViewerConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    #[setters(strip_option)]
    pub log_file: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    OpenFile,
}

#[derive(Debug, Clone, PartialEq)]
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
    OpenFile,
    Search,
    Sort,
    Enter,
    Exit,
    ToggleIndex,
    CopyCell,
    CopyRow,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid attribute at byte {position}: {source}")]
    Attribute {
        position: u64,
        #[source]
        source: quick_xml::events::attributes::AttrError,
    },

    #[error("malformed XML: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ChvError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_type_decoding_is_exact() {
        assert_eq!(CallType::from_code("1"), CallType::Incoming);
        assert_eq!(CallType::from_code("2"), CallType::Outgoing);
        assert_eq!(CallType::from_code("3"), CallType::Missed);
        for code in ["", "0", "4", "9", " 1", "01", "1.0", "missed"] {
            assert_eq!(CallType::from_code(code), CallType::Unknown, "code {code:?}");
        }
    }

    #[test]
    fn cells_follow_column_order() {
        let record = CallRecord {
            number: "9841000000".into(),
            duration: "42".into(),
            readable_date: "2023-01-01 10:00".into(),
            call_type: CallType::Missed,
            contact_name: "Alice".into(),
        };
        let cells: Vec<_> = Column::ALL.iter().map(|c| record.cell(*c)).collect();
        assert_eq!(cells, ["9841000000", "42", "2023-01-01 10:00", "Missed", "Alice"]);
    }

    #[test]
    fn display_cell_flattens_line_breaks() {
        let record = CallRecord {
            contact_name: "Alice\nSmith\r\nJr".into(),
            ..Default::default()
        };
        assert_eq!(record.display_cell(Column::ContactName), "Alice ↵ Smith ↵ Jr");
        assert_eq!(record.cell(Column::ContactName), "Alice\nSmith\r\nJr");
        assert_eq!(record.display_cell(Column::Type), "Unknown");
    }

    #[test]
    fn column_index_round_trips() {
        for (idx, column) in Column::ALL.iter().enumerate() {
            assert_eq!(column.index(), idx);
            assert_eq!(Column::from_index(idx), Some(*column));
        }
        assert_eq!(Column::from_index(5), None);
    }

    #[test]
    fn config_setters() {
        let cfg = ViewerConfig::default()
            .with_max_column_width(12)
            .with_log_file(PathBuf::from("/tmp/chv.log"));
        assert_eq!(cfg.max_column_width, 12);
        assert_eq!(cfg.event_poll_time, 100);
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/chv.log")));
    }
}
