use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::domain::{CallRecord, Column};

/// What a table widget needs from its row model.
pub trait TableModel {
    fn set_rows(&mut self, rows: Vec<CallRecord>);
    fn set_filter(&mut self, pattern: Option<&str>);
    fn set_sort_key(&mut self, key: Option<SortKey>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: Column,
    pub order: SortOrder,
}

#[derive(Debug)]
enum Matcher {
    Regex(Regex),
    Literal(String), // lowercased
}

#[derive(Debug)]
struct RowFilter {
    text: String,
    matcher: Matcher,
}

impl RowFilter {
    // Input that does not compile as a regex is matched literally
    fn new(text: &str) -> Self {
        let matcher = match RegexBuilder::new(text).case_insensitive(true).build() {
            Ok(regex) => Matcher::Regex(regex),
            Err(e) => {
                debug!("Filter {text:?} is not a regex ({e}), matching literally");
                Matcher::Literal(text.to_lowercase())
            }
        };
        RowFilter {
            text: text.to_string(),
            matcher,
        }
    }

    fn matches(&self, record: &CallRecord) -> bool {
        Column::ALL.iter().any(|&column| {
            let cell = record.display_cell(column);
            match &self.matcher {
                Matcher::Regex(regex) => regex.is_match(&cell),
                Matcher::Literal(term) => cell.to_lowercase().contains(term.as_str()),
            }
        })
    }
}

/// Call records plus the filtered and sorted view onto them.
#[derive(Debug, Default)]
pub struct RecordTable {
    rows: Vec<CallRecord>,
    filter: Option<RowFilter>,
    sort_key: Option<SortKey>,
    view: Vec<usize>, // Mapping of view row index to rows index
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.set_rows(Vec::new());
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Number of loaded rows, visible or not.
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, view_idx: usize) -> Option<&CallRecord> {
        self.view.get(view_idx).map(|&idx| &self.rows[idx])
    }

    /// Position of a visible row in the loaded document.
    pub fn model_index(&self, view_idx: usize) -> Option<usize> {
        self.view.get(view_idx).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallRecord> + '_ {
        self.view.iter().map(|&idx| &self.rows[idx])
    }

    pub fn rows(&self) -> &[CallRecord] {
        &self.rows
    }

    pub fn filter_text(&self) -> Option<&str> {
        self.filter.as_ref().map(|f| f.text.as_str())
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        self.sort_key
    }

    /// Sort by `column`, flipping the order when it already is the sort column.
    pub fn toggle_sort(&mut self, column: Column) {
        let order = match self.sort_key {
            Some(key) if key.column == column && key.order == SortOrder::Ascending => {
                SortOrder::Descending
            }
            _ => SortOrder::Ascending,
        };
        self.set_sort_key(Some(SortKey { column, order }));
    }

    fn rebuild_view(&mut self) {
        let mut view: Vec<usize> = match &self.filter {
            Some(filter) => self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, record)| filter.matches(record))
                .map(|(idx, _)| idx)
                .collect(),
            None => (0..self.rows.len()).collect(),
        };

        if let Some(key) = self.sort_key {
            let rows = &self.rows;
            // Stable, so equal cells keep document order in both directions
            view.sort_by(|&a, &b| {
                let ordering = compare_cells(key.column, &rows[a], &rows[b]);
                match key.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        trace!("View has {}/{} rows", view.len(), self.rows.len());
        self.view = view;
    }
}

impl TableModel for RecordTable {
    fn set_rows(&mut self, rows: Vec<CallRecord>) {
        self.rows = rows;
        self.rebuild_view();
    }

    fn set_filter(&mut self, pattern: Option<&str>) {
        self.filter = match pattern {
            Some(text) if !text.trim().is_empty() => Some(RowFilter::new(text)),
            _ => None,
        };
        self.rebuild_view();
    }

    fn set_sort_key(&mut self, key: Option<SortKey>) {
        self.sort_key = key;
        self.rebuild_view();
    }
}

fn compare_cells(column: Column, a: &CallRecord, b: &CallRecord) -> Ordering {
    let (a, b) = (a.cell(column), b.cell(column));
    if column.is_numeric() {
        // NaN and infinities count as text
        let a_val = parse_finite(&a);
        let b_val = parse_finite(&b);
        match (a_val, b_val) {
            (Some(a_num), Some(b_num)) => return a_num.total_cmp(&b_num),
            (Some(_), None) => return Ordering::Less, // Numbers first
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => {}
        }
    }
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(&b))
}

fn parse_finite(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CallType;

    fn call(number: &str, duration: &str, call_type: CallType, name: &str) -> CallRecord {
        CallRecord {
            number: number.into(),
            duration: duration.into(),
            readable_date: format!("2023-01-01 {number}"),
            call_type,
            contact_name: name.into(),
        }
    }

    fn sample() -> Vec<CallRecord> {
        vec![
            call("100", "42", CallType::Missed, "Alice"),
            call("200", "7", CallType::Incoming, "bob"),
            call("300", "310", CallType::Outgoing, "Carol"),
            call("400", "", CallType::Unknown, ""),
            call("500", "7", CallType::Missed, "alice cooper"),
        ]
    }

    fn table() -> RecordTable {
        let mut table = RecordTable::new();
        table.set_rows(sample());
        table
    }

    fn numbers(table: &RecordTable) -> Vec<&str> {
        table.iter().map(|r| r.number.as_str()).collect()
    }

    #[test]
    fn new_table_is_empty() {
        let table = RecordTable::new();
        assert!(table.is_empty());
        assert_eq!(table.total(), 0);
        assert_eq!(table.get(0), None);
    }

    #[test]
    fn set_rows_replaces_everything() {
        let mut table = table();
        assert_eq!(table.len(), 5);
        table.set_rows(vec![call("900", "1", CallType::Incoming, "Zed")]);
        assert_eq!(table.total(), 1);
        assert_eq!(numbers(&table), ["900"]);
        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn filter_matches_any_column_case_insensitively() {
        let mut table = table();
        table.set_filter(Some("alice"));
        assert_eq!(numbers(&table), ["100", "500"]);
        table.set_filter(Some("ALICE"));
        assert_eq!(numbers(&table), ["100", "500"]);
        table.set_filter(Some("bob"));
        assert_eq!(numbers(&table), ["200"]);
        table.set_filter(Some("nobody"));
        assert!(table.is_empty());
        assert_eq!(table.total(), 5);
    }

    #[test]
    fn filter_matches_type_labels() {
        let mut upper = table();
        let mut lower = table();
        upper.set_filter(Some("MISS"));
        lower.set_filter(Some("miss"));
        assert_eq!(numbers(&upper), ["100", "500"]);
        assert_eq!(numbers(&upper), numbers(&lower));
    }

    #[test]
    fn filter_is_a_regex() {
        let mut table = table();
        table.set_filter(Some("^[23]00$"));
        assert_eq!(numbers(&table), ["200", "300"]);
    }

    #[test]
    fn pattern_does_not_span_columns() {
        let mut table = table();
        table.set_filter(Some("42.*Missed"));
        assert!(table.is_empty());
    }

    #[test]
    fn invalid_regex_matches_literally() {
        let mut table = table();
        table.set_rows(vec![
            call("100", "1", CallType::Incoming, "Dr. (Who"),
            call("200", "1", CallType::Incoming, "Who"),
        ]);
        table.set_filter(Some("(who"));
        assert_eq!(numbers(&table), ["100"]);
        assert_eq!(table.filter_text(), Some("(who"));
    }

    #[test]
    fn blank_filter_shows_everything_in_order() {
        let mut table = table();
        for pattern in ["alice", "zzz", "3"] {
            table.set_filter(Some(pattern));
            table.set_filter(Some(""));
            assert_eq!(numbers(&table), ["100", "200", "300", "400", "500"]);
        }
        table.set_filter(Some("alice"));
        table.set_filter(Some("   "));
        assert_eq!(table.len(), 5);
        assert_eq!(table.filter_text(), None);
        table.set_filter(Some("alice"));
        table.set_filter(None);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn filter_survives_new_rows() {
        let mut table = table();
        table.set_filter(Some("alice"));
        table.set_rows(sample());
        assert_eq!(numbers(&table), ["100", "500"]);
    }

    #[test]
    fn model_index_points_into_document() {
        let mut table = table();
        table.set_filter(Some("carol"));
        assert_eq!(table.model_index(0), Some(2));
        assert_eq!(table.model_index(1), None);
        assert_eq!(table.get(0).map(|r| r.contact_name.as_str()), Some("Carol"));
    }

    #[test]
    fn toggle_sort_flips_order() {
        let mut table = table();
        table.toggle_sort(Column::ContactName);
        assert_eq!(
            table.sort_key(),
            Some(SortKey {
                column: Column::ContactName,
                order: SortOrder::Ascending
            })
        );
        assert_eq!(numbers(&table), ["400", "100", "500", "200", "300"]);
        table.toggle_sort(Column::ContactName);
        assert_eq!(table.sort_key().map(|k| k.order), Some(SortOrder::Descending));
        assert_eq!(numbers(&table), ["300", "200", "500", "100", "400"]);
        table.toggle_sort(Column::ContactName);
        assert_eq!(table.sort_key().map(|k| k.order), Some(SortOrder::Ascending));
        table.toggle_sort(Column::Number);
        assert_eq!(
            table.sort_key(),
            Some(SortKey {
                column: Column::Number,
                order: SortOrder::Ascending
            })
        );
    }

    #[test]
    fn duration_sorts_numerically_and_stably() {
        let mut table = table();
        table.toggle_sort(Column::Duration);
        // Equal durations keep document order, the empty cell goes last
        assert_eq!(numbers(&table), ["200", "500", "100", "300", "400"]);
        table.toggle_sort(Column::Duration);
        assert_eq!(numbers(&table), ["400", "300", "100", "200", "500"]);
    }

    #[test]
    fn sort_and_filter_compose() {
        let mut table = table();
        table.set_sort_key(Some(SortKey {
            column: Column::Duration,
            order: SortOrder::Descending,
        }));
        table.set_filter(Some("alice"));
        assert_eq!(numbers(&table), ["100", "500"]);
        table.set_filter(None);
        assert_eq!(table.len(), 5);
        assert_eq!(numbers(&table)[0], "400");
        table.set_sort_key(None);
        assert_eq!(numbers(&table), ["100", "200", "300", "400", "500"]);
    }

    #[test]
    fn filtering_does_not_touch_rows() {
        let mut table = table();
        table.toggle_sort(Column::Type);
        table.set_filter(Some("o"));
        assert_eq!(table.rows(), sample().as_slice());
    }

    #[test]
    fn non_finite_durations_sort_as_text() {
        let rows: Vec<_> = (0..2000)
            .map(|i| {
                let duration = if i % 7 == 0 {
                    "NaN".to_string()
                } else {
                    ((i * 7919) % 1000).to_string()
                };
                call(&i.to_string(), &duration, CallType::Incoming, "")
            })
            .collect();
        let mut table = RecordTable::new();
        table.set_rows(rows);
        table.toggle_sort(Column::Duration);

        let durations: Vec<&str> = table.iter().map(|r| r.duration.as_str()).collect();
        let numeric: Vec<f64> = durations
            .iter()
            .take_while(|d| **d != "NaN")
            .map(|d| d.parse().unwrap())
            .collect();
        assert_eq!(numeric.len(), 2000 - 286);
        assert!(numeric.windows(2).all(|w| w[0] <= w[1]));
        assert!(durations[numeric.len()..].iter().all(|d| *d == "NaN"));
    }

    #[test]
    fn filter_matches_rendered_line_breaks() {
        let mut table = RecordTable::new();
        table.set_rows(vec![call("1", "5", CallType::Missed, "Ann\nLee")]);
        table.set_filter(Some("ann ↵ lee"));
        assert_eq!(table.len(), 1);
        table.set_filter(Some("ann\nlee"));
        assert!(table.is_empty());
    }
}
