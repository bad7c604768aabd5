use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ratatui::text::Span;
use tracing::{debug, info, trace, warn};

use crate::domain::TVError;
use crate::natural::compare_natural;

/// Column id meaning "not sorted".
pub const NO_SORT_COLUMN: i32 = 0;
/// Lower bound for an auto sized column, before the margin is added.
pub const MIN_AUTO_WIDTH: u16 = 4;
pub const AUTO_WIDTH_MARGIN: u16 = 2;
pub const CHECKBOX_COLUMN_WIDTH: u16 = 5;

const HEADERS_ELEMENT: &str = "HEADERS";
const DATA_ELEMENT: &str = "DATA";
const ID_ATTRIBUTE: &str = "ID";
const SELECT_ATTRIBUTE: &str = "Select";

/// How cells of a column are presented and edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    PlainText,
    EditableText,
    Checkbox,
}

impl ColumnKind {
    fn from_attribute(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Some(ColumnKind::PlainText),
            "editable" => Some(ColumnKind::EditableText),
            "checkbox" => Some(ColumnKind::Checkbox),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: i32,
    pub name: String,
    pub width: i32,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Row {
    attributes: HashMap<String, String>,
}

impl Row {
    fn attribute(&self, name: &str) -> &str {
        self.attributes.get(name).map(String::as_str).unwrap_or("")
    }

    fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }
}

/// In-memory table loaded from an XML file with a `HEADERS` and a `DATA` section.
///
/// Every accessor tolerates missing sections, unknown columns and out of range
/// rows by returning an empty value, so a view can always render whatever was
/// loaded.
#[derive(Debug, Default)]
pub struct TableDocument {
    path: Option<PathBuf>,
    columns: Vec<Column>,
    rows: Vec<Row>,
    num_rows: usize,
    editable_columns: Vec<i32>,
}

impl TableDocument {
    /// An empty document. Columns listed in `editable_columns` become
    /// `EditableText` unless the file declares their kind itself.
    pub fn new(editable_columns: Vec<i32>) -> Self {
        Self {
            editable_columns,
            ..Self::default()
        }
    }

    pub fn from_xml(xml: &str, editable_columns: &[i32]) -> Result<Self, TVError> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();

        let find_section = |name: &str| {
            root.children()
                .find(|n| n.is_element() && n.has_tag_name(name))
        };

        let mut columns: Vec<Column> = Vec::new();
        match find_section(HEADERS_ELEMENT) {
            Some(headers) => {
                for node in headers.children().filter(|n| n.is_element()) {
                    let name = node.attribute("name").unwrap_or("").to_string();
                    let id = int_value(node.attribute("columnId").unwrap_or(""));
                    let width = int_value(node.attribute("width").unwrap_or(""));
                    let kind = resolve_kind(&name, id, node.attribute("kind"), editable_columns);
                    if columns.iter().any(|c| c.id == id) {
                        warn!("Duplicate column id {id} for \"{name}\", keeping the first definition");
                    }
                    columns.push(Column {
                        id,
                        name,
                        width,
                        kind,
                    });
                }
            }
            None => warn!("Table file has no {HEADERS_ELEMENT} section"),
        }

        let rows: Vec<Row> = match find_section(DATA_ELEMENT) {
            Some(data) => data
                .children()
                .filter(|n| n.is_element())
                .map(|node| Row {
                    attributes: node
                        .attributes()
                        .map(|a| (a.name().to_string(), a.value().to_string()))
                        .collect(),
                })
                .collect(),
            None => {
                warn!("Table file has no {DATA_ELEMENT} section");
                Vec::new()
            }
        };

        for c in columns.iter() {
            debug!("Column: {} \"{}\", width {}, {:?}", c.id, c.name, c.width, c.kind);
        }

        let num_rows = rows.len();
        Ok(Self {
            path: None,
            columns,
            rows,
            num_rows,
            editable_columns: editable_columns.to_vec(),
        })
    }

    /// Replace the content with the table stored at `path`.
    ///
    /// Returns false and leaves the document untouched if there is no path,
    /// the file does not exist or cannot be parsed.
    pub fn load(&mut self, path: Option<&Path>) -> bool {
        let Some(path) = path else {
            debug!("No table file set, nothing to load");
            return false;
        };
        if !path.exists() {
            warn!("Table file {} does not exist", path.display());
            return false;
        }

        match Self::read(path, &self.editable_columns) {
            Ok(mut doc) => {
                doc.path = Some(path.to_path_buf());
                info!(
                    "Loaded {} with {} columns and {} rows",
                    path.display(),
                    doc.columns.len(),
                    doc.num_rows
                );
                *self = doc;
                true
            }
            Err(e) => {
                warn!("Failed to load {}: {e}", path.display());
                false
            }
        }
    }

    fn read(path: &Path, editable_columns: &[i32]) -> Result<Self, TVError> {
        let xml = fs::read_to_string(path)?;
        Self::from_xml(&xml, editable_columns)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, column_id: i32) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn column_kind(&self, column_id: i32) -> Option<ColumnKind> {
        self.column(column_id).map(|c| c.kind)
    }

    pub fn column_name_for(&self, column_id: i32) -> &str {
        self.column(column_id).map(|c| c.name.as_str()).unwrap_or("")
    }

    /// Number of rows found at load time.
    pub fn row_count(&self) -> usize {
        self.num_rows
    }

    #[cfg(test)]
    pub fn row_id(&self, row: usize) -> &str {
        self.rows
            .get(row)
            .map(|r| r.attribute(ID_ATTRIBUTE))
            .unwrap_or("")
    }

    pub fn cell_text(&self, column_id: i32, row: usize) -> &str {
        let name = self.column_name_for(column_id);
        if name.is_empty() {
            return "";
        }
        self.rows.get(row).map(|r| r.attribute(name)).unwrap_or("")
    }

    pub fn set_cell_text(&mut self, column_id: i32, row: usize, value: &str) {
        let Some(name) = self.column(column_id).map(|c| c.name.clone()) else {
            trace!("Ignoring edit of unknown column {column_id}");
            return;
        };
        if name.is_empty() {
            return;
        }
        match self.rows.get_mut(row) {
            Some(r) => r.set_attribute(&name, value),
            None => trace!("Ignoring edit of row {row}, table has {} rows", self.num_rows),
        }
    }

    pub fn selection(&self, row: usize) -> i32 {
        self.rows
            .get(row)
            .map(|r| int_value(r.attribute(SELECT_ATTRIBUTE)))
            .unwrap_or(0)
    }

    pub fn set_selection(&mut self, row: usize, value: i32) {
        match self.rows.get_mut(row) {
            Some(r) => r.set_attribute(SELECT_ATTRIBUTE, value.to_string()),
            None => trace!("Ignoring selection of row {row}, table has {} rows", self.num_rows),
        }
    }

    /// Reorder the rows by the column in natural order, breaking ties by `ID`.
    pub fn sort_by(&mut self, column_id: i32, ascending: bool) {
        if column_id == NO_SORT_COLUMN {
            return;
        }
        let name = self.column_name_for(column_id).to_string();
        trace!("Sorting {} rows by \"{name}\", ascending: {ascending}", self.num_rows);

        self.rows.sort_by(|a, b| {
            let result = compare_natural(a.attribute(&name), b.attribute(&name)).then_with(|| {
                compare_natural(a.attribute(ID_ATTRIBUTE), b.attribute(ID_ATTRIBUTE))
            });
            if ascending { result } else { result.reverse() }
        });
    }

    /// Width in terminal cells needed to show every value of the column.
    pub fn auto_size_width(&self, column_id: i32) -> u16 {
        if self.column_kind(column_id) == Some(ColumnKind::Checkbox) {
            return CHECKBOX_COLUMN_WIDTH;
        }

        let widest = (0..self.num_rows)
            .map(|row| Span::raw(self.cell_text(column_id, row)).width())
            .max()
            .unwrap_or(0);
        let widest = u16::try_from(widest).unwrap_or(u16::MAX);
        widest.max(MIN_AUTO_WIDTH).saturating_add(AUTO_WIDTH_MARGIN)
    }
}

fn resolve_kind(name: &str, id: i32, declared: Option<&str>, editable_columns: &[i32]) -> ColumnKind {
    if let Some(value) = declared {
        match ColumnKind::from_attribute(value) {
            Some(kind) => return kind,
            None => warn!("Unknown kind \"{value}\" for column \"{name}\""),
        }
    }
    if name == SELECT_ATTRIBUTE {
        ColumnKind::Checkbox
    } else if editable_columns.contains(&id) {
        ColumnKind::EditableText
    } else {
        ColumnKind::PlainText
    }
}

/// Parse the leading integer of an attribute value, 0 if there is none.
/// "12px" reads as 12, " -3" as -3 and "abc" as 0.
fn int_value(s: &str) -> i32 {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if digits.is_empty() {
        return 0;
    }
    // Only ascii digits are left, so a failed parse means overflow
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    (sign * magnitude).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SMALL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TABLE_DATA>
  <HEADERS>
    <COLUMN columnId="1" name="ID" width="50"/>
    <COLUMN columnId="2" name="Name" width="200"/>
    <COLUMN columnId="3" name="Select" width="50"/>
  </HEADERS>
  <DATA>
    <ITEM ID="1" Name="item10" Select="0"/>
    <ITEM ID="2" Name="item2" Select="1"/>
    <ITEM ID="3" Name="Item1" Select="0"/>
    <ITEM ID="4" Name="item33" Select="1"/>
    <ITEM ID="5" Name="item4" Select="0"/>
  </DATA>
</TABLE_DATA>"#;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    fn names(doc: &TableDocument) -> Vec<&str> {
        (0..doc.row_count()).map(|r| doc.cell_text(2, r)).collect()
    }

    #[test]
    fn parse_columns_and_rows() {
        let doc = TableDocument::from_xml(SMALL, &[]).unwrap();
        assert_eq!(doc.row_count(), 5);
        assert_eq!(doc.column_name_for(1), "ID");
        assert_eq!(doc.column_name_for(2), "Name");
        assert_eq!(doc.column_name_for(3), "Select");
        assert_eq!(doc.column_name_for(42), "");
        assert_eq!(doc.column(2).map(|c| c.width), Some(200));
    }

    #[test]
    fn column_kinds() {
        let xml = r#"<T><HEADERS>
            <C columnId="1" name="ID"/>
            <C columnId="2" name="Notes" kind="Editable"/>
            <C columnId="3" name="Select"/>
            <C columnId="4" name="Done" kind="checkbox"/>
            <C columnId="5" name="Select" kind="text"/>
            <C columnId="6" name="Comment"/>
        </HEADERS></T>"#;
        let doc = TableDocument::from_xml(xml, &[6]).unwrap();
        assert_eq!(doc.column_kind(1), Some(ColumnKind::PlainText));
        assert_eq!(doc.column_kind(2), Some(ColumnKind::EditableText));
        assert_eq!(doc.column_kind(3), Some(ColumnKind::Checkbox));
        assert_eq!(doc.column_kind(4), Some(ColumnKind::Checkbox));
        assert_eq!(doc.column_kind(5), Some(ColumnKind::PlainText));
        assert_eq!(doc.column_kind(6), Some(ColumnKind::EditableText));
        assert_eq!(doc.column_kind(7), None);
    }

    #[test]
    fn cell_text_round_trip() {
        let mut doc = TableDocument::from_xml(SMALL, &[]).unwrap();
        doc.set_cell_text(2, 3, "renamed");
        assert_eq!(doc.cell_text(2, 3), "renamed");
        assert_eq!(doc.cell_text(2, 2), "Item1");

        // Attributes that did not exist before can be written too
        let xml = r#"<T><HEADERS><C columnId="7" name="Extra"/></HEADERS><DATA><R ID="1"/></DATA></T>"#;
        let mut doc = TableDocument::from_xml(xml, &[]).unwrap();
        assert_eq!(doc.cell_text(7, 0), "");
        doc.set_cell_text(7, 0, "");
        assert_eq!(doc.cell_text(7, 0), "");
        doc.set_cell_text(7, 0, "<&>");
        assert_eq!(doc.cell_text(7, 0), "<&>");
    }

    #[test]
    fn out_of_range_access_returns_defaults() {
        let mut doc = TableDocument::from_xml(SMALL, &[]).unwrap();
        assert_eq!(doc.cell_text(2, 99), "");
        assert_eq!(doc.cell_text(99, 0), "");
        assert_eq!(doc.selection(99), 0);
        assert_eq!(doc.row_id(99), "");

        doc.set_cell_text(2, 99, "nope");
        doc.set_cell_text(99, 0, "nope");
        doc.set_selection(99, 1);
        assert_eq!(doc.row_count(), 5);
        assert_eq!(names(&doc), vec!["item10", "item2", "Item1", "item33", "item4"]);
    }

    #[test]
    fn selection_round_trip() {
        let mut doc = TableDocument::from_xml(SMALL, &[]).unwrap();
        assert_eq!(doc.selection(0), 0);
        assert_eq!(doc.selection(1), 1);
        for (row, value) in [(0, 1), (1, 0), (2, 7), (3, -4)] {
            doc.set_selection(row, value);
            assert_eq!(doc.selection(row), value);
        }
        assert_eq!(doc.cell_text(3, 2), "7");
    }

    #[test]
    fn sort_is_natural_and_reversible() {
        let mut doc = TableDocument::from_xml(SMALL, &[]).unwrap();
        doc.sort_by(2, true);
        let ascending: Vec<String> = names(&doc).into_iter().map(String::from).collect();
        assert_eq!(ascending, vec!["Item1", "item2", "item4", "item10", "item33"]);

        doc.sort_by(2, false);
        let mut descending: Vec<String> = names(&doc).into_iter().map(String::from).collect();
        descending.reverse();
        assert_eq!(descending, ascending);
    }

    #[test]
    fn sort_ties_are_broken_by_id() {
        let xml = r#"<T><HEADERS><C columnId="1" name="ID"/><C columnId="2" name="Name"/></HEADERS>
            <DATA>
              <R ID="10" Name="a"/>
              <R ID="9" Name="a"/>
              <R ID="2" Name="b"/>
              <R ID="1" Name="A"/>
            </DATA></T>"#;
        let mut doc = TableDocument::from_xml(xml, &[]).unwrap();

        doc.sort_by(2, true);
        let ids: Vec<&str> = (0..doc.row_count()).map(|r| doc.row_id(r)).collect();
        assert_eq!(ids, vec!["1", "9", "10", "2"]);

        doc.sort_by(2, false);
        let ids: Vec<&str> = (0..doc.row_count()).map(|r| doc.row_id(r)).collect();
        assert_eq!(ids, vec!["2", "10", "9", "1"]);
    }

    #[test]
    fn inner_spaces_take_part_in_sorting() {
        let xml = r#"<T><HEADERS><C columnId="1" name="ID"/><C columnId="2" name="Name"/></HEADERS>
            <DATA>
              <R ID="1" Name="JohnSmith"/>
              <R ID="2" Name="John Smith"/>
              <R ID="3" Name="item2"/>
              <R ID="4" Name="item 2"/>
            </DATA></T>"#;
        let mut doc = TableDocument::from_xml(xml, &[]).unwrap();

        doc.sort_by(2, true);
        let ids: Vec<&str> = (0..doc.row_count()).map(|r| doc.row_id(r)).collect();
        assert_eq!(ids, vec!["4", "3", "2", "1"]);

        doc.sort_by(2, false);
        let ids: Vec<&str> = (0..doc.row_count()).map(|r| doc.row_id(r)).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn no_sort_column_keeps_order() {
        let mut doc = TableDocument::from_xml(SMALL, &[]).unwrap();
        doc.sort_by(NO_SORT_COLUMN, true);
        assert_eq!(names(&doc), vec!["item10", "item2", "Item1", "item33", "item4"]);
    }

    #[test]
    fn selection_travels_with_the_row() {
        let xml = r#"<T><HEADERS><C columnId="1" name="ID"/><C columnId="2" name="Name"/></HEADERS>
            <DATA><R ID="1" Name="Bob" Select="0"/><R ID="2" Name="Alice" Select="1"/></DATA></T>"#;
        let mut doc = TableDocument::from_xml(xml, &[]).unwrap();
        doc.sort_by(2, true);
        assert_eq!(doc.cell_text(2, 0), "Alice");
        assert_eq!(doc.cell_text(2, 1), "Bob");
        assert_eq!(doc.selection(0), 1);
        assert_eq!(doc.selection(1), 0);
    }

    #[test]
    fn missing_sections_give_empty_table() {
        let doc = TableDocument::from_xml("<T><DATA><R ID=\"1\"/></DATA></T>", &[]).unwrap();
        assert_eq!(doc.row_count(), 1);
        assert_eq!(doc.column_name_for(1), "");
        assert_eq!(doc.cell_text(1, 0), "");

        let mut doc = TableDocument::from_xml("<T><HEADERS><C columnId=\"1\" name=\"ID\"/></HEADERS></T>", &[]).unwrap();
        assert_eq!(doc.row_count(), 0);
        assert_eq!(doc.cell_text(1, 0), "");
        assert_eq!(doc.selection(0), 0);
        doc.sort_by(1, true);
        assert_eq!(doc.auto_size_width(1), MIN_AUTO_WIDTH + AUTO_WIDTH_MARGIN);
    }

    #[test]
    fn duplicate_column_ids_resolve_to_first() {
        let xml = r#"<T><HEADERS><C columnId="1" name="First"/><C columnId="1" name="Second"/></HEADERS></T>"#;
        let doc = TableDocument::from_xml(xml, &[]).unwrap();
        assert_eq!(doc.column_name_for(1), "First");
    }

    #[test]
    fn auto_size_width() {
        let doc = TableDocument::from_xml(SMALL, &[]).unwrap();
        // Longest name is "item10" / "item33"
        assert_eq!(doc.auto_size_width(2), 6 + AUTO_WIDTH_MARGIN);
        // IDs are a single character, the minimum applies
        assert_eq!(doc.auto_size_width(1), MIN_AUTO_WIDTH + AUTO_WIDTH_MARGIN);
        assert_eq!(doc.auto_size_width(3), CHECKBOX_COLUMN_WIDTH);
    }

    #[test]
    fn int_values_are_lenient() {
        assert_eq!(int_value("12"), 12);
        assert_eq!(int_value(" -3"), -3);
        assert_eq!(int_value("+5"), 5);
        assert_eq!(int_value("12px"), 12);
        assert_eq!(int_value("abc"), 0);
        assert_eq!(int_value(""), 0);
        assert_eq!(int_value("99999999999"), i32::MAX);
        assert_eq!(int_value("123456789012345678901234"), i32::MAX);
        assert_eq!(int_value("-123456789012345678901234"), i32::MIN);
    }

    #[test]
    fn load_fixture_file() {
        let path = fixture("TableData.xml");
        let mut doc = TableDocument::new(Vec::new());
        assert!(doc.load(Some(&path)));
        assert_eq!(doc.path(), Some(path.as_path()));
        assert_eq!(doc.row_count(), 8);
        assert_eq!(doc.columns().len(), 9);
        assert_eq!(doc.column_name_for(2), "Artist");
        assert_eq!(doc.column_kind(8), Some(ColumnKind::EditableText));
        assert_eq!(doc.column_kind(9), Some(ColumnKind::Checkbox));
    }

    #[test]
    fn load_missing_path_is_a_no_op() {
        let mut doc = TableDocument::new(Vec::new());
        assert!(!doc.load(None));
        assert!(!doc.load(Some(&fixture("does_not_exist.xml"))));
        assert_eq!(doc.row_count(), 0);
        assert!(doc.is_empty());
        assert_eq!(doc.path(), None);
    }

    #[test]
    fn load_failure_keeps_previous_table() {
        let mut doc = TableDocument::new(Vec::new());
        assert!(doc.load(Some(&fixture("TableData.xml"))));
        assert!(!doc.load(Some(&fixture("malformed.xml"))));
        assert!(!doc.load(Some(&fixture("does_not_exist.xml"))));
        assert_eq!(doc.row_count(), 8);
        assert_eq!(doc.path(), Some(fixture("TableData.xml").as_path()));
    }

    #[test]
    fn reload_discards_edits() {
        let path = fixture("TableData.xml");
        let mut doc = TableDocument::new(Vec::new());
        assert!(doc.load(Some(&path)));
        let original = doc.cell_text(2, 0).to_string();
        doc.set_cell_text(2, 0, "edited");
        assert!(doc.load(Some(&path)));
        assert_eq!(doc.cell_text(2, 0), original);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let result = TableDocument::from_xml("<T><HEADERS></T>", &[]);
        assert!(matches!(result, Err(TVError::XmlError(_))));
    }
}
