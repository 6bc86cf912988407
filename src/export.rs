//! Writers for filtered views.
//!
//! [`export`] and [`export_workbook`] produce a minimal Office Open XML
//! workbook: inline strings, numeric cells, booleans and date cells styled
//! with the built-in date (14) and date-time (22) formats. Parts are built
//! with `quick_xml::Writer`, which escapes text and attributes. Null cells
//! are left out of the sheet XML. [`export_delimited`] writes the same rows
//! as quoted delimited text.

use std::io::{Cursor, Write};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::info;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use thiserror::Error;
use zip::{CompressionMethod, ZipWriter, result::ZipError, write::SimpleFileOptions};

use crate::{data::Value, io_utils, table::Table};

pub const DEFAULT_SHEET_NAME: &str = "Filtered";

const MAX_SHEET_NAME_CHARS: usize = 31;
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

const STYLE_DATE: &str = "1";
const STYLE_DATETIME: &str = "2";
const SECONDS_PER_DAY: f64 = 86_400.0;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const PACKAGE_RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const OFFICE_DOCUMENT_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const STYLES_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const RELS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";
const WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const STYLES_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

type XmlWriter = Writer<Vec<u8>>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Workbook has no sheets")]
    NoSheets,
    #[error("Failed to write workbook archive: {0}")]
    Zip(#[from] ZipError),
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write delimited export: {0}")]
    Csv(#[from] csv::Error),
}

/// Single-sheet workbook holding `table`.
pub fn export(table: &Table, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    export_workbook(&[(sheet_name, table)])
}

/// Workbook with one sheet per entry, in order. Sheet names are sanitized and
/// made unique.
pub fn export_workbook(sheets: &[(&str, &Table)]) -> Result<Vec<u8>, ExportError> {
    if sheets.is_empty() {
        return Err(ExportError::NoSheets);
    }
    let names = unique_sheet_names(sheets.iter().map(|(name, _)| *name));

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut put = |path: &str, body: &[u8]| -> Result<(), ExportError> {
        zip.start_file(path, options)?;
        zip.write_all(body)?;
        Ok(())
    };

    put("[Content_Types].xml", &content_types(sheets.len())?)?;
    put("_rels/.rels", &root_rels()?)?;
    put("xl/workbook.xml", &workbook_xml(&names)?)?;
    put("xl/_rels/workbook.xml.rels", &workbook_rels(sheets.len())?)?;
    put("xl/styles.xml", STYLES.as_bytes())?;
    for (idx, (_, table)) in sheets.iter().enumerate() {
        put(&format!("xl/worksheets/sheet{}.xml", idx + 1), &worksheet_xml(table)?)?;
    }

    let bytes = zip.finish()?.into_inner();
    info!(
        "Exported {} sheet(s) as workbook ({} bytes)",
        sheets.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Header row plus every row as delimited text, every field quoted.
pub fn export_delimited(table: &Table, delimiter: u8) -> Result<Vec<u8>, ExportError> {
    let mut writer = io_utils::open_csv_writer(Vec::new(), delimiter);
    writer.write_record(table.headers())?;
    for row in table.display_rows(None) {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;
    info!(
        "Exported {} row(s) as delimited text (delimiter '{}')",
        table.row_count(),
        io_utils::printable_delimiter(delimiter)
    );
    Ok(bytes)
}

/// Applies the workbook rules for sheet names: at most 31 characters, none of
/// `[]:*?/\`, not blank.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned = name
        .chars()
        .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { '_' } else { c })
        .filter(|c| !c.is_control())
        .collect::<String>();
    let trimmed = cleaned.trim().trim_matches('\'');
    if trimmed.is_empty() {
        return DEFAULT_SHEET_NAME.to_string();
    }
    trimmed.chars().take(MAX_SHEET_NAME_CHARS).collect()
}

fn unique_sheet_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for name in names {
        let base = sanitize_sheet_name(name);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while unique
            .iter()
            .any(|taken| taken.to_lowercase() == candidate.to_lowercase())
        {
            let tail = format!(" ({suffix})");
            let keep = MAX_SHEET_NAME_CHARS.saturating_sub(tail.chars().count());
            candidate = base.chars().take(keep).collect::<String>() + &tail;
            suffix += 1;
        }
        unique.push(candidate);
    }
    unique
}

/// Starts a part with the XML declaration and opens its root element.
fn open_part(root: BytesStart<'_>) -> Result<XmlWriter, ExportError> {
    let mut xml = Writer::new(Vec::new());
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    xml.write_event(Event::Start(root))?;
    Ok(xml)
}

fn close_part(mut xml: XmlWriter, root: &str) -> Result<Vec<u8>, ExportError> {
    xml.write_event(Event::End(BytesEnd::new(root)))?;
    Ok(xml.into_inner())
}

fn empty_element(
    xml: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
) -> Result<(), ExportError> {
    let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
    xml.write_event(Event::Empty(element))?;
    Ok(())
}

fn content_types(sheet_count: usize) -> Result<Vec<u8>, ExportError> {
    let mut xml = open_part(BytesStart::new("Types").with_attributes([("xmlns", CONTENT_TYPES_NS)]))?;
    empty_element(
        &mut xml,
        "Default",
        &[("Extension", "rels"), ("ContentType", RELS_CONTENT_TYPE)],
    )?;
    empty_element(
        &mut xml,
        "Default",
        &[("Extension", "xml"), ("ContentType", "application/xml")],
    )?;
    empty_element(
        &mut xml,
        "Override",
        &[
            ("PartName", "/xl/workbook.xml"),
            ("ContentType", WORKBOOK_CONTENT_TYPE),
        ],
    )?;
    empty_element(
        &mut xml,
        "Override",
        &[
            ("PartName", "/xl/styles.xml"),
            ("ContentType", STYLES_CONTENT_TYPE),
        ],
    )?;
    for idx in 1..=sheet_count {
        let part = format!("/xl/worksheets/sheet{idx}.xml");
        empty_element(
            &mut xml,
            "Override",
            &[
                ("PartName", part.as_str()),
                ("ContentType", WORKSHEET_CONTENT_TYPE),
            ],
        )?;
    }
    close_part(xml, "Types")
}

/// A relationships part; each entry is `(id, type, target)`.
fn relationships(entries: &[(String, &str, String)]) -> Result<Vec<u8>, ExportError> {
    let mut xml = open_part(
        BytesStart::new("Relationships").with_attributes([("xmlns", PACKAGE_RELATIONSHIPS_NS)]),
    )?;
    for (id, kind, target) in entries {
        empty_element(
            &mut xml,
            "Relationship",
            &[("Id", id.as_str()), ("Type", *kind), ("Target", target.as_str())],
        )?;
    }
    close_part(xml, "Relationships")
}

fn root_rels() -> Result<Vec<u8>, ExportError> {
    relationships(&[(
        "rId1".to_string(),
        OFFICE_DOCUMENT_REL_TYPE,
        "xl/workbook.xml".to_string(),
    )])
}

fn workbook_rels(sheet_count: usize) -> Result<Vec<u8>, ExportError> {
    let mut entries = (1..=sheet_count)
        .map(|id| {
            (
                format!("rId{id}"),
                WORKSHEET_REL_TYPE,
                format!("worksheets/sheet{id}.xml"),
            )
        })
        .collect::<Vec<_>>();
    entries.push((
        format!("rId{}", sheet_count + 1),
        STYLES_REL_TYPE,
        "styles.xml".to_string(),
    ));
    relationships(&entries)
}

fn workbook_xml(names: &[String]) -> Result<Vec<u8>, ExportError> {
    let mut xml = open_part(
        BytesStart::new("workbook")
            .with_attributes([("xmlns", SPREADSHEET_NS), ("xmlns:r", RELATIONSHIPS_NS)]),
    )?;
    xml.write_event(Event::Start(BytesStart::new("sheets")))?;
    for (idx, name) in names.iter().enumerate() {
        let id = (idx + 1).to_string();
        let rel = format!("rId{id}");
        empty_element(
            &mut xml,
            "sheet",
            &[
                ("name", name.as_str()),
                ("sheetId", id.as_str()),
                ("r:id", rel.as_str()),
            ],
        )?;
    }
    xml.write_event(Event::End(BytesEnd::new("sheets")))?;
    close_part(xml, "workbook")
}

/// Header row at line 1, then one row per table row. Null cells are omitted;
/// a row with no values keeps one empty text cell so readers still count it.
fn worksheet_xml(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut xml = open_part(BytesStart::new("worksheet").with_attributes([("xmlns", SPREADSHEET_NS)]))?;
    if table.column_count() > 0 {
        let range = format!(
            "A1:{}",
            cell_ref(table.column_count() - 1, table.row_count() + 1)
        );
        empty_element(&mut xml, "dimension", &[("ref", range.as_str())])?;
    }
    xml.write_event(Event::Start(BytesStart::new("sheetData")))?;

    if table.column_count() > 0 {
        open_row(&mut xml, 1)?;
        for (col, column) in table.columns().iter().enumerate() {
            write_string_cell(&mut xml, &cell_ref(col, 1), &column.name)?;
        }
        xml.write_event(Event::End(BytesEnd::new("row")))?;

        for row in 0..table.row_count() {
            let line = row + 2;
            open_row(&mut xml, line)?;
            let mut written = false;
            for (col, value) in table.row(row).enumerate() {
                if let Some(value) = value {
                    write_value_cell(&mut xml, &cell_ref(col, line), value)?;
                    written = true;
                }
            }
            if !written {
                write_string_cell(&mut xml, &cell_ref(0, line), "")?;
            }
            xml.write_event(Event::End(BytesEnd::new("row")))?;
        }
    }

    xml.write_event(Event::End(BytesEnd::new("sheetData")))?;
    close_part(xml, "worksheet")
}

fn open_row(xml: &mut XmlWriter, line: usize) -> Result<(), ExportError> {
    let line = line.to_string();
    xml.write_event(Event::Start(
        BytesStart::new("row").with_attributes([("r", line.as_str())]),
    ))?;
    Ok(())
}

fn write_value_cell(xml: &mut XmlWriter, reference: &str, value: &Value) -> Result<(), ExportError> {
    match value {
        Value::String(text) => write_string_cell(xml, reference, text),
        Value::Integer(number) => write_number_cell(xml, reference, &[], &number.to_string()),
        Value::Float(number) if number.is_finite() => {
            write_number_cell(xml, reference, &[], &number.to_string())
        }
        Value::Float(_) => write_string_cell(xml, reference, &value.as_display()),
        Value::Boolean(flag) => {
            write_number_cell(xml, reference, &[("t", "b")], if *flag { "1" } else { "0" })
        }
        Value::Date(date) => write_number_cell(
            xml,
            reference,
            &[("s", STYLE_DATE)],
            &date_serial(*date).to_string(),
        ),
        Value::DateTime(datetime) => write_number_cell(
            xml,
            reference,
            &[("s", STYLE_DATETIME)],
            &datetime_serial(*datetime).to_string(),
        ),
    }
}

/// A `<c>` holding `<v>{raw}</v>`, with `extra` attributes after the reference.
fn write_number_cell(
    xml: &mut XmlWriter,
    reference: &str,
    extra: &[(&str, &str)],
    raw: &str,
) -> Result<(), ExportError> {
    let cell = BytesStart::new("c")
        .with_attributes([("r", reference)])
        .with_attributes(extra.iter().copied());
    xml.write_event(Event::Start(cell))?;
    xml.write_event(Event::Start(BytesStart::new("v")))?;
    xml.write_event(Event::Text(BytesText::new(raw)))?;
    xml.write_event(Event::End(BytesEnd::new("v")))?;
    xml.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_string_cell(xml: &mut XmlWriter, reference: &str, text: &str) -> Result<(), ExportError> {
    let cleaned = strip_illegal_xml(text);
    xml.write_event(Event::Start(
        BytesStart::new("c").with_attributes([("r", reference), ("t", "inlineStr")]),
    ))?;
    xml.write_event(Event::Start(BytesStart::new("is")))?;
    xml.write_event(Event::Start(
        BytesStart::new("t").with_attributes([("xml:space", "preserve")]),
    ))?;
    xml.write_event(Event::Text(BytesText::new(&cleaned)))?;
    xml.write_event(Event::End(BytesEnd::new("t")))?;
    xml.write_event(Event::End(BytesEnd::new("is")))?;
    xml.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Control characters other than tab, newline and carriage return are not
/// allowed in XML 1.0 text.
fn strip_illegal_xml(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn cell_ref(col: usize, row: usize) -> String {
    format!("{}{row}", column_letters(col))
}

/// Zero-based column index to its letter form (`0` → `A`, `26` → `AA`).
pub fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        let rem = (remaining - 1) % 26;
        letters.push(b'A' + rem as u8);
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().map(|b| *b as char).collect()
}

fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Days since the 1899-12-30 epoch.
fn date_serial(date: NaiveDate) -> i64 {
    date.signed_duration_since(excel_epoch()).num_days()
}

fn datetime_serial(datetime: NaiveDateTime) -> f64 {
    let seconds = f64::from(datetime.num_seconds_from_midnight())
        + f64::from(datetime.nanosecond()) / 1e9;
    date_serial(datetime.date()) as f64 + seconds / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::table::Column;

    fn sheet_xml(bytes: &[u8], part: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(part).unwrap();
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn column_letters_cover_multi_letter_columns() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn sanitize_sheet_name_applies_workbook_rules() {
        assert_eq!(sanitize_sheet_name("Q1/Q2 [draft]"), "Q1_Q2 _draft_");
        assert_eq!(sanitize_sheet_name("   "), DEFAULT_SHEET_NAME);
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).chars().count(), 31);
    }

    #[test]
    fn unique_sheet_names_suffix_repeats() {
        let names = unique_sheet_names(["TEC", "tec", "TEC"].into_iter());
        assert_eq!(names, vec!["TEC", "tec (1)", "TEC (2)"]);
    }

    #[test]
    fn serials_follow_the_1899_epoch() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(date_serial(date), 45292);
        let noon = date.and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(datetime_serial(noon), 45292.5);
    }

    #[test]
    fn worksheet_omits_nulls_and_escapes_text() {
        let table = Table::new(vec![
            Column::new(
                "Item",
                vec![Some(Value::String("A & <B>\u{1}".to_string())), None, None],
            ),
            Column::new(
                "Qty",
                vec![Some(Value::Integer(3)), Some(Value::Boolean(true)), None],
            ),
        ])
        .unwrap();
        let bytes = export(&table, "R&D").unwrap();
        let xml = sheet_xml(&bytes, "xl/worksheets/sheet1.xml");
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(xml.contains(r#"<dimension ref="A1:B4"/>"#));
        assert!(xml.contains("A &amp; &lt;B&gt;</t>"));
        assert!(xml.contains(r#"<c r="B2"><v>3</v></c>"#));
        assert!(xml.contains(r#"<c r="B3" t="b"><v>1</v></c>"#));
        assert!(!xml.contains(r#"r="A3""#));
        assert!(xml.contains(
            r#"<row r="4"><c r="A4" t="inlineStr"><is><t xml:space="preserve"></t></is></c></row>"#
        ));

        let workbook = sheet_xml(&bytes, "xl/workbook.xml");
        assert!(workbook.contains(r#"<sheet name="R&amp;D" sheetId="1" r:id="rId1"/>"#));
    }

    #[test]
    fn export_delimited_quotes_every_field() {
        let table = Table::new(vec![
            Column::new("Item", vec![Some(Value::String("Mouse".to_string()))]),
            Column::new("Qty", vec![None]),
        ])
        .unwrap();
        let bytes = export_delimited(&table, b';').unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "\"Item\";\"Qty\"\n\"Mouse\";\"\"\n");
    }

    #[test]
    fn export_workbook_requires_a_sheet() {
        assert!(matches!(export_workbook(&[]), Err(ExportError::NoSheets)));
    }
}
