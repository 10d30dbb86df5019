use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::models::export::Row;
use crate::core::ports::exporter::{ExportFile, TableExporter};
use crate::error::Error;

pub const SHEET_NAME: &str = "Respuestas";
pub const FILENAME: &str = "EncuestaBar_Resultados.xlsx";
pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Writes rows as a single-sheet workbook. The header is the union of all row columns in
/// order of first appearance; cells are inline strings.
pub struct XlsxExporter {
    sheet_name: String,
    filename: String,
}

impl Default for XlsxExporter {
    fn default() -> Self {
        Self::new(SHEET_NAME, FILENAME)
    }
}

impl XlsxExporter {
    pub fn new(sheet_name: &str, filename: &str) -> Self {
        Self {
            sheet_name: sheet_name.to_owned(),
            filename: filename.to_owned(),
        }
    }

    fn workbook(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            escape(&self.sheet_name)
        )
    }
}

fn header(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for column in rows.iter().flat_map(Row::columns) {
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_owned());
        }
    }
    columns
}

fn column_name(mut idx: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

fn sheet(rows: &[Row]) -> String {
    let columns = header(rows);
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    let mut push_row = |r: usize, values: Vec<&str>| {
        xml.push_str(&format!(r#"<row r="{}">"#, r));
        for (c, value) in values.into_iter().enumerate() {
            xml.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(c),
                r,
                escape(value)
            ));
        }
        xml.push_str("</row>");
    };
    push_row(1, columns.iter().map(String::as_str).collect());
    for (idx, row) in rows.iter().enumerate() {
        push_row(idx + 2, columns.iter().map(|c| row.get(c).unwrap_or("")).collect());
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

impl TableExporter for XlsxExporter {
    fn export(&self, rows: &[Row]) -> Result<ExportFile, Error> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_owned()),
            ("_rels/.rels", ROOT_RELS.to_owned()),
            ("xl/workbook.xml", self.workbook()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_owned()),
            ("xl/worksheets/sheet1.xml", sheet(rows)),
        ];
        for (path, content) in parts {
            zip.start_file(path, options)?;
            zip.write_all(content.as_bytes())?;
        }
        let content = zip.finish()?.into_inner();
        Ok(ExportFile {
            filename: self.filename.clone(),
            content_type: CONTENT_TYPE.to_owned(),
            content,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_export_workbook() {
        let mut row = Row::default();
        row.push("ID", "local_1");
        row.push("¿Qué bebes?", "Cerveza, Vino & <Agua>");
        let file = XlsxExporter::default().export(&[row]).unwrap();
        assert_eq!(file.filename, FILENAME);

        let mut archive = ZipArchive::new(Cursor::new(file.content)).unwrap();
        let mut workbook = String::new();
        archive.by_name("xl/workbook.xml").unwrap().read_to_string(&mut workbook).unwrap();
        assert!(workbook.contains(r#"name="Respuestas""#));

        let mut sheet = String::new();
        archive.by_name("xl/worksheets/sheet1.xml").unwrap().read_to_string(&mut sheet).unwrap();
        assert!(sheet.contains(r#"<c r="B1" t="inlineStr"><is><t xml:space="preserve">¿Qué bebes?</t></is></c>"#));
        assert!(sheet.contains("Cerveza, Vino &amp; &lt;Agua&gt;"));
        assert!(sheet.contains(r#"<row r="2">"#));
    }
}
