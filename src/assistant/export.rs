//! Lead export as an XLSX workbook.
//!
//! XLSX files are ZIP archives of SpreadsheetML parts. The workbook written
//! here is the smallest set of parts spreadsheet apps accept: one sheet,
//! inline strings, no shared string table and no styles.

use std::io::{Cursor, Write};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assistant::database::{Database, Lead, StoreError};
use crate::assistant::message::escape_html;
use crate::assistant::notifier::{Notifier, NotifyError};

/// Column order of every export.
pub const HEADER: [&str; 12] = [
    "id",
    "created_at",
    "role",
    "product",
    "qty",
    "city",
    "phone",
    "status",
    "user_id",
    "username",
    "full_name",
    "lang",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to load leads: {0}")]
    Store(#[from] StoreError),
    #[error("failed to build spreadsheet: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to build spreadsheet: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deliver export: {0}")]
    Delivery(#[from] NotifyError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid export window '{0}'")]
pub struct WindowError(pub String);

/// Which leads to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportWindow {
    All,
    /// Leads created within this span before now.
    Trailing(Duration),
}

impl ExportWindow {
    /// Parse `all`, `7d`, `24h`, `2w` or a bare number of days. Empty means `all`.
    pub fn parse(input: &str) -> Result<Self, WindowError> {
        let input = input.trim().to_lowercase();
        if input.is_empty() || input == "all" {
            return Ok(ExportWindow::All);
        }

        let unit_start = input.find(|c: char| !c.is_ascii_digit()).unwrap_or(input.len());
        let num: i64 = input[..unit_start].parse().map_err(|_| WindowError(input.clone()))?;
        if num <= 0 {
            return Err(WindowError(input));
        }

        let span = match &input[unit_start..] {
            "" | "d" | "day" | "days" => Duration::try_days(num),
            "h" | "hour" | "hours" => Duration::try_hours(num),
            "w" | "week" | "weeks" => Duration::try_weeks(num),
            _ => return Err(WindowError(input)),
        };
        span.map(ExportWindow::Trailing).ok_or(WindowError(input))
    }

    /// Earliest creation time to include. A span reaching past the start of
    /// representable time covers everything.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ExportWindow::All => None,
            ExportWindow::Trailing(span) => now.checked_sub_signed(span),
        }
    }

    /// Short human description used in the document caption.
    pub fn describe(self) -> String {
        match self {
            ExportWindow::All => "all time".to_string(),
            ExportWindow::Trailing(span) if span.num_hours() % 24 == 0 => format!("last {}d", span.num_days()),
            ExportWindow::Trailing(span) => format!("last {}h", span.num_hours()),
        }
    }
}

enum Cell {
    Number(i64),
    Text(String),
}

fn lead_row(lead: &Lead, tz: Tz) -> [Cell; 12] {
    [
        Cell::Number(lead.id),
        Cell::Text(lead.created_at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()),
        Cell::Text(lead.role.clone()),
        Cell::Text(lead.product.clone()),
        Cell::Text(lead.quantity.clone()),
        Cell::Text(lead.city.clone()),
        Cell::Text(lead.phone.clone()),
        Cell::Text(lead.status.as_str().to_string()),
        Cell::Number(lead.user_id),
        Cell::Text(lead.username.clone().unwrap_or_default()),
        Cell::Text(lead.full_name.clone()),
        Cell::Text(lead.language.code().to_string()),
    ]
}

/// XML 1.0 forbids most control characters even when escaped.
fn xml_text(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|&c| c == '\t' || c == '\n' || c == '\r' || c >= ' ')
        .collect();
    escape_html(&cleaned)
}

fn write_row(xml: &mut String, row_num: usize, cells: &[Cell]) {
    xml.push_str(&format!("<row r=\"{row_num}\">"));
    for (col, cell) in cells.iter().enumerate() {
        let reference = format!("{}{}", (b'A' + col as u8) as char, row_num);
        match cell {
            Cell::Number(n) => xml.push_str(&format!("<c r=\"{reference}\"><v>{n}</v></c>")),
            Cell::Text(t) => xml.push_str(&format!(
                "<c r=\"{reference}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                xml_text(t)
            )),
        }
    }
    xml.push_str("</row>");
}

fn sheet_xml(leads: &[Lead], tz: Tz) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );
    let header: Vec<Cell> = HEADER.iter().map(|h| Cell::Text((*h).to_string())).collect();
    write_row(&mut xml, 1, &header);
    for (i, lead) in leads.iter().enumerate() {
        write_row(&mut xml, i + 2, &lead_row(lead, tz));
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Leads" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Render leads into an XLSX workbook, one row per lead after the header.
pub fn render_xlsx(leads: &[Lead], tz: Tz) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let sheet = sheet_xml(leads, tz);
    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

/// File name for an export taken at `now`.
pub fn file_name(now: DateTime<Utc>, tz: Tz) -> String {
    format!("leads_{}.xlsx", now.with_timezone(&tz).format("%Y%m%d_%H%M"))
}

/// Gather, render and send an export to the operator. Returns the row count.
pub async fn deliver_export(
    database: &Database,
    notifier: &Notifier,
    window: ExportWindow,
    now: DateTime<Utc>,
) -> Result<usize, ExportError> {
    let leads = match window.cutoff(now) {
        None => database.list_all()?,
        Some(cutoff) => database.list_since(cutoff)?,
    };
    let tz = notifier.timezone();
    let data = render_xlsx(&leads, tz)?;
    let caption = format!("📊 Заявки / Arizalar: {} ({})", leads.len(), window.describe());

    notifier.send_document(&file_name(now, tz), data, &caption).await?;
    info!("📊 Exported {} lead(s) ({})", leads.len(), window.describe());
    Ok(leads.len())
}

/// Operator-facing report of a failed export.
pub fn failure_notice(err: &ExportError) -> String {
    format!("⚠️ Экспорт не удался / Eksport bajarilmadi: {}", escape_html(&err.to_string()))
}

/// Pull the cell values back out of a rendered workbook.
#[cfg(test)]
pub(crate) fn read_rows(xlsx: &[u8]) -> Vec<Vec<String>> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(Cursor::new(xlsx)).unwrap();
    let mut sheet = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .unwrap()
        .read_to_string(&mut sheet)
        .unwrap();

    let cell = regex::Regex::new(r"<c r=[^>]*>(?:<is><t[^>]*>(.*?)</t></is>|<v>(.*?)</v>)</c>").unwrap();
    sheet
        .split("<row ")
        .skip(1)
        .map(|row| {
            cell.captures_iter(row)
                .map(|c| c.get(1).or(c.get(2)).map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect()
        })
        .collect()
}
