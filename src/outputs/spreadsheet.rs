//! Spreadsheet export of news items.
//!
//! Items are written as an Excel 2003 XML (SpreadsheetML) workbook, which
//! Excel, LibreOffice and Numbers all open directly. The workbook has a single
//! worksheet with a header row followed by one row per item, in the order the
//! items were given.
//!
//! | Column | `zh` header | `en` header |
//! |--------|-------------|-------------|
//! | coin | 币种 | Coin |
//! | title | 标题 | Title |
//! | description | 描述 | Description |
//! | source | 来源 | Source |
//! | published time | 时间 | Time |
//!
//! Times are rendered as `YYYY/M/D HH:MM:SS` in UTC.

use crate::models::NewsItem;
use chrono::NaiveDate;
use clap::ValueEnum;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const SPREADSHEET_NS: &str = "urn:schemas-microsoft-com:office:spreadsheet";
const TIME_FORMAT: &str = "%Y/%-m/%-d %H:%M:%S";

/// Language of the worksheet name and header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HeaderLocale {
    #[default]
    Zh,
    En,
}

impl HeaderLocale {
    fn sheet_name(self) -> &'static str {
        match self {
            Self::Zh => "新闻数据",
            Self::En => "News",
        }
    }

    fn headers(self) -> [&'static str; 5] {
        match self {
            Self::Zh => ["币种", "标题", "描述", "来源", "时间"],
            Self::En => ["Coin", "Title", "Description", "Source", "Time"],
        }
    }
}

fn write_row<W: Write>(w: &mut Writer<W>, cells: &[&str]) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new("Row")))?;
    for cell in cells {
        w.write_event(Event::Start(BytesStart::new("Cell")))?;
        let mut data = BytesStart::new("Data");
        data.push_attribute(("ss:Type", "String"));
        w.write_event(Event::Start(data))?;
        w.write_event(Event::Text(BytesText::new(cell)))?;
        w.write_event(Event::End(BytesEnd::new("Data")))?;
        w.write_event(Event::End(BytesEnd::new("Cell")))?;
    }
    w.write_event(Event::End(BytesEnd::new("Row")))?;
    Ok(())
}

/// Render `items` into workbook bytes.
pub fn render_workbook(items: &[NewsItem], locale: HeaderLocale) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::PI(BytesPI::new(r#"mso-application progid="Excel.Sheet""#)))?;

    let mut workbook = BytesStart::new("Workbook");
    workbook.push_attribute(("xmlns", SPREADSHEET_NS));
    workbook.push_attribute(("xmlns:ss", SPREADSHEET_NS));
    writer.write_event(Event::Start(workbook))?;

    let mut worksheet = BytesStart::new("Worksheet");
    worksheet.push_attribute(("ss:Name", locale.sheet_name()));
    writer.write_event(Event::Start(worksheet))?;
    writer.write_event(Event::Start(BytesStart::new("Table")))?;

    write_row(&mut writer, &locale.headers())?;
    for item in items {
        let time = item.published_at.format(TIME_FORMAT).to_string();
        write_row(
            &mut writer,
            &[
                item.coin.as_str(),
                item.title.as_str(),
                item.description.as_str(),
                item.source.as_str(),
                time.as_str(),
            ],
        )?;
    }

    writer.write_event(Event::End(BytesEnd::new("Table")))?;
    writer.write_event(Event::End(BytesEnd::new("Worksheet")))?;
    writer.write_event(Event::End(BytesEnd::new("Workbook")))?;

    Ok(writer.into_inner())
}

/// Write the workbook for a query starting on `start_day`.
///
/// # Returns
///
/// The path of the written file: `{export_dir}/crypto_news_{start_day}.xml`.
#[instrument(level = "info", skip_all, fields(export_dir = %export_dir, items = items.len()))]
pub async fn write_workbook(
    items: &[NewsItem],
    start_day: NaiveDate,
    locale: HeaderLocale,
    export_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let bytes = render_workbook(items, locale)?;
    fs::create_dir_all(export_dir).await?;

    let path = Path::new(export_dir).join(format!("crypto_news_{start_day}.xml"));
    fs::write(&path, bytes).await?;
    info!(path = %path.display(), "Wrote spreadsheet export");
    Ok(path)
}
