//! Output generation for query results.
//!
//! # Submodules
//!
//! - [`json`]: writes every run's report and failures to one JSON file
//! - [`spreadsheet`]: exports the collected items as a SpreadsheetML workbook
//!
//! # Output Structure
//!
//! Both files are named after the first day of the queried range:
//!
//! ```text
//! json_output_dir/
//! └── crypto_news_2024-01-01.json
//!
//! export_dir/
//! └── crypto_news_2024-01-01.xml
//! ```

pub mod json;
pub mod spreadsheet;
