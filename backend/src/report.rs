use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use uuid::Uuid;

use crate::store::ResultTable;

pub const REPORT_FILENAME: &str = "Prediction_Results.txt";
pub const EMPTY_REPORT_LINE: &str = "No prediction records found.";

const TITLE: &str = "Customer Churn Prediction Results";
const SEPARATOR: &str = "\t | \t";

/// Renders the download report: a title, then either the empty notice or a
/// header line, a dashed rule and one line per row.
pub fn render(table: &ResultTable) -> String {
    let mut out = format!("{TITLE}\n\n");

    if table.rows.is_empty() {
        out.push_str(EMPTY_REPORT_LINE);
        out.push('\n');
        return out;
    }

    let header = table.columns.join(SEPARATOR);
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"-".repeat(header.len() + 5));
    out.push('\n');
    for row in &table.rows {
        out.push_str(&row.join(SEPARATOR));
        out.push('\n');
    }
    out
}

/// A report written to disk for the lifetime of one download. The file is
/// removed when the guard is dropped.
#[derive(Debug)]
pub struct TempReport {
    path: PathBuf,
}

impl TempReport {
    pub fn write(dir: &Path, contents: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("churn-report-{}.txt", Uuid::new_v4().simple()));
        fs::write(&path, contents)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempReport {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove report file {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_renders_notice_without_rows() {
        let table = ResultTable {
            columns: vec!["id".into(), "status_text".into()],
            rows: vec![],
        };
        assert_eq!(
            render(&table),
            "Customer Churn Prediction Results\n\nNo prediction records found.\n"
        );
    }

    #[test]
    fn rows_are_tab_delimited_under_a_rule() {
        let table = ResultTable {
            columns: vec!["id".into(), "status_text".into()],
            rows: vec![
                vec!["1".into(), "Stay".into()],
                vec!["2".into(), "Leave".into()],
            ],
        };
        let rendered = render(&table);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[2], "id\t | \tstatus_text");
        assert_eq!(lines[3], "-".repeat("id\t | \tstatus_text".len() + 5));
        assert_eq!(lines[4], "1\t | \tStay");
        assert_eq!(lines[5], "2\t | \tLeave");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn temp_report_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let report = TempReport::write(dir.path(), "hello").unwrap();
        let path = report.path().to_path_buf();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");

        drop(report);
        assert!(!path.exists());
    }
}
