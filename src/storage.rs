use crate::common::coerce::is_missing_cell;
use crate::common::error::Result;
use crate::common::types::TabularOutput;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encoding of a written table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    /// UTF-8 with a byte-order mark so spreadsheet tools pick up Arabic and
    /// accented French correctly
    Utf8Bom,
}

/// Row and missing-cell counts of a table read back from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub rows: usize,
    pub missing_values: u64,
}

/// Write a table as comma-separated text: one header row, no index column.
///
/// The parent directory is created if needed.
pub fn write_csv<T>(path: &Path, table: &T, encoding: Encoding) -> Result<usize>
where
    T: TabularOutput + ?Sized,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    if encoding == Encoding::Utf8Bom {
        file.write_all(UTF8_BOM)?;
    }

    let rows = table.rows();
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(table.header())?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Read a written table back and count its data rows and missing cells.
///
/// Short rows count their absent trailing cells as missing.
pub fn inspect_csv(path: &Path) -> Result<TableStats> {
    let bytes = fs::read(path)?;
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);
    let width = reader.headers()?.len();

    let mut rows = 0;
    let mut missing_values = 0u64;
    for record in reader.records() {
        let record = record?;
        rows += 1;
        missing_values += record.iter().filter(|cell| is_missing_cell(cell)).count() as u64;
        missing_values += width.saturating_sub(record.len()) as u64;
    }

    Ok(TableStats {
        rows,
        missing_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Fixed(Vec<Vec<String>>);

    impl TabularOutput for Fixed {
        fn header(&self) -> Vec<String> {
            vec!["label".into(), "value".into()]
        }

        fn rows(&self) -> Vec<Vec<String>> {
            self.0.clone()
        }
    }

    fn row(a: &str, b: &str) -> Vec<String> {
        vec![a.to_string(), b.to_string()]
    }

    #[test]
    fn test_write_with_bom_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let table = Fixed(vec![row("وزارة المالية", "12.5"), row("Santé", "")]);

        let written = write_csv(&path, &table, Encoding::Utf8Bom).unwrap();
        assert_eq!(written, 2);

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let stats = inspect_csv(&path).unwrap();
        assert_eq!(stats, TableStats { rows: 2, missing_values: 1 });
    }

    #[test]
    fn test_inspect_counts_na_tokens_and_short_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "a,b,c\n1,NaN,3\n4\n").unwrap();

        let stats = inspect_csv(&path).unwrap();
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.missing_values, 3);
    }

    #[test]
    fn test_header_only_file_has_no_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv(&path, &Fixed(vec![]), Encoding::Utf8).unwrap();

        let stats = inspect_csv(&path).unwrap();
        assert_eq!(stats.rows, 0);
        assert_eq!(stats.missing_values, 0);
    }
}
