//! Pure projection of the history ledger into a text table.

use crate::history::HistoryEntry;
use crate::i18n::Language;
use chrono::{DateTime, Local};

/// One display row; every cell already formatted
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub file_name: String,
    pub original_size: String,
    pub compressed_size: String,
    pub ratio: String,
    pub method: String,
    pub date: String,
    pub file_id: String,
    pub timestamp: String,
}

/// Human readable byte count: `0 B`, `1000 B`, `1.5 KB`, `2 MB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let fixed = format!("{:.2}", size);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

pub fn format_timestamp(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

pub fn history_rows(entries: &[HistoryEntry]) -> Vec<HistoryRow> {
    entries
        .iter()
        .map(|entry| HistoryRow {
            file_name: entry.file_name.clone(),
            original_size: format_file_size(entry.original_size),
            compressed_size: format_file_size(entry.compressed_size),
            ratio: format!("{:.1}%", entry.ratio),
            method: entry.compression_method.clone(),
            date: format_timestamp(&entry.timestamp),
            file_id: entry.file_id.clone(),
            timestamp: entry.timestamp.clone(),
        })
        .collect()
}

/// Render the ledger as an aligned table with translated headers
pub fn history_table(entries: &[HistoryEntry], language: Language) -> String {
    let m = language.messages();
    if entries.is_empty() {
        return format!("{}\n{}\n", m.recent_compressions, m.no_history);
    }

    let header = [
        m.file_name,
        m.original_size,
        m.compressed_size,
        m.ratio,
        m.method,
        m.date,
        "ID",
        "Timestamp",
    ]
    .map(str::to_string);
    let rows: Vec<[String; 8]> = history_rows(entries)
        .into_iter()
        .map(|r| {
            [
                r.file_name,
                r.original_size,
                r.compressed_size,
                r.ratio,
                r.method,
                r.date,
                r.file_id,
                r.timestamp,
            ]
        })
        .collect();

    let mut widths = header.clone().map(|h| h.chars().count());
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = format!("{}\n", m.recent_compressions);
    for row in std::iter::once(&header).chain(rows.iter()) {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::EntryStatus;

    fn entry() -> HistoryEntry {
        HistoryEntry {
            file_id: "f1".to_string(),
            file_name: "a.png".to_string(),
            original_size: 1000,
            compressed_size: 400,
            ratio: 60.0,
            compression_method: "webp".to_string(),
            compressed_filename: "a.webp".to_string(),
            download_url: Some("/dl/f1".to_string()),
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            status: EntryStatus::Success,
            message: String::new(),
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1000), "1000 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 * 1024), "3072 GB");
    }

    #[test]
    fn test_rows_are_formatted() {
        let rows = history_rows(&[entry()]);
        assert_eq!(rows[0].original_size, "1000 B");
        assert_eq!(rows[0].compressed_size, "400 B");
        assert_eq!(rows[0].ratio, "60.0%");
        assert_eq!(rows[0].timestamp, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_unparsable_timestamp_is_shown_raw() {
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn test_table_headers_follow_language() {
        let en = history_table(&[entry()], Language::En);
        assert!(en.starts_with("Recent Compressions\n"));
        assert!(en.contains("File Name"));
        assert!(en.contains("a.png"));

        let id = history_table(&[], Language::Id);
        assert_eq!(id, "Kompresi Terbaru\nBelum ada kompresi.\n");
    }
}
