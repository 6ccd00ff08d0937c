//! Repository export in CSV, JSON and JSON Lines

use crate::output::OutputError;
use crate::storage::{Storage, StoredRepository};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const CSV_HEADER: &str = "id,name_with_owner,url,stars,primary_language,fork_count,\
                          license_name,created_at,pushed_at,updated_at,partition,fetched_date";

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One JSON object per line
    Jsonl,
    /// A single JSON array
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(OutputError::UnknownFormat(other.to_string())),
        }
    }
}

/// Writes every stored repository to a file
///
/// # Arguments
///
/// * `storage` - Storage to read repositories from
/// * `format` - Output format
/// * `path` - Destination file, overwritten if present
///
/// # Returns
///
/// Number of repositories written
pub fn export_repositories(
    storage: &dyn Storage,
    format: ExportFormat,
    path: &Path,
) -> Result<u64, OutputError> {
    let repositories = storage.load_repositories()?;
    let write_error = |source| OutputError::Write {
        path: path.display().to_string(),
        source,
    };

    let file = File::create(path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    let count = export_to_writer(&mut writer, format, &repositories)?;

    info!(count, format = ?format, path = %path.display(), "Exported repositories");
    Ok(count)
}

/// Serializes repositories into `writer`
pub fn export_to_writer<W: Write>(
    writer: &mut W,
    format: ExportFormat,
    repositories: &[StoredRepository],
) -> Result<u64, OutputError> {
    let io = |source| OutputError::Write {
        path: "<writer>".to_string(),
        source,
    };

    match format {
        ExportFormat::Jsonl => {
            for repo in repositories {
                serde_json::to_writer(&mut *writer, repo)?;
                writeln!(writer).map_err(io)?;
            }
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, repositories)?;
            writeln!(writer).map_err(io)?;
        }
        ExportFormat::Csv => {
            writeln!(writer, "{}", CSV_HEADER).map_err(io)?;
            for repo in repositories {
                writeln!(writer, "{}", format_csv_row(repo)).map_err(io)?;
            }
        }
    }

    writer.flush().map_err(io)?;
    Ok(repositories.len() as u64)
}

fn format_csv_row(repo: &StoredRepository) -> String {
    let opt = |value: &Option<String>| value.as_deref().map(escape_csv).unwrap_or_default();
    let num = |value: Option<u32>| value.map(|n| n.to_string()).unwrap_or_default();

    [
        repo.id.to_string(),
        escape_csv(&repo.name_with_owner),
        escape_csv(&repo.url),
        num(repo.stars),
        opt(&repo.primary_language),
        num(repo.fork_count),
        opt(&repo.license_name),
        opt(&repo.created_at),
        opt(&repo.pushed_at),
        opt(&repo.updated_at),
        opt(&repo.partition),
        opt(&repo.fetched_date),
    ]
    .join(",")
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Repository;
    use crate::storage::SqliteStorage;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn stored(id: i64, language: Option<&str>) -> StoredRepository {
        StoredRepository {
            id,
            name: format!("repo{}", id),
            owner: "acme".to_string(),
            name_with_owner: format!("acme/repo{}", id),
            url: format!("https://github.com/acme/repo{}", id),
            stars: Some(id as u32 * 10),
            primary_language: language.map(String::from),
            fork_count: None,
            license_name: Some("Apache License 2.0".to_string()),
            created_at: None,
            pushed_at: None,
            updated_at: None,
            partition: Some("matrix_0".to_string()),
            fetched_date: Some("2024-03-01".to_string()),
        }
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("hello"), "hello");
        assert_eq!(escape_csv("hello, world"), "\"hello, world\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("jsonl".parse::<ExportFormat>().unwrap(), ExportFormat::Jsonl);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(OutputError::UnknownFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn test_csv_output() {
        let mut buffer = Vec::new();
        let count = export_to_writer(
            &mut buffer,
            ExportFormat::Csv,
            &[stored(1, Some("Rust")), stored(2, None)],
        )
        .unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(count, 2);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "1,acme/repo1,https://github.com/acme/repo1,10,Rust,,Apache License 2.0,,,,matrix_0,2024-03-01"
        );
        assert!(lines[2].starts_with("2,acme/repo2,https://github.com/acme/repo2,20,,"));
    }

    #[test]
    fn test_jsonl_output() {
        let mut buffer = Vec::new();
        export_to_writer(&mut buffer, ExportFormat::Jsonl, &[stored(1, None), stored(2, None)])
            .unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let ids: Vec<i64> = text
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_export_from_storage_to_file() {
        let dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let repos = vec![
            Repository::new(5, "five", "acme", "https://github.com/acme/five", 5).unwrap(),
            Repository::new(3, "three", "acme", "https://github.com/acme/three", 3).unwrap(),
        ];
        storage
            .upsert_repositories(&repos, Some("matrix_1"), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
            .unwrap();

        let path = dir.path().join("repos.json");
        let count = export_repositories(&storage, ExportFormat::Json, &path).unwrap();
        assert_eq!(count, 2);

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let array = parsed.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["name_with_owner"], "acme/three");
        assert_eq!(array[1]["stars"], 5);
        assert_eq!(array[1]["partition"], "matrix_1");
    }
}
