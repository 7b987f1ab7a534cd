// File: src/persistence.rs
use crate::error::PersistenceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes through a temp file in the target directory and renames it over
/// `path`, so readers see either the old file or the complete new one.
fn write_atomically<F>(path: &Path, write: F) -> Result<(), PersistenceError>
where
    F: FnOnce(&mut BufWriter<&NamedTempFile>) -> Result<(), PersistenceError>,
{
    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(&temp_file);
        write(&mut writer)?;
        writer.flush()?;
    }
    temp_file.persist(path)?;
    Ok(())
}

pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistenceError> {
    write_atomically(path, |writer| {
        serde_json::to_writer(writer, value)?;
        Ok(())
    })
}

/// `Ok(None)` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    if !path.exists() {
        return Ok(None);
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(Some(serde_json::from_reader(reader)?))
}

/// Compact binary snapshot for internal state that never needs to be read
/// by another version of the schema.
pub fn save_snapshot<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistenceError> {
    write_atomically(path, |writer| {
        bincode::serialize_into(writer, value)?;
        Ok(())
    })
}

pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    if !path.exists() {
        return Ok(None);
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(Some(bincode::deserialize_from(reader)?))
}

/// Appends one JSON record as a line, creating the file if needed.
pub fn append_json_line<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    let mut file = File::options().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    Ok(())
}

/// Reads every decodable line. Returns the records and the number of lines
/// that could not be decoded. A missing file is an empty log.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize), PersistenceError> {
    if !path.exists() {
        return Ok((Vec::new(), 0));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut skipped = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }
    Ok((records, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    #[test]
    fn json_save_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        save_json(&Record { name: "a".into(), count: 1 }, &path).unwrap();
        save_json(&Record { name: "b".into(), count: 2 }, &path).unwrap();

        let loaded: Option<Record> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(Record { name: "b".into(), count: 2 }));
    }

    #[test]
    fn missing_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<Record> = load_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
        let snapshot: Option<Record> = load_snapshot(&dir.path().join("absent.bin")).unwrap();
        assert!(snapshot.is_none());
    }

    #[test]
    fn snapshot_round_trips_through_bincode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        save_snapshot(&Record { name: "w".into(), count: 9 }, &path).unwrap();
        let loaded: Option<Record> = load_snapshot(&path).unwrap();
        assert_eq!(loaded.unwrap().count, 9);
    }

    #[test]
    fn json_lines_skip_corrupt_lines_and_ignore_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_json_line(&Record { name: "first".into(), count: 1 }, &path).unwrap();
        {
            let mut file = File::options().append(true).open(&path).unwrap();
            writeln!(file, "{{not json").unwrap();
            writeln!(file, r#"{{"name":"second","count":2,"added_later":true}}"#).unwrap();
        }

        let (records, skipped): (Vec<Record>, usize) = read_json_lines(&path).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "second");
    }
}
