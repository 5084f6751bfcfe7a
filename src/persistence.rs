//! Persistence for the vector index and accepted evaluations.
//!
//! Indexes are stored as JSON (human-readable) or bincode (compact binary),
//! chosen by file extension.

use crate::error::{EvalError, Result};
use crate::index::VectorIndex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Save format for vector indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Write a value as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| EvalError::Serialization(e.to_string()))?;
    fs::write(path, content).map_err(|e| EvalError::io(path, e))
}

/// Read a JSON file into a value.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        EvalError::Serialization(format!("Invalid JSON in '{}': {}", path.display(), e))
    })
}

/// Save a vector index to a file.
pub fn save_index(index: &VectorIndex, path: &Path) -> Result<()> {
    match SaveFormat::from_path(path) {
        SaveFormat::Json => write_json(index, path),
        SaveFormat::Bincode => {
            ensure_parent(path)?;
            let data = bincode::encode_to_vec(index, bincode::config::standard())
                .map_err(|e| EvalError::Serialization(e.to_string()))?;
            fs::write(path, data).map_err(|e| EvalError::io(path, e))
        }
    }
}

/// Load a vector index from a file.
pub fn load_index(path: &Path) -> Result<VectorIndex> {
    if !path.exists() {
        return Err(EvalError::IndexNotFound(path.to_path_buf()));
    }

    match SaveFormat::from_path(path) {
        SaveFormat::Json => read_json(path),
        SaveFormat::Bincode => {
            let data = fs::read(path).map_err(|e| EvalError::io(path, e))?;
            let (index, _): (VectorIndex, usize) =
                bincode::decode_from_slice(&data, bincode::config::standard())
                    .map_err(|e| EvalError::Serialization(e.to_string()))?;
            Ok(index)
        }
    }
}

/// Check if a file exists at the given path.
pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Get the size of a file in bytes.
pub fn file_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| EvalError::io(path, e))?;
    Ok(metadata.len())
}

/// Append a record to a JSON array file.
///
/// A missing file starts a new array. An existing file must already hold a
/// JSON array; an empty or malformed file is an error and is left untouched.
pub fn append_json_record<T: Serialize>(path: &Path, record: &T) -> Result<usize> {
    let mut records: Vec<serde_json::Value> = if path.exists() {
        read_json(path)?
    } else {
        Vec::new()
    };

    records.push(
        serde_json::to_value(record).map_err(|e| EvalError::Serialization(e.to_string()))?,
    );
    write_json(&records, path)?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkConfig;
    use crate::index::tests::{KeywordEmbedder, driving_docs};
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_index() -> VectorIndex {
        VectorIndex::from_documents(&driving_docs(), &ChunkConfig::default(), &KeywordEmbedder, 8)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage").join("index.json");

        let original = test_index().await;
        save_index(&original, &path).unwrap();
        assert!(file_exists(&path));

        let loaded = load_index(&path).unwrap();
        assert_eq!(loaded.len(), original.len());
        assert_eq!(loaded.embed_model, "keywords");
        assert_eq!(loaded.entries()[0].node, original.entries()[0].node);
    }

    #[tokio::test]
    async fn test_save_and_load_bincode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.bin");

        let original = test_index().await;
        save_index(&original, &path).unwrap();

        let loaded = load_index(&path).unwrap();
        assert_eq!(loaded.len(), original.len());
        assert_eq!(
            loaded.entries()[1].embedding,
            original.entries()[1].embedding
        );
        assert!(file_size(&path).unwrap() > 0);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SaveFormat::from_path(Path::new("i.json")), SaveFormat::Json);
        assert_eq!(SaveFormat::from_path(Path::new("i.bin")), SaveFormat::Bincode);
        assert_eq!(
            SaveFormat::from_path(Path::new("i.bincode")),
            SaveFormat::Bincode
        );
        assert_eq!(SaveFormat::from_path(Path::new("i")), SaveFormat::Json);
    }

    #[test]
    fn test_load_nonexistent_index() {
        let result = load_index(Path::new("/nonexistent/index.json"));
        assert!(matches!(result, Err(EvalError::IndexNotFound(_))));
    }

    #[test]
    fn test_append_creates_and_extends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.json");

        assert_eq!(append_json_record(&path, &json!({"score": 1.0})).unwrap(), 1);
        assert_eq!(append_json_record(&path, &json!({"score": 0.9})).unwrap(), 2);

        let records: Vec<serde_json::Value> = read_json(&path).unwrap();
        assert_eq!(records[0]["score"], 1.0);
        assert_eq!(records[1]["score"], 0.9);
    }

    #[test]
    fn test_append_to_empty_file_fails_without_touching_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.json");
        fs::write(&path, "").unwrap();

        let result = append_json_record(&path, &json!({"score": 1.0}));
        assert!(matches!(result, Err(EvalError::Serialization(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
