//! JSON files in the data directory.
//!
//! Tasks (for the local store), the team roster, settings and the auth session all
//! live as pretty-printed JSON next to each other. Reads are forgiving: a missing or
//! unreadable file yields the type's default. Writes are atomic (temp file + rename).

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a value from a JSON file, falling back to the default if the file is
/// missing or cannot be parsed.
pub fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let mut buf = String::new();
    match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
        Ok(_) => match serde_json::from_str(&buf) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unparseable JSON, starting fresh");
                T::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable file, starting fresh");
            T::default()
        }
    }
}

/// Save a value as JSON using an atomic write (temp file + rename).
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    let mut f = File::create(&tmp)?;
    f.write_all(data.as_bytes())?;
    f.flush()?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_and_corrupt_files_fall_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let loaded: Vec<String> = load_json(&missing);
        assert!(loaded.is_empty());

        let corrupt = dir.path().join("bad.json");
        fs::write(&corrupt, "{ not json").unwrap();
        let loaded: BTreeMap<String, u32> = load_json(&corrupt);
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        save_json(&vec!["a", "b"], &path).unwrap();
        let loaded: Vec<String> = load_json(&path);
        assert_eq!(loaded, ["a", "b"]);
        assert!(!path.with_extension("json.tmp").exists());

        remove_file(&path).unwrap();
        remove_file(&path).unwrap();
        assert!(!path.exists());
    }
}
