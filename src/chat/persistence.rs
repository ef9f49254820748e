use crate::chat::snapshot::{ReplicatedSnapshot, SnapshotDecodeError};
use std::path::{Path, PathBuf};
use std::{fs, io};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read snapshot file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("snapshot file {path:?} is corrupt: {source}")]
    Corrupt { path: PathBuf, source: SnapshotDecodeError },
}

/// SnapshotFile is where a replica keeps its copy of the chat state between restarts.
///
/// v1 Design choice: Disk interaction is synchronous and happens on the replica actor.
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty directory, not an error.
    pub fn load(&self) -> Result<ReplicatedSnapshot, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ReplicatedSnapshot::default()),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        ReplicatedSnapshot::decode_from_bytes(&bytes).map_err(|source| PersistenceError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Failures are logged and swallowed. The in-memory state stays authoritative either way.
    pub(crate) fn save(&self, logger: &slog::Logger, snapshot: &ReplicatedSnapshot) {
        if let Err(e) = self.try_save(snapshot) {
            slog::warn!(logger, "Failed to save snapshot to {:?}: {}", self.path, e);
        }
    }

    fn try_save(&self, snapshot: &ReplicatedSnapshot) -> io::Result<()> {
        let bytes = snapshot
            .encode_to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        // Write aside then rename, so a crash mid-write never leaves a torn file behind.
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::snapshot::Account;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("absent.bin"));

        assert_eq!(file.load().unwrap(), ReplicatedSnapshot::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("chat.bin"));
        let mut snapshot = ReplicatedSnapshot::default();
        snapshot.insert(
            "alice".to_string(),
            Account {
                password: "pw".to_string(),
                token: "tok".to_string(),
                pending: vec!["hello".to_string()],
            },
        );

        file.save(&test_logger(), &snapshot);

        assert_eq!(file.load().unwrap(), snapshot);
        assert!(!dir.path().join("chat.bin.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.bin");
        fs::write(&path, [0xffu8; 3]).unwrap();

        assert!(matches!(
            SnapshotFile::new(path).load(),
            Err(PersistenceError::Corrupt { .. })
        ));
    }

    #[test]
    fn save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("no_such_dir").join("chat.bin"));

        // Must not panic.
        file.save(&test_logger(), &ReplicatedSnapshot::default());
        assert!(file.load().unwrap().is_empty());
    }
}
