use std::path::{Path, PathBuf};

use system::{CanvasSnapshot, DrawCommand, SessionError};
use tokio::fs;

const SNAPSHOT_EXTENSION: &str = "wbs";

/// Saved canvases, one `<name>.wbs` file each.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn save(&self, name: &str, commands: &[DrawCommand]) -> Result<(), SessionError> {
        let path = self.file_path(name)?;
        let snapshot = CanvasSnapshot::from_commands(commands)?;
        fs::write(&path, snapshot.content())
            .await
            .map_err(|e| storage_error(&path, e))?;
        log::info!("Saved {} commands to {}", commands.len(), path.display());
        Ok(())
    }

    /// Reads and validates a saved canvas. Nothing is returned unless every command is well formed.
    pub async fn open(&self, name: &str) -> Result<Vec<DrawCommand>, SessionError> {
        let path = self.file_path(name)?;
        let content = fs::read(&path)
            .await
            .map_err(|e| storage_error(&path, e))?;
        Ok(CanvasSnapshot::from_vec(content).commands()?)
    }

    pub async fn list(&self) -> Result<Vec<String>, SessionError> {
        let mut result = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| storage_error(&self.dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == SNAPSHOT_EXTENSION) {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    result.push(name.to_owned());
                }
            }
        }
        result.sort();
        Ok(result)
    }

    fn file_path(&self, name: &str) -> Result<PathBuf, SessionError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(SessionError::Storage(format!("invalid snapshot name '{}'", name)));
        }
        Ok(self.dir.join(format!("{}.{}", name, SNAPSHOT_EXTENSION)))
    }
}

fn storage_error(path: &Path, error: std::io::Error) -> SessionError {
    log::warn!("{}: {}", path.display(), error);
    SessionError::Storage(format!("{}: {}", path.display(), error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::euclid::default::Point2D;
    use system::{Color, DrawMeta, ShapeKind};

    fn scratch_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "whiteboard-{}-{}",
            test,
            system::uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).expect("");
        dir
    }

    #[tokio::test]
    async fn it_saves_and_lists_canvases() {
        let dir = scratch_dir("save");
        let store = SnapshotStore::new(&dir);
        let commands = vec![DrawCommand::shape(
            DrawMeta::new("alice", 1, Color::default()),
            ShapeKind::Rectangle,
            Point2D::new(0.0, 0.0),
            Point2D::new(3.0, 2.0),
        )];
        store.save("first", &commands).await.expect("");
        store.save("second", &[]).await.expect("");

        assert_eq!(store.open("first").await.expect(""), commands);
        assert_eq!(store.list().await.expect(""), vec!["first", "second"]);
        std::fs::remove_dir_all(dir).expect("");
    }

    #[tokio::test]
    async fn it_rejects_names_leaving_the_directory() {
        let dir = scratch_dir("names");
        let store = SnapshotStore::new(&dir);
        for name in ["", "..", "../escape", "a/b", "a\\b"] {
            assert!(matches!(
                store.save(name, &[]).await,
                Err(SessionError::Storage(_))
            ));
        }
        std::fs::remove_dir_all(dir).expect("");
    }

    #[tokio::test]
    async fn a_corrupt_file_is_a_serialization_error() {
        let dir = scratch_dir("corrupt");
        std::fs::write(dir.join("broken.wbs"), [0xffu8; 5]).expect("");
        let store = SnapshotStore::new(&dir);
        assert!(matches!(
            store.open("broken").await,
            Err(SessionError::Serialization(_))
        ));
        assert!(matches!(
            store.open("missing").await,
            Err(SessionError::Storage(_))
        ));
        std::fs::remove_dir_all(dir).expect("");
    }
}
