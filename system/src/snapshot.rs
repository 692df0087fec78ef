use crate::draw_command::DrawCommand;
use crate::error::SerializationError;
use serde::{Deserialize, Serialize};

const SNAPSHOT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotRecords {
    version: u16,
    commands: Vec<DrawCommand>,
}

/// Persisted form of a canonical log.
#[derive(Clone, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    content: Vec<u8>,
}

impl std::fmt::Debug for CanvasSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSnapshot")
            .field("size", &self.content.len())
            .finish()
    }
}

impl CanvasSnapshot {
    pub fn from_commands(commands: &[DrawCommand]) -> Result<Self, SerializationError> {
        let records = SnapshotRecords {
            version: SNAPSHOT_VERSION,
            commands: commands.to_vec(),
        };
        let content = bincode::serialize(&records).map_err(SerializationError::new)?;
        Ok(Self { content })
    }

    pub fn from_vec(content: Vec<u8>) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Decodes the stored records and checks every one of them.
    pub fn commands(&self) -> Result<Vec<DrawCommand>, SerializationError> {
        let records = bincode::deserialize::<SnapshotRecords>(&self.content)
            .map_err(SerializationError::new)?;
        if records.version != SNAPSHOT_VERSION {
            return Err(SerializationError::new(format!(
                "unsupported snapshot version {}",
                records.version
            )));
        }
        validate_commands(&records.commands)?;
        Ok(records.commands)
    }

    pub fn to_json(commands: &[DrawCommand]) -> Result<String, SerializationError> {
        serde_json::to_string(commands).map_err(SerializationError::new)
    }

    pub fn from_json(json: &str) -> Result<Vec<DrawCommand>, SerializationError> {
        let commands = serde_json::from_str::<Vec<DrawCommand>>(json)
            .map_err(SerializationError::new)?;
        validate_commands(&commands)?;
        Ok(commands)
    }
}

/// Reports the first malformed command, if any.
pub fn validate_commands(commands: &[DrawCommand]) -> Result<(), SerializationError> {
    commands
        .iter()
        .enumerate()
        .try_for_each(|(index, command)| {
            command
                .validate()
                .map_err(|malformed| SerializationError::malformed(index, malformed))
        })
}
