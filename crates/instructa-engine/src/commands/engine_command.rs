//! Engine-level commands as received over the editor IPC channel.

use instructa_core::{ExError, ExErrorKind, ProjectChanges, SaveConfig, SaveResult};
use rusqlite::Connection;
use serde::Deserialize;

use crate::commands::save::save_project_data;

/// Engine-level commands that require database I/O.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EngineCommand {
    /// Persist one batch of project edits atomically.
    #[serde(rename_all = "camelCase")]
    SaveProjectData {
        changes: ProjectChanges,
        #[serde(default)]
        config: SaveConfig,
    },
}

/// Result of applying an engine command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommandResult {
    SaveProjectData(SaveResult),
}

impl EngineCommandResult {
    /// The wire-level save result carried by this outcome
    pub fn save_result(&self) -> &SaveResult {
        match self {
            EngineCommandResult::SaveProjectData(result) => result,
        }
    }
}

/// Apply an engine command against the caller's open connection.
pub fn apply_engine_command(cmd: EngineCommand, conn: &mut Connection) -> EngineCommandResult {
    match cmd {
        EngineCommand::SaveProjectData { changes, config } => {
            EngineCommandResult::SaveProjectData(save_project_data(conn, &changes, &config))
        }
    }
}

/// Decode a JSON command, run it, and encode the [`SaveResult`] as JSON.
///
/// A payload that does not decode produces a failed result rather than an
/// error, so the IPC caller always gets the same response shape back.
pub fn handle_json_command(conn: &mut Connection, payload: &str) -> String {
    let result = match serde_json::from_str::<EngineCommand>(payload) {
        Ok(cmd) => apply_engine_command(cmd, conn).save_result().clone(),
        Err(err) => {
            let ex = ExError::new(ExErrorKind::Serialization)
                .with_op("decode_command")
                .with_message(err.to_string());
            tracing::warn!(err_code = ex.code(), "Rejected malformed command payload");
            SaveResult::failed(ex.to_string())
        }
    };

    serde_json::to_string(&result)
        .unwrap_or_else(|_| r#"{"success":false,"error":"failed to encode result"}"#.to_string())
}
