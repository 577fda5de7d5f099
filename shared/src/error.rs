use std::path::PathBuf;

use strum::IntoStaticStr;
use thiserror::Error;

use super::*;

/// Everything the engine reports alongside its results. Only `OutputCollision`
/// and `Config` stop a batch.
#[derive(Debug, Clone, PartialEq, Error, Serialize, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngineError {
    #[error("schema error in {login} record {record_id}: {reason}")]
    Schema {
        login: GithubHandle,
        record_id: String,
        reason: String,
    },
    #[error("unusable timestamp {value:?} in {login} record {record_id}")]
    TimeParse {
        login: GithubHandle,
        record_id: String,
        value: String,
    },
    #[error("{record_kind} {id} of {login} seen twice with different content, keeping the first")]
    MergeConflict {
        login: GithubHandle,
        record_kind: RecordKind,
        id: RecordId,
    },
    #[error("{} already exists and overwrite was not requested", path.display())]
    OutputCollision { path: PathBuf },
    #[error("summary generation for {login} failed: {reason}")]
    TextGeneration { login: GithubHandle, reason: String },
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl EngineError {
    pub fn schema(login: &str, record_id: &str, reason: impl Into<String>) -> Self {
        Self::Schema {
            login: login.to_string(),
            record_id: record_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::OutputCollision { .. } | EngineError::Config { .. }
        )
    }
}
