//! HTTP request and response bodies.
//!
//! `/cell` requests arrive with a string `action` and optional fields; once
//! the kernel is found they are validated into a [`CellCommand`] before
//! anything touches the session.

use std::fmt;
use std::str::FromStr;

use jupycell_core::{Completion, Output};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::session::SessionId;

/// Action requested on `/cell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellAction {
    Add,
    Edit,
    Run,
    Delete,
    RunAll,
}

impl FromStr for CellAction {
    type Err = ServerError;

    fn from_str(s: &str) -> ServerResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "edit" => Ok(Self::Edit),
            "run" => Ok(Self::Run),
            "delete" => Ok(Self::Delete),
            "run_all" => Ok(Self::RunAll),
            _ => Err(ServerError::Validation(
                "Invalid action. Use 'add', 'edit', 'run', 'delete', or 'run_all'.".to_string(),
            )),
        }
    }
}

impl fmt::Display for CellAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Run => "run",
            Self::Delete => "delete",
            Self::RunAll => "run_all",
        };
        f.write_str(name)
    }
}

/// Body of `POST /cell`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRequest {
    pub kernel_id: SessionId,
    /// Parsed by [`CellRequest::into_command`], case-insensitively.
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A validated `/cell` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellCommand {
    Add { number: i64, code: String },
    Edit { number: i64, code: String },
    Run { number: i64 },
    Delete { number: i64 },
    RunAll,
}

impl CellRequest {
    /// Parse the action and check that the fields it requires are present.
    pub fn into_command(self) -> ServerResult<CellCommand> {
        let action: CellAction = self.action.parse()?;
        match action {
            CellAction::Add | CellAction::Edit => {
                let (Some(number), Some(code)) = (self.cell_number, self.code) else {
                    return Err(ServerError::Validation(
                        "cell_number and code are required for add/edit actions.".to_string(),
                    ));
                };
                Ok(if action == CellAction::Add {
                    CellCommand::Add { number, code }
                } else {
                    CellCommand::Edit { number, code }
                })
            }
            CellAction::Run | CellAction::Delete => {
                let number = self.cell_number.ok_or_else(|| {
                    ServerError::Validation(format!(
                        "cell_number is required for {} action.",
                        action
                    ))
                })?;
                Ok(if action == CellAction::Run {
                    CellCommand::Run { number }
                } else {
                    CellCommand::Delete { number }
                })
            }
            CellAction::RunAll => Ok(CellCommand::RunAll),
        }
    }
}

/// Query of `GET /cell_outputs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsQuery {
    pub kernel_id: SessionId,
    pub cell_number: i64,
}

/// Query of `GET /cells` and body of `POST /close`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelRef {
    pub kernel_id: SessionId,
}

/// Response of `POST /start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub kernel_id: SessionId,
}

/// Acknowledgement of a cell or kernel mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Outputs of a single cell.
///
/// `completion` is present when the outputs come from an execution that
/// just ran, absent when read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsResponse {
    pub outputs: Vec<Output>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
}

/// Result of one cell within a run-all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRun {
    pub cell_number: i64,
    pub outputs: Vec<Output>,
    pub completion: Completion,
}

/// Response of a run-all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAllResponse {
    pub outputs: Vec<CellRun>,
}

/// Response of `POST /cell`, shaped by the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellResponse {
    Status(StatusResponse),
    RunAll(RunAllResponse),
    Outputs(OutputsResponse),
}

/// A cell as listed by `GET /cells`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellView {
    pub cell_number: i64,
    pub code: String,
    pub outputs: Vec<Output>,
}

/// Response of `GET /cells`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellsResponse {
    pub cells: Vec<CellView>,
}

/// Body returned for any failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
