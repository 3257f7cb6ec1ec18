//! Kernel sessions.
//!
//! A session pairs one kernel with its cell store. Executions hold the
//! kernel lock for their whole duration, so runs on one session never
//! interleave on the channel; cell edits only take the cell lock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use jupycell_core::{CellStore, Execution, Kernel, Output};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{ServerError, ServerResult};
use crate::protocol::{CellRun, CellView};

/// Opaque identifier of a session, handed to clients as `kernel_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A running kernel and its cells.
pub struct Session {
    id: SessionId,
    /// Held for the full duration of every execution.
    kernel: Arc<Mutex<Kernel>>,
    cells: Mutex<CellStore>,
    /// Set under the kernel lock once the kernel has been shut down.
    closed: AtomicBool,
    created_at: Instant,
}

impl Session {
    pub fn new(id: SessionId, kernel: Kernel) -> Self {
        Self {
            id,
            kernel: Arc::new(Mutex::new(kernel)),
            cells: Mutex::new(CellStore::new()),
            closed: AtomicBool::new(false),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Add a cell.
    pub async fn add_cell(&self, number: i64, code: String) -> ServerResult<()> {
        self.cells.lock().await.add(number, code)?;
        Ok(())
    }

    /// Replace a cell's code and clear its outputs.
    pub async fn edit_cell(&self, number: i64, code: String) -> ServerResult<()> {
        self.cells.lock().await.edit(number, code)?;
        Ok(())
    }

    /// Delete a cell.
    pub async fn delete_cell(&self, number: i64) -> ServerResult<()> {
        self.cells.lock().await.delete(number)?;
        Ok(())
    }

    /// Outputs stored for a cell.
    pub async fn cell_outputs(&self, number: i64) -> ServerResult<Vec<Output>> {
        Ok(self.cells.lock().await.get_outputs(number)?.to_vec())
    }

    /// All cells in execution order.
    pub async fn cells(&self) -> Vec<CellView> {
        self.cells
            .lock()
            .await
            .all()
            .map(|(number, cell)| CellView {
                cell_number: number,
                code: cell.code.clone(),
                outputs: cell.outputs.clone(),
            })
            .collect()
    }

    /// Execute one cell and store its outputs.
    pub async fn run_cell(&self, number: i64) -> ServerResult<Execution> {
        // Fail fast instead of queueing behind a running execution
        self.cells.lock().await.get(number)?;

        let kernel = self.lock_kernel().await?;
        let (code, revision) = self.cells.lock().await.snapshot(number)?;
        let (_kernel, execution) = execute_blocking(kernel, code).await?;

        self.store(number, revision, &execution).await;
        Ok(execution)
    }

    /// Execute every cell in ascending order, one after another.
    ///
    /// A cell that times out or fails does not stop the ones after it.
    pub async fn run_all(&self) -> ServerResult<Vec<CellRun>> {
        let mut kernel = self.lock_kernel().await?;

        let plan: Vec<(i64, String, u64)> = self
            .cells
            .lock()
            .await
            .all()
            .map(|(number, cell)| (number, cell.code.clone(), cell.revision))
            .collect();
        tracing::debug!("Session {} running {} cells", self.id, plan.len());

        let mut runs = Vec::with_capacity(plan.len());
        for (number, code, revision) in plan {
            let (returned, execution) = execute_blocking(kernel, code).await?;
            kernel = returned;

            self.store(number, revision, &execution).await;
            runs.push(CellRun {
                cell_number: number,
                outputs: execution.outputs,
                completion: execution.completion,
            });
        }

        Ok(runs)
    }

    /// Shut the kernel down, waiting for any running execution first.
    pub async fn close(&self) -> ServerResult<()> {
        let mut kernel = self.lock_kernel().await?;
        self.closed.store(true, Ordering::Release);
        tokio::task::spawn_blocking(move || kernel.shutdown())
            .await
            .map_err(|e| ServerError::Internal(format!("Kernel shutdown task failed: {}", e)))??;

        tracing::info!(
            "Closed session {} after {:?}",
            self.id,
            self.created_at.elapsed()
        );
        Ok(())
    }

    /// Take the execution lock, unless the kernel was closed while waiting.
    async fn lock_kernel(&self) -> ServerResult<OwnedMutexGuard<Kernel>> {
        let kernel = self.kernel.clone().lock_owned().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(ServerError::KernelNotFound(self.id));
        }
        Ok(kernel)
    }

    async fn store(&self, number: i64, revision: u64, execution: &Execution) {
        let stored = self
            .cells
            .lock()
            .await
            .store_outputs(number, revision, execution.outputs.clone());
        if !stored {
            tracing::debug!(
                "Cell {} changed while running, discarding its outputs",
                number
            );
        }
    }
}

/// Run `code` on a blocking thread, handing the kernel guard back afterwards.
async fn execute_blocking(
    mut kernel: OwnedMutexGuard<Kernel>,
    code: String,
) -> ServerResult<(OwnedMutexGuard<Kernel>, Execution)> {
    tokio::task::spawn_blocking(move || {
        let execution = kernel.execute(&code);
        (kernel, execution)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Execution task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_a_bare_integer() {
        let id = SessionId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let parsed: SessionId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed.as_u64(), 7);
        assert_eq!(id.to_string(), "42");
    }
}
