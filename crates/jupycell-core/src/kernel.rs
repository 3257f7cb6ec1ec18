//! Synchronous execution on top of a message channel.
//!
//! A [`Kernel`] turns one code submission into a finite batch of outputs.
//! Each execution moves through
//! `PRE_DRAIN -> SUBMITTED -> COLLECTING -> DONE`, and any timeout or
//! channel failure jumps straight to `DONE` with whatever was collected.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::MessageChannel;
use crate::message::{Message, MessageKind, Output};

/// Timeouts used while talking to a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Per-poll timeout while discarding leftover messages before a submission.
    pub drain_timeout: Duration,
    /// Per-poll timeout while collecting a submission's outputs.
    pub collect_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(1),
            collect_timeout: Duration::from_secs(30),
        }
    }
}

/// How an execution's collection phase ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The kernel reported idle for this submission.
    #[default]
    Complete,
    /// No message arrived within the collect timeout; outputs are partial.
    TimedOut,
    /// The channel failed; outputs are partial.
    ChannelLost,
}

/// Outputs of one execution and how it ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub outputs: Vec<Output>,
    pub completion: Completion,
}

impl Execution {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }
}

/// A kernel channel plus the bookkeeping needed to run cells on it.
///
/// Not safe for overlapping executions: callers must serialize access,
/// which `&mut self` enforces within one owner.
pub struct Kernel {
    channel: Box<dyn MessageChannel>,
    config: BridgeConfig,
    /// The last collection saw its own idle status, so nothing of ours is in flight.
    settled: bool,
}

impl Kernel {
    pub fn new(channel: Box<dyn MessageChannel>, config: BridgeConfig) -> Self {
        Self {
            channel,
            config,
            settled: false,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run `code` and collect its outputs.
    ///
    /// Never fails: timeouts and channel errors truncate the batch and are
    /// reported through [`Execution::completion`].
    pub fn execute(&mut self, code: &str) -> Execution {
        if !self.settled {
            self.drain();
        }

        let msg_id = match self.channel.execute(code) {
            Ok(msg_id) => msg_id,
            Err(e) => {
                tracing::warn!("Failed to submit code to kernel: {}", e);
                self.settled = false;
                return Execution {
                    outputs: Vec::new(),
                    completion: Completion::ChannelLost,
                };
            }
        };
        tracing::debug!("Submitted execution {}", msg_id);

        let execution = self.collect(&msg_id);
        self.settled = execution.is_complete();
        execution
    }

    /// Shut down the underlying channel.
    pub fn shutdown(&mut self) -> crate::Result<()> {
        self.settled = false;
        self.channel.shutdown()
    }

    /// Discard messages until the kernel reports idle or goes quiet.
    fn drain(&mut self) {
        let mut discarded = 0usize;
        loop {
            match self.channel.poll(self.config.drain_timeout) {
                Ok(Some(message)) if message.is_idle() => break,
                Ok(Some(_)) => discarded += 1,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Kernel unresponsive while draining: {}", e);
                    break;
                }
            }
        }
        if discarded > 0 {
            tracing::debug!("Discarded {} leftover kernel messages", discarded);
        }
    }

    fn collect(&mut self, msg_id: &str) -> Execution {
        let mut outputs = Vec::new();

        let completion = loop {
            let message: Message = match self.channel.poll(self.config.collect_timeout) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tracing::warn!(
                        "Execution {} produced no message within {:?}, returning partial outputs",
                        msg_id,
                        self.config.collect_timeout
                    );
                    break Completion::TimedOut;
                }
                Err(e) => {
                    tracing::warn!("Kernel channel failed during execution {}: {}", msg_id, e);
                    break Completion::ChannelLost;
                }
            };

            if message.is_foreign_to(msg_id) {
                tracing::debug!(
                    "Ignoring {} message from execution {:?}",
                    message.msg_type,
                    message.parent_id
                );
                continue;
            }

            match message.kind() {
                MessageKind::Status if message.is_idle() => break Completion::Complete,
                kind if kind.is_output() => {
                    if let Some(output) = message.into_output() {
                        outputs.push(output);
                    }
                }
                _ => {}
            }
        };

        Execution {
            outputs,
            completion,
        }
    }
}
