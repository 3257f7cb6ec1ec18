//! Channels to kernel processes.
//!
//! A [`MessageChannel`] accepts code submissions and yields the kernel's
//! messages in order. Calls block, so async callers should run them on a
//! blocking thread.

pub mod protocol;
mod process;

use std::time::Duration;

use crate::error::Result;
use crate::message::Message;

pub use process::{KernelCommand, ProcessChannel, ProcessChannelFactory};
pub use protocol::{KernelRequest, read_message, write_message};

/// Bidirectional channel to a single execution context.
pub trait MessageChannel: Send {
    /// Submit code for execution, returning the submission's message id.
    fn execute(&mut self, code: &str) -> Result<String>;

    /// Wait up to `timeout` for the next message.
    ///
    /// Returns `Ok(None)` on timeout and an error if the channel is gone.
    fn poll(&mut self, timeout: Duration) -> Result<Option<Message>>;

    /// Stop the execution context.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Starts new channels.
pub trait ChannelFactory: Send + Sync {
    /// Start a fresh, isolated execution context.
    fn start(&self) -> Result<Box<dyn MessageChannel>>;
}
