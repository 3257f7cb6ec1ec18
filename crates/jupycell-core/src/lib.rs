//! Core engine for the jupycell notebook execution service.
//!
//! This crate provides:
//! - Kernel messages and typed cell outputs
//! - Channels to kernel processes and their wire protocol
//! - The per-kernel cell store
//! - The execution bridge that turns a message stream into output batches

pub mod cells;
pub mod channel;
pub mod error;
pub mod kernel;
pub mod message;

pub use cells::{Cell, CellStore};
pub use channel::{
    ChannelFactory, KernelCommand, MessageChannel, ProcessChannel, ProcessChannelFactory,
};
pub use error::{Error, Result};
pub use kernel::{BridgeConfig, Completion, Execution, Kernel};
pub use message::{ExecutionState, Message, MessageKind, Output};
