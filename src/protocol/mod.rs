//! # Protocol Module
//!
//! Implementation of the HAB Link request/response and bulk-transfer protocol.
//!
//! This module handles:
//! - Command classification against the reserved wire literals
//! - Payload chunking between begin/end transfer markers (sending side)
//! - Frame-bounded reassembly of transferred payloads (receiving side)
//! - The session state machine that sequences request, acknowledgment,
//!   transfer, and completion/timeout

pub mod command;
pub mod encoder;
pub mod decoder;
pub mod session;
