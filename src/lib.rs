//! # HAB Link Library
//!
//! Request/response image transfer for a high-altitude balloon payload over a
//! narrowband, half-duplex LoRa link.
//!
//! This library provides the protocol core shared by both endpoints: the
//! ground controller that issues requests and the remote payload unit that
//! captures and streams images back. Hardware (radio modem, camera, storage)
//! sits behind narrow trait boundaries.

pub mod config;
pub mod error;
pub mod protocol;
pub mod link;
pub mod capture;
pub mod storage;
pub mod remote;
pub mod indicator;
