//! # chatlink
//!
//! Real-time chat client for a multi-agent conversational backend reached
//! over WebSocket.
//!
//! The crate keeps one live session to the backend, reconnects after loss,
//! classifies inbound agent events into an append-only message log, and
//! mediates outbound user turns (including announcements of uploaded media).
//! Presentation is left to callers: they hold a [`client::ChatHandle`], read
//! snapshots, and subscribe to [`controller::ChatUpdate`]s.

pub mod classify;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod message_log;
pub mod reconnect;
pub mod transport;
pub mod upload;
pub mod wire;
