//! Parlor is a client for a session-authenticated chat service.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] is the single gateway to the server. It attaches the bearer
//!   token and CSRF header, sends cookies, and classifies failures into
//!   [`api::ApiError`].
//! - [`core`] owns client state: durable credential storage, the session
//!   state machine, the conversation cache, and the chat thread.
//! - [`utils`] holds URL, validation, and logging helpers.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which
//! wires the layers together for each command.

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
