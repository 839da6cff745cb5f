//! HTTP and `WebSocket` API for the water tank digital twin.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **Tank reads** (`/api/tank/*`): state, history, diagnostics
//! - **Control commands** (`/api/control/*`): fill, drain, setpoints,
//!   leak simulation, reset, and the controller's advisories
//! - **Alerts** (`/api/alerts*`): list, acknowledge, clear
//! - **Simulation lifecycle** (`/api/simulation/*`)
//! - **Live events** (`/ws`): every supervisor event as a JSON frame
//!
//! # Architecture
//!
//! Every handler goes through the shared
//! [`Supervisor`](tanktwin_core::supervisor::Supervisor), which owns the
//! tank state. The `/ws` stream subscribes to the same broadcast channel
//! the supervisor publishes to, with lag handling per client.

pub mod alerts;
pub mod control;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod simulation;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{ObserverHandle, StartupError, spawn_observer};
pub use state::AppState;
