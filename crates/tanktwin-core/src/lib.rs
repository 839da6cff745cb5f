//! Physics, control, alerting, and supervision for the Tank Twin.
//!
//! This crate owns everything that changes the tank state: the per-tick
//! physics step, the rule-based controller, the alert rule table, and the
//! supervisor that serializes commands and ticks behind one lock.
//!
//! # Modules
//!
//! - [`alerts`] -- Static alert rule table and evaluator.
//! - [`config`] -- Configuration loading from `tanktwin-config.yaml` into
//!   strongly-typed structs.
//! - [`decision`] -- Controller verdicts, trend prediction, and anomaly
//!   detection.
//! - [`diagnostics`] -- Advisory engineering report (flow regime, heat
//!   balance, water quality, structural stress).
//! - [`history`] -- Bounded ring buffer for snapshots and log entries.
//! - [`physics`] -- Per-tick state update.
//! - [`runner`] -- Periodic control loop and [`SimulationController`].
//! - [`sink`] -- [`EventSink`] trait and the broadcast implementation.
//! - [`store`] -- [`HistoryStore`] / [`AlertStore`] traits and in-memory
//!   implementations.
//! - [`supervisor`] -- The single-writer [`Supervisor`].
//!
//! [`SimulationController`]: runner::SimulationController
//! [`EventSink`]: sink::EventSink
//! [`HistoryStore`]: store::HistoryStore
//! [`AlertStore`]: store::AlertStore
//! [`Supervisor`]: supervisor::Supervisor

pub mod alerts;
pub mod config;
pub mod decision;
pub mod diagnostics;
pub mod history;
pub mod physics;
pub mod runner;
pub mod sink;
pub mod store;
pub mod supervisor;
