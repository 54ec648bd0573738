//! hashlb is a reverse-proxying HTTP load balancer.
//!
//! Every inbound request is routed to one of a fixed set of backends by
//! hashing its path, so the same path keeps landing on the same backend
//! while the healthy set is stable. A background prober checks each
//! backend's `/health` endpoint on a fixed interval and only healthy
//! backends are eligible.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate).
//! - [`config`] -- Config file loading, CLI overrides, and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`registry`] -- The shared backend pool: addresses, health flags, and
//!   request counters behind one lock.
//! - [`selector`] -- SHA-256 path hashing onto the healthy snapshot.
//! - [`prober`] -- Per-backend periodic health checks.
//! - [`proxy`] -- Request forwarding, header rewriting, and response relay.
//! - [`server`] -- Axum router, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |

// Public items are consumed by the binary and integration tests only.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod logging;
pub mod prober;
pub mod proxy;
pub mod registry;
pub mod selector;
pub mod server;
