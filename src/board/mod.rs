//! Task board back-end: environments, boards and ordered cards.
//!
//! ## Overview
//!
//! Cards live in an ordered list per board. Every board's positions are
//! always exactly `0..n-1`; the relocation engine is the only path that
//! changes where a card sits, and card create/delete open and close slots
//! through the same reconciler so the invariant survives every write.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState, Actor)  │
//! └──────────┘ WebSocket│         │                                        │
//!       ^               │         │ RelocationEngine::relocate()           │
//!       │               │         v                                        │
//!       │               │  engine.rs   ── access.rs   (AccessGate)         │
//!       │               │         │                                        │
//!       │               │         │ plan_relocation() inside PositionTx    │
//!       │               │         v                                        │
//!       │               │  reconciler.rs (pure)  ──>  db.rs (SQLite)       │
//!       │               │         │                                        │
//!       │               │         │ after commit, on a tracked task        │
//!       │               │         v                                        │
//!       └───────────────│  notifier.rs (activity log) ──> ws.rs (rooms)    │
//!                       └──────────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod api;
pub mod db;
pub mod engine;
pub mod models;
pub mod notifier;
pub mod reconciler;
pub mod server;
pub mod ws;
