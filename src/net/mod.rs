//! Network worker bridge.
//!
//! HTTP calls to the backend can block for seconds.  They run on a
//! dedicated worker thread so the control loop never waits on the network;
//! the two sides talk through bounded `embassy-sync` channels.
//!
//! ```text
//! ┌──────────────┐  NetRequest  ┌──────────────┐   HTTP   ┌─────────┐
//! │ Control Loop │─────────────▶│  Net Worker  │─────────▶│ Backend │
//! │   (sync)     │◀─────────────│  (block_on)  │◀─────────│         │
//! └──────────────┘  NetOutcome  └──────────────┘          └─────────┘
//! ```
//!
//! Settings received by the worker are only *queued*; the control loop
//! applies them between two sample ticks.

pub mod bridge;

pub use bridge::{NET_BRIDGE, NetBridge, NetOutcome, NetRequest};
