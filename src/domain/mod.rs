//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs` — Normalized types (exchange-agnostic, business-logic-ready)
//! - `wire.rs` — Raw records built by adapters from exchange responses
//! - `convert.rs` — `TryFrom<(Raw, &NormalizeContext)>` conversions with validation
//! - `state.rs` — State containers with update methods (for stream-driven data)
//! - `client.rs` — `Exchange` facade methods for the slice

pub mod balance;
pub mod market;
pub mod order;
pub mod orderbook;
pub mod trade;
