//! Shared types for the Bitfinex WebSocket API v2
//!
//! This crate provides the core type definitions used across the workspace.
//! It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`Symbol`] - Trading (`tBTCUSD`) and funding (`fUSD`) symbols
//! - [`Channel`], [`Precision`], [`Frequency`], [`BookLength`] - Subscription enums
//! - [`Row`], [`FromRow`] - Positional array decoding
//! - [`BookLevel`] and the other market/account records decoded from channel data
//! - [`EventMessage`] - Parsed event objects (`info`, `subscribed`, `error`, ...)
//! - [`BfxError`], [`DecodeError`] - Error types

pub mod account;
pub mod enums;
pub mod error;
pub mod level;
pub mod market;
pub mod messages;
pub mod orders;
pub mod symbol;
pub mod wire;

// Re-export commonly used types
pub use account::*;
pub use enums::*;
pub use error::*;
pub use level::*;
pub use market::*;
pub use messages::*;
pub use orders::*;
pub use symbol::*;
pub use wire::{FromRow, Row};

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
