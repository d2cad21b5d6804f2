//! Bloomgate Core — provider-agnostic domain model.
//!
//! This crate defines the unified ticket and event model that all provider
//! adapters normalize into, the pure action-routing decision function, and
//! the sprint-health calculator. It contains no network or HTTP code.

pub mod clock;
pub mod error;
pub mod event;
pub mod health;
pub mod retry;
pub mod router;
pub mod ticket;
