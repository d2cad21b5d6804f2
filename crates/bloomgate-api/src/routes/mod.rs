//! Route modules, one per audience.

pub mod health;
pub mod sprint;
pub mod tasks;
pub mod webhooks;
