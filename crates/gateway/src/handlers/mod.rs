//! API handlers module

pub mod agents;
pub mod health;
pub mod query;
