//! Route handlers for the SyncVeil API.

pub mod admin;
pub mod auth;
pub mod health;
pub mod root;
