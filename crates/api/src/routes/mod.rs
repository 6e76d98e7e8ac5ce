//! Route handlers for the info API

pub mod config;
pub mod health;
pub mod keys;
