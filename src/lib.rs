//! Admin backend for company branches.
//!
//! The branch create action validates the submitted forms, rejects titles the
//! company's client already uses and delegates the write to a creation
//! service backed by a branch store. An admin HTTP app exposes it.

pub mod action;
pub mod admin;
pub mod branch;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub(crate) mod utils;
