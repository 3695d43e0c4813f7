//! Core types and utilities for bizconsult
//!
//! This crate provides the session data model, the BizConsult AI persona
//! texts, configuration, and logging used by all other bizconsult
//! components.

pub mod config;
pub mod error;
pub mod logging;
pub mod persona;
pub mod session;

pub use error::{Error, Result};
pub use session::{ChatSession, Message, Role};
