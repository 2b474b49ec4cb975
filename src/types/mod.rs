//! Identity Types
//!
//! Core type definitions for identity operations.

pub mod config;
pub mod record;
pub mod token;

pub use config::*;
pub use record::*;
pub use token::*;
