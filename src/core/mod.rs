//! Core Components
//!
//! Core infrastructure for identity operations.

pub mod dispatcher;
pub mod transport;

pub use dispatcher::*;
pub use transport::*;
