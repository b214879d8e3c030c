//! # Talkie Core Kernel
//!
//! Application-wide pieces shared by every plugin:
//!
//! - **Constants**: names, versions and config locations (`constants`).
//! - **Application context**: the [`AppContext`](context::AppContext) every
//!   plugin receives once from the plugin manager.
//! - **Error Handling**: the top-level [`Error`](error::Error) and `Result` alias.
pub mod constants;
pub mod context;
pub mod error;

pub use context::AppContext;
pub use error::{Error, Result};
