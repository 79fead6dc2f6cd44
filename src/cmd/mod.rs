//! CLI command implementations.
//!
//! | Module   | Commands handled          |
//! |----------|---------------------------|
//! | `start`  | `Start` (the default)     |
//! | `config` | `Config`                  |

pub mod config;
pub mod start;

pub use config::cmd_config;
pub use start::cmd_start;
