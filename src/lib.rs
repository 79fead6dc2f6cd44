pub mod browser;
pub mod build_config;
pub mod compat;
pub mod compiler;
pub mod config;
pub mod env;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod package;
pub mod paths;
pub mod pipeline;
pub mod port;
pub mod preflight;
pub mod project_config;
pub mod prompt;
pub mod proxy;
pub mod server;
pub mod supervisor;
pub mod ui;
pub mod urls;
pub mod version;

#[cfg(test)]
mod test_support;
