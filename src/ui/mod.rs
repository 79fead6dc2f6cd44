pub mod icons;
pub mod output;

pub use output::StartupUI;
