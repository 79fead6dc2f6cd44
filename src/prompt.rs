//! Yes/no questions asked during an interactive launch.

use dialoguer::{Confirm, theme::ColorfulTheme};

use crate::errors::StartupError;

/// Source of answers to yes/no questions.
pub trait Prompt: Send + Sync {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, StartupError>;
}

/// Asks on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, StartupError> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(default)
            .interact()
            .map_err(|e| StartupError::Prompt(e.to_string()))
    }
}
