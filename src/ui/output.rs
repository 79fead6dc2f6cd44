use std::path::Path;

use console::{Term, style};

use crate::errors::StartupError;
use crate::ui::icons::{CHECK, CROSS, ROCKET, STOP, WARN};
use crate::urls::AppUrls;

/// User-facing terminal output for the launcher.
///
/// Everything here goes to stdout; diagnostics for developers of devstart go
/// through `tracing` on stderr instead. Clearing the screen is a no-op for
/// non-interactive sessions so CI logs keep their history.
#[derive(Debug, Clone, Copy)]
pub struct StartupUI {
    interactive: bool,
}

impl StartupUI {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn clear(&self) {
        if self.interactive {
            let _ = Term::stdout().clear_screen();
        }
    }

    /// Print a startup failure. Missing files get one entry per file.
    pub fn startup_error(&self, err: &StartupError) {
        match err {
            StartupError::MissingFiles { missing } => {
                println!("{}{}", CROSS, style(err).red());
                for path in missing {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string());
                    let dir = path.parent().unwrap_or(Path::new(""));
                    println!("  {} {}", style("Name:").red(), style(name).cyan());
                    println!(
                        "  {} {}",
                        style("Searched in:").red(),
                        style(dir.display()).cyan()
                    );
                }
            }
            StartupError::PortUnavailable { .. } => println!("{}", style(err).red()),
            other => {
                let message = other.to_string();
                if !message.is_empty() {
                    println!("{}", message);
                }
            }
        }
    }

    pub fn browsers_set(&self, browsers: &[&str]) {
        println!();
        println!(
            "{} {}",
            style("Set target browsers:").green(),
            style(browsers.join(", ")).cyan()
        );
        println!();
    }

    pub fn starting_server(&self) {
        println!("{}{}", ROCKET, style("Starting the development server...").cyan());
        println!();
    }

    pub fn compiling(&self) {
        println!("Compiling...");
    }

    pub fn compiled_successfully(&self) {
        println!("{}{}", CHECK, style("Compiled successfully!").green());
    }

    pub fn no_type_issues(&self) {
        println!("{}", style("No issues found.").green());
    }

    pub fn failed_to_compile(&self, error: &str) {
        println!("{}{}", CROSS, style("Failed to compile.").red());
        println!();
        println!("{}", error);
    }

    pub fn compiled_with_warnings(&self, warnings: &[String]) {
        println!("{}{}", WARN, style("Compiled with warnings.").yellow());
        println!();
        println!("{}", warnings.join("\n\n"));
        println!();
        println!(
            "Search for the {} to learn more about each warning.",
            style("keywords").yellow().underlined()
        );
        println!(
            "To ignore, add {} to the line before.",
            style("// eslint-disable-next-line").cyan()
        );
        println!();
    }

    pub fn instructions(&self, app_name: &str, urls: &AppUrls, use_yarn: bool) {
        println!();
        println!(
            "You can now view {} in the browser.",
            style(app_name).bold()
        );
        println!();
        match &urls.lan_url_for_terminal {
            Some(lan) => {
                println!(
                    "  {}            {}",
                    style("Local:").bold(),
                    urls.local_url_for_terminal
                );
                println!("  {}  {}", style("On Your Network:").bold(), lan);
            }
            None => println!("  {}", urls.local_url_for_terminal),
        }
        println!();
        println!("Note that the development build is not optimized.");
        let build_cmd = if use_yarn { "yarn build" } else { "npm run build" };
        println!(
            "To create a production build, use {}.",
            style(build_cmd).cyan()
        );
        println!();
    }

    pub fn fast_refresh_unsupported(&self, version: &str) {
        println!(
            "{}",
            style(format!(
                "Fast Refresh requires React 16.10 or higher. You are using React {}.",
                version
            ))
            .yellow()
        );
    }

    pub fn proxy_error(&self, path: &str, host: &str, target: &str, cause: &str) {
        println!(
            "{}",
            style(format!(
                "Proxy error: Could not proxy request {} from {} to {}.",
                path, host, target
            ))
            .red()
        );
        println!("{}", style(cause).dim());
        println!();
    }

    pub fn shutting_down(&self, reason: &str) {
        println!();
        println!("{}{} ({})", STOP, style("Shutting down...").yellow(), reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_flag_round_trips() {
        assert!(StartupUI::new(true).is_interactive());
        assert!(!StartupUI::new(false).is_interactive());
    }

    #[test]
    fn test_non_interactive_clear_does_not_touch_terminal() {
        // Only checks that the call is safe without a TTY.
        StartupUI::new(false).clear();
    }
}
