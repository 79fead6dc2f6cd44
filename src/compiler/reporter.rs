use crate::compiler::messages::Diagnostics;
use crate::ui::StartupUI;
use crate::urls::AppUrls;

/// What a finished compile cycle amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    Warnings(Vec<String>),
    /// First error only; the rest are usually consequences of it.
    Failed(String),
}

/// Prints compile progress and results the way the dev server reports them.
#[derive(Debug, Clone)]
pub struct CompileReporter {
    ui: StartupUI,
    app_name: String,
    urls: AppUrls,
    use_yarn: bool,
    use_typescript: bool,
    is_first_compile: bool,
}

impl CompileReporter {
    pub fn new(
        ui: StartupUI,
        app_name: impl Into<String>,
        urls: AppUrls,
        use_yarn: bool,
        use_typescript: bool,
    ) -> Self {
        Self {
            ui,
            app_name: app_name.into(),
            urls,
            use_yarn,
            use_typescript,
            is_first_compile: true,
        }
    }

    /// A source change started a new cycle.
    pub fn invalid(&self) {
        self.ui.clear();
        self.ui.compiling();
    }

    pub fn done(&mut self, diagnostics: &Diagnostics) -> CompileOutcome {
        self.ui.clear();
        let formatted = diagnostics.formatted();

        let outcome = if let Some(first) = formatted.errors.into_iter().next() {
            CompileOutcome::Failed(first)
        } else if !formatted.warnings.is_empty() {
            CompileOutcome::Warnings(formatted.warnings)
        } else {
            CompileOutcome::Success
        };

        match &outcome {
            CompileOutcome::Success => {
                self.ui.compiled_successfully();
                if self.use_typescript {
                    self.ui.no_type_issues();
                }
                if self.ui.is_interactive() || self.is_first_compile {
                    self.ui.instructions(&self.app_name, &self.urls, self.use_yarn);
                }
            }
            CompileOutcome::Warnings(warnings) => self.ui.compiled_with_warnings(warnings),
            CompileOutcome::Failed(error) => self.ui.failed_to_compile(error),
        }

        tracing::debug!(?outcome, first = self.is_first_compile, "compile cycle reported");
        self.is_first_compile = false;
        outcome
    }

    pub fn is_first_compile(&self) -> bool {
        self.is_first_compile
    }
}
