//! Configuration view and validation commands for `devstart config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use devstart::config::{StartupContext, process_env};
    use devstart::project_config::{CONFIG_FILE_NAME, ProjectConfig};
    use devstart::proxy::prepare_proxy;

    let config_path = project_dir.join(CONFIG_FILE_NAME);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("devstart Configuration");
            println!("======================");
            println!();

            let config = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                ProjectConfig::load(&config_path)?
            } else {
                println!("No {} found at {}", CONFIG_FILE_NAME, config_path.display());
                println!("Using default configuration.");
                ProjectConfig::default()
            };
            println!();

            println!("[build]");
            match &config.build.command {
                Some(command) => println!("  command = {:?}", command),
                None => println!("  command = (none; public/ is served as is)"),
            }
            println!("  output_dir = \"{}\"", config.build.output_dir.display());
            println!("  settle_ms = {}", config.build.settle_ms);
            println!();
            println!("[server]");
            println!("  history_fallback = {}", config.server.history_fallback);
            println!();

            // Show effective values (including env overrides)
            println!("Effective values (with .env and environment overrides):");
            let ctx = StartupContext::load(project_dir, process_env(), false)?;
            println!("  app = \"{}\"", ctx.app_name);
            println!("  host = \"{}\"", ctx.host);
            println!("  port = {}", ctx.port);
            println!("  protocol = \"{}\"", ctx.protocol);
            println!("  public_path = \"{}\"", ctx.paths.public_url_or_path);
            println!("  package_manager = \"{}\"", if ctx.use_yarn { "yarn" } else { "npm" });
            println!("  typescript = {}", ctx.use_typescript);
            println!("  ci = {}", ctx.is_ci);

            let proxy = prepare_proxy(
                ctx.package.proxy.as_ref(),
                &ctx.paths.app_public,
                &ctx.paths.public_url_or_path,
            )?;
            if proxy.is_empty() {
                println!("  proxy = (none)");
            } else {
                println!("  proxy:");
                for rule in &proxy.rules {
                    println!("    {}", rule);
                }
            }
            println!();

            if !config_path.exists() {
                println!("Run 'devstart config init' to create a {} file.", CONFIG_FILE_NAME);
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let config = ProjectConfig::load(&config_path)?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE_NAME, config_path.display());
                println!("Delete it first if you want to regenerate.");
                return Ok(());
            }

            ProjectConfig::default().save(&config_path)?;
            println!("Created {}", config_path.display());
            println!();
            println!("Set [build] command to your bundler's watch command, for example:");
            println!(
                "  command = [\"npx\", \"esbuild\", \"{{entry}}\", \"--bundle\", \"--outdir={{output_dir}}\", \"--watch\"]"
            );
            println!();
        }
    }

    Ok(())
}
