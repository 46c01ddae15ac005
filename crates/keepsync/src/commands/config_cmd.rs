//! Config subcommand handlers.

use keepsync_config::{self as config, StoreProfile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::effective_format;
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config_file = config::config_path();

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config_file.display().to_string(), global.quiet)
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_from(&config_file)?;
            let out = output::render(effective_format(global, &cfg), &cfg)?;
            output::print_output(&out, global.quiet)
        }

        ConfigCommand::Add {
            name,
            path,
            save_timeout_ms,
            default,
        } => {
            let mut cfg = config::load_config_from(&config_file)?;

            // Relative paths on the command line mean the working directory,
            // not the config directory.
            let path = std::path::absolute(&path)?;
            cfg.insert_store(
                &name,
                StoreProfile {
                    path,
                    save_timeout_ms,
                },
            )?;
            if default {
                cfg.default_store = Some(name.clone());
            }

            config::save_config_to(&cfg, &config_file)?;
            if !global.quiet {
                eprintln!("✓ Store '{name}' saved to {}", config_file.display());
            }
            Ok(())
        }
    }
}
