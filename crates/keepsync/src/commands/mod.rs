//! Command dispatch: bridges CLI args -> a hosted synchronizer -> output.

pub mod config_cmd;
pub mod value;

use std::path::PathBuf;

use keepsync_config::{self as config, Config};
use keepsync_core::{JsonFileStore, SyncConfig, Synchronizer};

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// The value file a command operates on, and how to present it.
#[derive(Debug)]
pub struct Target {
    pub path: PathBuf,
    pub sync: SyncConfig,
    pub format: OutputFormat,
}

/// Resolve `--file` or `--store` (falling back to the default store)
/// against the config file.
pub fn resolve_target(global: &GlobalOpts) -> Result<Target, CliError> {
    let config_file = config::config_path();
    let cfg = config::load_config_from(&config_file)?;
    let format = effective_format(global, &cfg);

    if let Some(ref path) = global.file {
        let name = path
            .file_stem()
            .map_or_else(|| "file".to_owned(), |s| s.to_string_lossy().into_owned());
        let mut sync = SyncConfig::named(name);
        sync.save_timeout = cfg.default_save_timeout();
        return Ok(Target {
            path: path.clone(),
            sync,
            format,
        });
    }

    let (path, sync) = config::resolve_store_in(&cfg, global.store.as_deref(), &config_file)?;
    Ok(Target { path, sync, format })
}

/// `--output` wins, then `defaults.output` from the config file.
pub fn effective_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global
        .output
        .unwrap_or_else(|| output::format_from_config(&cfg.defaults.output))
}

/// Dispatch a value command against a freshly started synchronizer.
pub async fn dispatch(cmd: Command, target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    let store: JsonFileStore<serde_json::Value> = JsonFileStore::new(&target.path);
    let sync = Synchronizer::new(store, target.sync);

    let result = match cmd {
        Command::Get => value::get(&sync, target.format, global).await,
        Command::Set(args) => value::set(&sync, args).await,
        Command::Watch(args) => value::watch(&sync, args, target.format, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    };

    sync.shutdown().await;
    result
}
