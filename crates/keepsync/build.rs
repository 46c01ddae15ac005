//! Build-time docs for the `keepsync` binary.
//!
//! Writes into `OUT_DIR`:
//!   - `man/keepsync.1` plus one `keepsync-<sub>.1` per visible subcommand,
//!     nested ones included (`keepsync-config-add.1`)
//!   - `completions/` scripts for bash, zsh and fish, identical to what
//!     `keepsync completions <shell>` prints

use std::fs;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::Shell;

// cli.rs only depends on clap + clap_complete (both build-dependencies),
// so it compiles here without the rest of the crate.
#[path = "src/cli.rs"]
mod cli;

const BIN_NAME: &str = "keepsync";
const SHELLS: [Shell; 3] = [Shell::Bash, Shell::Zsh, Shell::Fish];

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir: PathBuf = std::env::var_os("OUT_DIR")
        .expect("OUT_DIR not set by Cargo")
        .into();

    let man_dir = output_dir(&out_dir, "man");
    let mut pages = Vec::new();
    collect_pages(cli::Cli::command(), &mut pages);
    for page in pages {
        write_manpage(&page, &man_dir);
    }

    let completion_dir = output_dir(&out_dir, "completions");
    for shell in SHELLS {
        let mut cmd = cli::Cli::command();
        clap_complete::generate_to(shell, &mut cmd, BIN_NAME, &completion_dir)
            .unwrap_or_else(|e| panic!("failed to generate {shell} completions: {e}"));
    }
}

fn output_dir(out_dir: &Path, name: &str) -> PathBuf {
    let dir = out_dir.join(name);
    fs::create_dir_all(&dir)
        .unwrap_or_else(|e| panic!("failed to create {}: {e}", dir.display()));
    dir
}

/// Flatten the command tree into one page per command, renaming each
/// subcommand after its full path so the pages don't collide.
fn collect_pages(cmd: clap::Command, pages: &mut Vec<clap::Command>) {
    let prefix = cmd.get_name().to_owned();
    let subs: Vec<clap::Command> = cmd
        .get_subcommands()
        .filter(|sub| !sub.is_hide_set())
        .map(|sub| {
            let name = format!("{prefix}-{}", sub.get_name());
            sub.clone().name(name)
        })
        .collect();
    pages.push(cmd);
    for sub in subs {
        collect_pages(sub, pages);
    }
}

fn write_manpage(cmd: &clap::Command, dir: &Path) {
    let path = dir.join(format!("{}.1", cmd.get_name()));
    let mut buf = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut buf)
        .unwrap_or_else(|e| panic!("failed to render {}: {e}", path.display()));
    fs::write(&path, buf).unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
}
