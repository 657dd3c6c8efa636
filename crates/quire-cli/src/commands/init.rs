//! Project initialization command (quire init)

use super::Context;
use anyhow::{bail, Context as _, Result};
use colored::Colorize;
use quire_config::project::STARTER_TEMPLATE;
use quire_config::PROJECT_CONFIG_FILE;
use std::fs;
use std::path::Path;

const GITIGNORE_ENTRY: &str = "/.quire/";

/// Write a starter quire.toml into the project directory
pub fn run(ctx: &Context, force: bool) -> Result<()> {
    let dir = &ctx.project_dir;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join(PROJECT_CONFIG_FILE);
    if config_path.exists() && !force {
        bail!(
            "Project already initialized: {} exists (use --force to overwrite)",
            config_path.display()
        );
    }

    fs::write(&config_path, STARTER_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    fs::create_dir_all(dir.join("assets")).context("Failed to create assets directory")?;
    let ignored = ignore_scratch(dir)?;

    if !ctx.quiet {
        println!("{} Created {}", "\u{2713}".green(), config_path.display());
        if ignored {
            println!("  Added {} to .gitignore", GITIGNORE_ENTRY);
        }
        println!("\nEdit the [profiles] section, then run:");
        println!("  quire build");
    }
    Ok(())
}

/// Add the scratch directory to .gitignore; false if already listed
fn ignore_scratch(dir: &Path) -> Result<bool> {
    let path = dir.join(".gitignore");
    let existing = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).context("Failed to read .gitignore"),
    };

    if existing.lines().any(|line| line.trim() == GITIGNORE_ENTRY) {
        return Ok(false);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str("# quire scratch and caches\n");
    content.push_str(GITIGNORE_ENTRY);
    content.push('\n');
    fs::write(&path, content).context("Failed to write .gitignore")?;
    Ok(true)
}
