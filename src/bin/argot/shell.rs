use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use log::debug;
use thiserror::Error;
use tokio::process::Command;

use argot::UnitConfig;
use argot::commands::definition::{BeforeOutcome, HookContext, HookResult, Hooks};
use argot::commands::option::OptionValue;

#[derive(Error, Debug)]
#[error("'{script}' failed with {status}")]
pub struct ShellError {
    script: String,
    status: ExitStatus,
}

/// Environment variable carrying an option value, `dry-run` becomes `ARGOT_OPT_DRY_RUN`
fn env_name(option: &str) -> String {
    let mut name = String::from("ARGOT_OPT_");
    name.extend(option.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_uppercase()
        } else {
            '_'
        }
    }));
    name
}

fn option_env(ctx: &HookContext) -> Vec<(String, String)> {
    ctx.options
        .iter()
        .map(|(name, value)| {
            let value = match value {
                OptionValue::Flag(true) => "1".to_string(),
                OptionValue::Flag(false) => String::new(),
                OptionValue::Value(v) => v.clone(),
            };
            (env_name(name), value)
        })
        .collect()
}

async fn spawn(
    script: &str,
    cwd: &Path,
    ctx: &HookContext,
    quiet: bool,
) -> std::io::Result<ExitStatus> {
    debug!("Running '{script}' for '{}' in {}", ctx.name, cwd.display());
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(script)
        .current_dir(cwd)
        .envs(option_env(ctx));
    if quiet {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }
    command.status().await
}

async fn run_script(script: String, cwd: PathBuf, ctx: HookContext) -> HookResult {
    let status = spawn(&script, &cwd, &ctx, false).await?;
    if status.success() {
        Ok(())
    } else {
        Err(ShellError { script, status }.into())
    }
}

/// Exit status 0 means the unit has nothing to do
async fn skip_if(script: String, cwd: PathBuf, ctx: HookContext) -> HookResult<BeforeOutcome> {
    let status = spawn(&script, &cwd, &ctx, true).await?;
    Ok(if status.success() {
        BeforeOutcome::Skip
    } else {
        BeforeOutcome::Continue
    })
}

/// Build the lifecycle hooks of a configured unit from its shell fragments
pub fn hooks_for(unit: &UnitConfig) -> Hooks {
    let mut hooks = Hooks::new();
    if let Some(script) = unit.hooks.skip_if.clone() {
        let cwd = unit.cwd.clone();
        hooks = hooks.before(move |ctx| skip_if(script.clone(), cwd.clone(), ctx));
    }
    if let Some(script) = unit.hooks.run.clone() {
        let cwd = unit.cwd.clone();
        hooks = hooks.exec(move |ctx| run_script(script.clone(), cwd.clone(), ctx));
    }
    if let Some(script) = unit.hooks.after.clone() {
        let cwd = unit.cwd.clone();
        hooks = hooks.after(move |ctx| run_script(script.clone(), cwd.clone(), ctx));
    }
    if let Some(script) = unit.hooks.after_all.clone() {
        let cwd = unit.cwd.clone();
        hooks = hooks.after_all(move |ctx| run_script(script.clone(), cwd.clone(), ctx));
    }
    hooks
}
