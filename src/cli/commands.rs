use crate::cli::context::AppContext;
use crate::cli::prompt::confirm_removal;
use crate::cli::status;
use crate::domain::{CancelToken, EnvError, PackageListing, RemoveOutcome};
use crate::infra::config::{DEFAULT_JUNO_TOML_NAME, install_default_config};
use crate::services::TaskHandle;
use anyhow::{Context, Result, bail};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

pub fn list(ctx: &AppContext) -> Result<()> {
    let envs = ctx.manager.list();
    if envs.is_empty() {
        status::info(&format!("No environments found in {:?}", ctx.base_dir()));
        return Ok(());
    }

    for env in envs {
        println!("{env}");
    }
    Ok(())
}

pub fn show(ctx: &AppContext, name: &str) -> Result<()> {
    let details = ctx.manager.describe(name, &CancelToken::new())?;

    println!("Name: {}", details.name);
    println!("Path: {}", details.root.display());
    println!("Python: {}", details.version);
    Ok(())
}

pub fn create(ctx: &AppContext, names: &[String], packages: Option<&str>) -> Result<()> {
    let handles: Vec<TaskHandle<Result<(), EnvError>>> = names
        .iter()
        .map(|name| {
            status::info(&format!("Creating environment '{name}'... Please wait"));
            let manager = ctx.manager.clone();
            let name = name.clone();
            let packages = packages.map(String::from);
            ctx.queue.submit(name.clone(), move |cancel| {
                manager
                    .create(&name, packages.as_deref(), cancel)
                    .map(|_| ())
            })
        })
        .collect();

    let failures = finish_creates(handles);

    summarize(failures, names.len(), "create")
}

pub fn remove(ctx: &AppContext, names: &[String], assume_yes: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    remove_with_prompt(ctx, names, assume_yes, &mut input, &mut output)
}

/// `remove` with the confirmation streams supplied by the caller.
pub fn remove_with_prompt<R, W>(
    ctx: &AppContext,
    names: &[String],
    assume_yes: bool,
    input: &mut R,
    output: &mut W,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut confirmed = Vec::new();
    for name in names {
        if assume_yes || confirm_removal(name, input, output)? {
            confirmed.push(name.clone());
        } else {
            status::info(&format!("Skipped '{name}'"));
        }
    }

    let handles: Vec<TaskHandle<Result<RemoveOutcome, EnvError>>> = confirmed
        .iter()
        .map(|name| {
            status::info(&format!("Removing environment '{name}'... Please wait"));
            let manager = ctx.manager.clone();
            let name = name.clone();
            ctx.queue
                .submit(name.clone(), move |cancel| manager.remove(&name, cancel))
        })
        .collect();

    let mut failures = 0;
    for handle in handles {
        let label = handle.label().to_string();
        match handle.wait() {
            Ok(Ok(RemoveOutcome::Removed)) => {
                status::success(&format!("Environment '{label}' removed successfully"));
            }
            Ok(Ok(RemoveOutcome::KernelNotRemoved { detail })) => {
                status::warning(&format!(
                    "Removed '{label}', but its Jupyter kernel may still be registered: {detail}. \
                     Run `jupyter kernelspec list` to clean it up."
                ));
            }
            Ok(Err(e)) => {
                failures += 1;
                status::error(&format!("Error removing environment '{label}': {e}"));
            }
            Err(e) => {
                failures += 1;
                status::error(&e.to_string());
            }
        }
    }

    summarize(failures, confirmed.len(), "remove")
}

pub fn install(ctx: &AppContext, name: &str, packages: &str) -> Result<()> {
    status::info(&format!("Installing packages in '{name}'... Please wait"));

    let manager = ctx.manager.clone();
    let env = name.to_string();
    let packages = packages.to_string();
    let handle = ctx.queue.submit(format!("install {name}"), move |cancel| {
        manager.install_packages(&env, &packages, cancel)
    });

    match handle.wait()? {
        Ok(tokens) => {
            status::success(&format!("Packages installed successfully: {}", tokens.join(", ")));
            Ok(())
        }
        Err(e) => {
            status::error(&format!("Error installing packages: {e}"));
            Err(e.into())
        }
    }
}

pub fn packages(ctx: &AppContext, name: &str) -> Result<()> {
    match ctx.manager.list_installed_packages(name, &CancelToken::new()) {
        PackageListing::Packages(lines) if lines.is_empty() => {
            status::info(&format!("No packages installed in '{name}'"));
        }
        PackageListing::Packages(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        PackageListing::Unavailable => {
            status::warning("Unable to retrieve package list.");
        }
    }
    Ok(())
}

pub fn export(ctx: &AppContext, name: &str, output: Option<&Path>) -> Result<()> {
    let manager = ctx.manager.clone();
    let env = name.to_string();
    let handle = ctx.queue.submit(format!("export {name}"), move |cancel| {
        manager.export_requirements(&env, cancel)
    });

    let requirements = match handle.wait()? {
        Ok(text) => text,
        Err(e) => {
            status::error(&format!("Error exporting requirements: {e}"));
            return Err(e.into());
        }
    };

    match output {
        Some(path) => {
            fs::write(path, &requirements)
                .with_context(|| format!("writing requirements to {:?}", path))?;
            status::success(&format!("Requirements saved to {}", path.display()));
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&requirements)
                .context("writing requirements")?;
            stdout.flush().context("writing requirements")?;
        }
    }
    Ok(())
}

pub fn activate(ctx: &AppContext, name: &str) -> Result<()> {
    println!("{}", ctx.manager.activation_command(name)?);
    Ok(())
}

pub fn setup(config_dir: &Path) -> Result<()> {
    info!("Preparing config in {:?}", config_dir);

    if install_default_config(config_dir)? {
        status::success(&format!(
            "Wrote {} to {}",
            DEFAULT_JUNO_TOML_NAME,
            config_dir.display()
        ));
    } else {
        status::info(&format!(
            "{} already exists in {}, left untouched",
            DEFAULT_JUNO_TOML_NAME,
            config_dir.display()
        ));
    }
    Ok(())
}

fn finish_creates(handles: Vec<TaskHandle<Result<(), EnvError>>>) -> usize {
    let mut failures = 0;
    for handle in handles {
        let label = handle.label().to_string();
        match handle.wait() {
            Ok(Ok(())) => {
                status::success(&format!("Virtual environment '{label}' created successfully"));
            }
            Ok(Err(e)) => {
                failures += 1;
                status::error(&format!("Error creating environment '{label}': {e}"));
            }
            Err(e) => {
                failures += 1;
                status::error(&e.to_string());
            }
        }
    }
    failures
}

fn summarize(failures: usize, total: usize, verb: &str) -> Result<()> {
    if failures > 0 {
        bail!("{failures} of {total} {verb} operation(s) failed");
    }
    Ok(())
}
