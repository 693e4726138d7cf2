mod output;
mod shell;

use std::collections::HashMap;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::info;

use argot::commands::option::Options;
use argot::commands::registry::UnitId;
use argot::runner::{RunError, Runner};
use argot::{Project, load_config, logger};

#[derive(Parser, Debug)]
#[command(
    name = "argot",
    about = "Resolve command lines against a command tree and run them with their dependencies"
)]
struct Cli {
    /// Path to config file (auto-detected if not specified)
    #[arg(short, long)]
    config: Option<String>,

    /// Log file path (enables file logging in addition to stderr)
    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print how a command line is resolved
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Resolve a command line and run the matched commands
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a task from the config by name
    Task { name: String },
    /// Print the invocable command tree
    List,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_file = cli.log_file.as_deref().map(std::fs::File::create).transpose()?;
    logger::init(log_file)?;

    let mut project = load_config(cli.config.as_deref(), shell::hooks_for)?;
    info!("Loaded {}", project.config_path.display());

    match cli.command {
        Commands::Plan { json, args } => print_plan(&project, &args, json),
        Commands::Run { args } => run_args(&mut project, &args).await,
        Commands::Task { name } => {
            let task = project
                .registry
                .find_task(&name)
                .ok_or_else(|| format!("Unknown task '{name}'"))?;
            execute(&mut project, vec![(task, Options::new())]).await
        }
        Commands::List => {
            print!("{}", output::format_tree(&project));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_plan(
    project: &Project,
    args: &[String],
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let plan = project.resolve(args);
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("{plan}");
    }
    Ok(if plan.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_args(
    project: &mut Project,
    args: &[String],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let plan = project.resolve(args);
    if !plan.success {
        for item in plan.diagnostics() {
            eprintln!("{}", output::format_diagnostic(item));
            if let Some(node) = project.plan.find(&item.path) {
                eprint!("{}", output::format_available(project, node));
            }
        }
        return Ok(ExitCode::FAILURE);
    }

    let units: Vec<(UnitId, Options)> = plan
        .commands()
        .map(|(unit, item)| (unit, item.options.clone()))
        .collect();
    if units.is_empty() {
        // Only topics were named, show what they contain
        let path = plan.items.last().map(|item| item.path.as_slice()).unwrap_or_default();
        let node = project.plan.find(path).unwrap_or(project.plan.root());
        eprint!("{}", output::format_available(project, node));
        return Ok(ExitCode::FAILURE);
    }
    execute(project, units).await
}

/// Run each unit in order, stopping at the first failure, then fire `after_all` hooks
async fn execute(
    project: &mut Project,
    units: Vec<(UnitId, Options)>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let names: HashMap<UnitId, String> = project
        .registry
        .ids()
        .filter_map(|id| project.registry.get(id).map(|d| (id, d.name.clone())))
        .collect();

    let mut runner = Runner::new(&mut project.registry);
    let printer = tokio::spawn(output::print_events(runner.subscribe(), names));

    let mut result: Result<(), RunError> = Ok(());
    for (unit, options) in units {
        result = runner.run(unit, options).await;
        if result.is_err() {
            break;
        }
    }
    runner.run_after_all().await;
    drop(runner);
    printer.await?;

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{}", output::format_failure(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}
