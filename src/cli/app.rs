//! Main CLI application

use crate::cli::completion;
use crate::config::{
    is_valid_variable_name, load_dotenv_files, parse_config_auto, parse_config_file,
    validate_config, Assignment, Config,
};
use crate::error::{ConfigError, Result};
use crate::runner::{
    DependencyResolver, ExecutionPlan, Executor, Shell, TaskRegistry, VariableStore, Verbosity,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A loaded task file, ready to plan and run
pub struct App {
    /// Parsed configuration
    config: Config,
    /// Config file path
    config_path: PathBuf,
    /// Registered tasks
    registry: TaskRegistry,
    /// Process environment and dotenv values, with no declarations yet
    environment: VariableStore,
    /// Variable declarations, applied per run once overrides are known
    assignments: Vec<Assignment>,
    /// Interpreter and working directory for actions
    shell: Shell,
}

impl App {
    /// Create a new app from the discovered task file
    pub fn new() -> Result<Self> {
        let (config, config_path) = parse_config_auto()?;
        Self::from_config(config, config_path)
    }

    /// Create app with a specific config file
    pub fn with_config_file(path: PathBuf) -> Result<Self> {
        let config = parse_config_file(&path)?;
        Self::from_config(config, path)
    }

    /// Validate `config` and build the registry and variable store from it.
    ///
    /// Actions run from the directory holding the task file.
    pub fn from_config(config: Config, config_path: PathBuf) -> Result<Self> {
        validate_config(&config)?;

        let base_dir = match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut shell = Shell::new().with_working_dir(base_dir.clone());
        if let Some(interpreter) = &config.interpreter {
            shell = shell.with_interpreter(interpreter.clone());
        }

        let mut environment = VariableStore::new()
            .with_shell(shell.clone())
            .with_process_env();
        environment.add_environment_defaults(load_dotenv_files(&config, &base_dir)?);
        let assignments = config.assignments()?;

        let registry = TaskRegistry::from_config(&config)?;
        debug!(
            path = %config_path.display(),
            tasks = registry.len(),
            variables = assignments.len(),
            "loaded task file"
        );

        Ok(App {
            config,
            config_path,
            registry,
            environment,
            assignments,
            shell,
        })
    }

    /// Variable store for one invocation.
    ///
    /// Overrides go in first so a declaration may reference a name that is
    /// only given on the command line.
    pub fn variables(&self, overrides: &HashMap<String, String>) -> Result<VariableStore> {
        let mut variables = self.environment.clone();
        variables.set_overrides(overrides);
        for assignment in &self.assignments {
            variables.declare(assignment)?;
        }
        Ok(variables)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// The task run when no target is named: `default`, else the first task
    pub fn default_target(&self) -> Option<&str> {
        self.config
            .default
            .as_deref()
            .or_else(|| self.registry.first().map(|task| task.name.as_str()))
    }

    /// Plan `targets`, or the default target when none are given
    pub fn plan(&self, targets: &[String]) -> Result<ExecutionPlan> {
        let resolver = DependencyResolver::new(&self.registry);
        if !targets.is_empty() {
            return Ok(resolver.plan_all(targets)?);
        }

        match self.default_target() {
            Some(target) => Ok(resolver.plan(target)?),
            None => Err(ConfigError::Invalid("No tasks defined".to_string()).into()),
        }
    }

    /// Plan and execute `targets`
    pub fn run_targets(
        &self,
        targets: &[String],
        overrides: &HashMap<String, String>,
        verbosity: Verbosity,
        dry_run: bool,
    ) -> Result<()> {
        let plan = self.plan(targets)?;
        let variables = self.variables(overrides)?;
        Executor::new(&self.registry, &variables)
            .with_shell(self.shell.clone())
            .with_verbosity(verbosity)
            .with_dry_run(dry_run)
            .run(&plan, overrides)?;
        Ok(())
    }

    /// Render the public tasks, one per line.
    ///
    /// With `verbose`, each task's description follows on indented lines.
    pub fn task_listing(&self, verbose: bool) -> Vec<String> {
        let public: Vec<_> = self.registry.iter().filter(|task| !task.private).collect();
        let width = public.iter().map(|task| task.name.len()).max().unwrap_or(0);
        let default = self.default_target();

        let mut lines = Vec::with_capacity(public.len());
        for task in public {
            let mut line = format!("{:width$}", task.name, width = width);
            if let Some(usage) = &task.usage {
                line.push_str("  ");
                line.push_str(usage);
            }
            if Some(task.name.as_str()) == default {
                line.push_str(" (default)");
            }
            lines.push(line.trim_end().to_string());

            if let (true, Some(description)) = (verbose, &task.description) {
                lines.extend(description.lines().map(|text| format!("    {}", text)));
            }
        }
        lines
    }

    /// Resolve every declared variable under `overrides`
    pub fn variable_listing(&self, overrides: &HashMap<String, String>) -> Result<Vec<String>> {
        let mut variables = self.variables(overrides)?;

        let names = variables.declared_names().to_vec();
        let mut lines = Vec::with_capacity(names.len());
        for name in names {
            let variable = variables.resolve_variable(&name)?;
            lines.push(format!(
                "{}={} ({})",
                variable.name,
                variable.value,
                variable.origin.as_str()
            ));
        }
        Ok(lines)
    }
}

/// Build the clap command
fn build_command() -> Command {
    let targets_arg = || {
        Arg::new("items")
            .value_name("TARGET|NAME=VALUE")
            .help("Targets to build and variable overrides")
            .num_args(0..)
            .action(ArgAction::Append)
    };

    Command::new("makeflow")
        .version(crate::VERSION)
        .about("Plan and run interdependent shell tasks from a YAML task file")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to makeflow.yml task file")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Run targets and everything they depend on")
                .arg(
                    Arg::new("dry_run")
                        .short('n')
                        .long("dry-run")
                        .help("Print actions without running them")
                        .action(ArgAction::SetTrue),
                )
                .arg(targets_arg()),
        )
        .subcommand(
            Command::new("plan")
                .about("Print the execution order for targets")
                .arg(targets_arg()),
        )
        .subcommand(Command::new("list").about("List public tasks"))
        .subcommand(
            Command::new("vars")
                .about("Print every declared variable with its resolved value")
                .arg(targets_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate a shell completion script")
                .arg(
                    Arg::new("shell")
                        .value_name("SHELL")
                        .required(true)
                        .value_parser(value_parser!(clap_complete::Shell)),
                ),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Split positional items into targets and `NAME=value` overrides
fn split_items(items: &[String]) -> (Vec<String>, HashMap<String, String>) {
    let mut targets = Vec::new();
    let mut overrides = HashMap::new();

    for item in items {
        match item.split_once('=') {
            Some((name, value)) if is_valid_variable_name(name) => {
                overrides.insert(name.to_string(), value.to_string());
            }
            _ => targets.push(item.clone()),
        }
    }

    (targets, overrides)
}

fn items(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>("items")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn load_app(matches: &ArgMatches) -> Result<App> {
    match matches.get_one::<String>("file") {
        Some(path) => App::with_config_file(PathBuf::from(path)),
        None => App::new(),
    }
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<()> {
    run_from(std::env::args_os())
}

/// Run the CLI application with provided arguments
pub fn run_from<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut command = build_command();
    let matches = command.clone().get_matches_from(args);
    let verbosity = get_verbosity(&matches);

    let Some((name, sub_matches)) = matches.subcommand() else {
        command.print_help()?;
        println!();
        return Ok(());
    };

    match name {
        "completions" => {
            if let Some(shell) = sub_matches.get_one::<clap_complete::Shell>("shell") {
                completion::print_completions(*shell, &mut command);
            }
        }
        "run" => {
            let app = load_app(&matches)?;
            let (targets, overrides) = split_items(&items(sub_matches));
            app.run_targets(&targets, &overrides, verbosity, sub_matches.get_flag("dry_run"))?;
        }
        "plan" => {
            let app = load_app(&matches)?;
            let (targets, _) = split_items(&items(sub_matches));
            for task in app.plan(&targets)?.iter() {
                println!("{}", task);
            }
        }
        "list" => {
            let app = load_app(&matches)?;
            if let Some(usage) = &app.config.usage {
                let name = app.config.name.as_deref().unwrap_or("makeflow");
                println!("{}: {}", name, usage);
            }
            for line in app.task_listing(verbosity >= Verbosity::Verbose) {
                println!("{}", line);
            }
        }
        "vars" => {
            let app = load_app(&matches)?;
            let (_, overrides) = split_items(&items(sub_matches));
            for line in app.variable_listing(&overrides)? {
                println!("{}", line);
            }
        }
        _ => {
            command.print_help()?;
            println!();
        }
    }

    Ok(())
}
