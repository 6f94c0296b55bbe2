//! Stratus CLI entrypoint.
//!
//! This is the main entrypoint for the stratus command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stratus_deploy::cli::{Cli, Commands, OutputFormatter, StateCommands};
use stratus_deploy::config::{find_config_file, ConfigParser, ConfigValidator, StackConfig};
use stratus_deploy::error::{ConfigError, Result};
use stratus_deploy::network::ConfiguredZones;
use stratus_deploy::planner::{DiffEngine, PlanExecutor, StackHasher, StackPlan};
use stratus_deploy::stack::{declare_stack, plan_layout, DeclaredStack, DocumentFormat, StackDocument};
use stratus_deploy::state::{load_stack, LocalStateStore, StackLock, StateStore, STATE_DIR};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_retryable() {
                eprintln!("The state is busy; retry once the other run has finished.");
            }
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Subnets => cmd_subnets(config_path, &formatter),
        Commands::Graph { dependencies } => cmd_graph(config_path, dependencies, &formatter),
        Commands::Plan { detailed } => cmd_plan(config_path, detailed, &formatter).await,
        Commands::Apply { yes, format, out } => {
            cmd_apply(config_path, yes, format, out.as_deref(), &formatter).await
        }
        Commands::Outputs => cmd_outputs(config_path, &formatter),
        Commands::Destroy { yes } => cmd_destroy(config_path, yes, &formatter).await,
        Commands::State { command } => cmd_state(config_path, command, &formatter).await,
    }
}

/// Initialize a new project.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing new stratus project in: {}", path.display());

    let config_path = path.join("stratus.stack.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    // Create directory if needed
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    // Write config template
    let config_template = include_str!("../templates/stratus.stack.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    // Write .env.example
    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    // Write/update .gitignore
    let state_entry = format!("{STATE_DIR}/");
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let has_env = existing.lines().any(|l| l.trim() == ".env");
        let has_state = existing.contains(STATE_DIR);
        if !has_env || !has_state {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# stratus")?;
            if !has_env {
                writeln!(file, ".env")?;
            }
            if !has_state {
                writeln!(file, "{state_entry}")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, format!(".env\n{state_entry}\n"))?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in the secrets");
    eprintln!("  2. Edit stratus.stack.yaml with your network and services");
    eprintln!("  3. Run 'stratus validate' to check your configuration");
    eprintln!("  4. Run 'stratus plan' to see what changed since the last apply");
    eprintln!("  5. Run 'stratus apply' to render the stack document");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;

    let result = ConfigValidator::new().check(&config);
    println!("{}", formatter.format_validation(&result, &config, show_warnings));

    if result.is_valid() {
        Ok(())
    } else {
        Err(ConfigError::validation_general(format!(
            "{} error(s) found",
            result.error_count()
        ))
        .into())
    }
}

/// Show zone selection and subnet blocks.
fn cmd_subnets(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _) = load_valid_config(config_path)?;
    let (_, layout) = plan_layout(&config, &zone_source(&config))?;

    println!("{}", formatter.format_subnets(&layout));
    Ok(())
}

/// Show the resource graph in build order.
fn cmd_graph(
    config_path: Option<&PathBuf>,
    show_dependencies: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_valid_config(config_path)?;
    let stack = declare(&config)?;
    let order = stack.graph.topological_order()?;

    println!("{}", formatter.format_graph(&stack.graph, &order, show_dependencies));
    Ok(())
}

/// Show the stack plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, parser, state_store) = load_config_and_state(config_path)?;
    parser.validate_required_env(&config)?;

    let stack = declare(&config)?;
    let state = load_stack(&state_store, &config.project.name, &config.project.environment).await?;

    let config_hash = StackHasher::new().hash_config(&config);
    let diff = DiffEngine::new().compute_diff(&stack.graph, Some(&state));
    let plan = StackPlan::from_diff(&diff, &config_hash);

    println!("{}", formatter.format_plan(&plan));
    if detailed && diff.has_changes() {
        println!("{}", formatter.format_diff_details(&diff));
    }

    Ok(())
}

/// Render the stack document and record the plan.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    format: DocumentFormat,
    out: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, parser, state_store) = load_config_and_state(config_path)?;
    parser.validate_required_env(&config)?;
    let stack = declare(&config)?;

    let lock = state_store.lock(&stack_id(&config), "", "apply").await?;
    let result = apply_locked(
        &config,
        &stack,
        &state_store,
        &lock,
        &ApplyOptions {
            auto_approve,
            format,
            out,
        },
        formatter,
    )
    .await;
    release(&state_store, &lock).await;

    result
}

/// Options for a single apply run.
struct ApplyOptions<'a> {
    auto_approve: bool,
    format: DocumentFormat,
    out: Option<&'a Path>,
}

/// Apply body, run while `lock` is held.
async fn apply_locked(
    config: &StackConfig,
    stack: &DeclaredStack,
    state_store: &LocalStateStore,
    lock: &StackLock,
    options: &ApplyOptions<'_>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut state =
        load_stack(state_store, &config.project.name, &config.project.environment).await?;

    let hasher = StackHasher::new();
    let config_hash = hasher.hash_config(config);
    let diff = DiffEngine::new().compute_diff(&stack.graph, Some(&state));
    let plan = StackPlan::from_diff(&diff, &config_hash);

    println!("{}", formatter.format_plan(&plan));

    if !plan.is_empty() && !options.auto_approve && !confirm("Do you want to apply this plan? [y/N]: ", "y")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    let extension = options.format.extension();
    let document_path = options
        .out
        .map_or_else(|| state_store.document_file(extension), Path::to_path_buf);
    StackDocument::new(config, stack, &hasher)
        .write_to(&document_path, options.format)
        .await?;
    eprintln!("Stack document: {}", document_path.display());

    let rerendered =
        state.record_document(&document_path, extension, &hasher.hash_graph(&stack.graph));
    if plan.is_empty() && !rerendered {
        eprintln!("{}", formatter.success("No changes to record."));
        return Ok(());
    }

    let result = PlanExecutor::new(&stack.graph).execute(&plan, &mut state);
    state.outputs = stack.outputs.keys().cloned().collect();
    state_store.save(&state, lock).await?;

    println!("{}", formatter.format_execution(&result));
    Ok(())
}

/// Show published outputs.
fn cmd_outputs(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _) = load_valid_config(config_path)?;
    let stack = declare(&config)?;

    println!("{}", formatter.format_outputs(&stack.outputs));
    Ok(())
}

/// Record the stack as destroyed.
async fn cmd_destroy(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _, state_store) = load_config_and_state(config_path)?;

    let lock = state_store.lock(&stack_id(&config), "", "destroy").await?;
    let result = destroy_locked(&config, &state_store, &lock, auto_approve, formatter).await;
    release(&state_store, &lock).await;

    result
}

/// Destroy body, run while `lock` is held.
async fn destroy_locked(
    config: &StackConfig,
    state_store: &LocalStateStore,
    lock: &StackLock,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut state =
        load_stack(state_store, &config.project.name, &config.project.environment).await?;

    if state.resources.is_empty() {
        eprintln!("{}", formatter.warning("No resources recorded; nothing to destroy."));
        return Ok(());
    }

    eprintln!("The following resources will be destroyed:");
    for resource in state.ordered_resources().iter().rev() {
        eprintln!("  - {} ({})", resource.name, resource.kind);
    }

    if !auto_approve && !confirm("\nType 'destroy' to confirm: ", "destroy")? {
        eprintln!("Destruction cancelled.");
        return Ok(());
    }

    let removed = PlanExecutor::destroy(&mut state);
    state_store.save(&state, lock).await?;

    eprintln!(
        "{}",
        formatter.success(&format!("Recorded destruction of {} resources.", removed.len()))
    );
    Ok(())
}

/// State management commands.
async fn cmd_state(
    config_path: Option<&PathBuf>,
    command: StateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _, state_store) = load_config_and_state(config_path)?;

    match command {
        StateCommands::Show => {
            if let Some(state) = state_store.load().await? {
                println!("{}", formatter.format_state(&state));
            } else {
                eprintln!("No state found.");
            }
            match state_store.current_lock().await? {
                Some(lock) if lock.is_expired() => {
                    eprintln!("Lapsed lock left by {} ({})", lock.holder, lock.command);
                }
                Some(lock) => eprintln!("{}", lock.describe()),
                None => {}
            }
        }
        StateCommands::Lock { holder } => {
            let holder = holder.as_deref().unwrap_or("");
            let lock = state_store.lock(&stack_id(&config), holder, "lock").await?;
            eprintln!("State locked: {}", lock.lock_id);
        }
        StateCommands::Unlock { lock_id, force } => {
            let target = if force {
                state_store.current_lock().await?.map(|lock| lock.lock_id)
            } else {
                lock_id
            };
            match target {
                Some(id) => {
                    if state_store.unlock(&id).await? {
                        eprintln!("State unlocked.");
                    } else {
                        eprintln!("{}", formatter.warning(&format!("Lock {id} is not held.")));
                    }
                }
                None if force => eprintln!("State is not locked."),
                None => eprintln!("Please provide --lock-id or use --force"),
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads `.env` and the configuration, with environment overrides applied.
fn load_config(config_path: Option<&PathBuf>) -> Result<(StackConfig, ConfigParser)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    Ok((config, parser))
}

/// Loads the configuration and rejects it on the first validation error.
fn load_valid_config(config_path: Option<&PathBuf>) -> Result<(StackConfig, ConfigParser)> {
    let (config, parser) = load_config(config_path)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok((config, parser))
}

/// Loads a validated configuration and its state store.
fn load_config_and_state(
    config_path: Option<&PathBuf>,
) -> Result<(StackConfig, ConfigParser, LocalStateStore)> {
    let (config, parser) = load_valid_config(config_path)?;
    let config_file = resolve_config_path(config_path)?;
    let base = config_dir(&config_file);

    let state_dir = config
        .state
        .path
        .as_ref()
        .map_or_else(|| base.join(STATE_DIR), |path| base.join(path));
    debug!("Using state directory: {}", state_dir.display());

    Ok((config, parser, LocalStateStore::in_dir(state_dir)))
}

/// Directory holding the configuration file.
fn config_dir(config_file: &Path) -> PathBuf {
    config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Zones come from the configuration; the engine owns provider lookups.
fn zone_source(config: &StackConfig) -> ConfiguredZones {
    ConfiguredZones::new(config.network.availability_zones.clone())
}

/// Runs the declaration pass.
fn declare(config: &StackConfig) -> Result<DeclaredStack> {
    declare_stack(config, &zone_source(config))
}

/// `project/environment`, the name a lock guards.
fn stack_id(config: &StackConfig) -> String {
    format!("{}/{}", config.project.name, config.project.environment)
}

/// Releases `lock`, logging instead of failing the command.
async fn release(state_store: &LocalStateStore, lock: &StackLock) {
    match state_store.unlock(&lock.lock_id).await {
        Ok(true) => {}
        Ok(false) => warn!("Lock {} was taken over before release", lock.lock_id),
        Err(e) => warn!("Failed to release state lock: {e}"),
    }
}

/// Prompts on stderr and compares the answer.
fn confirm(prompt: &str, expected: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case(expected))
}
