//! Stitch CLI entrypoint.
//!
//! This is the main entrypoint for the stitch command-line tool.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stitch::batch::BatchRunner;
use stitch::cli::{BatchArgs, Cli, Commands, HostSites, OutputFormatter};
use stitch::config::{ConfigParser, ConfigValidator, StitchConfig, find_config_file, load_dotenv};
use stitch::error::{ConfigError, Result, StitchError};
use stitch::exec::executor_for;
use stitch::ops::{CONFIG_TEMPLATE, Fetcher, OperationKind, SiteOperations, TemplateRenderer, builtin};
use stitch::resolver::Resolver;
use stitch::session::SessionBuilder;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status for errors raised before any host was contacted.
const CONFIG_ERROR_EXIT: u8 = 2;

/// Main entrypoint.
fn main() -> ExitCode {
    // `.env` must be loaded before clap reads `STITCH_*` defaults.
    let args: Vec<OsString> = std::env::args_os().collect();
    let env_error = preload_dotenv(&args).err();

    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);
    if let Some(e) = env_error {
        eprintln!("Error: {e}");
        return ExitCode::from(CONFIG_ERROR_EXIT);
    }

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_configuration() {
                ExitCode::from(CONFIG_ERROR_EXIT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Loads the `.env` next to the configuration file named by `--config`,
/// `STITCH_CONFIG`, or found by walking up from the current directory.
fn preload_dotenv(args: &[OsString]) -> Result<()> {
    let config_file = Cli::config_from_args(args)
        .or_else(|| std::env::var_os("STITCH_CONFIG").map(PathBuf::from))
        .or_else(|| find_config_file(".").ok());

    if let Some(config_file) = config_file {
        load_dotenv(&config_file)?;
    }
    Ok(())
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

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

/// Main async entry point. Returns false when a command ran but failed.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);

    if let Some((kind, args)) = cli.command.batch() {
        return cmd_batch(&cli, kind, args, &formatter).await;
    }

    match &cli.command {
        Commands::Init { path, force } => cmd_init(path, *force, &formatter),
        Commands::Validate { warnings } => {
            cmd_validate(cli.config.as_ref(), *warnings, &formatter)
        }
        Commands::Sites => cmd_sites(&cli, &formatter),
        Commands::Show { site } => cmd_show(&cli, site, &formatter),
        Commands::Setup(_) | Commands::Deploy(_) | Commands::Stage(_) => Ok(true),
    }
}

/// Write a starter configuration.
fn cmd_init(path: &Path, force: bool, formatter: &OutputFormatter) -> Result<bool> {
    info!("Initializing stitch configuration in: {}", path.display());

    let config_path = path.join("stitch.yml");
    if !force && config_path.exists() {
        eprintln!(
            "{}",
            formatter.warning(&format!(
                "Configuration file already exists: {} (use --force to overwrite)",
                config_path.display()
            ))
        );
        return Ok(true);
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let template = builtin(CONFIG_TEMPLATE)
        .ok_or_else(|| StitchError::internal("Starter configuration template is missing"))?;
    std::fs::write(&config_path, template)?;

    println!(
        "{}",
        formatter.success(&format!("Created: {}", config_path.display()))
    );
    Ok(true)
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let config = parse_config(&config_file)?;
    let result = ConfigValidator::new().check(&config);

    println!("{}", formatter.format_validation(&result, show_warnings));

    if result.is_valid() {
        debug!(
            hosts = config.host_names().len(),
            sites = config.all_site_keys().len(),
            "Configuration summary"
        );
    }
    Ok(result.is_valid())
}

/// Run `setup`, `deploy` or `stage` on every selected host.
async fn cmd_batch(
    cli: &Cli,
    kind: OperationKind,
    args: &BatchArgs,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let config = load_config(cli.config.as_ref())?;
    let resolver = Resolver::new(&config)?;
    let hosts = select_hosts(cli, &config, &resolver, false)?;

    // Every host's batch is built up front so a bad site name aborts
    // before any host is contacted.
    let builder = SessionBuilder::new(&resolver);
    let batches = hosts
        .iter()
        .map(|host| builder.build_batch(host, &args.sites))
        .collect::<Result<Vec<_>>>()?;

    let renderer = cli
        .templates
        .as_ref()
        .map_or_else(TemplateRenderer::new, TemplateRenderer::with_override_dir);
    let operation = SiteOperations::new(kind, renderer, Fetcher::new()?, args.install_options());

    let mut all_succeeded = true;
    for batch in &batches {
        let exec = executor_for(&batch.host);
        let runner = BatchRunner::new(exec.as_ref()).with_fail_fast(args.fail_fast);
        let report = runner.run(batch, &operation).await;

        if !report.success() {
            error!(run_id = %report.run_id, "{report}");
            all_succeeded = false;
        }
        println!("{}", formatter.format_report(&report));
    }

    Ok(all_succeeded)
}

/// List the applicable sites of the selected hosts, or of every host.
fn cmd_sites(cli: &Cli, formatter: &OutputFormatter) -> Result<bool> {
    let config = load_config(cli.config.as_ref())?;
    let resolver = Resolver::new(&config)?;
    let hosts = select_hosts(cli, &config, &resolver, true)?;

    let listing = hosts
        .iter()
        .map(|host| {
            let entry = resolver.effective_host(host)?;
            Ok(HostSites {
                host: entry.shortname,
                hostname: entry.hostname,
                sites: resolver.applicable_sites(host)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    println!("{}", formatter.format_sites(&listing));
    Ok(true)
}

/// Show the effective settings of a site on the selected hosts.
fn cmd_show(cli: &Cli, site: &str, formatter: &OutputFormatter) -> Result<bool> {
    let config = load_config(cli.config.as_ref())?;
    let resolver = Resolver::new(&config)?;

    for host in select_hosts(cli, &config, &resolver, false)? {
        if !resolver.is_site_on_host(site, &host)? {
            eprintln!(
                "{}",
                formatter.warning(&format!("Site '{site}' is not deployed on host '{host}'"))
            );
        }
        let settings = resolver.effective_site(site, &host)?;
        println!("{}", formatter.format_settings(&settings)?);
    }
    Ok(true)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads the configuration file.
fn parse_config(config_file: &Path) -> Result<StitchConfig> {
    ConfigParser::new().load_file(config_file)
}

/// Loads and validates the configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<StitchConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let config = parse_config(&config_file)?;
    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok(config)
}

/// Picks the host short names to operate on.
///
/// `--host` names one host, `--role` every host of a role in order. Without
/// either, the host declaring this machine's hostname is used, or every
/// host when `all_by_default` is set.
fn select_hosts(
    cli: &Cli,
    config: &StitchConfig,
    resolver: &Resolver<'_>,
    all_by_default: bool,
) -> Result<Vec<String>> {
    if let Some(name) = &cli.host {
        return Ok(vec![resolver.find_host(name)?.shortname]);
    }

    if let Some(role) = &cli.role {
        let roles = config.roles_to_hostnames();
        let hostnames = roles.get(role).ok_or_else(|| {
            ConfigError::validation(format!("Unknown role '{role}'"), "roles")
        })?;
        return hostnames
            .iter()
            .map(|hostname| resolver.shortname_for(hostname).map(str::to_string))
            .collect();
    }

    if all_by_default {
        return Ok(config.host_names().into_iter().map(str::to_string).collect());
    }

    let local = hostname::get()
        .map_err(|e| StitchError::internal(format!("Cannot read this machine's hostname: {e}")))?;
    let local = local.to_string_lossy();
    debug!("No host selected, using this machine: {local}");
    Ok(vec![resolver.shortname_for(&local)?.to_string()])
}
