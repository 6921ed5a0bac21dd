//! `pakrt`: an educational Linux container runtime CLI.
//!
//! Grounded on `youki`'s `main.rs` (global-opts + subcommand `clap::Parser`, one function
//! per subcommand under `commands::`) and `logger::init`/`observability.rs` for the
//! ambient logging setup, adapted to pakrt's own 11-subcommand surface instead of the OCI
//! `StandardCmd`/`CommonCmd` split.

mod commands;
mod logger;

use clap::{Parser, Subcommand};
use pakrt_container::Config;

#[derive(Parser, Debug)]
#[command(name = "pakrt", version, about = "An educational Linux container runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// Enable debug logging (forces trace level).
    #[arg(long, global = true)]
    debug: bool,

    /// Enable the background resource monitor.
    #[arg(long, global = true)]
    monitor: bool,

    /// Run without root privileges, using user namespaces and a per-user base directory.
    #[arg(long, global = true)]
    rootless: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a container's directory tree, rootfs, namespaces, network, and cgroups.
    CreateContainer {
        name: String,
        #[arg(long, default_value_t = 128)]
        ram: i64,
        #[arg(long, default_value_t = 50)]
        cpu: i64,
        #[arg(long)]
        hostname: Option<String>,
    },
    /// List every known container with its status, resources, and network address.
    ListContainers,
    /// Launch the init process of a created container.
    RunContainer {
        name: String,
        command: Option<String>,
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
        #[arg(long)]
        detach: bool,
    },
    /// Stop and remove a container.
    DeleteContainer {
        name: String,
        #[arg(long)]
        force: bool,
    },
    /// Sweep orphaned host resources, then delete every known container.
    CleanupAll,
    /// Detect and repair inconsistencies for one container, or every container if none is
    /// named.
    RecoverState { name: Option<String> },
    /// Run the platform/disk/cgroup/shell readiness checks.
    ValidateSystem,
    /// Interactively confirm, then sweep every orphaned host resource.
    EmergencyCleanup,
    /// Poll a container's cgroup usage at a fixed interval.
    Monitor {
        name: String,
        #[arg(default_value_t = 2)]
        seconds: u64,
    },
    /// Render the host/container/veth network adjacency.
    ShowTopology,
    /// Audit permissions and ownership for the system, or for one container.
    SecurityAudit {
        #[arg(default_value = "all")]
        scope: String,
        name: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    config.apply_cli_overrides(cli.verbose, cli.debug, cli.monitor, cli.rootless);
    logger::init(&config);

    tracing::debug!(
        euid = %nix::unistd::geteuid(),
        args = ?std::env::args_os(),
        "pakrt starting"
    );

    let exit_code = match run(&cli, config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            if let Some(hint) = commands::remediation_hint(&err) {
                eprintln!("hint: {hint}");
            }
            commands::exit_code_for(&err)
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: &Cli, config: Config) -> anyhow::Result<()> {
    pakrt_container::rollback::install_signal_handlers();

    match &cli.command {
        Commands::CreateContainer {
            name,
            ram,
            cpu,
            hostname,
        } => commands::lifecycle::create(config, name, *ram, *cpu, hostname.as_deref()),
        Commands::ListContainers => commands::lifecycle::list(config),
        Commands::RunContainer {
            name,
            command,
            args,
            detach,
        } => commands::lifecycle::run(config, name, command.as_deref(), args, *detach),
        Commands::DeleteContainer { name, force } => {
            commands::lifecycle::delete(config, name, *force)
        }
        Commands::CleanupAll => commands::integrity::cleanup_all(config),
        Commands::RecoverState { name } => commands::integrity::recover_state(config, name.as_deref()),
        Commands::ValidateSystem => commands::integrity::validate_system(config),
        Commands::EmergencyCleanup => commands::integrity::emergency_cleanup(config),
        Commands::Monitor { name, seconds } => commands::report::monitor(config, name, *seconds),
        Commands::ShowTopology => commands::report::show_topology(config),
        Commands::SecurityAudit { scope, name } => {
            commands::report::security_audit(config, scope, name.as_deref())
        }
    }
}
