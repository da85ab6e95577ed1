use clap::{Parser, Subcommand};
use runvm::daemon::{detach_session, run_daemon};
use runvm::logging::{init_cli_logging, init_daemon_logging};
use runvm::splice::Stdio;
use runvm::splice::tty::{interrupted, watch_resize};
use runvm::{
    Console, ContainerLayout, RuntimeOptions, StartConfigInput, StartOrchestrator,
};
use runvm_shared::constants::GENERIC_FAILURE_STATUS;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "runvm")]
#[command(about = "Run OCI containers inside lightweight VMs", long_about = None)]
struct Cli {
    /// Root directory for container state
    #[arg(long, global = true, default_value = "/run/runvm")]
    root: PathBuf,

    /// Container ID
    #[arg(long, global = true, default_value = "")]
    id: String,

    /// Container backend: process, kvm, qemu, xen or vbox
    #[arg(long, global = true, default_value = "process")]
    driver: String,

    /// Guest kernel image
    #[arg(long, global = true)]
    kernel: Option<String>,

    /// Guest initrd image
    #[arg(long, global = true)]
    initrd: Option<String>,

    /// VirtualBox disk image
    #[arg(long, global = true)]
    vbox: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and run a container, attaching to its console
    Start {
        /// OCI config file, relative to the bundle directory
        #[arg(short = 'c', long, default_value = "config.json")]
        config_file: PathBuf,

        /// Platform runtime file, relative to the bundle directory
        #[arg(short = 'r', long, default_value = "runtime.json")]
        runtime_file: PathBuf,
    },

    /// Per-container supervisor (started by `start`)
    #[command(hide = true)]
    Daemon,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let status = match cli.command {
        Commands::Start {
            ref config_file,
            ref runtime_file,
        } => {
            init_cli_logging();
            let input = StartConfigInput {
                name: cli.id.clone(),
                root: cli.root.clone(),
                options: RuntimeOptions {
                    driver: cli.driver.clone(),
                    kernel: cli.kernel.clone(),
                    initrd: cli.initrd.clone(),
                    vbox: cli.vbox.clone(),
                },
                config_file: config_file.clone(),
                runtime_file: runtime_file.clone(),
                bundle_path: None,
            };
            start(input).await
        }
        Commands::Daemon => daemon(cli.root, &cli.id).await,
    };

    // Exit without tearing down the runtime: a blocked stdin read would
    // otherwise keep the process alive.
    std::process::exit(status);
}

async fn start(input: StartConfigInput) -> i32 {
    let resize = watch_resize().unwrap_or_else(|e| {
        tracing::warn!("Terminal resize tracking disabled: {}", e);
        None
    });
    let console = Console::new(Stdio::inherit())
        .with_resize(resize)
        .with_interrupt(Box::pin(interrupted()))
        .with_raw_mode(true);

    let result = match StartOrchestrator::for_current_exe() {
        Ok(orchestrator) => orchestrator.start(input, console).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(status) => status,
        Err(e) => {
            // Declined requests (exit 0) are reported the same way
            eprintln!("runvm: {}", e);
            e.exit_status()
        }
    }
}

async fn daemon(root: PathBuf, id: &str) -> i32 {
    detach_session();

    if id.is_empty() {
        return GENERIC_FAILURE_STATUS;
    }
    let layout = ContainerLayout::new(root, id);
    let guard = match init_daemon_logging(&layout) {
        Ok(guard) => guard,
        Err(_) => return GENERIC_FAILURE_STATUS,
    };

    tracing::info!(
        container = %id,
        pid = std::process::id(),
        "Supervisor starting"
    );
    let status = match run_daemon(layout).await {
        Ok(status) => status,
        Err(e) => {
            tracing::error!("Supervisor failed: {}", e);
            GENERIC_FAILURE_STATUS
        }
    };

    // Flush buffered log lines before process::exit skips destructors
    drop(guard);
    status
}
