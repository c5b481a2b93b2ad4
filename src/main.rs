//! Contentfaux - CLI Entry Point

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use contentfaux::config::{SettingsLayer, SETTINGS_FILE};
use contentfaux::{
    Command, Controller, HttpSource, LoopbackHook, ProcessHook, RunOutcome, Settings,
    TransportHook,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Mode {
    /// Serve fixtures on the loopback listener until interrupted
    #[default]
    Stub,
    /// Clear interception in this process only; a running `stub` server
    /// is stopped with Ctrl-C
    Unstub,
    /// Sync fixtures from the live content API
    Setup,
}

impl From<Mode> for Command {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Stub => Command::Stub,
            Mode::Unstub => Command::Unstub,
            Mode::Setup => Command::Setup,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "contentfaux",
    about = "Local test-double for a content API - fixture sync and request stubbing",
    version
)]
struct Args {
    /// What to do
    #[arg(value_enum, default_value_t = Mode::Stub)]
    mode: Mode,

    /// Use the preview API instead of the CDN
    #[arg(long)]
    preview: bool,

    /// Project root (defaults to the current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Settings file (defaults to <root>/contentfaux.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address for the loopback stub server
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print an example settings file and exit
    #[arg(long)]
    print_config: bool,
}

fn resolve_settings(args: &Args) -> Result<Settings> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    let env = SettingsLayer::from_process_env()?;
    let file = match &args.config {
        Some(path) => {
            info!(path = ?path, "Loading settings");
            SettingsLayer::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => SettingsLayer::from_project(&root)?,
    };
    let manifest = SettingsLayer::from_package_manifest(&root)?;

    let mut settings = Settings::merge(&[env, file, manifest], &root);
    if args.preview {
        settings.preview = true;
    }
    if let Some(listen) = args.listen {
        settings.listen = listen;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let example = include_str!("../contentfaux.example.yaml");
        println!("# {}\n{}", SETTINGS_FILE, example);
        return Ok(());
    }

    let settings = resolve_settings(&args)?;
    let source = Arc::new(HttpSource::new()?);

    match args.mode {
        Mode::Stub => {
            let hook = Arc::new(LoopbackHook::new(settings.listen));
            let mut controller = Controller::new(settings, hook.clone(), source);
            let outcome = controller.run(Mode::Stub.into()).await?;
            if let RunOutcome::Stubbed { fixtures } = outcome {
                let addr = hook
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_default();
                println!("Serving {} fixtures on http://{} (Ctrl-C to stop)", fixtures, addr);
            }

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            controller.unstub();
            println!("Stubbing stopped");
        }
        mode => {
            let hook: Arc<dyn TransportHook> = Arc::new(ProcessHook);
            let mut controller = Controller::new(settings, hook, source);
            match controller.run(mode.into()).await? {
                RunOutcome::Synced(written) => {
                    println!(
                        "Wrote {} fixtures to {}",
                        written.len(),
                        controller.settings().fixture_dir.display()
                    );
                    for name in written.keys() {
                        println!("  - {}", name);
                    }
                }
                RunOutcome::Unstubbed => {
                    println!("No interception active in this process; stop a running stub server with Ctrl-C")
                }
                RunOutcome::Stubbed { .. } => {}
            }
        }
    }

    Ok(())
}
