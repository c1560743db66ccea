use crate::demo::{run_demo, DemoArgs};
use crate::server;
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::workflows::applications::{CountdownState, FileReferenceStore, ReferenceSlot};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Admissions",
    about = "Run the school admissions service and inspect application references",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect or discard the locally stored application reference
    Reference {
        #[command(subcommand)]
        command: ReferenceCommand,
    },
    /// Walk one application through all five wizard steps in-process
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ReferenceCommand {
    /// Show the stored reference and how long the payment window stays open
    Status(ReferenceArgs),
    /// Forget the stored reference so the next application starts fresh
    Clear(ReferenceArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
struct ReferenceArgs {
    /// Reference file to use instead of ADMISSIONS_REFERENCE_STORE
    #[arg(long)]
    path: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Reference {
            command: ReferenceCommand::Status(args),
        } => reference_status(args),
        Command::Reference {
            command: ReferenceCommand::Clear(args),
        } => reference_clear(args),
        Command::Demo(args) => run_demo(args).await,
    }
}

/// The client reference file: an explicit path, else the configured store.
pub(crate) fn reference_path(path: Option<PathBuf>) -> Result<PathBuf, AppError> {
    match path {
        Some(path) => Ok(path),
        None => Ok(AppConfig::load()?.admissions.reference_store),
    }
}

fn reference_slot(args: ReferenceArgs) -> Result<ReferenceSlot<FileReferenceStore>, AppError> {
    Ok(ReferenceSlot::new(FileReferenceStore::new(reference_path(
        args.path,
    )?)))
}

fn reference_status(args: ReferenceArgs) -> Result<(), AppError> {
    let slot = reference_slot(args)?;
    match slot.retrieve()? {
        Some(artifact) => {
            let countdown = CountdownState::at(&artifact, Utc::now());
            println!("Reference: {}", artifact.code);
            println!("Issued:    {}", artifact.created_at.to_rfc3339());
            println!("Expires:   {}", artifact.expires_at().to_rfc3339());
            println!("Window:    {}", countdown.label());
            if countdown.is_expired() {
                println!("The payment window has closed; start a new application.");
            }
        }
        None => println!("No application in progress."),
    }
    Ok(())
}

fn reference_clear(args: ReferenceArgs) -> Result<(), AppError> {
    let slot = reference_slot(args)?;
    slot.clear()?;
    println!("Stored reference cleared.");
    Ok(())
}
