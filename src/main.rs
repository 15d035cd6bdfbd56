mod commands;
mod config;
mod context;
mod lifecycle;
mod output;
mod provider;
mod reconcile;
mod resource;
mod store;
mod traits;

use clap::{Parser, Subcommand};
use commands::{MergeCommand, ReconcileCommand, StatusCommand};
use context::Context;
use std::sync::atomic::Ordering;

#[derive(Parser)]
#[command(name = "vpc-import")]
#[command(
    about = "Adopt existing AWS VPCs into a Terraform/OpenTofu project",
    long_about = "Reads the VPC IDs listed in terraform.tfvars (existing_vpc_ids), records each \
VPC's configuration in imported_vpc_configs, makes sure the matching resource and variable \
blocks exist, then runs init, import, plan and apply."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, merge, import, plan and apply every listed VPC
    Reconcile(ReconcileCommand),

    /// Discover and merge the listed VPCs without running the tool
    Merge(MergeCommand),

    /// Show what has been merged so far (no AWS or tool calls)
    Status(StatusCommand),
}

fn main() {
    let cli = Cli::parse();
    let ctx = Context::new();

    let cancelled = ctx.cancelled.clone();
    if let Err(err) = ctrlc::set_handler(move || cancelled.store(true, Ordering::SeqCst)) {
        ctx.output
            .warning(&format!("Ctrl-C will not stop the run cleanly: {}", err));
    }

    let result = match cli.command {
        Commands::Reconcile(cmd) => cmd.execute(&ctx),
        Commands::Merge(cmd) => cmd.execute(&ctx),
        Commands::Status(cmd) => cmd.execute(&ctx),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => {
            ctx.output.error(&format!("{:#}", err));
            1
        }
    };

    std::process::exit(exit_code);
}
