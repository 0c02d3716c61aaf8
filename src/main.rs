//! linchk CLI
//!
//! Checks a linearized kernel described in JSON (see [`linchk::kernel`])
//! against its declared dependencies, or prints the schedules and
//! statement-instance orderings of one statement pair.
//!
//! # Usage
//!
//! ## Check every declared dependency
//! ```bash
//! cargo run --bin linchk -- check --kernel kernel.json
//! cargo run --bin linchk -- check --kernel kernel.json --json
//! ```
//!
//! ## Inspect the orderings of one pair
//! ```bash
//! cargo run --bin linchk -- sio \
//!   --kernel kernel.json \
//!   --before j1 \
//!   --after 2 \
//!   --scope lconc
//! ```
//!
//! Logging goes through `RUST_LOG` (default `linchk=info`, `--verbose`
//! raises it to debug).

use clap::{Parser, Subcommand};
use isl_rs::Context;
use linchk::dependency::check_dependencies;
use linchk::linearization::statement_ids;
use linchk::{CheckerConfig, ConcurrencyScope, KernelDescription, SioComposer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "linchk")]
#[command(about = "Dependency-safety checker for linearized polyhedral kernels")]
#[command(version = "0.1")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check all declared dependencies of a kernel against its linearization
    ///
    /// A dependency passes when every required instance pair is ordered
    /// under the sequential, local-concurrent or global-concurrent view.
    /// Exits with an error if any dependency is violated.
    Check {
        /// Kernel description (JSON)
        #[arg(long = "kernel", short = 'k', value_name = "FILE")]
        kernel: PathBuf,

        /// Print the report as JSON
        #[arg(long = "json")]
        json: bool,

        /// Let global barriers also order lanes of a group
        #[arg(long = "global-barriers-sync-locally")]
        global_barriers_sync_locally: bool,

        /// Enable verbose output
        #[arg(long = "verbose", short = 'v')]
        verbose: bool,
    },

    /// Print schedules and statement-instance orderings for one pair
    Sio {
        /// Kernel description (JSON)
        #[arg(long = "kernel", short = 'k', value_name = "FILE")]
        kernel: PathBuf,

        /// Statement that must execute first
        #[arg(long = "before", value_name = "ID")]
        before: String,

        /// Statement that must execute second
        #[arg(long = "after", value_name = "ID")]
        after: String,

        /// Only print this scope (seq, lconc, gconc)
        #[arg(long = "scope")]
        scope: Option<ConcurrencyScope>,

        /// Print relations as built instead of coalesced
        #[arg(long = "no-coalesce")]
        no_coalesce: bool,

        /// Enable verbose output
        #[arg(long = "verbose", short = 'v')]
        verbose: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "linchk=debug" } else { "linchk=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Check {
            kernel,
            json,
            global_barriers_sync_locally,
            verbose,
        } => {
            init_logging(verbose);
            let config = CheckerConfig {
                global_barriers_sync_locally,
                ..Default::default()
            };
            run_check(kernel, json, &config)
        }
        Commands::Sio {
            kernel,
            before,
            after,
            scope,
            no_coalesce,
            verbose,
        } => {
            init_logging(verbose);
            let config = CheckerConfig {
                coalesce: !no_coalesce,
                ..Default::default()
            };
            run_sio(kernel, &before, &after, scope, &config)
        }
    }
}

fn run_check(
    kernel_path: PathBuf,
    json: bool,
    config: &CheckerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let kernel = KernelDescription::from_file(&kernel_path)?;
    let items = kernel.linearization_items()?;
    let ctx = Context::alloc();
    let composer = SioComposer::new(&ctx, &kernel, &items, config)?;
    let checks = check_dependencies(&composer, &ctx, &kernel.dependencies)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&checks)?);
    } else {
        println!("Kernel: {}", kernel.name);
        println!(
            "Linearization: {} items, {} statements",
            items.len(),
            statement_ids(&items).len()
        );
        println!("Dependencies: {}", checks.len());
        println!();
        for check in &checks {
            let status = if check.satisfied { "ok" } else { "VIOLATED" };
            let scopes: Vec<String> = check.covered_by.iter().map(|s| s.to_string()).collect();
            println!(
                "  {} -> {}: {} [{}]",
                check.dependency.before,
                check.dependency.after,
                status,
                scopes.join(", ")
            );
            if !check.satisfied {
                println!("    unordered: {}", check.violations);
            }
        }
    }

    let violated = checks.iter().filter(|c| !c.satisfied).count();
    if violated > 0 {
        return Err(format!(
            "{} of {} dependencies violated by the linearization",
            violated,
            checks.len()
        )
        .into());
    }
    Ok(())
}

fn run_sio(
    kernel_path: PathBuf,
    before: &str,
    after: &str,
    scope: Option<ConcurrencyScope>,
    config: &CheckerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let kernel = KernelDescription::from_file(&kernel_path)?;
    let items = kernel.linearization_items()?;
    let ctx = Context::alloc();
    let composer = SioComposer::new(&ctx, &kernel, &items, config)?;
    let partition = composer.partition();
    println!(
        "Sequential inames: {:?}",
        partition.sequential.iter().collect::<Vec<_>>()
    );
    println!("Hardware coordinates: {:?}", partition.hw_var_names());
    println!();

    let scopes: Vec<ConcurrencyScope> = match scope {
        Some(scope) => vec![scope],
        None => ConcurrencyScope::ALL.to_vec(),
    };
    for scope in scopes {
        let ordering = composer.ordering(before, after, scope)?;
        println!("=== {} ===", scope);
        println!("{}", ordering.schedule.builder);
        println!("before: {}", ordering.schedule.map_before.to_str());
        println!("after:  {}", ordering.schedule.map_after.to_str());
        println!("SIO:    {}", ordering.sio.to_str());
        println!();
    }
    Ok(())
}
