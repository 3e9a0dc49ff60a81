mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Args, Command};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging (default to warn when RUST_LOG is absent)
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("uescope=warn,uescope_core=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match args.command {
        Command::Processes => commands::processes::run(),
        Command::Version { target } => commands::bases::run_version(&target),
        Command::Bases { target } => commands::bases::run(&target),
        Command::Names { target } => commands::parse::run_names(&target),
        Command::Objects { target } => commands::parse::run_objects(&target),
        Command::Packages { target, json } => commands::browse::run_packages(&target, json),
        Command::List {
            target,
            package,
            category,
            json,
        } => commands::browse::run_list(&target, &package, &category, json),
        Command::Search {
            target,
            query,
            mode,
            json,
        } => commands::search::run(&target, &query, &mode, json),
        Command::Details {
            target,
            address,
            json,
        } => commands::inspect::run_details(&target, &address, json),
        Command::Fname { target, id } => commands::inspect::run_fname(&target, id),
        Command::Analyze { target, address } => commands::inspect::run_analyze(&target, &address),
        Command::Inspect { target, address } => commands::inspect::run_hierarchy(&target, &address),
        Command::Instance {
            target,
            instance,
            class,
            json,
        } => commands::inspect::run_instance(&target, &instance, &class, json),
        Command::Array {
            target,
            address,
            inner_type,
            count,
            json,
        } => commands::inspect::run_array(&target, &address, &inner_type, count, json),
        Command::Instances { target, class } => commands::inspect::run_instances(&target, &class),
    }
}
