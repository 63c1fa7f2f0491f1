//! Route Gateway
//!
//! Host- and path-routed HTTP gateway with failover across backend pools.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ routing table ──┬──▶ local handler
//!                                                     │
//!                                                     └──▶ pipeline ──▶ selector ──▶ backend
//!                                                              ▲            │
//!                                                              └─ breaker ◀─┘
//!
//!     Cross-cutting: config (+ hot reload), health reactivator, admin API,
//!                    observability, lifecycle
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(name = "route-gateway", version, about = "Host and path routed HTTP gateway")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match route_gateway::lifecycle::startup::run_from_file(&args.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            eprintln!("route-gateway: {e}");
            ExitCode::FAILURE
        }
    }
}
