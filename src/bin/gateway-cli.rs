use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the route gateway admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routes with backend counters
    Statistics,
    /// Add a reverse proxy route from a JSON file
    AddRoute {
        /// JSON RouteConfig (name, domain, path, proxyEnable, proxyServers)
        file: PathBuf,
    },
    /// Delete a reverse proxy route by name
    DeleteRoute { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Statistics => {
            client
                .get(format!("{}/statistics", cli.url))
                .send()
                .await?
        }
        Commands::AddRoute { file } => {
            let route: Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            client
                .post(format!("{}/routes/add", cli.url))
                .json(&route)
                .send()
                .await?
        }
        Commands::DeleteRoute { name } => {
            client
                .post(format!("{}/routes/delete", cli.url))
                .json(&serde_json::json!({ "name": name }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await?;

    if !status.is_success() {
        let error = body["Meta"]["Error"].as_str().unwrap_or("unknown error");
        eprintln!("Error ({}): {}", status, error);
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&body["Objects"])?);
    Ok(())
}
