use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "iplocate-cli")]
#[command(about = "Command-line client for the iplocate server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:4000")]
    url: String,

    #[arg(short, long, default_value = "http://localhost:9090")]
    metrics_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the server's public address and greet NAME
    Locate {
        name: String,
    },
    /// Print the Prometheus scrape output
    Metrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Locate { name } => {
            let res = client
                .post(format!("{}/api", cli.url.trim_end_matches('/')))
                .json(&json!({ "name": name }))
                .send()
                .await?;
            print_locate(res).await?;
        }
        Commands::Metrics => {
            let res = client
                .get(format!("{}/metrics", cli.metrics_url.trim_end_matches('/')))
                .send()
                .await?;
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                eprintln!("Error: metrics endpoint returned status {}", status);
                eprintln!("Response: {}", text);
                std::process::exit(1);
            }
            print!("{}", text);
        }
    }

    Ok(())
}

async fn print_locate(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await?;

    if !status.is_success() {
        let message = body.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        eprintln!("Error ({}): {}", status, message);
        std::process::exit(1);
    }

    match body.get("result").and_then(Value::as_str) {
        Some(result) => println!("{}", result),
        None => println!("{}", serde_json::to_string_pretty(&body)?),
    }
    Ok(())
}
