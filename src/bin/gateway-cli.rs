use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the Sentinel gateway", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://localhost:8081", env = "SENTINEL_ADMIN_URL")]
    url: String,

    /// Admin bearer token
    #[arg(short, long, env = "SENTINEL_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway status (breaker, kill switch, limits)
    Status,
    /// Inspect the circuit breaker
    Breaker,
    /// Force the circuit breaker closed
    ResetBreaker,
    /// Show or set the global kill switch
    KillSwitch {
        #[arg(value_enum)]
        action: Option<Toggle>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Breaker => client.get(format!("{}/admin/breaker", base)),
        Commands::ResetBreaker => client.post(format!("{}/admin/breaker/reset", base)),
        Commands::KillSwitch { action: None } => client.get(format!("{}/admin/kill-switch", base)),
        Commands::KillSwitch { action: Some(toggle) } => client
            .put(format!("{}/admin/kill-switch", base))
            .json(&json!({ "active": matches!(toggle, Toggle::On) })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
