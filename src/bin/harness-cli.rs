use clap::{Parser, Subcommand};
use harness_server::correlation::{CorrelationToken, DEFAULT_TOKEN_LENGTH_BYTES, TEST_ENV_ID_HEADER};
use harness_server::http::STATUS_CHECK_PATH;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "harness-cli")]
#[command(about = "Driver-side CLI for a running harness-server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8200")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh correlation token
    Token {
        #[arg(long, default_value_t = DEFAULT_TOKEN_LENGTH_BYTES)]
        bytes: usize,
    },
    /// Poll the status-check endpoint
    Status,
    /// Send a correlated request
    Send {
        path: String,
        #[arg(short, long)]
        token: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        #[arg(short, long)]
        body: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token { bytes } => {
            println!("{}", CorrelationToken::generate(bytes)?);
        }
        Commands::Status => {
            let res = reqwest::get(format!("{}{}", cli.url, STATUS_CHECK_PATH)).await?;
            print_response(res).await?;
        }
        Commands::Send { path, token, method, body } => {
            let token = CorrelationToken::new(token)?;
            let mut headers = HeaderMap::new();
            headers.insert(TEST_ENV_ID_HEADER, HeaderValue::from_str(token.as_str())?);

            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut req = reqwest::Client::new()
                .request(method, format!("{}{}", cli.url, path))
                .headers(headers);
            if let Some(body) = body {
                req = req.body(body);
            }
            print_response(req.send().await?).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: harness returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
