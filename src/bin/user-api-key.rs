//! Interactive driver for the User API Key handshake.
//!
//! Prints the authorization URL, reads the encrypted payload the forum shows
//! after approval from stdin and prints the issued API key.

use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;
use user_api_key::{
    ConsumePolicy, HandshakeConfig, HandshakeRequest, HandshakeSession, HandshakeStatus,
    MemoryHandshakeStore, SessionKey, handshake::issuer::DEFAULT_KEY_BITS,
};

#[derive(Parser, Debug)]
#[command(name = "user-api-key")]
#[command(about = "Request a User API Key from a Discourse forum")]
#[command(version)]
struct Cli {
    /// Base URL of the forum
    #[arg(long, env = "USER_API_KEY_SITE_URL", default_value = "https://linux.do")]
    site_url: String,

    /// Application name shown on the authorization page
    #[arg(
        long,
        env = "USER_API_KEY_APPLICATION_NAME",
        default_value = "Sample Discourse App"
    )]
    application_name: String,

    /// Client id; generated when omitted
    #[arg(long, env = "USER_API_KEY_CLIENT_ID")]
    client_id: Option<String>,

    /// Requested scope, may be repeated or comma-separated (default: read)
    #[arg(long = "scope", value_delimiter = ',')]
    scopes: Vec<String>,

    /// RSA modulus size in bits
    #[arg(long, env = "USER_API_KEY_KEY_BITS", default_value_t = DEFAULT_KEY_BITS)]
    key_bits: usize,

    /// Discard the key after the first rejected payload
    #[arg(long)]
    single_attempt: bool,
}

impl Cli {
    fn config(&self) -> HandshakeConfig {
        HandshakeConfig {
            key_bits: self.key_bits,
            consume_policy: if self.single_attempt {
                ConsumePolicy::OnAttempt
            } else {
                ConsumePolicy::OnSuccess
            },
        }
    }

    fn request(&self) -> HandshakeRequest {
        let mut request = HandshakeRequest::new(&self.site_url, &self.application_name)
            .with_scopes(self.scopes.iter().map(String::as_str));
        request.client_id = self.client_id.clone();
        request
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let store = MemoryHandshakeStore::default();
    let session = HandshakeSession::with_config(&store, SessionKey::generate(), cli.config());

    eprintln!("Generating a {}-bit key...", cli.key_bits);
    let url = session
        .begin(&cli.request())
        .await
        .with_context(|| format!("failed to start a handshake with {}", cli.site_url))?;

    println!("1. Open this URL and approve the request:\n\n{url}\n");
    println!("2. Paste the encrypted payload, then an empty line:");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(payload) = read_payload(&mut lines)
            .await
            .context("failed to read the payload from stdin")?
        else {
            bail!("no payload received");
        };
        match session.complete(&payload).await {
            Ok(result) => {
                println!("\nClient ID: {}", result.client_id());
                println!("API Key:   {}", result.key());
                return Ok(());
            }
            Err(err) if session.status().await == HandshakeStatus::AwaitingPayload => {
                eprintln!("{err}. Paste the payload again:");
            }
            Err(err) => return Err(err).context("handshake failed"),
        }
    }
}

/// Reads one payload: non-empty lines up to the next empty line or EOF.
async fn read_payload(lines: &mut Lines<BufReader<Stdin>>) -> std::io::Result<Option<String>> {
    let mut payload = String::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            if payload.is_empty() {
                continue;
            }
            break;
        }
        payload.push_str(line);
    }
    Ok((!payload.is_empty()).then_some(payload))
}
