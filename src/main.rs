use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agentstream::{
    AgentStreamClient, ClientBuilder, Credential, EventLog, FinalResult, Scheme, SessionOutcome,
};

#[derive(Parser)]
#[command(name = "agentstream")]
#[command(about = "Ask the multi-agent backend a question and stream its progress", long_about = None)]
struct Cli {
    /// The question to ask
    query: String,

    /// Credential sent with the start message (defaults to AGENT_STREAM_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Backend host, e.g. localhost:8000
    #[arg(long)]
    host: Option<String>,

    /// Endpoint path
    #[arg(long)]
    path: Option<String>,

    /// Connect with wss instead of ws
    #[arg(long, conflicts_with = "page_scheme")]
    secure: bool,

    /// Pick ws/wss the way a page loaded over this scheme would (http or https)
    #[arg(long)]
    page_scheme: Option<String>,

    /// Seconds to wait for the connection to open
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Seconds to wait between messages before giving up
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Print the final payload as JSON instead of the answer text
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn client_builder(&self) -> Result<ClientBuilder> {
        let mut builder =
            ClientBuilder::from_env().context("invalid AGENT_STREAM_* environment")?;

        if let Some(host) = &self.host {
            builder = builder.host(host);
        }
        if let Some(path) = &self.path {
            builder = builder.path(path);
        }
        if self.secure {
            builder = builder.scheme(Scheme::Wss);
        }
        if let Some(page_scheme) = &self.page_scheme {
            builder = builder.page_scheme(page_scheme);
        }
        if let Some(secs) = self.connect_timeout {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.idle_timeout {
            builder = builder.idle_timeout(Duration::from_secs(secs));
        }

        let json = self.json;
        Ok(builder.on_final(move |payload| print_final(&payload, json)))
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_final(payload: &serde_json::Value, json: bool) {
    if json {
        println!("{payload}");
        return;
    }

    let result = FinalResult::from_payload(payload);
    println!();
    println!("{}", result.answer_text().unwrap_or("(no answer)"));
    if !result.agents_used.is_empty() {
        let agents: Vec<String> = result
            .agents_used
            .iter()
            .map(|a| agentstream::stream::agent_label(a))
            .collect();
        println!("agents: {}", agents.join(", "));
    }
}

/// Print events past `rendered` and advance it.
fn render(log: &EventLog, rendered: &mut usize) {
    let mut stderr = std::io::stderr().lock();
    for event in log.iter().skip(*rendered) {
        let _ = writeln!(
            stderr,
            "[{}] {}: {}",
            event.time_label(),
            event.agent_label(),
            event.text
        );
    }
    *rendered = log.len();
}

async fn stream(client: &mut AgentStreamClient) -> Option<SessionOutcome> {
    let mut log = client.subscribe();
    let mut rendered = 0;

    let finished = {
        let wait = client.wait();
        tokio::pin!(wait);
        loop {
            tokio::select! {
                outcome = &mut wait => break Some(outcome),
                changed = log.changed() => {
                    if changed.is_ok() {
                        render(&log.borrow_and_update(), &mut rendered);
                    }
                }
                _ = tokio::signal::ctrl_c() => break None,
            }
        }
    };

    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            eprintln!("interrupted");
            client.teardown().await
        }
    };

    if let Some(outcome) = &outcome {
        render(&outcome.log, &mut rendered);
    }
    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut client = cli.client_builder()?.build()?;
    let credential = cli.token.clone().map(Credential::new).or_else(Credential::from_env);

    if client.submit(cli.query.as_str(), credential).await.is_none() {
        bail!("query must not be empty");
    }
    eprintln!("thinking...");

    let Some(outcome) = stream(&mut client).await else {
        bail!("session ended without an outcome");
    };

    if outcome.is_complete() {
        return Ok(());
    }
    match outcome.error {
        Some(e) => Err(e).context("session did not complete"),
        None => bail!("connection closed before a final answer arrived"),
    }
}
