//! streamrelay
//!
//! Relays a managed agent's answer to a push connection, one chunk at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use streamrelay::agent::{AgentService, BedrockAgent, EchoAgent};
use streamrelay::aws::load_sdk_config;
use streamrelay::delivery::{ApiGatewayChannel, ConsoleChannel, DeliveryChannel};
use streamrelay::local::read_event;
use streamrelay::relay::RelayHandler;
use streamrelay::runtime::{self, ErrorReport, RuntimeClient};
use streamrelay_core::config::{EnvConfigProvider, FileConfigProvider};
use streamrelay_core::tracing_init::init_tracing;
use streamrelay_core::{ConfigProvider, FrameEncoding, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "streamrelay")]
#[command(version, about = "Relay managed-agent answers to push connections")]
struct Cli {
    /// TOML config file. Environment variables still override its values.
    #[arg(long, global = true, env = "STREAMRELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Values that take precedence over the file and the environment.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Agent identifier.
    #[arg(long, global = true)]
    agent_id: Option<String>,

    /// Agent alias identifier.
    #[arg(long, global = true)]
    agent_alias_id: Option<String>,

    /// AWS region for the agent and delivery clients.
    #[arg(long, global = true)]
    region: Option<String>,

    /// Fixed connection-management endpoint.
    #[arg(long, global = true)]
    delivery_endpoint: Option<String>,

    /// End-of-stream marker sent after the last chunk.
    #[arg(long, global = true)]
    sentinel: Option<String>,

    /// Frame encoding: `json` or `raw`.
    #[arg(long, global = true)]
    encoding: Option<FrameEncoding>,
}

impl Overrides {
    fn apply(self, config: &mut RelayConfig) {
        if let Some(v) = self.agent_id {
            config.agent_id = v;
        }
        if let Some(v) = self.agent_alias_id {
            config.agent_alias_id = v;
        }
        if let Some(v) = self.region {
            config.region = v;
        }
        if self.delivery_endpoint.is_some() {
            config.delivery_endpoint = self.delivery_endpoint;
        }
        if self.sentinel.is_some() {
            config.sentinel = self.sentinel;
        }
        if let Some(v) = self.encoding {
            config.encoding = v;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve invocations from the function runtime API.
    Serve,

    /// Run the handler once against a local event and print the outcome.
    Invoke {
        /// Event JSON file. Reads stdin when omitted.
        #[arg(long)]
        event: Option<PathBuf>,

        /// Print pushed frames to stdout instead of posting them.
        #[arg(long)]
        console: bool,

        /// Answer with the offline echo agent instead of the managed agent.
        #[arg(long)]
        echo: bool,

        /// Delay between echo chunks, in milliseconds.
        #[arg(long, default_value_t = 0, requires = "echo")]
        echo_delay_ms: u64,
    },
}

fn load_config(path: Option<PathBuf>, overrides: Overrides) -> anyhow::Result<RelayConfig> {
    let provider: Box<dyn ConfigProvider> = match path {
        Some(path) => Box::new(FileConfigProvider::new(path)),
        None => Box::new(EnvConfigProvider::new()),
    };
    let mut config = provider.load()?;
    overrides.apply(&mut config);
    info!(
        provider = provider.name(),
        agent_id = %config.agent_id,
        region = %config.region,
        encoding = %config.encoding,
        "Configuration loaded"
    );
    Ok(config)
}

#[tokio::main]
#[allow(clippy::print_stdout)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting streamrelay");

    match cli.command {
        Command::Serve => serve(cli.config, cli.overrides).await,
        Command::Invoke {
            event,
            console,
            echo,
            echo_delay_ms,
        } => {
            let config = load_config(cli.config, cli.overrides)?;
            if !echo {
                config.validate()?;
            }
            let needs_aws = !echo || !console;
            let sdk_config = if needs_aws {
                Some(load_sdk_config(&config.region).await)
            } else {
                None
            };

            let agent: Arc<dyn AgentService> = match (&sdk_config, echo) {
                (Some(sdk), false) => Arc::new(BedrockAgent::new(sdk)),
                _ => Arc::new(EchoAgent::new().with_delay(Duration::from_millis(echo_delay_ms))),
            };
            let channel: Arc<dyn DeliveryChannel> = match sdk_config {
                Some(sdk) if !console => Arc::new(ApiGatewayChannel::new(
                    sdk,
                    config.delivery_endpoint.as_deref(),
                )),
                _ => Arc::new(ConsoleChannel::stdout()),
            };

            let handler = RelayHandler::new(&config, agent, channel);
            let event = read_event(event.as_deref()).await?;
            let outcome = handler.handle(event).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
    }
}

async fn serve(config_path: Option<PathBuf>, overrides: Overrides) -> anyhow::Result<()> {
    let client = RuntimeClient::from_env()?;

    // Startup failures are reported to the runtime before exiting.
    let config = match load_config(config_path, overrides).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(config) => config,
        Err(e) => {
            let report = ErrorReport::new("InvalidConfiguration", e.to_string());
            if let Err(post_err) = client.post_init_error(&report).await {
                warn!(error = %post_err, "Failed to report init error");
            }
            return Err(e);
        }
    };

    let sdk_config = load_sdk_config(&config.region).await;
    let agent: Arc<dyn AgentService> = Arc::new(BedrockAgent::new(&sdk_config));
    let channel: Arc<dyn DeliveryChannel> = Arc::new(ApiGatewayChannel::new(
        sdk_config,
        config.delivery_endpoint.as_deref(),
    ));
    let handler = RelayHandler::new(&config, agent, channel);

    tokio::select! {
        result = runtime::serve(&handler, &client) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}
