use ach_onboarding::infrastructure::config::{ProcessorConfig, SANDBOX_URL};
use ach_onboarding::interfaces::http::{AppState, create_router};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address the onboarding API listens on
    #[arg(long, env = "ACH_LISTEN_ADDR", default_value = "127.0.0.1:4242")]
    listen: SocketAddr,

    /// Base URL of the ACH processor API
    #[arg(long, env = "ACH_PROCESSOR_URL", default_value = SANDBOX_URL)]
    processor_url: String,

    /// Processor application key
    #[arg(long, env = "ACH_CLIENT_KEY")]
    client_key: String,

    /// Processor application secret
    #[arg(long, env = "ACH_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Full address of the account that receives every payment
    #[arg(long, env = "ACH_DESTINATION_ACCOUNT")]
    destination_account: String,

    /// Timeout for each processor request, in milliseconds
    #[arg(long, env = "ACH_REQUEST_TIMEOUT_MS", default_value_t = 15_000)]
    request_timeout_ms: u64,

    /// Attempts per processor call on transient failure (transfers are never retried)
    #[arg(long, env = "ACH_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// First backoff delay between attempts, in milliseconds
    #[arg(long, env = "ACH_BACKOFF_BASE_MS", default_value_t = 200)]
    backoff_base_ms: u64,

    /// Refresh the access token this many seconds before it expires
    #[arg(long, env = "ACH_TOKEN_SAFETY_MARGIN_SECS", default_value_t = 60)]
    token_safety_margin_secs: u64,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "ACH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "ACH_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            base_url: self.processor_url.clone(),
            client_key: self.client_key.clone(),
            client_secret: self.client_secret.clone(),
            destination_account: self.destination_account.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            token_safety_margin: Duration::from_secs(self.token_safety_margin_secs),
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = cli.processor_config();
    let orchestrator = config.build_orchestrator().into_diagnostic()?;
    info!(
        processor = %config.base_url,
        destination = %config.destination_account,
        "orchestrator ready"
    );

    let app = create_router(AppState::new(orchestrator));
    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .into_diagnostic()?;
    info!(addr = %cli.listen, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .into_diagnostic()?;
    Ok(())
}
