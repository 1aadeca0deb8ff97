use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopping_insight_mcp_runtime::{ClientConfig, DEFAULT_BASE_URL, run};

#[derive(Parser)]
#[command(
    name = "shopping-insight-mcp",
    version,
    about = "Naver Shopping Insight MCP server over stdio. Credentials come from NAVER_CLIENT_ID / NAVER_CLIENT_SECRET."
)]
struct Cli {
    /// DataLab shopping API base URL
    #[arg(long, env = "NAVER_DATALAB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Upstream request timeout in seconds (no timeout when unset)
    #[arg(long, env = "NAVER_DATALAB_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout carries protocol frames; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shopping_insight_mcp=info,shopping_insight_mcp_runtime=info".into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let code = run(ClientConfig {
        base_url: cli.base_url,
        timeout: cli.timeout_secs.map(Duration::from_secs),
    })
    .await;
    std::process::exit(code);
}
