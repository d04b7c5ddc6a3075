use med_agent::{run, AgentConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(%err, "invalid configuration, using defaults");
            AgentConfig::default()
        }
    };
    if let Err(err) = run(config).await {
        eprintln!("Failed to start medication reminder agent: {err:#}");
        std::process::exit(1);
    }
}
