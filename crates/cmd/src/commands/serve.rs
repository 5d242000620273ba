use crate::config::SluiceConfig;
use crate::server::start_server;
use anyhow::{Context, Result};

pub async fn serve_command(mut config: SluiceConfig, listen: Option<String>) -> Result<()> {
    if let Some(listen) = listen {
        listen
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid listen address '{listen}'"))?;
        config.listen = listen;
    }
    start_server(&config).await
}
