use crate::config::SluiceConfig;
use crate::server::AppState;
use anyhow::Result;

/// Build everything `serve` would build, then describe it
#[allow(clippy::print_stdout)]
pub fn check_command(config: &SluiceConfig) -> Result<()> {
    let state = AppState::from_config(config)?;
    let warehouse = state.bridge.warehouse();

    println!("Configuration OK");
    println!("  listen:      {}", config.listen);
    println!("  user:        {}", config.credentials.username);
    println!("  session ttl: {:?}", config.session.ttl);
    println!("  blob store:  {}", state.bridge.blobs().url());
    println!("  warehouse:   {} table {}", warehouse.name(), warehouse.table());
    println!("  scratch dir: {}", config.bridge.scratch_dir.display());
    println!("  max upload:  {} bytes", config.max_upload_bytes);
    if let Some(dir) = &config.static_dir {
        println!("  static dir:  {}", dir.display());
    }
    Ok(())
}
