use anyhow::Context;
use hearth_hub::Hub;
use hearth_kernel::config::{HubConfig, load_config, load_config_or_defaults};
use hearth_logger::Logger;

const CONFIG_ENV: &str = "HEARTH_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).or_else(|| std::env::var(CONFIG_ENV).ok());

    // A malformed file fails both loads; a missing one only the first.
    let (cfg, missing) = match load_config::<HubConfig>(path.as_deref()) {
        Ok(cfg) => (cfg, None),
        Err(e) => {
            let cfg = load_config_or_defaults::<HubConfig>(path.as_deref())
                .context("Critical: Configuration is malformed")?;
            (cfg, Some(e))
        },
    };

    let _log = Logger::from_settings(&cfg.log)?.init()?;
    if let Some(e) = missing {
        tracing::warn!(error = %e, "Config file not loaded, running with defaults");
    }

    Hub::new(cfg).run().await
}
