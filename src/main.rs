use log::{error, info};

use season_engine::logic::config::EngineConfig;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match EngineConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Could not load the configuration: {e}");
            std::process::exit(1);
        }
    };

    match season_engine::run(config).await {
        Ok(summary) => info!("Stopped on {} ({:?})", summary.today, summary.stop_reason),
        Err(e) => {
            error!("Simulation failed: {e}");
            std::process::exit(1);
        }
    }
}
