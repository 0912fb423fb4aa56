pub mod db;
pub mod logic;

use std::{sync::Arc, time::Instant};

use log::info;

use crate::{
    db::{MemoryStore, SqliteStore},
    logic::{
        calendar::{handlers::HandlerTable, notify::LogSink, outcome::TierWeightedOutcome, CalendarScheduler, RunSummary},
        config::EngineConfig,
        error::EngineResult,
        storage::Storage,
    },
};

// Open the configured storage, seed it on first launch and run the calendar once.
pub async fn run(config: EngineConfig) -> EngineResult<RunSummary> {
    let storage: Arc<dyn Storage> = if config.database_url.is_empty() {
        Arc::new(MemoryStore::new(config.start_date))
    }
    else {
        Arc::new(SqliteStore::connect(&config.database_url, config.start_date).await?)
    };

    let start = Instant::now();
    if db::seed::initialise(storage.as_ref(), &config).await? {
        info!("Added competitions in {:.2?}", start.elapsed());
    }

    let outcome = Arc::new(TierWeightedOutcome::build(config.seed));
    let mut scheduler = CalendarScheduler::new(
        storage,
        HandlerTable::with_defaults(),
        outcome,
        Arc::new(LogSink),
        config,
    );

    let start = Instant::now();
    let summary = scheduler.run().await?;
    info!("Simulated {} days in {:.2?}", summary.days_advanced, start.elapsed());
    return Ok(summary);
}
