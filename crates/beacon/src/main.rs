//! Beacon forwarder entry point
//!
//! Reads newline-delimited analytics segments from stdin or a file and feeds
//! them through the analytics pipeline into durable per-destination journals.

mod cli;
mod config;
mod input;
mod location;
mod logging;
mod signals;

use anyhow::Context;
use beacon_core::{Analytics, EngineStats, LocationPoller, SetupParams, StandardQueueFactory};
use cli::CliArgs;
use config::AppConfig;
use input::{parse_line, InputRecord};
use location::FileLocationProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// Main application struct
pub struct Application {
    config: AppConfig,
    args: CliArgs,
    analytics: Analytics,
}

impl Application {
    /// Loads configuration, initialises logging and builds the pipeline.
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(level) = &args.log_level {
            config.logging.level = level.clone();
        }
        if args.disabled {
            config.engine.enabled = false;
        }

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

        logging::setup_logging(&config.logging, args.json_logs)?;

        info!("🚀 Starting beacon v{}", env!("CARGO_PKG_VERSION"));
        info!("📂 Config: {}", args.config_path.display());
        info!("🗄️ Journals: {}", config.engine.journal_dir);

        let analytics = Analytics::new(Arc::new(StandardQueueFactory::journal(&config.engine.journal_dir)));
        analytics.set_enabled(config.engine.enabled);

        Ok(Self { config, args, analytics })
    }

    /// Runs setup, streams input until EOF or a shutdown signal, then flushes
    /// and stops.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut params = SetupParams::new(self.config.config_source(), self.config.destinations());
        if let Some(org_id) = &self.config.engine.org_id {
            params = params.with_org_id(org_id.clone());
        }
        // Not awaited: input records queue up behind it in order.
        let setup = self.analytics.setup(params);

        let poller = self.start_location_poller();

        let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &self.args.input {
            Some(path) => Box::new(BufReader::new(
                tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open input {}", path.display()))?,
            )),
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };

        if let Err(e) = setup.await {
            error!("❌ Initial setup failed: {}", e);
        }

        tokio::select! {
            result = self.forward(reader) => result?,
            result = signals::wait_for_shutdown_signal() => result?,
        }

        info!("🛑 Shutting down...");
        if let Some(poller) = &poller {
            poller.stop().await;
        }
        let stats = final_flush(&self.analytics).await;
        info!(
            "📊 {} events logged | {} deliveries ({} failed) | {} flushes ({} failed)",
            stats.events_logged, stats.deliveries, stats.delivery_failures, stats.flushes, stats.flush_failures
        );

        self.analytics.shutdown().await;
        info!("✅ Shutdown complete");
        Ok(())
    }

    fn start_location_poller(&self) -> Option<Arc<LocationPoller>> {
        if !self.config.location.enabled {
            return None;
        }
        let provider = Arc::new(FileLocationProvider::new(&self.config.location.file));
        let poller = self
            .analytics
            .location_poller(provider, Duration::from_millis(self.config.location.interval_ms));
        poller.start();
        Some(poller)
    }

    async fn forward(&self, reader: Box<dyn AsyncBufRead + Unpin + Send>) -> anyhow::Result<()> {
        let mut lines = reader.lines();
        let mut line_no = 0u64;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let record = match parse_line(&line) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!("⚠️ Skipping line {}: {:#}", line_no, e);
                    continue;
                }
            };

            match record {
                InputRecord::Segment(segment) => {
                    let name = segment.name().to_string();
                    if let Err(e) = self.analytics.log(segment).await {
                        warn!("⚠️ Line {} ('{}') not logged: {}", line_no, name, e);
                    }
                }
                InputRecord::Lifecycle(state) => {
                    if !self.analytics.update_lifecycle_state(state) {
                        debug!("Line {}: lifecycle unchanged", line_no);
                    }
                }
                InputRecord::Flush => {
                    if let Err(e) = self.analytics.flush(None).await {
                        warn!("⚠️ Flush requested on line {} failed: {}", line_no, e);
                    }
                }
            }
        }

        info!("📭 End of input after {} line(s)", line_no);
        Ok(())
    }
}

/// Flushes every destination and returns the stats once that flush has run.
///
/// Bypasses the lifecycle monitor, which ignores a repeated `Paused`.
async fn final_flush(analytics: &Analytics) -> EngineStats {
    if let Err(e) = analytics.flush(None).await {
        warn!("⚠️ Final flush failed: {}", e);
    }
    analytics.stats().await
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let code = match Application::new(args).await {
        Ok(app) => match app.run().await {
            Ok(()) => 0,
            Err(e) => {
                error!("❌ Application error: {:?}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            1
        }
    };

    // A pending stdin read cannot be cancelled and would hold up runtime shutdown.
    std::process::exit(code);
}
