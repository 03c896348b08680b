/// Setup coordination: building and installing destination sets
use super::core::SetupParams;
use super::worker::{contained, ActiveSet, Worker};
use crate::destination::DestinationSet;
use crate::error::{ConfigError, EngineError, QueueError, SetupError};
use crate::render::RenderContext;
use std::sync::atomic::Ordering;
use tracing::{debug, error, info};

impl Worker {
    /// Handles a setup action.
    ///
    /// `Some(params)` replaces the staged parameters; `None` re-applies the
    /// staged ones. With nothing staged this is a successful no-op. On
    /// success the new set is installed and the gate opens; on failure the
    /// previous set is discarded and the gate closes.
    pub(super) async fn handle_setup(&mut self, params: Option<SetupParams>) -> Result<(), EngineError> {
        if let Some(params) = params {
            self.staged = Some(params);
        }
        let Some(params) = self.staged.clone() else {
            debug!("Setup requested before any parameters were staged, nothing to do");
            return Ok(());
        };

        match self.build_destination_set(&params).await {
            Ok(destinations) => {
                info!(
                    "✅ Engine ready with {} destination(s): {:?}",
                    destinations.len(),
                    destinations.destinations().iter().map(|d| d.id.as_str()).collect::<Vec<_>>()
                );
                self.active = Some(ActiveSet {
                    destinations,
                    context: RenderContext {
                        org_id: params.org_id.clone(),
                    },
                });
                self.shared.ready.store(true, Ordering::SeqCst);
                self.shared.stats.write().await.setups_succeeded += 1;
                Ok(())
            }
            Err(e) => {
                error!("❌ Setup failed, engine not ready: {}", e);
                self.active = None;
                self.shared.ready.store(false, Ordering::SeqCst);
                self.shared.stats.write().await.setups_failed += 1;
                Err(e.into())
            }
        }
    }

    /// Fetches the remote config, opens one queue per destination and waits
    /// for all of them to become ready. Nothing is installed here.
    async fn build_destination_set(&self, params: &SetupParams) -> Result<DestinationSet, SetupError> {
        let remote = contained(params.config_source.fetch())
            .await
            .map_err(ConfigError::Unavailable)??;
        debug!("Remote config: {:?}", remote);

        let mut entries = Vec::with_capacity(params.destinations.len());
        for destination in &params.destinations {
            let opened = contained(self.factory.open(destination, &remote, params.flush_callback.clone()))
                .await
                .unwrap_or_else(|panic| Err(QueueError::NotReady(panic)));
            let queue = opened.map_err(|source| SetupError::Queue {
                destination: destination.id.clone(),
                source,
            })?;
            entries.push((destination.clone(), queue));
        }

        let readiness = entries.iter().map(|(destination, queue)| async move {
            contained(queue.wait_ready())
                .await
                .unwrap_or_else(|panic| Err(QueueError::NotReady(panic)))
                .map_err(|source| SetupError::Queue {
                    destination: destination.id.clone(),
                    source,
                })
        });
        futures::future::try_join_all(readiness).await?;

        Ok(DestinationSet::new(entries))
    }
}
