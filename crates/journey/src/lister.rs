use std::sync::Arc;

use amtree_core::error::{ExportError, ExportResult};
use amtree_core::fetch::ResourceFetcher;
use amtree_core::session::SessionContext;
use futures_util::stream::{self, StreamExt};
use tracing::info;

use crate::assembler::DEFAULT_MAX_CONCURRENCY;
use crate::detector::CustomizationDetector;
use crate::types::JourneyListing;

/// Lists every journey of the session's realm with its customization verdict.
#[derive(Clone)]
pub struct JourneyLister {
    fetcher: Arc<dyn ResourceFetcher>,
    detector: CustomizationDetector,
    max_concurrency: usize,
}

impl std::fmt::Debug for JourneyLister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyLister")
            .field("detector", &self.detector)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl JourneyLister {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            detector: CustomizationDetector::new(fetcher.clone()),
            fetcher,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self.detector = self.detector.with_concurrency(self.max_concurrency);
        self
    }

    /// Only a failed list query surfaces as an error; classifying an
    /// individual tree always yields a verdict.
    pub async fn list(&self, session: &SessionContext) -> ExportResult<JourneyListing> {
        let trees = self
            .fetcher
            .fetch_tree_list(session)
            .await
            .map_err(|source| ExportError::List {
                realm: session.realm.clone(),
                source,
            })?;

        // List entries already carry their `nodes` map, so no per-tree fetch.
        let listing: JourneyListing = stream::iter(trees.iter())
            .map(|tree| async move {
                let custom = self.detector.is_custom(session, tree).await;
                (tree.id.clone(), custom)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        info!(
            realm = %session.realm,
            journeys = listing.len(),
            custom = listing.values().filter(|c| **c).count(),
            "Listed journeys"
        );
        Ok(listing)
    }
}
