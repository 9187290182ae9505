//! Discovery of the newest published frame.
//!
//! Candidate timestamps are walked newest first. For each timestamp every
//! storage location is probed concurrently, and the group acts as a barrier:
//! the search only moves to the next older timestamp once every location
//! has answered "absent". Inside a group the highest-priority location that
//! reports the object wins, even if a lower-priority probe answers first.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use radar_common::{Cadence, CandidateLocation, FrameError, FrameNaming, FrameResult, FrameTimestamp};

use crate::archive::Archive;
use crate::metrics;

#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub cadence: Cadence,
    /// How far back from "now" to search
    pub horizon: chrono::Duration,
    /// Wall-clock limit for the whole search
    pub budget: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            cadence: Cadence::TWO_MINUTES,
            horizon: chrono::Duration::hours(4),
            budget: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFrame {
    pub url: String,
    pub timestamp: FrameTimestamp,
    pub location: CandidateLocation,
    /// Position of `location` in the priority list
    pub location_index: usize,
}

pub struct FrameLocator {
    archive: Arc<dyn Archive>,
    naming: FrameNaming,
    locations: Vec<CandidateLocation>,
    config: LocatorConfig,
}

impl FrameLocator {
    pub fn new(
        archive: Arc<dyn Archive>,
        naming: FrameNaming,
        locations: Vec<CandidateLocation>,
        config: LocatorConfig,
    ) -> Self {
        Self {
            archive,
            naming,
            locations,
            config,
        }
    }

    pub fn locations(&self) -> &[CandidateLocation] {
        &self.locations
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Find the newest existing frame at or before `now`.
    #[instrument(skip(self, cancel), fields(now = %now))]
    pub async fn locate(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> FrameResult<LocatedFrame> {
        let deadline = tokio::time::Instant::now() + self.config.budget;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Frame search cancelled");
                Err(FrameError::Cancelled)
            }
            result = tokio::time::timeout_at(deadline, self.search(now)) => match result {
                Ok(found) => found,
                Err(_) => {
                    warn!(budget_secs = self.config.budget.as_secs_f64(), "Frame search exceeded budget");
                    Err(FrameError::LocateTimeout {
                        budget: self.config.budget,
                    })
                }
            },
        }
    }

    async fn search(&self, now: DateTime<Utc>) -> FrameResult<LocatedFrame> {
        let mut searched = 0;

        for timestamp in FrameTimestamp::walk_back(now, self.config.cadence, self.config.horizon) {
            searched += 1;
            if let Some((location_index, url)) = self.probe_timestamp(&timestamp).await {
                let location = self.locations[location_index].clone();
                info!(
                    url = %url,
                    timestamp = %timestamp,
                    location_index,
                    timestamps_searched = searched,
                    "Located frame"
                );
                return Ok(LocatedFrame {
                    url,
                    timestamp,
                    location,
                    location_index,
                });
            }
        }

        warn!(
            timestamps = searched,
            locations = self.locations.len(),
            "No frame found within horizon"
        );
        Err(FrameError::NotFound {
            timestamps: searched,
            locations: self.locations.len(),
        })
    }

    /// Probe every location for one timestamp. Returns the winning location
    /// index and URL, or `None` when all locations report absent.
    async fn probe_timestamp(&self, timestamp: &FrameTimestamp) -> Option<(usize, String)> {
        let mut probes: FuturesUnordered<_> = self
            .locations
            .iter()
            .enumerate()
            .map(|(index, location)| {
                let url = self.naming.url(location, timestamp);
                let archive = Arc::clone(&self.archive);
                async move {
                    let result = archive.exists(&url).await;
                    (index, url, result)
                }
            })
            .collect();

        let mut answers: Vec<Option<bool>> = vec![None; self.locations.len()];
        let mut urls: Vec<Option<String>> = vec![None; self.locations.len()];

        while let Some((index, url, result)) = probes.next().await {
            let exists = match result {
                Ok(true) => {
                    metrics::record_probe("hit");
                    true
                }
                Ok(false) => {
                    metrics::record_probe("absent");
                    false
                }
                Err(e) => {
                    metrics::record_probe("error");
                    warn!(url = %url, error = %e, "Probe failed, treating as absent");
                    false
                }
            };
            debug!(url = %url, exists, "Probe answered");
            answers[index] = Some(exists);
            urls[index] = Some(url);

            if let Some(winner) = accepted(&answers) {
                // Dropping `probes` cancels whatever is still in flight
                return urls[winner].take().map(|url| (winner, url));
            }
        }

        None
    }
}

/// Index of the first location that exists, provided every location ahead
/// of it has already answered absent.
fn accepted(answers: &[Option<bool>]) -> Option<usize> {
    for (index, answer) in answers.iter().enumerate() {
        match answer {
            Some(true) => return Some(index),
            Some(false) => continue,
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_waits_for_higher_priority() {
        assert_eq!(accepted(&[None, Some(true)]), None);
        assert_eq!(accepted(&[Some(false), Some(true)]), Some(1));
        assert_eq!(accepted(&[Some(true), None, None]), Some(0));
        assert_eq!(accepted(&[Some(false), Some(false)]), None);
        assert_eq!(accepted(&[]), None);
    }
}
