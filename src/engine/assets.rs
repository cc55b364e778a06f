use crate::engine::stack::LayerStack;
use crate::error::MapError;
use crate::model::{LayerKey, MapResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(u64);

/// An outstanding fetch, tied to the revision of the layer that asked for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTicket {
    pub id: TicketId,
    pub layer: LayerKey,
    pub url: String,
    pub layer_revision: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum AssetStatus {
    Pending,
    Loaded,
    Failed(String),
}

/// Settled statuses kept before the least recently wanted ones are evicted.
pub const DEFAULT_CAPACITY: usize = 512;

#[derive(Clone, Debug)]
struct Entry {
    layer_revision: u64,
    status: AssetStatus,
    last_used: u64,
}

/// Bookkeeping for images the host fetches on the engine's behalf.
#[derive(Clone, Debug)]
pub struct AssetTracker {
    next_id: u64,
    clock: u64,
    capacity: usize,
    pending: HashMap<TicketId, AssetTicket>,
    entries: HashMap<(LayerKey, String), Entry>,
}

impl Default for AssetTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AssetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        AssetTracker {
            next_id: 0,
            clock: 0,
            capacity,
            pending: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Issues a ticket for `url` unless the current layer already requested it.
    pub fn request(
        &mut self,
        stack: &LayerStack,
        key: &LayerKey,
        url: &str,
    ) -> MapResult<Option<AssetTicket>> {
        let layer_revision = stack
            .slot_revision(key)
            .ok_or_else(|| MapError::UnknownLayer(key.to_string()))?;
        self.clock += 1;
        let entry_key = (key.clone(), url.to_string());
        if let Some(entry) = self
            .entries
            .get_mut(&entry_key)
            .filter(|entry| entry.layer_revision == layer_revision)
        {
            entry.last_used = self.clock;
            return Ok(None);
        }

        // tickets issued for an earlier layer under this key are superseded
        self.pending
            .retain(|_, ticket| &ticket.layer != key || ticket.layer_revision == layer_revision);

        self.next_id += 1;
        let ticket = AssetTicket {
            id: TicketId(self.next_id),
            layer: key.clone(),
            url: url.to_string(),
            layer_revision,
        };
        self.entries.insert(
            entry_key,
            Entry {
                layer_revision,
                status: AssetStatus::Pending,
                last_used: self.clock,
            },
        );
        self.pending.insert(ticket.id, ticket.clone());
        tracing::debug!("Requested asset {} for layer {}", url, key);
        Ok(Some(ticket))
    }

    /// Records a fetch outcome. Returns false when the result was discarded
    /// because its layer was removed or replaced after the ticket was issued.
    pub fn complete(
        &mut self,
        stack: &LayerStack,
        ticket: &AssetTicket,
        outcome: Result<(), String>,
    ) -> bool {
        if self.pending.remove(&ticket.id).is_none() {
            tracing::debug!("Ignoring unknown or repeated ticket {:?}", ticket.id);
            return false;
        }
        let entry_key = (ticket.layer.clone(), ticket.url.clone());
        if stack.slot_revision(&ticket.layer) != Some(ticket.layer_revision) {
            tracing::warn!(
                "Discarding stale asset {} for layer {} (revision {})",
                ticket.url,
                ticket.layer,
                ticket.layer_revision
            );
            if self
                .entries
                .get(&entry_key)
                .is_some_and(|entry| entry.layer_revision == ticket.layer_revision)
            {
                self.entries.remove(&entry_key);
            }
            return false;
        }

        let status = match outcome {
            Ok(()) => AssetStatus::Loaded,
            Err(reason) => {
                tracing::warn!("Asset {} for layer {} failed: {}", ticket.url, ticket.layer, reason);
                AssetStatus::Failed(reason)
            }
        };
        self.entries.insert(
            entry_key,
            Entry {
                layer_revision: ticket.layer_revision,
                status,
                last_used: self.clock,
            },
        );
        self.evict_settled();
        true
    }

    fn evict_settled(&mut self) {
        let settled = |entry: &Entry| entry.status != AssetStatus::Pending;
        let mut excess = self
            .entries
            .values()
            .filter(|entry| settled(*entry))
            .count()
            .saturating_sub(self.capacity);
        while excess > 0 {
            let Some(oldest) = self
                .entries
                .iter()
                .filter(|(_, entry)| settled(*entry))
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(entry_key, _)| entry_key.clone())
            else {
                break;
            };
            self.entries.remove(&oldest);
            excess -= 1;
        }
    }

    /// Cancels pending tickets whose layer and url are no longer in `wanted`,
    /// returning how many were dropped. A late result for one is ignored.
    pub fn cancel_unwanted(&mut self, wanted: &HashSet<(LayerKey, String)>) -> usize {
        let before = self.pending.len();
        let entries = &mut self.entries;
        self.pending.retain(|_, ticket| {
            let entry_key = (ticket.layer.clone(), ticket.url.clone());
            if wanted.contains(&entry_key) {
                return true;
            }
            if entries
                .get(&entry_key)
                .is_some_and(|entry| entry.status == AssetStatus::Pending)
            {
                entries.remove(&entry_key);
            }
            false
        });
        let cancelled = before - self.pending.len();
        if cancelled > 0 {
            tracing::debug!("Cancelled {} asset requests no longer on screen", cancelled);
        }
        cancelled
    }

    /// Status of `url` for the layer currently stored under `key`.
    pub fn status(&self, stack: &LayerStack, key: &LayerKey, url: &str) -> Option<&AssetStatus> {
        let revision = stack.slot_revision(key)?;
        self.entries
            .get(&(key.clone(), url.to_string()))
            .filter(|entry| entry.layer_revision == revision)
            .map(|entry| &entry.status)
    }

    pub fn is_failed(&self, stack: &LayerStack, key: &LayerKey, url: &str) -> bool {
        matches!(self.status(stack, key, url), Some(AssetStatus::Failed(_)))
    }

    /// Tickets still waiting for a result, oldest first.
    pub fn pending(&self) -> Vec<&AssetTicket> {
        let mut tickets: Vec<_> = self.pending.values().collect();
        tickets.sort_by_key(|ticket| ticket.id);
        tickets
    }

    /// Drops recorded statuses and outstanding tickets for a layer.
    pub fn forget(&mut self, key: &LayerKey) {
        self.entries.retain(|(layer, _), _| layer != key);
        self.pending.retain(|_, ticket| &ticket.layer != key);
    }
}

/// Fetches ticketed assets over HTTP.
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }

    pub async fn fetch(&self, ticket: &AssetTicket) -> MapResult<Vec<u8>> {
        tracing::info!("Fetching asset {} for layer {}", ticket.url, ticket.layer);
        let failure = |reason: String| MapError::AssetLoadFailure {
            url: ticket.url.clone(),
            reason,
        };

        let resp = self
            .client
            .get(&ticket.url)
            .send()
            .await
            .map_err(|e| failure(format!("Failed to fetch URL: {}", e)))?
            .error_for_status()
            .map_err(|e| failure(format!("Unexpected status: {}", e)))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| failure(format!("Failed to read response: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Reduces a fetch result to the outcome [`AssetTracker::complete`] records.
pub fn outcome_of<T>(result: &MapResult<T>) -> Result<(), String> {
    match result {
        Ok(_) => Ok(()),
        Err(MapError::AssetLoadFailure { reason, .. }) => Err(reason.clone()),
        Err(other) => Err(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, Layer, MarkerIcon, MarkerLayer};
    use pretty_assertions::assert_eq;

    fn marker(popup: &str) -> Layer {
        let icon = MarkerIcon::new("/map_icon.png", [32.0, 32.0], [16.0, 48.0]);
        Layer::new(
            "amravati",
            MarkerLayer::new(GeoPoint::new(20.91, 77.75).unwrap(), popup).with_icon(icon),
        )
    }

    #[test]
    fn repeated_requests_share_one_ticket() {
        let mut stack = LayerStack::new();
        stack.add(marker("Amravati")).unwrap();
        let mut assets = AssetTracker::new();
        let key = LayerKey::from("amravati");

        let ticket = assets.request(&stack, &key, "/map_icon.png").unwrap();
        assert!(ticket.is_some());
        assert_eq!(assets.request(&stack, &key, "/map_icon.png").unwrap(), None);
        assert_eq!(assets.status(&stack, &key, "/map_icon.png"), Some(&AssetStatus::Pending));
        assert_eq!(assets.pending().len(), 1);
    }

    #[test]
    fn unknown_layer_cannot_request() {
        let stack = LayerStack::new();
        let mut assets = AssetTracker::new();
        assert!(matches!(
            assets.request(&stack, &"nope".into(), "/x.png"),
            Err(MapError::UnknownLayer(_))
        ));
    }

    #[test]
    fn failures_are_recorded_per_layer() {
        let mut stack = LayerStack::new();
        stack.add(marker("Amravati")).unwrap();
        let mut assets = AssetTracker::new();
        let key = LayerKey::from("amravati");

        let ticket = assets.request(&stack, &key, "/map_icon.png").unwrap().unwrap();
        assert!(assets.complete(&stack, &ticket, Err("404 Not Found".to_string())));

        assert!(assets.is_failed(&stack, &key, "/map_icon.png"));
        assert_eq!(
            assets.status(&stack, &key, "/map_icon.png"),
            Some(&AssetStatus::Failed("404 Not Found".to_string()))
        );
        assert!(assets.pending().is_empty());
        // a second completion of the same ticket is ignored
        assert!(!assets.complete(&stack, &ticket, Ok(())));
    }

    #[test]
    fn results_for_replaced_layers_are_discarded() {
        let mut stack = LayerStack::new();
        stack.add(marker("Amravati")).unwrap();
        let mut assets = AssetTracker::new();
        let key = LayerKey::from("amravati");
        let ticket = assets.request(&stack, &key, "/map_icon.png").unwrap().unwrap();

        stack.add(marker("Amravati (updated)")).unwrap();

        assert!(!assets.complete(&stack, &ticket, Err("timeout".to_string())));
        assert!(!assets.is_failed(&stack, &key, "/map_icon.png"));
        // the replacement layer gets a fresh ticket
        let fresh = assets.request(&stack, &key, "/map_icon.png").unwrap().unwrap();
        assert!(fresh.layer_revision > ticket.layer_revision);
    }

    #[test]
    fn results_for_removed_layers_are_discarded() {
        let mut stack = LayerStack::new();
        stack.add(marker("Amravati")).unwrap();
        let mut assets = AssetTracker::new();
        let key = LayerKey::from("amravati");
        let ticket = assets.request(&stack, &key, "/map_icon.png").unwrap().unwrap();

        stack.remove(&key);
        assets.forget(&key);

        assert!(!assets.complete(&stack, &ticket, Ok(())));
        assert_eq!(assets.status(&stack, &key, "/map_icon.png"), None);
    }

    #[test]
    fn forgetting_a_layer_cancels_its_tickets() {
        let mut stack = LayerStack::new();
        stack.add(marker("Amravati")).unwrap();
        let mut assets = AssetTracker::new();
        let key = LayerKey::from("amravati");
        let ticket = assets.request(&stack, &key, "/map_icon.png").unwrap().unwrap();

        assets.forget(&key);

        assert!(assets.pending().is_empty());
        assert!(!assets.complete(&stack, &ticket, Ok(())));
    }

    #[test]
    fn a_replacement_layer_supersedes_older_tickets() {
        let mut stack = LayerStack::new();
        stack.add(marker("Amravati")).unwrap();
        let mut assets = AssetTracker::new();
        let key = LayerKey::from("amravati");
        let old = assets.request(&stack, &key, "/map_icon.png").unwrap().unwrap();

        stack.add(marker("Amravati (updated)")).unwrap();
        let fresh = assets.request(&stack, &key, "/map_icon.png").unwrap().unwrap();

        let pending: Vec<_> = assets.pending().into_iter().map(|ticket| ticket.id).collect();
        assert_eq!(pending, vec![fresh.id]);
        assert!(!assets.complete(&stack, &old, Ok(())));
    }

    #[test]
    fn unwanted_tickets_are_cancelled() {
        let mut stack = LayerStack::new();
        stack.add(marker("Amravati")).unwrap();
        let mut assets = AssetTracker::new();
        let key = LayerKey::from("amravati");
        let gone = assets.request(&stack, &key, "/a.png").unwrap().unwrap();
        assets.request(&stack, &key, "/b.png").unwrap();

        let wanted = HashSet::from([(key.clone(), "/b.png".to_string())]);
        assert_eq!(assets.cancel_unwanted(&wanted), 1);

        assert_eq!(assets.pending().len(), 1);
        assert_eq!(assets.status(&stack, &key, "/a.png"), None);
        assert!(!assets.complete(&stack, &gone, Ok(())));
        // wanted again later, it gets a new ticket
        assert!(assets.request(&stack, &key, "/a.png").unwrap().is_some());
    }

    #[test]
    fn settled_statuses_are_capped_least_recently_used_first() {
        let mut stack = LayerStack::new();
        stack.add(marker("Amravati")).unwrap();
        let mut assets = AssetTracker::with_capacity(2);
        let key = LayerKey::from("amravati");

        for url in ["/1.png", "/2.png"] {
            let ticket = assets.request(&stack, &key, url).unwrap().unwrap();
            assets.complete(&stack, &ticket, Ok(()));
        }
        // touching /1.png makes /2.png the oldest
        assert_eq!(assets.request(&stack, &key, "/1.png").unwrap(), None);
        let ticket = assets.request(&stack, &key, "/3.png").unwrap().unwrap();
        assets.complete(&stack, &ticket, Ok(()));

        assert_eq!(assets.status(&stack, &key, "/1.png"), Some(&AssetStatus::Loaded));
        assert_eq!(assets.status(&stack, &key, "/2.png"), None);
        assert_eq!(assets.status(&stack, &key, "/3.png"), Some(&AssetStatus::Loaded));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn fetch_failures_carry_the_url() {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap();
        let fetcher = HttpFetcher::with_client(client);
        let ticket = AssetTicket {
            id: TicketId(1),
            layer: "flood".into(),
            url: "http://127.0.0.1:1/overlay2.png".to_string(),
            layer_revision: 1,
        };

        match fetcher.fetch(&ticket).await {
            Err(MapError::AssetLoadFailure { url, .. }) => assert_eq!(url, ticket.url),
            other => panic!("unexpected fetch result {other:?}"),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn malformed_urls_fail_before_sending() {
        let ticket = AssetTicket {
            id: TicketId(2),
            layer: "flood".into(),
            url: "not a url".to_string(),
            layer_revision: 1,
        };

        let result = HttpFetcher::new().fetch(&ticket).await;
        assert!(matches!(
            &result,
            Err(MapError::AssetLoadFailure { reason, .. }) if reason.starts_with("Failed to fetch URL")
        ));
        assert!(outcome_of(&result).is_err());
    }

    #[test]
    fn fetch_errors_become_outcomes() {
        let failed: MapResult<Vec<u8>> = Err(MapError::AssetLoadFailure {
            url: "/overlay2.png".to_string(),
            reason: "connection refused".to_string(),
        });
        assert_eq!(outcome_of(&failed), Err("connection refused".to_string()));
        assert_eq!(outcome_of(&Ok::<_, MapError>(vec![1u8])), Ok(()));
    }
}
