use chrono::{DateTime, Utc};
use domain::TrendObservation;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// History store trait for data access abstraction.
/// This allows switching between different storage backends (in-memory, filesystem, database).
///
/// The store is append-only: observations are recorded once, keyed by
/// (video id, observation timestamp), and never updated in place.
pub trait HistoryStore: Send + Sync {
    /// Append one observation.
    fn record(&self, observation: TrendObservation);

    /// All observations for a video, sorted by observation timestamp.
    fn history(&self, video_id: &str) -> Vec<TrendObservation>;

    /// The most recent observation for a video.
    fn latest(&self, video_id: &str) -> Option<TrendObservation>;

    /// Ids of all videos with at least one observation.
    fn video_ids(&self) -> Vec<String>;

    /// Total number of recorded observations across all videos.
    fn observation_count(&self) -> usize;
}

/// Per-metric change between the first and last observation of a history.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub views_delta: i64,
    pub likes_delta: i64,
    pub comments_delta: i64,
}

/// Growth over a recorded history. None unless there are at least two
/// observations; a single data point has no trend.
pub fn summarize_growth(history: &[TrendObservation]) -> Option<GrowthSummary> {
    let first = history.first()?;
    let last = history.last()?;
    if first.observed_at == last.observed_at {
        return None;
    }
    Some(GrowthSummary {
        from: first.observed_at,
        to: last.observed_at,
        views_delta: last.views as i64 - first.views as i64,
        likes_delta: last.likes as i64 - first.likes as i64,
        comments_delta: last.comments as i64 - first.comments as i64,
    })
}

/// In-memory implementation of the HistoryStore trait
pub struct InMemoryHistoryStore {
    observations: Arc<RwLock<HashMap<String, Vec<TrendObservation>>>>,
}

impl InMemoryHistoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self {
            observations: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn record(&self, observation: TrendObservation) {
        self.observations
            .write()
            .expect("Failed to acquire write lock on observations")
            .entry(observation.video_id.clone())
            .or_default()
            .push(observation);
    }

    fn history(&self, video_id: &str) -> Vec<TrendObservation> {
        let mut history = self
            .observations
            .read()
            .expect("Failed to acquire read lock on observations")
            .get(video_id)
            .cloned()
            .unwrap_or_default();
        history.sort_by_key(|obs| obs.observed_at);
        history
    }

    fn latest(&self, video_id: &str) -> Option<TrendObservation> {
        self.observations
            .read()
            .expect("Failed to acquire read lock on observations")
            .get(video_id)?
            .iter()
            .max_by_key(|obs| obs.observed_at)
            .cloned()
    }

    fn video_ids(&self) -> Vec<String> {
        self.observations
            .read()
            .expect("Failed to acquire read lock on observations")
            .keys()
            .cloned()
            .collect()
    }

    fn observation_count(&self) -> usize {
        self.observations
            .read()
            .expect("Failed to acquire read lock on observations")
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fake::Fake;
    use fake::faker::lorem::en::Sentence;

    fn observation(video_id: &str, hour: u32, views: u64) -> TrendObservation {
        TrendObservation {
            video_id: video_id.to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            views,
            likes: views / 20,
            comments: views / 100,
            engagement_rate: 0.05,
            comment_rate: 0.01,
            region: "US".to_string(),
            category_name: Sentence(1..3).fake(),
        }
    }

    #[test]
    fn record_appends_per_video() {
        let store = InMemoryHistoryStore::new();
        store.record(observation("a", 0, 100));
        store.record(observation("a", 1, 150));
        store.record(observation("b", 0, 10));

        assert_eq!(store.observation_count(), 3);
        assert_eq!(store.history("a").len(), 2);
        assert_eq!(store.history("b").len(), 1);
        assert!(store.history("missing").is_empty());
    }

    #[test]
    fn history_is_sorted_by_observation_time() {
        let store = InMemoryHistoryStore::new();
        store.record(observation("a", 2, 200));
        store.record(observation("a", 0, 100));
        store.record(observation("a", 1, 150));

        let views: Vec<u64> = store.history("a").iter().map(|o| o.views).collect();
        assert_eq!(views, vec![100, 150, 200]);
    }

    #[test]
    fn latest_returns_most_recent_observation() {
        let store = InMemoryHistoryStore::new();
        store.record(observation("a", 0, 100));
        store.record(observation("a", 3, 300));
        store.record(observation("a", 1, 150));

        let latest = store.latest("a").unwrap();
        assert_eq!(latest.views, 300);
        assert!(store.latest("missing").is_none());
    }

    #[test]
    fn growth_summary_spans_first_to_last() {
        let store = InMemoryHistoryStore::new();
        store.record(observation("a", 0, 100));
        store.record(observation("a", 1, 150));
        store.record(observation("a", 2, 140));

        let summary = summarize_growth(&store.history("a")).unwrap();
        assert_eq!(summary.views_delta, 40);
        assert_eq!(
            summary.from,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            summary.to,
            Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn growth_summary_needs_two_data_points() {
        let store = InMemoryHistoryStore::new();
        assert!(summarize_growth(&store.history("a")).is_none());

        store.record(observation("a", 0, 100));
        assert!(summarize_growth(&store.history("a")).is_none());
    }
}
