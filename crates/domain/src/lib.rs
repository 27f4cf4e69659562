use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single trending video as returned by one fetch of the most-popular chart.
///
/// This is a transient snapshot: counters reflect whatever the API reported
/// at retrieval time, and two independent fetches are not a verified series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingVideo {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub thumbnail: String,
    pub video_url: String,
    /// Hours between `published_at` and the wall clock at normalization time.
    /// Recomputed on every fetch, so it is a function of when the query ran.
    pub hours_since_published: f64,
    pub category_name: String,
}

impl TrendingVideo {
    /// Likes per view. Zero when the video has no views yet.
    pub fn engagement_rate(&self) -> f64 {
        if self.views == 0 {
            0.0
        } else {
            self.likes as f64 / self.views as f64
        }
    }

    /// Comments per view. Zero when the video has no views yet.
    pub fn comment_rate(&self) -> f64 {
        if self.views == 0 {
            0.0
        } else {
            self.comments as f64 / self.views as f64
        }
    }
}

/// One real observed data point for a video's counters.
///
/// Observations are keyed by (`video_id`, `observed_at`) and are append-only:
/// growth curves are derived from a sequence of these, never fabricated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendObservation {
    pub video_id: String,
    pub observed_at: DateTime<Utc>,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub engagement_rate: f64,
    pub comment_rate: f64,
    pub region: String,
    pub category_name: String,
}

impl TrendObservation {
    /// Capture an observation from a fetched video.
    pub fn from_video(video: &TrendingVideo, region: &str, observed_at: DateTime<Utc>) -> Self {
        Self {
            video_id: video.video_id.clone(),
            observed_at,
            views: video.views,
            likes: video.likes,
            comments: video.comments,
            engagement_rate: video.engagement_rate(),
            comment_rate: video.comment_rate(),
            region: region.to_string(),
            category_name: video.category_name.clone(),
        }
    }
}

/// Hours elapsed between `published_at` and `now`.
///
/// Negative only if the API reports a future publication timestamp.
pub fn hours_since(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - published_at).num_seconds() as f64 / 3600.0
}
