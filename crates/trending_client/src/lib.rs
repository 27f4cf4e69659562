use chrono::{DateTime, Utc};
use domain::TrendingVideo;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Production endpoint of the YouTube Data API v3.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// How long a (region, max results) result set is served from memory
/// before a fresh request is issued.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Errors from the trending fetch and the connectivity probe.
///
/// An empty trending chart is NOT an error: it comes back as `Ok` with an
/// empty vec, so callers can tell "nothing trending" apart from "call failed".
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure (DNS, connect, timeout). Not retried.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success HTTP status. Carries the status
    /// and the API's own error message when the body was parseable.
    #[error("API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("malformed API response: {0}")]
    Decode(String),
}

/// Response body of `GET /videos`, reduced to the fields this client reads.
#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    /// Absent entirely for videos with all counters disabled.
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    published_at: DateTime<Utc>,
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    medium: Thumbnail,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Counters arrive as decimal strings; any of them may be missing when the
/// uploader disabled the corresponding counter.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default)]
    view_count: Option<String>,
    #[serde(default)]
    like_count: Option<String>,
    #[serde(default)]
    comment_count: Option<String>,
}

/// Error body shape used by Google APIs: `{"error": {"code": .., "message": ..}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// One memoized result set with the instant it was fetched.
struct CacheEntry {
    fetched_at: Instant,
    videos: Vec<TrendingVideo>,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// Client for the most-popular chart of the YouTube Data API v3.
///
/// Holds the API key and a per-(region, max results) memoization table.
/// Each call produces an independent, immutable snapshot; repeat calls with
/// identical arguments inside the TTL window are served from memory.
pub struct TrendingClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    cache_ttl: Duration,
    cache: RwLock<HashMap<(String, u32), CacheEntry>>,
}

impl TrendingClient {
    /// Create a client against the production API endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, YOUTUBE_API_BASE)
    }

    /// Create a client against an alternate endpoint, e.g. a local mock server.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Override the memoization window. A zero TTL disables memoization.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Verify that the API key is usable with one minimal single-result query.
    ///
    /// Any success status counts as connected regardless of body content.
    /// On failure the error preserves the HTTP status and the API's message,
    /// so an invalid key is distinguishable from quota exhaustion or an outage.
    pub async fn verify_key(&self) -> Result<(), ApiError> {
        tracing::debug!(base_url = %self.base_url, "Probing API connectivity");

        let response = self
            .http
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("chart", "mostPopular"),
                ("maxResults", "1"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!("API connectivity verified");
            return Ok(());
        }

        let body = response.text().await?;
        let err = status_error(status, &body);
        tracing::warn!(status = %status, "API connectivity probe failed");
        Err(err)
    }

    /// Fetch the most-popular chart for a region.
    ///
    /// Records come back in the API's own popularity order; no client-side
    /// sort is applied. `region` and `max_results` are passed through without
    /// validation or clamping, so the upstream bounds (1-50) apply.
    pub async fn trending(
        &self,
        region: &str,
        max_results: u32,
    ) -> Result<Vec<TrendingVideo>, ApiError> {
        let key = (region.to_string(), max_results);
        {
            let cache = self
                .cache
                .read()
                .expect("Failed to acquire read lock on cache");
            if let Some(entry) = cache.get(&key) {
                if !entry.is_expired(self.cache_ttl) {
                    tracing::debug!(region, max_results, "Serving trending videos from cache");
                    return Ok(entry.videos.clone());
                }
            }
        }

        tracing::debug!(region, max_results, "Fetching trending videos");

        let max_results_param = max_results.to_string();
        let response = self
            .http
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "snippet,statistics,contentDetails"),
                ("chart", "mostPopular"),
                ("regionCode", region),
                ("maxResults", max_results_param.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(region, status = %status, "Trending fetch failed");
            return Err(status_error(status, &body));
        }

        let parsed: VideoListResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        let videos = normalize(parsed.items, Utc::now())?;

        tracing::info!(region, count = videos.len(), "Fetched trending videos");

        let mut cache = self
            .cache
            .write()
            .expect("Failed to acquire write lock on cache");
        cache.insert(
            key,
            CacheEntry {
                fetched_at: Instant::now(),
                videos: videos.clone(),
            },
        );

        Ok(videos)
    }
}

/// Turn raw response items into domain records, deriving recency against `now`.
fn normalize(
    items: Vec<VideoItem>,
    now: DateTime<Utc>,
) -> Result<Vec<TrendingVideo>, ApiError> {
    items
        .into_iter()
        .map(|item| {
            let views = parse_count("viewCount", item.statistics.view_count.as_deref())?;
            let likes = parse_count("likeCount", item.statistics.like_count.as_deref())?;
            let comments = parse_count("commentCount", item.statistics.comment_count.as_deref())?;
            Ok(TrendingVideo {
                video_url: format!("https://www.youtube.com/watch?v={}", item.id),
                video_id: item.id,
                title: item.snippet.title,
                channel_title: item.snippet.channel_title,
                published_at: item.snippet.published_at,
                views,
                likes,
                comments,
                thumbnail: item.snippet.thumbnails.medium.url,
                hours_since_published: domain::hours_since(item.snippet.published_at, now),
                category_name: "Trending".to_string(),
            })
        })
        .collect()
}

/// A missing counter means the counter is disabled and reads as zero.
/// A present but non-numeric counter is a malformed response.
fn parse_count(field: &str, value: Option<&str>) -> Result<u64, ApiError> {
    match value {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::Decode(format!("{field} is not numeric: {raw:?}"))),
    }
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().chars().take(200).collect());
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse_items(json: &str) -> Vec<VideoItem> {
        serde_json::from_str::<VideoListResponse>(json)
            .expect("response should deserialize")
            .items
    }

    #[test]
    fn normalizes_a_full_item() {
        let items = parse_items(
            r#"{"items":[{"id":"abc","snippet":{"title":"T","channelTitle":"C","publishedAt":"2024-01-01T00:00:00Z","thumbnails":{"medium":{"url":"u"}}},"statistics":{"viewCount":"100"}}]}"#,
        );
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let videos = normalize(items, now).unwrap();

        assert_eq!(videos.len(), 1);
        let v = &videos[0];
        assert_eq!(v.video_id, "abc");
        assert_eq!(v.title, "T");
        assert_eq!(v.channel_title, "C");
        assert_eq!(v.views, 100);
        assert_eq!(v.likes, 0);
        assert_eq!(v.comments, 0);
        assert_eq!(v.thumbnail, "u");
        assert_eq!(v.video_url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(v.hours_since_published, 24.0);
        assert_eq!(v.category_name, "Trending");
    }

    #[test]
    fn missing_statistics_object_yields_zero_counters() {
        let items = parse_items(
            r#"{"items":[{"id":"abc","snippet":{"title":"T","channelTitle":"C","publishedAt":"2024-01-01T00:00:00Z","thumbnails":{"medium":{"url":"u"}}}}]}"#,
        );
        let videos = normalize(items, Utc::now()).unwrap();
        assert_eq!(videos[0].views, 0);
        assert_eq!(videos[0].likes, 0);
        assert_eq!(videos[0].comments, 0);
    }

    #[test]
    fn preserves_api_order() {
        let items = parse_items(
            r#"{"items":[
                {"id":"b","snippet":{"title":"B","channelTitle":"C","publishedAt":"2024-01-01T00:00:00Z","thumbnails":{"medium":{"url":"u"}}},"statistics":{"viewCount":"1"}},
                {"id":"a","snippet":{"title":"A","channelTitle":"C","publishedAt":"2024-01-01T00:00:00Z","thumbnails":{"medium":{"url":"u"}}},"statistics":{"viewCount":"9"}}
            ]}"#,
        );
        let videos = normalize(items, Utc::now()).unwrap();
        let ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn empty_items_array_normalizes_to_empty_set() {
        let items = parse_items(r#"{"items":[]}"#);
        assert!(normalize(items, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn non_numeric_counter_is_a_decode_error() {
        let items = parse_items(
            r#"{"items":[{"id":"abc","snippet":{"title":"T","channelTitle":"C","publishedAt":"2024-01-01T00:00:00Z","thumbnails":{"medium":{"url":"u"}}},"statistics":{"viewCount":"lots"}}]}"#,
        );
        let err = normalize(items, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn malformed_timestamp_fails_deserialization() {
        let result = serde_json::from_str::<VideoListResponse>(
            r#"{"items":[{"id":"abc","snippet":{"title":"T","channelTitle":"C","publishedAt":"yesterday","thumbnails":{"medium":{"url":"u"}}}}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn status_error_extracts_api_message() {
        let body = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota."}}"#;
        match status_error(StatusCode::FORBIDDEN, body) {
            ApiError::Status { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("exceeded your quota"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_error_falls_back_to_raw_body() {
        match status_error(StatusCode::BAD_GATEWAY, "upstream unavailable") {
            ApiError::Status { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
