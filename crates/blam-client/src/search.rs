//! Track search used when attaching a song to a post or comment.
//!
//! [`HttpTrackSearch`] talks to the search endpoint; [`DebouncedSearch`]
//! wraps any backend with the debounce, the enable flag and a sequence-number
//! freshness gate so that only the latest query's results are published.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use blam_shared::constants::{APP_NAME, SEARCH_PATH};
use blam_shared::Song;

use crate::error::{ClientError, Result};

#[async_trait]
pub trait TrackSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Song>>;
}

// ---------------------------------------------------------------------------
// HTTP backend
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    songs: Vec<TrackDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackDto {
    id: String,
    title: String,
    artist: String,
    album: Option<String>,
    /// Whole seconds.
    duration: Option<u32>,
    spotify_url: Option<String>,
    preview_url: Option<String>,
    image_url: Option<String>,
}

impl From<TrackDto> for Song {
    fn from(t: TrackDto) -> Self {
        Self {
            id: t.id,
            title: t.title,
            artist: t.artist,
            album: t.album,
            duration_seconds: t.duration,
            spotify_url: t.spotify_url,
            preview_url: t.preview_url,
            image_url: t.image_url,
        }
    }
}

pub struct HttpTrackSearch {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTrackSearch {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(APP_NAME)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, SEARCH_PATH)
    }
}

#[async_trait]
impl TrackSearch for HttpTrackSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Song>> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Search(format!(
                "search endpoint returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.songs.into_iter().map(Song::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Debounce + freshness gate
// ---------------------------------------------------------------------------

/// What a search box renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    pub songs: Vec<Song>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct DebouncedSearch {
    backend: Arc<dyn TrackSearch>,
    debounce: Duration,
    limit: usize,
    seq: AtomicU64,
    enabled: AtomicBool,
    state: watch::Sender<SearchState>,
}

impl DebouncedSearch {
    pub fn new(backend: Arc<dyn TrackSearch>, debounce: Duration, limit: usize) -> Self {
        Self {
            backend,
            debounce,
            limit,
            seq: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
            state: watch::Sender::new(SearchState::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Disabling clears results and supersedes any pending search.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.seq.fetch_add(1, Ordering::SeqCst);
            self.state.send_modify(|s| {
                s.songs.clear();
                s.loading = false;
            });
        }
    }

    /// Search for `query` after the debounce period.
    ///
    /// Returns `Ok(None)` when a newer query superseded this one, either
    /// during the debounce or while the request was outstanding; stale
    /// results are never published. Empty queries, and any query while
    /// disabled, yield an empty list without calling the backend.
    pub async fn search(&self, query: &str) -> Result<Option<Vec<Song>>> {
        let ticket = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim().to_string();

        if query.is_empty() || !self.enabled.load(Ordering::SeqCst) {
            self.state.send_replace(SearchState {
                query,
                ..SearchState::default()
            });
            return Ok(Some(Vec::new()));
        }

        tokio::time::sleep(self.debounce).await;
        if !self.is_current(ticket) {
            debug!(%query, "search superseded during debounce");
            return Ok(None);
        }

        self.state.send_modify(|s| {
            s.query = query.clone();
            s.loading = true;
            s.error = None;
        });

        let result = self.backend.search(&query, self.limit).await;
        if !self.is_current(ticket) {
            debug!(%query, "discarding stale search results");
            return Ok(None);
        }

        match result {
            Ok(songs) => {
                debug!(%query, count = songs.len(), "search results");
                self.state.send_replace(SearchState {
                    query,
                    songs: songs.clone(),
                    loading: false,
                    error: None,
                });
                Ok(Some(songs))
            }
            Err(e) => {
                warn!(%query, error = %e, "track search failed");
                self.state.send_replace(SearchState {
                    query,
                    songs: Vec::new(),
                    loading: false,
                    error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.seq.load(Ordering::SeqCst) == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockSearch {
        calls: Mutex<Vec<String>>,
        /// Queries that take this long to answer.
        slow: Mutex<Vec<(String, Duration)>>,
        fail: AtomicBool,
    }

    impl MockSearch {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrackSearch for MockSearch {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Song>> {
            self.calls.lock().unwrap().push(query.to_string());
            let delay = self
                .slow
                .lock()
                .unwrap()
                .iter()
                .find(|(q, _)| q == query)
                .map(|(_, d)| *d);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Search("Failed to search tracks".into()));
            }
            Ok(vec![Song {
                id: format!("trk-{query}"),
                title: query.to_string(),
                artist: "Various".into(),
                ..Default::default()
            }])
        }
    }

    fn debounced(backend: &Arc<MockSearch>) -> Arc<DebouncedSearch> {
        Arc::new(DebouncedSearch::new(
            backend.clone(),
            Duration::from_millis(300),
            10,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_query_hits_backend() {
        let backend = Arc::new(MockSearch::default());
        let search = debounced(&backend);

        let first = tokio::spawn({
            let search = search.clone();
            async move { search.search("radio").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = search.search("radiohead").await.unwrap();

        assert!(first.await.unwrap().unwrap().is_none());
        assert_eq!(second.unwrap()[0].title, "radiohead");
        assert_eq!(backend.calls(), vec!["radiohead".to_string()]);
        assert_eq!(search.state().query, "radiohead");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_discarded() {
        let backend = Arc::new(MockSearch::default());
        backend
            .slow
            .lock()
            .unwrap()
            .push(("slow".into(), Duration::from_millis(500)));
        let search = debounced(&backend);

        let first = tokio::spawn({
            let search = search.clone();
            async move { search.search("slow").await }
        });
        // The first request is already outstanding at this point.
        tokio::time::sleep(Duration::from_millis(400)).await;
        let second = search.search("fast").await.unwrap();

        assert!(first.await.unwrap().unwrap().is_none());
        assert!(second.is_some());
        assert_eq!(backend.calls(), vec!["slow".to_string(), "fast".to_string()]);

        let state = search.state();
        assert_eq!(state.query, "fast");
        assert_eq!(state.songs[0].title, "fast");
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_or_disabled_skips_backend() {
        let backend = Arc::new(MockSearch::default());
        let search = debounced(&backend);

        assert_eq!(search.search("   ").await.unwrap(), Some(vec![]));
        search.set_enabled(false);
        assert_eq!(search.search("blur").await.unwrap(), Some(vec![]));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_recorded_in_state() {
        let backend = Arc::new(MockSearch::default());
        backend.fail.store(true, Ordering::SeqCst);
        let search = debounced(&backend);

        assert!(search.search("anything").await.is_err());
        let state = search.state();
        assert!(state.songs.is_empty());
        assert!(state.error.is_some());
        assert!(!state.loading);
    }

    #[test]
    fn test_response_decoding() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"songs":[{"id":"4uLU6hMCjMI75M1A2tKUQC","title":"Never Gonna Give You Up",
                "artist":"Rick Astley","album":"Whenever You Need Somebody","duration":213,
                "spotifyUrl":"https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC",
                "previewUrl":null}]}"#,
        )
        .unwrap();
        let songs: Vec<Song> = body.songs.into_iter().map(Song::from).collect();
        assert_eq!(songs[0].duration_seconds, Some(213));
        assert_eq!(songs[0].preview_url, None);

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.songs.is_empty());
    }

    #[test]
    fn test_endpoint_url() {
        let http = HttpTrackSearch::new("http://localhost:3000/").unwrap();
        assert_eq!(http.endpoint(), "http://localhost:3000/api/spotify/search");
    }
}
