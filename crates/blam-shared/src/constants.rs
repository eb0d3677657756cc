/// Application name
pub const APP_NAME: &str = "Blam";

/// Delay between the last keystroke and the track search request (ms)
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

/// Number of tracks requested from the search collaborator
pub const SEARCH_RESULT_LIMIT: usize = 10;

/// Path of the track search endpoint, relative to the search base URL
pub const SEARCH_PATH: &str = "/api/spotify/search";

/// Default base URL of the track search endpoint
pub const DEFAULT_SEARCH_URL: &str = "http://localhost:3000";

/// Window during which realtime notifications fold into one reload (ms)
pub const RELOAD_COALESCE_MS: u64 = 50;

/// Avatar assigned at sign-up when none is given
pub const DEFAULT_AVATAR: &str = "/music-lover-avatar.png";

/// Member count a freshly created custom community starts with
pub const NEW_COMMUNITY_MEMBER_COUNT: u64 = 1;
