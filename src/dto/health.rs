use serde::Serialize;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status; always "ok" while the process is serving.
    pub status: String,
    /// Number of songs in the loaded catalogue.
    pub songs: usize,
}

impl HealthResponse {
    /// Create a health response for a catalogue of `songs` entries.
    pub fn ok(songs: usize) -> Self {
        Self {
            status: "ok".to_string(),
            songs,
        }
    }
}
