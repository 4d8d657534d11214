/// Configuration for the venue client.
#[derive(Debug, Clone)]
pub struct VenueConfig {
    /// Base URL for the venue's web server (e.g. `https://venue.example.com`).
    pub web_server_url: String,
}
