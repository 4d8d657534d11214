//! Exchange client factory — connects to a venue and authenticates a user.
//!
//! Wraps venue SDK initialisation into a single `create_client` call that
//! produces a ready-to-trade [`MakerClient`].

use std::sync::Arc;

use tracing::info;
use venue::{Venue, VenueConfig, VenueUser};

use crate::error::MakerError;

/// A fully-initialised exchange client with authenticated user session.
pub struct MakerClient {
    /// Shared venue HTTP/WS client.
    pub venue: Arc<Venue>,
    /// Authenticated user with active session.
    pub user: VenueUser,
    /// Primary account ID on the exchange.
    pub account_id: u32,
}

/// Create a fully-initialised exchange client from a bs58-encoded private key.
///
/// This:
/// 1. Connects to `web_server_url` and fetches market/token info.
/// 2. Creates a `VenueUser` from the private key.
/// 3. Establishes a session and fetches account data.
///
/// # Errors
///
/// Returns [`MakerError::NoAccount`] if the wallet has no exchange account.
/// Returns [`MakerError::Venue`] for any SDK-level error.
pub async fn create_client(
    web_server_url: &str,
    private_key: &str,
) -> Result<MakerClient, MakerError> {
    info!(web_server_url, "connecting to venue");

    let config = VenueConfig {
        web_server_url: web_server_url.to_string(),
    };
    let venue = Arc::new(Venue::new(config).await?);

    let mut user = VenueUser::from_private_key(Arc::clone(&venue), private_key)?;
    // Log truncated public key for identification.
    let pk = &user.public_key;
    info!(
        wallet = format!("{:02x}{:02x}..{:02x}{:02x}", pk[0], pk[1], pk[30], pk[31]),
        "wallet loaded"
    );

    user.refresh_session().await?;
    user.update_account_id().await?;
    user.fetch_info().await?;

    let account_id = user
        .account_ids
        .as_ref()
        .and_then(|ids| ids.first().copied())
        .ok_or(MakerError::NoAccount)?;

    info!(account_id, "connected");

    Ok(MakerClient {
        venue,
        user,
        account_id,
    })
}
