use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ed25519_dalek::SigningKey;

use crate::actions::atomic::UserAtomicSubaction;
use crate::actions::session::{create_session, revoke_session, SESSION_TTL};
use crate::actions::signing::{sign_hex_encoded_payload, sign_raw_payload};
use crate::actions::{AtomicSubactionResult, SignFn};
use crate::client::Venue;
use crate::error::{Result, VenueError};
use crate::types::*;

/// User client for the exchange.
///
/// Manages session-based authentication, atomic order submission, and
/// account queries.
pub struct VenueUser {
    pub venue: Arc<Venue>,
    pub public_key: [u8; 32],
    pub session_pubkey: [u8; 32],
    pub session_id: Option<u64>,
    nonce: AtomicU32,
    /// Signing function for user-level actions (hex-encoded).
    sign_user_fn: Box<SignFn>,
    /// Signing function for session-level actions (raw).
    sign_session_fn: Box<SignFn>,

    pub account_ids: Option<Vec<u32>>,
    pub orders: HashMap<String, Vec<OpenOrder>>,
    pub positions: HashMap<String, Vec<PositionSummary>>,
    pub margins: HashMap<String, AccountMarginsView>,
}

impl VenueUser {
    /// Create a `VenueUser` from a private key string (bs58 encoded).
    pub fn from_private_key(venue: Arc<Venue>, private_key: &str) -> Result<Self> {
        let signing_key = crate::utils::keypair_from_private_key(private_key)?;
        let public_key = signing_key.verifying_key().to_bytes();

        // For session, generate a separate keypair.
        let session_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let session_pubkey = session_key.verifying_key().to_bytes();

        let user_key = signing_key.clone();
        let sign_user_fn: Box<SignFn> = Box::new(move |payload: &[u8]| {
            let key = user_key.clone();
            let payload = payload.to_vec();
            Box::pin(async move { sign_hex_encoded_payload(&payload, &key).await })
        });

        let sess_key = session_key.clone();
        let sign_session_fn: Box<SignFn> = Box::new(move |payload: &[u8]| {
            let key = sess_key.clone();
            let payload = payload.to_vec();
            Box::pin(async move { sign_raw_payload(&payload, &key).await })
        });

        Ok(Self {
            venue,
            public_key,
            session_pubkey,
            session_id: None,
            nonce: AtomicU32::new(0),
            sign_user_fn,
            sign_session_fn,
            account_ids: None,
            orders: HashMap::new(),
            positions: HashMap::new(),
            margins: HashMap::new(),
        })
    }

    /// Get a new nonce for actions.
    pub fn get_nonce(&self) -> u32 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Refresh the session (create a new one).
    pub async fn refresh_session(&mut self) -> Result<()> {
        let timestamp = self.venue.get_timestamp().await?;
        let nonce = self.get_nonce();

        let user_pubkey = bs58::encode(&self.public_key).into_string();
        let session_pubkey = bs58::encode(&self.session_pubkey).into_string();

        let (action_id, session_id) = create_session(
            &self.venue.http_client,
            &self.sign_user_fn,
            timestamp,
            nonce,
            &user_pubkey,
            &session_pubkey,
            Some(timestamp + SESSION_TTL),
        )
        .await?;

        tracing::info!(action_id, session_id, "session created");
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Revoke a session.
    pub async fn revoke_session(&mut self, session_id: u64) -> Result<()> {
        let timestamp = self.venue.get_timestamp().await?;
        let nonce = self.get_nonce();

        revoke_session(
            &self.venue.http_client,
            &self.sign_user_fn,
            timestamp,
            nonce,
            session_id,
        )
        .await?;

        if self.session_id == Some(session_id) {
            self.session_id = None;
        }
        Ok(())
    }

    /// Update account IDs by querying the server.
    pub async fn update_account_id(&mut self) -> Result<()> {
        let pubkey = bs58::encode(&self.public_key).into_string();
        let user = self.venue.get_user(&pubkey).await?;
        self.account_ids = Some(user.account_ids);
        Ok(())
    }

    /// Fetch account info (orders, positions, margins) for every known account.
    pub async fn fetch_info(&mut self) -> Result<()> {
        let account_ids = self
            .account_ids
            .as_ref()
            .ok_or(VenueError::NoAccount)?
            .clone();

        self.orders.clear();
        self.positions.clear();
        self.margins.clear();

        for &account_id in &account_ids {
            let account = self.venue.get_account(account_id).await?;
            let key = account_id.to_string();

            self.orders.insert(key.clone(), account.orders);
            self.positions.insert(key.clone(), account.positions);
            self.margins.insert(key.clone(), account.margins);
        }

        Ok(())
    }

    fn check_session(&self) -> Result<u64> {
        self.session_id
            .ok_or_else(|| VenueError::SessionInvalid("no active session".into()))
    }

    fn default_account_id(&self) -> Result<u32> {
        self.account_ids
            .as_ref()
            .and_then(|ids| ids.first().copied())
            .ok_or(VenueError::NoAccount)
    }

    /// Execute up to `MAX_ATOMIC_ACTIONS` place/cancel operations atomically.
    pub async fn atomic(
        &self,
        user_actions: &[UserAtomicSubaction],
        account_id: Option<u32>,
    ) -> Result<AtomicResult> {
        let session_id = self.check_session()?;
        let acct = account_id
            .or_else(|| self.default_account_id().ok())
            .ok_or(VenueError::NoAccount)?;

        let timestamp = self.venue.get_timestamp().await?;
        let nonce = self.get_nonce();

        let (action_id, results) = crate::actions::atomic::atomic(
            &self.venue.http_client,
            &self.sign_session_fn,
            timestamp,
            nonce,
            session_id,
            acct,
            &self.venue.markets,
            user_actions,
        )
        .await?;

        Ok(AtomicResult { action_id, results })
    }
}

// Result types for user operations.

/// Result of an atomic (batched) action.
#[derive(Debug)]
pub struct AtomicResult {
    pub action_id: u64,
    pub results: Vec<AtomicSubactionResult>,
}
