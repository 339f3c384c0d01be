//! Token session state machine.
//!
//! Mirrors the server-held token collection through create, revoke,
//! regenerate, and rate-limit edit operations. The server stays the source
//! of truth: every successful mutation re-fetches the full list instead of
//! patching the local copy, so server-side effects (rate-limit defaults,
//! ID normalization) never drift from what is displayed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::client::TokenServiceClient;
use crate::errors::SessionError;
use crate::models::token::{ApiToken, RevokeSelector};

/// IDs the service will accept; anything else is rejected before a request
/// is issued.
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new("^[A-Za-z0-9_-]+$").unwrap());

/// In-progress rate-limit edit. At most one token is editable at a time;
/// starting an edit on another token discards this one.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    pub token_id: String,
    /// Raw user input; parsed as base-10 only when the edit is saved.
    pub draft_rate_limit: String,
}

#[derive(Debug, Default)]
struct SessionState {
    tokens: Vec<ApiToken>,
    edit: Option<EditBuffer>,
    pending_new_token: Option<String>,
    last_error: Option<String>,
    /// Issue number of the most recently applied list fetch.
    applied_refresh_seq: u64,
}

/// Client-side view of the token collection with explicit transitions.
///
/// Operations that talk to the service return `true` on success and park
/// the user-facing failure text in [`last_error`](Self::last_error); errors
/// do not propagate past the operation boundary. The state mutex is never
/// held across a network await, so a session shared between tasks stays
/// responsive and the refresh sequence guard stays meaningful.
pub struct TokenSession {
    client: TokenServiceClient,
    state: Mutex<SessionState>,
    /// Monotonic issue counter for list fetches. A completed fetch is
    /// applied only if nothing issued later has been applied before it, so
    /// a slow stale refresh cannot clobber the refresh of a newer mutation.
    refresh_seq: AtomicU64,
    /// Raised while a mutating call is outstanding. Advisory: hosts disable
    /// the triggering control off this instead of taking a lock. A hung
    /// request leaves it raised for as long as the transport allows.
    mutation_in_flight: AtomicBool,
}

impl TokenSession {
    pub fn new(client: TokenServiceClient) -> Self {
        Self {
            client,
            state: Mutex::new(SessionState::default()),
            refresh_seq: AtomicU64::new(0),
            mutation_in_flight: AtomicBool::new(false),
        }
    }

    // ── Snapshot accessors ────────────────────────────────────

    /// Cached token list as of the last applied refresh.
    pub fn tokens(&self) -> Vec<ApiToken> {
        self.state().tokens.clone()
    }

    /// The open edit, if any.
    pub fn edit_buffer(&self) -> Option<EditBuffer> {
        self.state().edit.clone()
    }

    /// One-time plaintext from the most recent successful create or
    /// regenerate. Sticky: only the next create or regenerate replaces it,
    /// since once dropped the secret is unrecoverable.
    pub fn pending_new_token(&self) -> Option<String> {
        self.state().pending_new_token.clone()
    }

    /// User-facing failure text from the most recent operation, if it
    /// failed.
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    /// Whether a mutating call is currently outstanding.
    pub fn mutation_in_flight(&self) -> bool {
        self.mutation_in_flight.load(Ordering::SeqCst)
    }

    // ── Operations ────────────────────────────────────────────

    /// Replace the cached list with a fresh server snapshot. On failure the
    /// stale list is retained.
    pub async fn refresh(&self) -> bool {
        let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state().last_error = None;

        match self.client.list_tokens().await {
            Ok(tokens) => {
                let mut state = self.state();
                if seq > state.applied_refresh_seq {
                    state.tokens = tokens;
                    state.applied_refresh_seq = seq;
                } else {
                    // A fetch issued after this one already landed.
                    debug!(
                        "discarding stale token list fetch (seq {}, applied {})",
                        seq, state.applied_refresh_seq
                    );
                }
                true
            }
            Err(e) => {
                warn!("token list fetch failed: {}", e);
                self.fail("failed to fetch token list")
            }
        }
    }

    /// Mint a new token under `id`. On success the one-time plaintext is
    /// parked in [`pending_new_token`](Self::pending_new_token) and the
    /// list is re-fetched.
    pub async fn create(&self, id: &str) -> bool {
        self.state().last_error = None;

        let id = id.trim();
        if id.is_empty() {
            return self.fail_with(SessionError::Validation("please enter a token ID".into()));
        }
        if !ID_PATTERN.is_match(id) {
            return self.fail_with(SessionError::Validation(
                "token IDs may only contain letters, digits, '-' and '_'".into(),
            ));
        }

        let _guard = self.mutation_guard();
        match self.client.add_token(id, None).await {
            Ok(plaintext) => {
                self.state().pending_new_token = Some(plaintext);
                self.refresh().await;
                true
            }
            Err(e) => {
                warn!("add token '{}' failed: {}", id, e);
                self.fail("failed to add token")
            }
        }
    }

    /// Revoke a token. Callers must have confirmed the action with the
    /// user before invoking this; the session does not prompt.
    pub async fn revoke(&self, selector: &RevokeSelector) -> bool {
        self.state().last_error = None;

        let _guard = self.mutation_guard();
        match self.client.revoke_token(selector).await {
            Ok(message) => {
                debug!("revoked '{}': {}", selector.value(), message);
                self.refresh().await;
                true
            }
            Err(e) => {
                warn!("revoke '{}' failed: {}", selector.value(), e);
                self.fail(e.revoke_message())
            }
        }
    }

    /// Re-issue `token_id` with a fresh secret, preserving its rate limit.
    ///
    /// There is no transactional regenerate on the wire: the old token is
    /// revoked first, then a replacement is minted under the same ID. If
    /// the mint fails the token is already gone, and that is reported as
    /// its own failure rather than a plain create error. Callers must have
    /// confirmed the action.
    pub async fn regenerate(&self, token_id: &str) -> bool {
        self.state().last_error = None;

        let rate_limit = self
            .state()
            .tokens
            .iter()
            .find(|t| t.id == token_id)
            .map(|t| t.rate_limit);
        let rate_limit = match rate_limit {
            Some(v) => v,
            None => {
                return self.fail_with(SessionError::Validation(format!(
                    "token '{}' is not in the current list; refresh and retry",
                    token_id
                )));
            }
        };

        let _guard = self.mutation_guard();

        if let Err(e) = self
            .client
            .revoke_token(&RevokeSelector::by_id(token_id))
            .await
        {
            warn!("regenerate '{}': revoke step failed: {}", token_id, e);
            return self.fail("failed to regenerate token");
        }

        match self.client.add_token(token_id, Some(rate_limit)).await {
            Ok(plaintext) => {
                self.state().pending_new_token = Some(plaintext);
                self.refresh().await;
                true
            }
            Err(e) => {
                let lost = SessionError::RegenerationLost {
                    id: token_id.to_string(),
                    source: Box::new(e),
                };
                warn!("{}", lost);
                // The old token is already deleted; resync so the list
                // shows that, then surface the compound failure (refresh
                // clears last_error, so the order matters).
                self.refresh().await;
                self.fail_with(lost)
            }
        }
    }

    /// Open an edit on `token_id`, seeding the draft from its current rate
    /// limit. Any in-progress edit on another token is discarded.
    pub fn begin_edit(&self, token_id: &str, current_rate_limit: u64) {
        let mut state = self.state();
        if let Some(prev) = &state.edit {
            if prev.token_id != token_id {
                debug!("discarding unsaved rate limit draft for '{}'", prev.token_id);
            }
        }
        state.edit = Some(EditBuffer {
            token_id: token_id.to_string(),
            draft_rate_limit: current_rate_limit.to_string(),
        });
    }

    /// Overwrite the draft of the open edit. Ignored when no edit is open.
    pub fn update_draft(&self, value: &str) {
        let mut state = self.state();
        match &mut state.edit {
            Some(edit) => edit.draft_rate_limit = value.to_string(),
            None => debug!("draft update with no edit open; ignored"),
        }
    }

    /// Abandon the open edit, if any.
    pub fn cancel_edit(&self) {
        self.state().edit = None;
    }

    /// Persist the open edit. The draft must parse as a base-10 integer;
    /// otherwise no request is issued and the edit stays open for
    /// correction. The edit also stays open when the service rejects the
    /// update, so the user can retry.
    pub async fn save_edit(&self) -> bool {
        self.state().last_error = None;

        let edit = self.state().edit.clone();
        let edit = match edit {
            Some(e) => e,
            None => return self.fail_with(SessionError::Validation("no edit in progress".into())),
        };

        let rate_limit: u64 = match edit.draft_rate_limit.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                return self.fail_with(SessionError::Validation(format!(
                    "rate limit '{}' is not a whole number",
                    edit.draft_rate_limit
                )));
            }
        };

        let _guard = self.mutation_guard();
        match self.client.edit_token(&edit.token_id, rate_limit).await {
            Ok(()) => {
                self.refresh().await;
                self.state().edit = None;
                true
            }
            Err(e) => {
                warn!("rate limit update for '{}' failed: {}", edit.token_id, e);
                self.fail("failed to update token")
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // A poisoned lock only means a holder panicked mid-transition; the
        // state itself is still coherent, so take it rather than wedge.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn fail(&self, message: impl Into<String>) -> bool {
        self.state().last_error = Some(message.into());
        false
    }

    /// Record an error whose Display form is already the user-facing text.
    fn fail_with(&self, error: SessionError) -> bool {
        self.fail(error.to_string())
    }

    fn mutation_guard(&self) -> MutationGuard<'_> {
        self.mutation_in_flight.store(true, Ordering::SeqCst);
        MutationGuard { flag: &self.mutation_in_flight }
    }
}

/// Clears the in-flight flag when the operation ends, on every path.
struct MutationGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A session whose client points at a closed port. Everything tested
    /// here short-circuits before the network, so nothing is ever sent.
    fn offline_session() -> TokenSession {
        TokenSession::new(TokenServiceClient::new("http://127.0.0.1:9", "test-admin"))
    }

    #[test]
    fn begin_edit_replaces_a_draft_on_another_token() {
        let session = offline_session();

        session.begin_edit("alpha", 10);
        session.update_draft("999");
        session.begin_edit("beta", 20);

        let edit = session.edit_buffer().unwrap();
        assert_eq!(edit.token_id, "beta");
        assert_eq!(edit.draft_rate_limit, "20");
    }

    #[test]
    fn update_draft_overwrites_the_open_edit() {
        let session = offline_session();

        session.begin_edit("alpha", 10);
        session.update_draft("15");
        session.update_draft("25");

        assert_eq!(session.edit_buffer().unwrap().draft_rate_limit, "25");
    }

    #[test]
    fn update_draft_without_an_edit_is_ignored() {
        let session = offline_session();
        session.update_draft("15");
        assert!(session.edit_buffer().is_none());
    }

    #[test]
    fn cancel_edit_clears_the_buffer() {
        let session = offline_session();
        session.begin_edit("alpha", 10);
        session.cancel_edit();
        assert!(session.edit_buffer().is_none());
    }

    #[tokio::test]
    async fn save_edit_without_an_edit_fails() {
        let session = offline_session();
        assert!(!session.save_edit().await);
        assert_eq!(session.last_error().unwrap(), "no edit in progress");
    }

    #[tokio::test]
    async fn save_edit_rejects_a_non_integer_draft() {
        let session = offline_session();
        session.begin_edit("alpha", 10);
        session.update_draft("abc");

        assert!(!session.save_edit().await);
        // The edit stays open so the user can correct it.
        let edit = session.edit_buffer().unwrap();
        assert_eq!(edit.draft_rate_limit, "abc");
        assert!(session.last_error().unwrap().contains("whole number"));
    }

    #[tokio::test]
    async fn save_edit_rejects_a_negative_draft() {
        let session = offline_session();
        session.begin_edit("alpha", 10);
        session.update_draft("-3");

        assert!(!session.save_edit().await);
        assert!(session.edit_buffer().is_some());
    }

    #[tokio::test]
    async fn create_rejects_blank_and_malformed_ids() {
        let session = offline_session();

        assert!(!session.create("   ").await);
        assert_eq!(session.last_error().unwrap(), "please enter a token ID");

        assert!(!session.create("bad#id").await);
        assert!(session.last_error().unwrap().contains("letters, digits"));
    }

    #[tokio::test]
    async fn regenerate_requires_a_locally_known_token() {
        let session = offline_session();
        assert!(!session.regenerate("ghost").await);
        assert!(session.last_error().unwrap().contains("not in the current list"));
    }

    #[tokio::test]
    async fn each_operation_clears_the_previous_error() {
        let session = offline_session();

        assert!(!session.create("bad#id").await);
        assert!(session.last_error().is_some());

        // save_edit parses "10" fine but the network is closed, so the
        // create error is gone and the update error replaced it.
        session.begin_edit("alpha", 10);
        assert!(!session.save_edit().await);
        assert_eq!(session.last_error().unwrap(), "failed to update token");
    }

    #[test]
    fn mutation_flag_is_clear_at_rest() {
        let session = offline_session();
        assert!(!session.mutation_in_flight());
    }
}
