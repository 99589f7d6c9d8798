//! Client identity generation and persistence.

use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;

use crate::store::StateStore;

/// Sentinel left behind by first-run installs before an identity exists.
/// A persisted token equal to this value is treated as absent.
pub const PLACEHOLDER_TOKEN: &str = "unregistered";

/// Fixed fallback returned when storage fails, so callers never block on
/// identity resolution.
pub const FALLBACK_TOKEN: &str = "anonymous";

/// Length of a generated identity token in hex characters.
pub const TOKEN_LEN: usize = 32;

/// Resolves the stable client identity used to tag outbound API requests.
#[derive(Clone)]
pub struct IdentityService {
    state: Arc<dyn StateStore>,
    cached: Arc<Mutex<Option<String>>>,
}

impl IdentityService {
    /// Create a service over the given state store.
    #[must_use]
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self {
            state,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Return the persisted identity token, generating and persisting a new
    /// one when none exists (or only the placeholder does).
    ///
    /// Never fails outward: any storage error yields [`FALLBACK_TOKEN`].
    /// The resolved value is cached for the lifetime of the service, so
    /// repeated calls are stable and cheap.
    pub async fn get_or_create(&self) -> String {
        if let Some(token) = self.cached() {
            return token;
        }

        match self.state.identity().await {
            Ok(Some(token)) if !token.is_empty() && token != PLACEHOLDER_TOKEN => {
                self.cache(&token);
                token
            }
            Ok(_) => {
                let token = generate_token();
                if let Err(e) = self.state.set_identity(&token).await {
                    tracing::warn!(error = %e, "failed to persist identity token");
                    return FALLBACK_TOKEN.to_string();
                }
                tracing::debug!("generated new identity token");
                self.cache(&token);
                token
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read identity token");
                FALLBACK_TOKEN.to_string()
            }
        }
    }

    fn cached(&self) -> Option<String> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cache(&self, token: &str) {
        *self
            .cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }
}

/// Generate a fresh identity token: 16 random bytes, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN / 2];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().fold(
        String::with_capacity(TOKEN_LEN),
        |mut out, b| {
            use std::fmt::Write;
            let _ = write!(out, "{b:02x}");
            out
        },
    )
}
