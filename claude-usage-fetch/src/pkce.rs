//! PKCE verifier, challenge, and state generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::digest::{SHA256, digest};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::warn;
use uuid::Uuid;

/// Random bytes behind a code verifier.
pub const VERIFIER_BYTES: usize = 32;

/// Random bytes behind a state parameter.
pub const STATE_BYTES: usize = 24;

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns `byte_count` random bytes as unpadded URL-safe base64.
///
/// Never fails. If the system random source is unavailable the result is
/// derived from UUIDs seeded with the clock, process id, and a counter.
pub fn random_url_safe_string(byte_count: usize) -> String {
    let mut bytes = vec![0u8; byte_count];
    match SystemRandom::new().fill(&mut bytes) {
        Ok(()) => URL_SAFE_NO_PAD.encode(&bytes),
        Err(_) => {
            warn!("System random source unavailable, using UUID fallback");
            fallback_string(byte_count)
        }
    }
}

fn fallback_string(byte_count: usize) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let pid = std::process::id();

    let mut bytes = Vec::with_capacity(byte_count + 16);
    while bytes.len() < byte_count {
        let counter = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{nanos}:{pid}:{counter}").as_bytes());
        bytes.extend_from_slice(id.as_bytes());
    }
    bytes.truncate(byte_count);
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// S256 code challenge: SHA-256 of the verifier, unpadded URL-safe base64.
pub fn code_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(digest(&SHA256, code_verifier.as_bytes()))
}

/// A fresh verifier/challenge/state triple.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceTriple {
    /// Secret kept in memory until the code exchange.
    pub code_verifier: String,
    /// Challenge sent with the authorize request.
    pub code_challenge: String,
    /// CSRF state echoed back by the callback.
    pub state: String,
}

impl PkceTriple {
    /// Generates a new triple.
    pub fn generate() -> Self {
        let code_verifier = random_url_safe_string(VERIFIER_BYTES);
        let code_challenge = code_challenge(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
            state: random_url_safe_string(STATE_BYTES),
        }
    }
}

impl std::fmt::Debug for PkceTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceTriple")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish()
    }
}
