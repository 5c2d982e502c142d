//! Per-API bearer token cache with an injectable time source.
//!
//! A [`Token`] is usable while `now - issued_at < valid_for`. Anything else
//! (never issued, expired, or a clock that went backwards past `issued_at`)
//! forces a refresh before the token is handed out.

use std::fmt;
use std::time::{Duration, SystemTime};

/// Validity window assumed for every token this crate fetches.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(600);

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> SystemTime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Which cached token to operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Secure Endpoint v3 access token.
    Amp,
    /// SecureX / XDR bearer token.
    SecureX,
}

impl TokenKind {
    /// Parses `amp` or `securex`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "amp" => Some(TokenKind::Amp),
            "securex" => Some(TokenKind::SecureX),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Amp => "amp",
            TokenKind::SecureX => "securex",
        })
    }
}

/// A cached token slot.
#[derive(Clone, Default)]
pub struct Token {
    value: Option<String>,
    issued_at: Option<SystemTime>,
    valid_for: Duration,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("issued_at", &self.issued_at)
            .field("valid_for", &self.valid_for)
            .finish()
    }
}

impl Token {
    /// An empty slot; never usable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A slot holding `value`, fetched at `issued_at`.
    pub fn issued(value: String, issued_at: SystemTime, valid_for: Duration) -> Self {
        Token {
            value: Some(value),
            issued_at: Some(issued_at),
            valid_for,
        }
    }

    /// Whether the token exists and is younger than its validity window.
    pub fn is_usable(&self, now: SystemTime) -> bool {
        match (&self.value, self.issued_at) {
            (Some(_), Some(issued)) => now
                .duration_since(issued)
                .is_ok_and(|age| age < self.valid_for),
            _ => false,
        }
    }

    /// The token value if it is still usable at `now`.
    pub fn value_at(&self, now: SystemTime) -> Option<&str> {
        if self.is_usable(now) {
            self.value.as_deref()
        } else {
            None
        }
    }

    /// Empties the slot so the next check forces a refresh.
    pub fn clear(&mut self) {
        *self = Token::empty();
    }
}
