//! Core data model shared across the login flow, identity clients and
//! session handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health check response
#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Correlation receipt returned by a successful OTP send.
///
/// The identifier is opaque; it binds the emailed code to the address it was
/// sent to and is consumed exactly once by the verify call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeReceipt {
    pub challenge_id: String,
}

/// Social sign-in provider metadata as returned by the identity service.
///
/// `icon` is a base64 image payload rendered inline on the sign-in page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Result of either authentication path.
///
/// `tokens` is opaque to this application and handed to the session layer
/// verbatim. `user` may be absent; the session is still considered
/// established with an empty user record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthOutcome {
    #[serde(default)]
    pub tokens: Option<Value>,
    #[serde(default)]
    pub user: Option<Value>,
}

/// Established session, persisted in the encrypted session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatehouseSession {
    pub tokens: Value,
    pub user: Value,
    pub established_at: DateTime<Utc>,
}

/// One-shot marker bridging the provider redirect round trip.
///
/// Written before the full-page navigation to the provider and consumed by
/// the first arrival at the callback route; its absence on a later arrival
/// is what keeps the code exchange from being submitted twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingLogin {
    pub provider: String,
    pub issued_at: DateTime<Utc>,
}
