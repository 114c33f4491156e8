use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Browsers hand out subscription keys as base64url, usually without padding
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Push subscription in the shape the notifications endpoint accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// Subscription keys, standard base64
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

impl PushSubscription {
    /// Build from the base64url keys a browser's `PushSubscription.toJSON()`
    /// produces, re-encoding them the way the API expects.
    pub fn from_browser_keys(endpoint: &str, p256dh: &str, auth: &str) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: reencode(p256dh)?,
                auth: reencode(auth)?,
            },
        })
    }
}

fn reencode(url_safe: &str) -> Result<String> {
    let raw = URL_SAFE_LENIENT.decode(url_safe.trim())?;
    Ok(STANDARD.encode(raw))
}
