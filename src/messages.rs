//! Cross-context message contract.
//!
//! Messages travel as JSON text tagged by a `type` field, both over the
//! same-origin broadcast channel and through the host/extension postMessage
//! relay. Receivers must check the carried `stateKey` against their own before
//! applying a payload; unknown message types are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{Appearance, SavedState};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    /// Embedded context asks its host/relay for the current snapshot.
    #[serde(rename = "REQUEST_STATE")]
    RequestState {
        #[serde(rename = "stateKey")]
        state_key: String,
    },
    /// Full snapshot push (relay response or canonical change notification).
    /// The state payload stays a raw JSON value so receivers run the lenient
    /// field-by-field validator instead of failing on odd documents.
    #[serde(rename = "SOOTY_STATE_SYNC")]
    StateSync {
        #[serde(rename = "stateKey")]
        state_key: String,
        state: Value,
    },
    /// Host tap signal (e.g. click on the injected widget's drag handle).
    #[serde(rename = "COMPANION_TAP")]
    CompanionTap,
    #[serde(rename = "OPEN_COMPANION")]
    OpenCompanion,
    #[serde(rename = "CLOSE_COMPANION")]
    CloseCompanion,
    /// Appearance broadcast toward companion surfaces.
    #[serde(rename = "SOOTY_APPEARANCE")]
    AppearanceSync { appearance: Value },
}

impl SyncMessage {
    pub fn state_sync(state_key: &str, state: &SavedState) -> SyncMessage {
        SyncMessage::StateSync {
            state_key: state_key.to_string(),
            state: serde_json::to_value(state).unwrap_or(Value::Null),
        }
    }

    pub fn appearance_sync(appearance: &Appearance) -> SyncMessage {
        SyncMessage::AppearanceSync {
            appearance: serde_json::to_value(appearance).unwrap_or(Value::Null),
        }
    }

    /// Parse incoming message text; anything malformed or unknown is `None`
    /// and gets dropped by the caller.
    pub fn parse(raw: &str) -> Option<SyncMessage> {
        serde_json::from_str(raw).ok()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// True when this message either carries no state key or carries a
    /// matching one. Keyed payloads for other pets must not be applied.
    pub fn matches_key(&self, key: &str) -> bool {
        match self {
            SyncMessage::RequestState { state_key } | SyncMessage::StateSync { state_key, .. } => {
                state_key == key
            }
            _ => true,
        }
    }
}
