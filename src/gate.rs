//! API-key gate: the app shows the key form until a key is stored.

use crate::llm::Credential;

/// Name under which the key is persisted on the client.
pub const API_KEY_STORAGE_KEY: &str = "wordcraftApiKeyV1";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyGate {
    #[default]
    NoKey,
    KeyEntry {
        error: Option<String>,
    },
    Ready(Credential),
}

impl KeyGate {
    /// Decides the initial state from whatever the client has stored.
    pub fn from_stored(stored: Option<&str>) -> Self {
        match stored.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => KeyGate::Ready(Credential::new(value)),
            None => KeyGate::NoKey,
        }
    }

    pub fn begin_entry(self) -> Self {
        match self {
            KeyGate::NoKey => KeyGate::KeyEntry { error: None },
            other => other,
        }
    }

    pub fn submit(self, input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return KeyGate::KeyEntry {
                error: Some("API Key cannot be empty.".to_string()),
            };
        }
        KeyGate::Ready(Credential::new(trimmed))
    }

    pub fn clear(self) -> Self {
        KeyGate::NoKey
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            KeyGate::Ready(credential) => Some(credential),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, KeyGate::Ready(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            KeyGate::KeyEntry { error } => error.as_deref(),
            _ => None,
        }
    }
}
