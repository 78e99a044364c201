use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Terminal tokens mapped to the `KeyboardEvent.code` values robot profiles are keyed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeymapConfig {
    pub keys: BTreeMap<String, String>,
}

impl Default for KeymapConfig {
    fn default() -> Self {
        let keys = [
            ("w", "KeyW"),
            ("a", "KeyA"),
            ("s", "KeyS"),
            ("d", "KeyD"),
            ("h", "KeyH"),
            ("k", "KeyK"),
            ("l", "KeyL"),
        ]
        .into_iter()
        .map(|(token, code)| (token.to_string(), code.to_string()))
        .collect();
        KeymapConfig { keys }
    }
}

impl KeymapConfig {
    /// Key code for `token`; unmapped tokens pass through unchanged.
    pub fn key_code<'a>(&'a self, token: &'a str) -> &'a str {
        self.keys.get(token).map(String::as_str).unwrap_or(token)
    }
}
