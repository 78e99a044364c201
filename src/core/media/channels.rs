//! Channel listing from the media server's monitor endpoint.

use std::fmt;

use anyhow::{Result, bail};
use log::{debug, info};
use serde::Deserialize;

use crate::core::media::endpoint::{OriginScheme, channel_list_url};

/// Channel ids come back as numbers or strings depending on the server build.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChannelId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Number(id) => write!(f, "{}", id),
            ChannelId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub state: i64,
    #[serde(default)]
    pub blocked: bool,
}

impl ChannelInfo {
    pub fn is_live(&self) -> bool {
        self.state == 1
    }

    /// Display label: live wins over blocked.
    pub fn label(&self) -> String {
        if self.is_live() {
            format!("{} (live)", self.name)
        } else if self.blocked {
            format!("{} (blocked)", self.name)
        } else {
            self.name.clone()
        }
    }
}

pub struct ChannelDirectory {
    client: reqwest::Client,
}

impl Default for ChannelDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn fetch(&self, host: &str, port: u16, scheme: OriginScheme) -> Result<Vec<ChannelInfo>> {
        let url = channel_list_url(host, port, scheme)?;
        info!("Fetching channel list from {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("HTTP error: {}", response.status());
        }

        let channels: Vec<ChannelInfo> = response.json().await?;
        debug!("Received {} channels", channels.len());
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_state() {
        let body = r#"[
            {"id": 1, "name": "instant", "state": 1, "blocked": true},
            {"id": "2", "name": "lab", "state": 0, "blocked": true},
            {"id": 3, "name": "idle"}
        ]"#;
        let channels: Vec<ChannelInfo> = serde_json::from_str(body).unwrap();
        let labels: Vec<String> = channels.iter().map(ChannelInfo::label).collect();
        assert_eq!(labels, ["instant (live)", "lab (blocked)", "idle"]);
        assert_eq!(channels[1].id.to_string(), "2");
        assert_eq!(channels[0].id, ChannelId::Number(1));
    }
}
