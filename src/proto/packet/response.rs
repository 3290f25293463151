use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;

/// The JSON document a server answers a status request with.
///
/// Unknown fields are ignored and every optional field defaults, so any
/// reasonably well formed server answer decodes.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Players>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
    /// `data:image/png;base64,<payload>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default)]
    pub enforces_secure_chat: bool,
    #[serde(default)]
    pub prevents_chat_reports: bool,
    #[serde(
        default,
        rename = "modinfo",
        alias = "modInfo",
        skip_serializing_if = "Option::is_none"
    )]
    pub mod_info: Option<ModInfo>,
}

/// The version part of the JSON response to a ping
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
pub struct Version {
    pub name: String,
    pub protocol: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
pub struct Players {
    pub max: u32, // Max supported by vanilla server is 2^31 - 1
    pub online: u32,
    /// Chosen by the server, often absent or empty
    #[serde(default)]
    pub sample: Vec<Player>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
pub struct Player {
    pub name: String,
    pub id: Uuid,
}

/// The message of the day, either a bare string or a chat component
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(untagged)]
pub enum Description {
    PlainText(String),
    Component(ChatComponent),
    /// Arrays and other shapes that carry no top level text
    Other(serde_json::Value),
}

impl Description {
    pub fn text(&self) -> Option<&str> {
        match self {
            Description::PlainText(text) => Some(text),
            Description::Component(component) => component.text.as_deref(),
            Description::Other(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
pub struct ChatComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Styling, `extra` children and anything else the server sent
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Forge mod loader metadata
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
pub struct ModInfo {
    #[serde(rename = "type")]
    pub kind: SmolStr,
    #[serde(default, rename = "modList", alias = "mods")]
    pub mods: Vec<Mod>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
pub struct Mod {
    #[serde(rename = "modid", alias = "id")]
    pub id: SmolStr,
    pub version: SmolStr,
}

impl StatusPayload {
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_ref().and_then(Description::text)
    }

    /// Decode the PNG bytes out of the favicon data uri
    pub fn favicon_png(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        let favicon = self.favicon.as_deref()?;
        let data = favicon.rsplit_once(',').map_or(favicon, |(_, data)| data);

        // Some older servers wrap the base64 text
        Some(STANDARD.decode(data.replace(['\n', '\r'], "")))
    }

    /// Attach the measured round trip, completing the response
    pub fn with_latency(self, latency: Duration) -> StatusResponse {
        StatusResponse {
            status: self,
            ping: latency.as_secs_f64() * 1000.0,
        }
    }
}

/// The outcome of a full status exchange: the payload plus the measured ping.
#[derive(Serialize, Debug, Clone)]
pub struct StatusResponse {
    #[serde(flatten)]
    status: StatusPayload,
    ping: f64,
}

impl StatusResponse {
    pub fn status(&self) -> &StatusPayload {
        &self.status
    }

    pub fn into_status(self) -> StatusPayload {
        self.status
    }

    /// Round trip of the ping packet in milliseconds
    pub fn ping(&self) -> f64 {
        self.ping
    }

    pub fn latency(&self) -> Duration {
        Duration::from_secs_f64(self.ping / 1000.0)
    }
}
