use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use serde::Deserialize;

/// Port a Java edition server listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 25565;

/// Protocol version sent in the handshake (1.21.4)
pub const DEFAULT_PROTOCOL_VERSION: i32 = 769;

/// A host name or IP literal. Comparison and hashing ignore case, including
/// outside ASCII, so `Bücher.example` and `bücher.example` name the same server.
#[derive(Debug, Clone)]
pub struct Hostname(Arc<str>);

impl From<String> for Hostname {
    fn from(value: String) -> Self {
        Hostname(Arc::from(value))
    }
}

impl From<&str> for Hostname {
    fn from(value: &str) -> Self {
        Hostname(Arc::from(value))
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for Hostname {
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl Eq for Hostname {}

impl Hash for Hostname {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.folded() {
            state.write_u32(u32::from(c));
        }
        // Terminate like `str` does so adjacent fields cannot bleed into each other
        state.write_u8(0xff);
    }
}

impl Hostname {
    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }

    /// Case-insensitive substring match
    pub fn contains(&self, needle: &str) -> bool {
        self.0.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// The target of a status query.
///
/// Two addresses are equal when their hosts match ignoring case and their
/// ports and protocol versions match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    pub host: Hostname,
    pub port: u16,
    pub protocol_version: i32,
}

impl ServerAddress {
    pub fn new(host: impl Into<Hostname>, port: u16, protocol_version: i32) -> Self {
        ServerAddress {
            host: host.into(),
            port,
            protocol_version,
        }
    }

    pub fn addr(&self) -> (&str, u16) {
        (self.host.as_ref(), self.port)
    }
}

impl Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A `host[:port]` pair as typed by a user or written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: Hostname,
    pub port: Option<u16>,
}

impl HostPort {
    pub fn into_address(self, default_port: u16, protocol_version: i32) -> ServerAddress {
        ServerAddress {
            host: self.host,
            port: self.port.unwrap_or(default_port),
            protocol_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPortParseError {
    EmptyHost,
    InvalidPort(String),
}

impl Display for HostPortParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPortParseError::EmptyHost => write!(f, "host must not be empty"),
            HostPortParseError::InvalidPort(port) => {
                write!(f, "port `{port}` is not a u16 value")
            }
        }
    }
}

impl std::error::Error for HostPortParseError {}

impl FromStr for HostPort {
    type Err = HostPortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        // Bare IPv6 literals contain colons of their own, only bracketed ones can carry a port
        let (host, port) = match s.strip_prefix('[') {
            Some(rest) => match rest.split_once(']') {
                Some((host, "")) => (host, None),
                Some((host, port)) => (host, Some(port.strip_prefix(':').unwrap_or(port))),
                None => (s, None),
            },
            None if s.matches(':').count() == 1 => match s.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            },
            None => (s, None),
        };

        if host.is_empty() {
            return Err(HostPortParseError::EmptyHost);
        }

        let port = port
            .map(|port| {
                port.parse()
                    .map_err(|_| HostPortParseError::InvalidPort(port.to_owned()))
            })
            .transpose()?;

        Ok(HostPort {
            host: Hostname::from(host),
            port,
        })
    }
}

impl<'d> Deserialize<'d> for HostPort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'d>,
    {
        struct HostPortVisitor;

        impl<'d> serde::de::Visitor<'d> for HostPortVisitor {
            type Value = HostPort;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    formatter,
                    "a string like <host_name> or <host_name>:<port> where <port> is a u16 value"
                )
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse()
                    .map_err(|_| E::invalid_value(serde::de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_str(HostPortVisitor)
    }
}

impl schemars::JsonSchema for HostPort {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "HostPort".into()
    }

    fn schema_id() -> std::borrow::Cow<'static, str> {
        concat!(module_path!(), "::HostPort").into()
    }

    fn json_schema(gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
        <String as schemars::JsonSchema>::json_schema(gen)
    }
}
