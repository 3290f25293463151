use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use dashmap::DashMap;
use mcstatus_model::{HostPort, ServerAddress};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{
    cache::{Cache, MemoryCache},
    client::{self, QueryError},
    config::{CacheConfig, Config, QueryConfig},
    proto::response::StatusResponse,
};

/// Identifies whoever asked for a status, used to keep their history apart
pub type UserId = u64;

/// A status lookup as typed by a user, before it is checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub host: String,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    EmptyHost,
    PortNotAllowed { port: u16, min_port: u16 },
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::EmptyHost => write!(f, "the server address must not be empty"),
            RequestError::PortNotAllowed { port, min_port } => {
                write!(f, "port {port} is not allowed, ports below {min_port} are refused")
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl From<HostPort> for StatusRequest {
    fn from(value: HostPort) -> Self {
        StatusRequest {
            host: value.host.to_string(),
            port: value.port,
        }
    }
}

impl StatusRequest {
    /// Check the request and resolve it into the address to query
    pub fn validate(&self, query: &QueryConfig) -> Result<ServerAddress, RequestError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(RequestError::EmptyHost);
        }

        let port = self.port.unwrap_or(query.default_port);
        if port < query.min_port {
            return Err(RequestError::PortNotAllowed {
                port,
                min_port: query.min_port,
            });
        }

        Ok(ServerAddress::new(host, port, query.protocol_version))
    }
}

#[derive(Debug)]
struct History {
    /// Oldest first
    addresses: Vec<ServerAddress>,
    expires_at: Instant,
}

/// Answers status requests through a cache and remembers what each user asked for.
pub struct StatusService {
    query: QueryConfig,
    cache: CacheConfig,
    statuses: Arc<dyn Cache<ServerAddress, Arc<StatusResponse>>>,
    history: DashMap<UserId, History>,
}

impl StatusService {
    pub fn new(config: &Config) -> Self {
        let statuses: MemoryCache<ServerAddress, Arc<StatusResponse>> = MemoryCache::new();
        Self::with_cache(config, Arc::new(statuses))
    }

    pub fn with_cache(
        config: &Config,
        statuses: Arc<dyn Cache<ServerAddress, Arc<StatusResponse>>>,
    ) -> Self {
        StatusService {
            query: config.query.clone(),
            cache: config.cache.clone(),
            statuses,
            history: DashMap::new(),
        }
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.query
    }

    /// Fetch the status of `address`, from the cache when it is fresh.
    ///
    /// Only successful queries are cached and added to the user's history.
    #[tracing::instrument(skip(self), fields(address = %address))]
    pub async fn request_status(
        &self,
        user: UserId,
        address: &ServerAddress,
    ) -> Result<Arc<StatusResponse>, QueryError> {
        if let Some(status) = self.statuses.get(address) {
            trace!("cache hit");
            return Ok(status);
        }

        let status = Arc::new(client::query_with_timeout(address, self.query.timeout()).await?);

        self.statuses.purge_expired();
        if !self
            .statuses
            .put(address.clone(), status.clone(), self.cache.status_ttl())
        {
            debug!("status was cached concurrently");
        }

        self.record(user, address);

        Ok(status)
    }

    fn record(&self, user: UserId, address: &ServerAddress) {
        let now = Instant::now();
        let fresh = || History {
            addresses: vec![address.clone()],
            expires_at: now + self.cache.history_ttl(),
        };

        // Users who never come back would otherwise keep their history forever
        self.history.retain(|_, history| history.expires_at > now);

        match self.history.entry(user) {
            dashmap::Entry::Occupied(mut occupied) if occupied.get().expires_at > now => {
                let addresses = &mut occupied.get_mut().addresses;
                addresses.retain(|previous| previous != address);
                addresses.push(address.clone());
            }
            dashmap::Entry::Occupied(mut occupied) => {
                occupied.insert(fresh());
            }
            dashmap::Entry::Vacant(vacant) => {
                vacant.insert(fresh());
            }
        }
    }

    /// Addresses the user successfully queried, most recent first
    pub fn previous_requests(&self, user: UserId) -> Vec<ServerAddress> {
        let now = Instant::now();

        let expired = match self.history.get(&user) {
            Some(history) if history.expires_at > now => {
                return history.addresses.iter().rev().cloned().collect();
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.history
                .remove_if(&user, |_, history| history.expires_at <= now);
        }

        Vec::new()
    }

    /// Previous requests whose host contains `input`, for completing a partly typed address
    pub fn suggestions(&self, user: UserId, input: &str) -> Vec<ServerAddress> {
        let input = input.trim();

        self.previous_requests(user)
            .into_iter()
            .filter(|address| address.host.contains(input))
            .take(self.cache.history_limit)
            .collect()
    }
}
