pub mod cache;
pub mod client;
pub mod config;
pub mod proto;
pub mod service;
pub mod trace;

pub use client::{query, query_with_timeout, ExchangeState, FailureReason, QueryError};
pub use mcstatus_model::{HostPort, Hostname, ServerAddress};
pub use proto::response::{StatusPayload, StatusResponse};
