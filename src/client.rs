use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::{Duration, SystemTime},
};

use mcstatus_model::ServerAddress;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
    time::{timeout_at, Instant},
};
use tracing::{debug, trace};
use tracing_error::SpanTrace;

use crate::proto::{
    io::{
        parse_pong, parse_status_response, read_packet, write_handshake, write_ping,
        write_status_request,
    },
    response::StatusResponse,
    Handshake, ProtocolError,
};

/// The steps of a single status exchange, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Connecting,
    HandshakeSent,
    StatusRequested,
    AwaitingStatus,
    PingSent,
    AwaitingPong,
    Done,
}

impl Display for ExchangeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExchangeState::Connecting => "connecting",
            ExchangeState::HandshakeSent => "handshake sent",
            ExchangeState::StatusRequested => "status requested",
            ExchangeState::AwaitingStatus => "awaiting status",
            ExchangeState::PingSent => "ping sent",
            ExchangeState::AwaitingPong => "awaiting pong",
            ExchangeState::Done => "done",
        })
    }
}

/// Why an exchange failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Connect failure, deadline, or the connection closing early
    Unreachable,
    /// The status packet did not hold a valid status document
    MalformedResponse,
    VarIntTooLarge,
    UnexpectedEof,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::Unreachable => "server unreachable",
            FailureReason::MalformedResponse => "malformed status response",
            FailureReason::VarIntTooLarge => "var int too large",
            FailureReason::UnexpectedEof => "unexpected end of packet",
        })
    }
}

/// A failed exchange. No partial status is ever attached.
#[derive(Debug)]
pub struct QueryError {
    reason: FailureReason,
    state: ExchangeState,
    source: Box<dyn Error + Send + Sync>,
    span_trace: SpanTrace,
}

impl QueryError {
    fn new(
        reason: FailureReason,
        state: ExchangeState,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        QueryError {
            reason,
            state,
            source: source.into(),
            span_trace: SpanTrace::capture(),
        }
    }

    pub fn reason(&self) -> FailureReason {
        self.reason
    }

    /// The last state the exchange reached before failing
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.reason, self.state, self.source)
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.source as &(dyn Error + 'static))
    }
}

/// Failures while waiting on a frame mean the server went away, anything
/// else means it sent something unusable.
fn classify_frame(error: ProtocolError, state: ExchangeState) -> QueryError {
    let reason = match error {
        ProtocolError::UnexpectedEof | ProtocolError::Io(_) => FailureReason::Unreachable,
        ProtocolError::VarIntTooLarge => FailureReason::VarIntTooLarge,
        _ => FailureReason::MalformedResponse,
    };

    QueryError::new(reason, state, error)
}

fn classify_payload(error: ProtocolError, state: ExchangeState) -> QueryError {
    let reason = match error {
        ProtocolError::UnexpectedEof => FailureReason::UnexpectedEof,
        ProtocolError::VarIntTooLarge => FailureReason::VarIntTooLarge,
        _ => FailureReason::MalformedResponse,
    };

    QueryError::new(reason, state, error)
}

fn unreachable_while(state: ExchangeState) -> impl FnOnce(ProtocolError) -> QueryError {
    move |error| QueryError::new(FailureReason::Unreachable, state, error)
}

fn advance(state: &mut ExchangeState, next: ExchangeState) {
    trace!(from = %state, to = %next, "exchange advanced");
    *state = next;
}

/// Query the status of a server, giving up at `deadline`.
///
/// Each call opens its own connection and closes it before returning,
/// whatever the outcome. Dropping the returned future cancels the exchange
/// and releases the connection as well.
#[tracing::instrument(skip_all, fields(address = %address, protocol_version = address.protocol_version), err(level = "debug"))]
pub async fn query(
    address: &ServerAddress,
    deadline: Instant,
) -> Result<StatusResponse, QueryError> {
    let mut state = ExchangeState::Connecting;

    let outcome = timeout_at(deadline, exchange(address, &mut state)).await;

    match outcome {
        Ok(result) => result,
        Err(elapsed) => {
            debug!(%state, "deadline exceeded");
            Err(QueryError::new(FailureReason::Unreachable, state, elapsed))
        }
    }
}

/// [`query`] with a deadline relative to now
pub async fn query_with_timeout(
    address: &ServerAddress,
    timeout: Duration,
) -> Result<StatusResponse, QueryError> {
    query(address, Instant::now() + timeout).await
}

async fn exchange(
    address: &ServerAddress,
    state: &mut ExchangeState,
) -> Result<StatusResponse, QueryError> {
    let mut stream = TcpStream::connect(address.addr())
        .await
        .map_err(|error| QueryError::new(FailureReason::Unreachable, *state, error))?;
    trace!("connected");

    let result = server_list_ping(&mut stream, address, state).await;

    // The connection is released on drop regardless, this only makes the close polite
    if let Err(error) = stream.shutdown().await {
        trace!(%error, "shutdown failed");
    }

    result
}

async fn server_list_ping(
    stream: &mut TcpStream,
    address: &ServerAddress,
    state: &mut ExchangeState,
) -> Result<StatusResponse, QueryError> {
    let (read, mut write) = stream.split();
    let mut read = BufReader::new(read);

    write_handshake(
        &mut write,
        &Handshake {
            protocol_version: address.protocol_version,
            address: address.host.clone(),
            port: address.port,
        },
    )
    .await
    .map_err(unreachable_while(*state))?;
    advance(state, ExchangeState::HandshakeSent);

    // The Status Request packet has no fields
    write_status_request(&mut write)
        .await
        .map_err(unreachable_while(*state))?;
    advance(state, ExchangeState::StatusRequested);

    // The server should respond with a Status Response packet
    advance(state, ExchangeState::AwaitingStatus);
    let packet = read_packet(&mut read)
        .await
        .map_err(|error| classify_frame(error, *state))?;
    let status = parse_status_response(&packet)
        .await
        .map_err(|error| classify_payload(error, *state))?;
    debug!(
        version = %status.version.name,
        protocol = status.version.protocol,
        "status received"
    );

    // The ping carries the wall clock time, the round trip itself is timed on the monotonic clock
    let sent_payload = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_millis() as i64)
        .unwrap_or_default();
    let ping_sent = Instant::now();

    write_ping(&mut write, sent_payload)
        .await
        .map_err(unreachable_while(*state))?;
    advance(state, ExchangeState::PingSent);

    // The server will respond with the Pong Response packet echoing the payload
    advance(state, ExchangeState::AwaitingPong);
    let packet = read_packet(&mut read)
        .await
        .map_err(unreachable_while(*state))?;
    let received_payload = parse_pong(&packet).await.map_err(unreachable_while(*state))?;
    let latency = Instant::now().saturating_duration_since(ping_sent);

    if sent_payload != received_payload {
        return Err(QueryError::new(
            FailureReason::Unreachable,
            *state,
            format!("pong payload {received_payload} does not echo ping payload {sent_payload}"),
        ));
    }

    advance(state, ExchangeState::Done);

    Ok(status.with_latency(latency))
}
