use std::{future::Future, io, sync::Arc, time::Duration};

use mcstatus::{
    config::Config,
    proto::{
        io::{read_packet, write_packet},
        string, var_int, Packet,
    },
    query_with_timeout,
    service::StatusService,
    ExchangeState, FailureReason, ServerAddress,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::Instant,
};

const STATUS: &str = r#"{
    "version": {"name": "1.21.4", "protocol": 769},
    "players": {"max": 20, "online": 1, "sample": [{"name": "alice", "id": "4566e69f-c907-48ee-8d71-d7ba5aa00d20"}]},
    "description": {"text": "A Minecraft Server"}
}"#;

/// Accept a single connection on loopback and run `script` against it
async fn fake_server<F, Fut, T>(script: F) -> (ServerAddress, JoinHandle<T>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(stream).await
    });

    (ServerAddress::new("127.0.0.1", port, 769), server)
}

/// Read the handshake and the status request, returning the handshake
async fn await_status_request(stream: &mut TcpStream) -> Packet {
    let handshake = read_packet(stream).await.unwrap();
    assert_eq!(handshake.id, 0x00);

    let request = read_packet(stream).await.unwrap();
    assert_eq!(request.id, 0x00);
    assert!(request.data.is_empty());

    handshake
}

async fn send_status(stream: &mut TcpStream, json: &str) {
    write_packet(stream, 0x00, &string::write(json).unwrap())
        .await
        .unwrap();
}

/// Whether the client closed its end, waiting a few seconds at most
async fn connection_released(stream: &mut TcpStream) -> bool {
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_u8()).await;

    matches!(
        read,
        Ok(Err(error)) if matches!(
            error.kind(),
            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
        )
    )
}

async fn echo_pong(stream: &mut TcpStream) {
    let ping = read_packet(stream).await.unwrap();
    assert_eq!(ping.id, 0x01);
    assert_eq!(ping.data.len(), 8);

    write_packet(stream, 0x01, &ping.data).await.unwrap();
}

#[tokio::test]
async fn successful_exchange() {
    let (address, server) = fake_server(|mut stream| async move {
        let handshake = await_status_request(&mut stream).await;
        send_status(&mut stream, STATUS).await;
        echo_pong(&mut stream).await;

        (handshake, connection_released(&mut stream).await)
    })
    .await;

    let response = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(response.ping() >= 0.0);
    let status = response.status();
    assert_eq!(status.version.protocol, 769);
    assert_eq!(status.description_text(), Some("A Minecraft Server"));
    assert_eq!(status.players.as_ref().unwrap().sample[0].name, "alice");

    let (handshake, released) = server.await.unwrap();
    assert!(released, "connection still open after the exchange");

    let mut data = handshake.data.as_slice();
    assert_eq!(var_int::read(&mut data).await.unwrap().value, 769);
    assert_eq!(string::read(&mut data).await.unwrap(), "127.0.0.1");
    assert_eq!(data.read_u16().await.unwrap(), address.port);
    assert_eq!(var_int::read(&mut data).await.unwrap().value, 1);
    assert!(data.is_empty());
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let started = Instant::now();
    let error = query_with_timeout(
        &ServerAddress::new("127.0.0.1", port, 769),
        Duration::from_secs(2),
    )
    .await
    .unwrap_err();

    assert_eq!(error.reason(), FailureReason::Unreachable);
    assert_eq!(error.state(), ExchangeState::Connecting);
    assert!(started.elapsed() <= Duration::from_secs(3));
}

#[tokio::test]
async fn server_closing_before_status_is_unreachable() {
    let (address, server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        stream.shutdown().await.unwrap();
    })
    .await;

    let error = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::Unreachable);
    assert_eq!(error.state(), ExchangeState::AwaitingStatus);
    server.await.unwrap();
}

#[tokio::test]
async fn bad_json_is_malformed() {
    let (address, _server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        send_status(&mut stream, "{\"version\": 12").await;
    })
    .await;

    let error = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::MalformedResponse);
    assert_eq!(error.state(), ExchangeState::AwaitingStatus);
}

#[tokio::test]
async fn wrong_packet_id_is_malformed() {
    let (address, _server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        write_packet(&mut stream, 0x05, &string::write(STATUS).unwrap())
            .await
            .unwrap();
    })
    .await;

    let error = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::MalformedResponse);
}

#[tokio::test]
async fn short_json_string_is_unexpected_eof() {
    let (address, _server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;

        // Claims a 100 byte string but carries two bytes
        let mut data = var_int::write(100);
        data.extend_from_slice(b"{}");
        write_packet(&mut stream, 0x00, &data).await.unwrap();
    })
    .await;

    let error = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::UnexpectedEof);
}

#[tokio::test]
async fn oversized_var_int_is_reported() {
    let (address, _server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        stream.write_all(&[0xff; 6]).await.unwrap();
        stream.flush().await.unwrap();
    })
    .await;

    let error = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::VarIntTooLarge);
}

#[tokio::test]
async fn missing_pong_is_unreachable() {
    let (address, _server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        send_status(&mut stream, STATUS).await;

        read_packet(&mut stream).await.unwrap();
        stream.shutdown().await.unwrap();
    })
    .await;

    let error = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::Unreachable);
    assert_eq!(error.state(), ExchangeState::AwaitingPong);
}

#[tokio::test]
async fn mismatched_pong_is_unreachable() {
    let (address, _server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        send_status(&mut stream, STATUS).await;

        read_packet(&mut stream).await.unwrap();
        write_packet(&mut stream, 0x01, &(-1i64).to_be_bytes())
            .await
            .unwrap();
    })
    .await;

    let error = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::Unreachable);
    assert_eq!(error.state(), ExchangeState::AwaitingPong);
}

#[tokio::test]
async fn silent_server_hits_the_deadline() {
    let (address, server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;

        // Never answers, only watches for the client to hang up
        connection_released(&mut stream).await
    })
    .await;

    let started = Instant::now();
    let error = query_with_timeout(&address, Duration::from_millis(200))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::Unreachable);
    assert_eq!(error.state(), ExchangeState::AwaitingStatus);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(server.await.unwrap(), "connection still open after the deadline");
}

#[tokio::test]
async fn dropping_the_query_releases_the_connection() {
    let (address, server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        connection_released(&mut stream).await
    })
    .await;

    let cancelled = tokio::time::timeout(
        Duration::from_millis(200),
        query_with_timeout(&address, Duration::from_secs(30)),
    )
    .await;

    assert!(cancelled.is_err());
    assert!(server.await.unwrap(), "connection still open after cancelling");
}

#[tokio::test]
async fn failed_exchange_releases_the_connection() {
    let (address, server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        send_status(&mut stream, "{\"version\": 12").await;
        connection_released(&mut stream).await
    })
    .await;

    let error = query_with_timeout(&address, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), FailureReason::MalformedResponse);
    assert!(server.await.unwrap(), "connection still open after a failure");
}

#[tokio::test]
async fn service_serves_repeat_requests_from_cache() {
    // The fake server accepts a single connection, a second query would be refused
    let (address, _server) = fake_server(|mut stream| async move {
        await_status_request(&mut stream).await;
        send_status(&mut stream, STATUS).await;
        echo_pong(&mut stream).await;
    })
    .await;

    let service = StatusService::new(&Config::default());

    let first = service.request_status(1, &address).await.unwrap();
    let second = service.request_status(2, &address).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(service.previous_requests(1), [address]);
    assert!(service.previous_requests(2).is_empty());
    assert_eq!(service.suggestions(1, "127.0").len(), 1);
}
