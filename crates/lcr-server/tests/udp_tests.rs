//! End to end over loopback UDP

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use lcr_core::{Carrier, CarrierId, LcrConfig, MemoryRouteStore, Route, RoutingService, SignalingDispatcher};
use lcr_server::UdpTransport;

fn store() -> MemoryRouteStore {
    let store = MemoryRouteStore::new();
    for id in 1..=2 {
        store.insert_carrier(
            Carrier::new(CarrierId(id), format!("c{}", id)).with_trunk_group(
                format!("tg{}", id),
                format!("10.0.0.{}", id),
                5060,
                1,
            ),
        );
        store.insert_route(Route::new(id, CarrierId(id), "1416", 0.01 * id as f64));
    }
    store
}

fn invite(client: std::net::SocketAddr, user: &str) -> String {
    format!(
        "INVITE sip:{user}@lcr.example.com;user=phone SIP/2.0\r\n\
Via: SIP/2.0/UDP {client};branch=z9hG4bK-1\r\n\
From: <sip:6132221234@{ip}>;tag=f1\r\n\
To: <sip:{user}@lcr.example.com>\r\n\
Call-ID: e2e-1@{ip}\r\n\
CSeq: 1 INVITE\r\n\
Content-Length: 0\r\n\
\r\n",
        user = user,
        client = client,
        ip = client.ip(),
    )
}

async fn start() -> (UdpTransport, UdpSocket) {
    let (transport, client, _receive_loop) = start_with_handle().await;
    (transport, client)
}

async fn start_with_handle() -> (UdpTransport, UdpSocket, tokio::task::JoinHandle<()>) {
    let service = Arc::new(RoutingService::new(LcrConfig::default(), Arc::new(store())).unwrap());
    let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let dispatcher = Arc::new(SignalingDispatcher::new(service, transport.connector()));
    let receive_loop = transport.spawn_receive_loop(dispatcher);

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(transport.local_addr()).await.unwrap();
    (transport, client, receive_loop)
}

async fn exchange(client: &UdpSocket, datagram: &str) -> String {
    client.send(datagram.as_bytes()).await.unwrap();
    let mut buf = vec![0u8; 4096];
    let len = timeout(Duration::from_secs(5), client.recv(&mut buf))
        .await
        .expect("no response within 5s")
        .unwrap();
    String::from_utf8(buf[..len].to_vec()).unwrap()
}

#[tokio::test]
async fn test_invite_is_redirected() {
    let (transport, client) = start().await;
    let response = exchange(&client, &invite(client.local_addr().unwrap(), "4169671111")).await;

    assert!(response.starts_with("SIP/2.0 302 Moved Temporarily\r\n"), "{}", response);
    assert!(response.contains("Call-ID: e2e-1@127.0.0.1\r\n"));
    assert!(response.contains(";dtg=tg1>;q=1.0\r\n"));
    assert!(response.contains(";dtg=tg2>;q=0.9\r\n"));
    transport.close();
}

#[tokio::test]
async fn test_garbage_is_dropped_and_loop_survives() {
    let (transport, client) = start().await;
    client.send(b"not sip at all").await.unwrap();
    client.send(b"\r\n\r\n").await.unwrap();

    let response = exchange(&client, &invite(client.local_addr().unwrap(), "operator")).await;
    assert!(response.starts_with("SIP/2.0 404 Not Found\r\n"), "{}", response);
    transport.close();
}

#[tokio::test]
async fn test_close_stops_receive_loop() {
    let (transport, _client, receive_loop) = start_with_handle().await;
    assert!(!transport.is_closed());

    transport.close();
    assert!(transport.is_closed());
    timeout(Duration::from_secs(5), receive_loop)
        .await
        .expect("receive loop still running after close")
        .unwrap();
}
