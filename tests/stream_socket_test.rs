//! Latest-line extraction over real loopback TCP connections.

use daq_bridge::error::BridgeError;
use daq_bridge::stream::{connect_channels, StreamChannel, StreamConnection, SENTINEL};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

async fn producer_pair() -> (StreamChannel, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (channel, accepted) = tokio::join!(StreamChannel::connect("out1", addr, 1024), listener.accept());
    (channel, accepted.unwrap().0)
}

/// Poll until the channel reports a line or the deadline passes.
async fn poll_until_line(channel: &mut StreamChannel) -> Option<String> {
    for _ in 0..50 {
        if let Some(line) = channel.poll_latest().unwrap() {
            return Some(line.to_owned());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_connection_error() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let mut channel = StreamChannel::connect("out3", addr, 1024).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = channel.poll_latest().unwrap_err();
    assert!(matches!(err, BridgeError::Connection { .. }));
}

#[tokio::test]
async fn test_failed_connect_is_deferred() {
    let addr: SocketAddr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let connection = StreamConnection::connect(addr).await;
    assert!(!connection.is_connected());
}

#[tokio::test]
async fn test_no_data_yields_sentinel() {
    let (mut channel, _producer) = producer_pair().await;
    assert_eq!(channel.poll_latest().unwrap(), None);
    assert_eq!(channel.poll_latest().unwrap().unwrap_or(SENTINEL), SENTINEL);
}

#[tokio::test]
async fn test_freshest_line_wins() {
    let (mut channel, mut producer) = producer_pair().await;
    producer.write_all(b"1.0\n2.0\n3.5\n").await.unwrap();
    producer.flush().await.unwrap();

    assert_eq!(poll_until_line(&mut channel).await.as_deref(), Some("3.5"));
}

#[tokio::test]
async fn test_partial_line_completes_on_a_later_poll() {
    let (mut channel, mut producer) = producer_pair().await;
    producer.write_all(b"7.2").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(channel.poll_latest().unwrap(), None);

    producer.write_all(b"5\n").await.unwrap();
    assert_eq!(poll_until_line(&mut channel).await.as_deref(), Some("7.25"));
}

#[tokio::test]
async fn test_peer_close_is_a_connection_error() {
    let (mut channel, producer) = producer_pair().await;
    drop(producer);

    let mut result = Ok(None);
    for _ in 0..50 {
        result = channel.poll_latest().map(|l| l.map(str::to_owned));
        if result.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(result, Err(BridgeError::Connection { .. })));
}

#[tokio::test]
async fn test_connect_channels_names_in_order() {
    let listeners = [
        TcpListener::bind("127.0.0.1:0").await.unwrap(),
        TcpListener::bind("127.0.0.1:0").await.unwrap(),
        TcpListener::bind("127.0.0.1:0").await.unwrap(),
    ];
    let addrs = [
        listeners[0].local_addr().unwrap(),
        listeners[1].local_addr().unwrap(),
        listeners[2].local_addr().unwrap(),
    ];

    let channels = connect_channels(addrs, 1024).await;
    let names: Vec<_> = channels.iter().map(StreamChannel::name).collect();
    assert_eq!(names, ["out1", "out2", "out3"]);
}
