//! RPC between two services that each hold their own `RemoteBroker`
//! connection to one daemon.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pets_broker::{serve, RemoteBroker};
use pets_core::broker::InMemoryBroker;
use pets_core::rpc::{HandlerError, HandlerReply, RpcHandler};
use pets_core::topology::{Operation, OWNER_DLQ};
use pets_core::{RpcClient, RpcConfig, RpcError, RpcListener};
use tokio::net::TcpListener;

struct UpperHandler;

#[async_trait]
impl RpcHandler for UpperHandler {
    async fn handle(&self, _op: Operation, body: &[u8]) -> Result<HandlerReply, HandlerError> {
        if body == b"poison" {
            return Err(HandlerError::Malformed("poison".to_string()));
        }
        Ok(HandlerReply::Body(body.to_ascii_uppercase()))
    }
}

async fn daemon() -> (SocketAddr, InMemoryBroker) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let broker = InMemoryBroker::standard();
    tokio::spawn(serve(
        listener,
        broker.clone(),
        64,
        Arc::new(AtomicBool::new(true)),
    ));
    (addr, broker)
}

async fn wired(addr: SocketAddr, timeout: Duration) -> RpcClient {
    let callee = Arc::new(RemoteBroker::connect(addr).await.unwrap());
    let listener = RpcListener::new(callee, Arc::new(UpperHandler), 4);
    listener.start(&[Operation::OwnerGet]).await.unwrap();

    let caller = Arc::new(RemoteBroker::connect(addr).await.unwrap());
    RpcClient::new(
        caller,
        RpcConfig::default()
            .with_timeout(timeout)
            .with_namespace("test-caller"),
    )
}

#[tokio::test]
async fn test_rpc_round_trip_through_daemon() {
    // Arrange
    let (addr, _broker) = daemon().await;
    let client = wired(addr, Duration::from_secs(2)).await;

    // Act
    let reply = client
        .call_op(Operation::OwnerGet, b"hello".to_vec())
        .await
        .unwrap();

    // Assert
    assert_eq!(reply, b"HELLO");
}

#[tokio::test]
async fn test_poison_request_is_dead_lettered_through_daemon() {
    let (addr, broker) = daemon().await;
    let client = wired(addr, Duration::from_millis(300)).await;

    let result = client.call_op(Operation::OwnerGet, b"poison".to_vec()).await;

    assert!(matches!(result, Err(RpcError::Timeout { .. })));
    assert_eq!(broker.queue_depth(OWNER_DLQ), 1);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(RemoteBroker::connect(addr).await.is_err());
}
