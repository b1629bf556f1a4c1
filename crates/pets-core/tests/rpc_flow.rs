//! Request/reply behaviour of `RpcClient` against `RpcListener` over the
//! in-memory broker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pets_core::broker::InMemoryBroker;
use pets_core::protocol::envelope::{CorrelationId, Envelope};
use pets_core::rpc::{HandlerError, HandlerReply, RpcHandler};
use pets_core::topology::{Operation, CAT_DLQ};
use pets_core::{Broker, RpcClient, RpcConfig, RpcError, RpcListener};

/// Replies with the request body reversed, stays silent for `"absent"`,
/// sleeps for `"slow"`, and rejects `"broken"`.
struct ReverseHandler;

#[async_trait]
impl RpcHandler for ReverseHandler {
    async fn handle(&self, _op: Operation, body: &[u8]) -> Result<HandlerReply, HandlerError> {
        match body {
            b"absent" => Ok(HandlerReply::Silent),
            b"broken" => Err(HandlerError::Malformed("broken".to_string())),
            b"slow" => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(HandlerReply::Body(b"late".to_vec()))
            }
            _ => {
                let mut reversed = body.to_vec();
                reversed.reverse();
                Ok(HandlerReply::Body(reversed))
            }
        }
    }
}

async fn setup(timeout_ms: u64) -> (InMemoryBroker, RpcClient) {
    let broker = InMemoryBroker::standard();
    let listener = RpcListener::new(Arc::new(broker.clone()), Arc::new(ReverseHandler), 8);
    listener.start(&[Operation::CatGet]).await.unwrap();
    let client = RpcClient::new(
        Arc::new(broker.clone()),
        RpcConfig::default().with_timeout(Duration::from_millis(timeout_ms)),
    );
    (broker, client)
}

#[tokio::test]
async fn test_call_receives_matching_reply() {
    // Arrange
    let (_broker, client) = setup(2000).await;

    // Act
    let reply = client.call_op(Operation::CatGet, b"abc".to_vec()).await.unwrap();

    // Assert
    assert_eq!(reply, b"cba");
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_silent_listener_surfaces_as_timeout() {
    let (_broker, client) = setup(150).await;
    let result = client.call_op(Operation::CatGet, b"absent".to_vec()).await;
    assert!(matches!(result, Err(RpcError::Timeout { .. })));
}

#[tokio::test]
async fn test_empty_reply_is_distinct_from_no_reply() {
    let (_broker, client) = setup(2000).await;
    let reply = client.call_op(Operation::CatGet, Vec::new()).await.unwrap();
    assert!(reply.is_empty());
}

#[tokio::test]
async fn test_concurrent_calls_each_get_their_own_reply() {
    // Arrange
    let (_broker, client) = setup(2000).await;
    let client = Arc::new(client);

    // Act
    let mut handles = Vec::new();
    for i in 0..20 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            let body = format!("req-{i:02}").into_bytes();
            let reply = client.call_op(Operation::CatGet, body.clone()).await.unwrap();
            (body, reply)
        }));
    }

    // Assert
    for handle in handles {
        let (mut body, reply) = handle.await.unwrap();
        body.reverse();
        assert_eq!(reply, body);
    }
}

#[tokio::test]
async fn test_late_reply_after_timeout_is_discarded() {
    // Arrange
    let (broker, client) = setup(100).await;

    // Act: first call times out, its reply arrives later
    let first = client.call_op(Operation::CatGet, b"slow".to_vec()).await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    let second = client.call_op(Operation::CatGet, b"xy".to_vec()).await.unwrap();

    // Assert: the stale reply was not handed to the second caller
    assert!(matches!(first, Err(RpcError::Timeout { .. })));
    assert_eq!(second, b"yx");
    assert_eq!(broker.queue_depth("cat.get.reply.queue"), 0);
}

#[tokio::test]
async fn test_reply_with_unknown_correlation_id_is_ignored() {
    let (broker, client) = setup(2000).await;
    // Start the dispatcher.
    client.call_op(Operation::CatGet, b"a".to_vec()).await.unwrap();

    let mut stray = Envelope::to_queue("cat.get.reply.queue", b"stray".to_vec());
    stray.correlation_id = Some(CorrelationId::new());
    broker.publish(stray).await.unwrap();

    let reply = client.call_op(Operation::CatGet, b"ok".to_vec()).await.unwrap();
    assert_eq!(reply, b"ko");
}

#[tokio::test]
async fn test_broken_request_goes_to_dead_letter_queue_and_caller_times_out() {
    let (broker, client) = setup(150).await;

    let result = client.call_op(Operation::CatGet, b"broken".to_vec()).await;

    assert!(matches!(result, Err(RpcError::Timeout { .. })));
    assert_eq!(broker.queue_depth(CAT_DLQ), 1);
}

#[tokio::test]
async fn test_namespaced_clients_do_not_steal_replies() {
    // Arrange
    let (broker, _) = setup(2000).await;
    let a = RpcClient::new(
        Arc::new(broker.clone()),
        RpcConfig::default().with_namespace("a"),
    );
    let b = RpcClient::new(
        Arc::new(broker.clone()),
        RpcConfig::default().with_namespace("b"),
    );

    // Act
    let (ra, rb) = tokio::join!(
        a.call_op(Operation::CatGet, b"12".to_vec()),
        b.call_op(Operation::CatGet, b"34".to_vec())
    );

    // Assert
    assert_eq!(ra.unwrap(), b"21");
    assert_eq!(rb.unwrap(), b"43");
}
