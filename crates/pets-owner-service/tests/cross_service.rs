//! Owner and cat services wired together over one in-memory broker, driven
//! by an RPC client the way the gateway drives them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use pets_cat_service::{CatMessageListener, CatService, InMemoryCatRepository, RpcOwnerDirectory};
use pets_core::broker::InMemoryBroker;
use pets_core::protocol::payload::{
    decode_bool, decode_json, encode_id, encode_json, FriendPair, PetTransfer,
};
use pets_core::{
    CatDto, Color, CreateCatRequest, CreateOwnerRequest, Operation, OwnerDto, OwnerId,
    RpcClient, RpcConfig, RpcError, RpcListener,
};
use pets_core::rpc::{HandlerError, HandlerReply, RpcHandler};
use pets_owner_service::{
    InMemoryOwnerRepository, OwnerMessageListener, OwnerService, RpcCatDirectory,
};
use uuid::Uuid;

/// Service-to-service calls give up sooner than the outer caller so a
/// silent inner step still ends in a silent outer reply.
const INNER_TIMEOUT: Duration = Duration::from_millis(300);
const CALLER_TIMEOUT: Duration = Duration::from_millis(1200);

struct Harness {
    caller: RpcClient,
    _listeners: Vec<RpcListener>,
}

fn rpc(broker: &InMemoryBroker, namespace: &str, timeout: Duration) -> RpcClient {
    RpcClient::new(
        Arc::new(broker.clone()),
        RpcConfig::default()
            .with_timeout(timeout)
            .with_namespace(namespace),
    )
}

async fn start_owner_service(broker: &InMemoryBroker) -> RpcListener {
    let cats = Arc::new(RpcCatDirectory::new(Arc::new(rpc(
        broker,
        "owner-service",
        INNER_TIMEOUT,
    ))));
    let service = OwnerService::new(InMemoryOwnerRepository::new(), cats);
    let listener = RpcListener::new(
        Arc::new(broker.clone()),
        Arc::new(OwnerMessageListener::new(Arc::new(service))),
        8,
    );
    listener.start(&Operation::OWNER).await.unwrap();
    listener
}

/// How the cat side of the broker behaves in a test.
enum CatSide {
    Absent,
    Serving,
    /// Serves every cat operation except `cat.deleteByOwner`, which it
    /// acknowledges without deleting anything and without replying.
    SilentOnCascade,
}

/// Cat handler that drops cascade requests.
struct SilentCascade(CatMessageListener<InMemoryCatRepository>);

#[async_trait]
impl RpcHandler for SilentCascade {
    async fn handle(&self, op: Operation, body: &[u8]) -> Result<HandlerReply, HandlerError> {
        if op == Operation::CatDeleteByOwner {
            return Ok(HandlerReply::Silent);
        }
        self.0.handle(op, body).await
    }
}

async fn start_cat_service(broker: &InMemoryBroker, silent_cascade: bool) -> RpcListener {
    let owners = Arc::new(RpcOwnerDirectory::new(Arc::new(rpc(
        broker,
        "cat-service",
        INNER_TIMEOUT,
    ))));
    let service = Arc::new(CatService::new(InMemoryCatRepository::new(), owners));
    let handler: Arc<dyn RpcHandler> = if silent_cascade {
        Arc::new(SilentCascade(CatMessageListener::new(service)))
    } else {
        Arc::new(CatMessageListener::new(service))
    };
    let listener = RpcListener::new(Arc::new(broker.clone()), handler, 8);
    listener.start(&Operation::CAT).await.unwrap();
    listener
}

async fn harness(side: CatSide) -> Harness {
    let broker = InMemoryBroker::standard();
    let mut listeners = vec![start_owner_service(&broker).await];
    match side {
        CatSide::Absent => {}
        CatSide::Serving => listeners.push(start_cat_service(&broker, false).await),
        CatSide::SilentOnCascade => listeners.push(start_cat_service(&broker, true).await),
    }
    Harness {
        caller: rpc(&broker, "test-caller", CALLER_TIMEOUT),
        _listeners: listeners,
    }
}

impl Harness {
    async fn call(&self, op: Operation, body: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        self.caller.call_op(op, body).await
    }

    async fn create_owner(&self, first: &str) -> OwnerDto {
        let body = encode_json(&CreateOwnerRequest {
            first_name: first.to_string(),
            last_name: "Tester".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 5, 5).unwrap(),
        })
        .unwrap();
        decode_json(&self.call(Operation::OwnerCreate, body).await.unwrap()).unwrap()
    }

    async fn create_cat(&self, name: &str, owner_id: OwnerId) -> Result<CatDto, RpcError> {
        let body = encode_json(&CreateCatRequest {
            name: name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2019, 7, 7).unwrap(),
            breed: "Maine Coon".to_string(),
            color: Color::Tabby,
            owner_id,
        })
        .unwrap();
        let reply = self.call(Operation::CatCreate, body).await?;
        Ok(decode_json(&reply).unwrap())
    }

    async fn get_cat(&self, id: Uuid) -> Result<CatDto, RpcError> {
        let reply = self.call(Operation::CatGet, encode_id(id)).await?;
        Ok(decode_json(&reply).unwrap())
    }

    async fn owner_exists(&self, id: OwnerId) -> bool {
        self.call(Operation::OwnerGet, encode_id(id)).await.is_ok()
    }

    async fn bool_call(&self, op: Operation, body: Vec<u8>) -> bool {
        decode_bool(&self.call(op, body).await.unwrap()).unwrap()
    }
}

fn pair(id1: Uuid, id2: Uuid) -> Vec<u8> {
    encode_json(&FriendPair { id1, id2 }).unwrap()
}

fn transfer(owner_id: OwnerId, pet_id: Uuid) -> Vec<u8> {
    encode_json(&PetTransfer { owner_id, pet_id }).unwrap()
}

#[tokio::test]
async fn test_owner_and_cat_lifecycle_scenario() {
    // Arrange
    let h = harness(CatSide::Serving).await;
    let o1 = h.create_owner("Olive").await;

    // Act / Assert: creation validated against the owner service
    let c1 = h.create_cat("C1", o1.id).await.unwrap();
    assert_eq!(c1.owner_id, o1.id);
    assert!(c1.friends.is_empty());
    assert!(matches!(
        h.create_cat("C2", Uuid::new_v4()).await,
        Err(RpcError::Timeout { .. })
    ));

    // Friendship with a missing cat or with itself is refused
    assert!(!h.bool_call(Operation::CatMakeFriends, pair(c1.id, Uuid::new_v4())).await);
    assert!(!h.bool_call(Operation::CatMakeFriends, pair(c1.id, c1.id)).await);

    // Deleting the owner cascades to its cat
    let ack = h.call(Operation::OwnerDelete, encode_id(o1.id)).await.unwrap();
    assert!(ack.is_empty());
    assert!(!h.owner_exists(o1.id).await);
    assert!(matches!(h.get_cat(c1.id).await, Err(RpcError::Timeout { .. })));
}

#[tokio::test]
async fn test_cascade_removes_cats_and_their_friend_links() {
    // Arrange
    let h = harness(CatSide::Serving).await;
    let leaving = h.create_owner("Leaving").await;
    let staying = h.create_owner("Staying").await;
    let x = h.create_cat("X", leaving.id).await.unwrap();
    let y = h.create_cat("Y", leaving.id).await.unwrap();
    let z = h.create_cat("Z", staying.id).await.unwrap();
    assert!(h.bool_call(Operation::CatMakeFriends, pair(x.id, z.id)).await);
    assert!(h.bool_call(Operation::CatMakeFriends, pair(y.id, z.id)).await);

    // Act
    h.call(Operation::OwnerDelete, encode_id(leaving.id)).await.unwrap();

    // Assert
    assert!(h.get_cat(x.id).await.is_err());
    assert!(h.get_cat(y.id).await.is_err());
    assert!(h.get_cat(z.id).await.unwrap().friends.is_empty());
    assert!(h.owner_exists(staying.id).await);
}

#[tokio::test]
async fn test_owner_survives_when_cascade_gets_no_reply() {
    // Arrange: no cat service on the broker
    let h = harness(CatSide::Absent).await;
    let owner = h.create_owner("Kept").await;

    // Act
    let result = h.call(Operation::OwnerDelete, encode_id(owner.id)).await;

    // Assert
    assert!(matches!(result, Err(RpcError::Timeout { .. })));
    assert!(h.owner_exists(owner.id).await);
}

#[tokio::test]
async fn test_owner_and_cats_survive_when_cascade_is_never_answered() {
    // Arrange: X and Y are friends, Y is also friends with Z of another owner
    let h = harness(CatSide::SilentOnCascade).await;
    let owner = h.create_owner("Kept").await;
    let other = h.create_owner("Neighbour").await;
    let x = h.create_cat("X", owner.id).await.unwrap();
    let y = h.create_cat("Y", owner.id).await.unwrap();
    let z = h.create_cat("Z", other.id).await.unwrap();
    assert!(h.bool_call(Operation::CatMakeFriends, pair(x.id, y.id)).await);
    assert!(h.bool_call(Operation::CatMakeFriends, pair(y.id, z.id)).await);

    // Act
    let result = h.call(Operation::OwnerDelete, encode_id(owner.id)).await;

    // Assert
    assert!(matches!(result, Err(RpcError::Timeout { .. })));
    assert!(h.owner_exists(owner.id).await);
    let x_after = h.get_cat(x.id).await.unwrap();
    let y_after = h.get_cat(y.id).await.unwrap();
    assert_eq!(x_after.owner_id, owner.id);
    assert_eq!(y_after.owner_id, owner.id);
    assert_eq!(x_after.friends, vec![y.id]);
    assert_eq!(y_after.friends.len(), 2);
    assert_eq!(h.get_cat(z.id).await.unwrap().friends, vec![y.id]);
}

#[tokio::test]
async fn test_update_reconciles_friend_list_symmetrically() {
    // Arrange
    let h = harness(CatSide::Serving).await;
    let owner = h.create_owner("Fran").await;
    let a = h.create_cat("A", owner.id).await.unwrap();
    let b = h.create_cat("B", owner.id).await.unwrap();
    let c = h.create_cat("C", owner.id).await.unwrap();
    assert!(h.bool_call(Operation::CatMakeFriends, pair(a.id, b.id)).await);

    // Act: replace A's friends {B} with {C}
    let mut desired = h.get_cat(a.id).await.unwrap();
    desired.friends = vec![c.id];
    let reply = h
        .call(Operation::CatUpdate, encode_json(&desired).unwrap())
        .await
        .unwrap();

    // Assert
    let updated: CatDto = decode_json(&reply).unwrap();
    assert_eq!(updated.friends, vec![c.id]);
    assert!(h.get_cat(b.id).await.unwrap().friends.is_empty());
    assert_eq!(h.get_cat(c.id).await.unwrap().friends, vec![a.id]);
}

#[tokio::test]
async fn test_change_owner_for_pet_moves_cat() {
    // Arrange
    let h = harness(CatSide::Serving).await;
    let first = h.create_owner("First").await;
    let second = h.create_owner("Second").await;
    let cat = h.create_cat("Mover", first.id).await.unwrap();

    // Act
    let moved = h
        .bool_call(Operation::OwnerChangeForPet, transfer(second.id, cat.id))
        .await;

    // Assert
    assert!(moved);
    assert_eq!(h.get_cat(cat.id).await.unwrap().owner_id, second.id);
    assert!(
        !h.bool_call(Operation::OwnerChangeForPet, transfer(second.id, Uuid::new_v4()))
            .await
    );
}

#[tokio::test]
async fn test_delete_pet_only_for_its_owner() {
    // Arrange
    let h = harness(CatSide::Serving).await;
    let owner = h.create_owner("Owner").await;
    let stranger = h.create_owner("Stranger").await;
    let cat = h.create_cat("Pet", owner.id).await.unwrap();

    // Act / Assert
    assert!(!h.bool_call(Operation::OwnerDeletePet, transfer(stranger.id, cat.id)).await);
    assert!(h.get_cat(cat.id).await.is_ok());
    assert!(h.bool_call(Operation::OwnerDeletePet, transfer(owner.id, cat.id)).await);
    assert!(h.get_cat(cat.id).await.is_err());
}
