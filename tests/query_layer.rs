use clutch_vault::query::{filter_eq, to_row, FetchAll, QueryError, QueryLayer, DEFAULT_PAGE_SIZE};
use clutch_vault::remote::MemoryClient;
use serde_json::{json, Value};

fn layer() -> (MemoryClient, QueryLayer<MemoryClient>) {
    let client = MemoryClient::new();
    (client.clone(), QueryLayer::new(client))
}

fn seed_friends(client: &MemoryClient) {
    client.seed(
        "friends",
        [
            json!({"id": 1, "user_id": "u1", "friend_id": "u2", "status": "pending"}),
            json!({"id": 2, "user_id": "u1", "friend_id": "u3", "status": "accepted"}),
            json!({"id": 3, "user_id": "u4", "friend_id": "u1", "status": "pending"}),
        ],
    );
}

fn ids(rows: &[serde_json::Map<String, Value>]) -> Vec<i64> {
    rows.iter().filter_map(|r| r["id"].as_i64()).collect()
}

#[tokio::test]
async fn filters_are_conjunctive() {
    let (client, q) = layer();
    seed_friends(&client);

    let rows = q
        .fetch_all(&FetchAll::new("friends").eq("user_id", "u1").eq("status", "pending"))
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![1]);
}

#[tokio::test]
async fn empty_filter_returns_every_row() {
    let (client, q) = layer();
    seed_friends(&client);

    let rows = q.fetch_all(&FetchAll::new("friends")).await.unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn unknown_room_password_is_an_empty_result() {
    let (client, q) = layer();
    client.seed(
        "tournaments",
        [json!({"id": 1, "name": "Weekend Cup", "room_password": "alpha"})],
    );

    let rows = q
        .fetch_all(&FetchAll::new("tournaments").eq("room_password", ""))
        .await
        .unwrap();
    assert!(rows.is_empty());

    let rows = q
        .fetch_all(&FetchAll::new("tournaments").eq("room_password", "abc123"))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn fetch_by_id_requires_exactly_one_row() {
    let (client, q) = layer();
    client.seed(
        "tournaments",
        [
            json!({"id": 7, "name": "a"}),
            json!({"id": 8, "name": "b"}),
            json!({"id": 8, "name": "b-dup"}),
        ],
    );

    let row = q.fetch_by_id("tournaments", 7).await.unwrap();
    assert_eq!(row["name"], "a");

    let missing = q.fetch_by_id("tournaments", 99).await.unwrap_err();
    assert!(missing.is_not_found());

    let ambiguous = q.fetch_by_id("tournaments", 8).await.unwrap_err();
    assert!(matches!(ambiguous, QueryError::NotFoundOrAmbiguous { .. }));
}

#[tokio::test]
async fn insert_then_fetch_returns_the_same_fields() {
    let (_, q) = layer();
    let record = to_row(&json!({"title": "Hi", "content": "there", "read": false})).unwrap();

    let echoed = q.insert_record("notifications", &record).await.unwrap();
    let id = echoed[0]["id"].clone();
    let fetched = q.fetch_by_id("notifications", id).await.unwrap();

    for (k, v) in &record {
        assert_eq!(&fetched[k], v, "column {k}");
    }
}

#[tokio::test]
async fn delete_then_fetch_fails() {
    let (client, q) = layer();
    seed_friends(&client);

    q.delete_record("friends", 2).await.unwrap();
    let err = q.fetch_by_id("friends", 2).await.unwrap_err();
    assert!(err.is_not_found());

    // Deleting an id that no longer exists is still fine
    q.delete_record("friends", 2).await.unwrap();
}

#[tokio::test]
async fn update_touches_only_the_patched_columns() {
    let (client, q) = layer();
    seed_friends(&client);

    let patch = to_row(&json!({"status": "accepted"})).unwrap();
    let rows = q.update_record("friends", 1, &patch).await.unwrap();
    assert_eq!(rows[0]["status"], "accepted");
    assert_eq!(rows[0]["friend_id"], "u2");
}

#[tokio::test]
async fn update_of_missing_row_is_rejected() {
    let (_, q) = layer();
    let patch = to_row(&json!({"status": "accepted"})).unwrap();
    let err = q.update_record("friends", 404, &patch).await.unwrap_err();
    assert!(matches!(err, QueryError::WriteRejected { .. }));
}

#[tokio::test]
async fn duplicate_primary_key_is_rejected() {
    let (client, q) = layer();
    seed_friends(&client);

    let record = to_row(&json!({"id": 1, "user_id": "x", "friend_id": "y"})).unwrap();
    let err = q.insert_record("friends", &record).await.unwrap_err();
    assert!(matches!(err, QueryError::WriteRejected { .. }));
}

#[tokio::test]
async fn window_policy_matches_limit_and_offset() {
    let (client, q) = layer();
    client.seed("messages", (1..=150).map(|i| json!({"id": i})));

    let base = FetchAll::new("messages").order_by("id");

    let page = q.fetch_all(&base.clone().offset(10)).await.unwrap();
    assert_eq!(page.len() as u64, DEFAULT_PAGE_SIZE);
    assert_eq!(ids(&page)[0], 11);

    let first = q.fetch_all(&base.clone().limit(5)).await.unwrap();
    assert_eq!(ids(&first), vec![1, 2, 3, 4, 5]);

    let slice = q.fetch_all(&base.clone().offset(145).limit(10)).await.unwrap();
    assert_eq!(ids(&slice), vec![146, 147, 148, 149, 150]);

    let all = q.fetch_all(&base).await.unwrap();
    assert_eq!(all.len(), 150);
}

#[tokio::test]
async fn order_direction_is_respected() {
    let (client, q) = layer();
    client.seed(
        "messages",
        [
            json!({"id": 1, "timestamp": "2024-01-02T00:00:00Z"}),
            json!({"id": 2, "timestamp": "2024-01-03T00:00:00Z"}),
            json!({"id": 3, "timestamp": "2024-01-01T00:00:00Z"}),
        ],
    );

    let newest_first = q
        .fetch_all(&FetchAll::new("messages").order_by("timestamp").descending())
        .await
        .unwrap();
    assert_eq!(ids(&newest_first), vec![2, 1, 3]);
}

#[tokio::test]
async fn bad_identifiers_never_reach_the_provider() {
    let (_, q) = layer();

    let err = q.fetch_all(&FetchAll::new("friends; drop")).await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));

    let err = q
        .fetch_all(&FetchAll::new("friends").eq("status", json!(["a", "b"])))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));

    let err = q.fetch_by_id("friends", Value::Null).await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));
}

#[tokio::test]
async fn unreachable_table_surfaces_remote_errors() {
    let (client, q) = layer();
    seed_friends(&client);
    client.set_offline("friends");

    let err = q.fetch_all(&FetchAll::new("friends")).await.unwrap_err();
    assert!(matches!(err, QueryError::RemoteQuery { .. }));

    let record = to_row(&json!({"user_id": "a"})).unwrap();
    let err = q.insert_record("friends", &record).await.unwrap_err();
    assert!(matches!(err, QueryError::WriteRejected { .. }));

    client.set_online("friends");
    assert_eq!(q.fetch_all(&FetchAll::new("friends")).await.unwrap().len(), 3);
}

#[tokio::test]
async fn bulk_update_and_delete_follow_the_filter() {
    let (client, q) = layer();
    seed_friends(&client);

    let patch = to_row(&json!({"status": "accepted"})).unwrap();
    let updated = q
        .update_matching("friends", &filter_eq("status", "pending"), &patch)
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);

    q.delete_matching("friends", &filter_eq("user_id", "u1"))
        .await
        .unwrap();
    assert_eq!(ids(&client.rows("friends")), vec![3]);

    let err = q
        .delete_matching("friends", &Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));
}
