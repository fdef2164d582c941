use hemmer_provider_zookeeper::error::ProviderError;
use hemmer_provider_zookeeper::provider::{SEQUENTIAL_ZNODE, ZNODE};
use hemmer_provider_zookeeper::session::memory::{InMemoryConnector, InMemoryEnsemble};
use hemmer_provider_zookeeper::testing::{
    assert_error_contains, assert_has_errors, assert_no_errors, assert_plan_changes_attribute,
    assert_plan_replaces, assert_plan_updates_in_place, ProviderTester,
};
use hemmer_provider_zookeeper::{ProviderHandle, ZooKeeperProvider};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

type Tester = ProviderTester<ZooKeeperProvider<InMemoryConnector>>;

fn isolated(ensemble: &InMemoryEnsemble) -> ZooKeeperProvider<InMemoryConnector> {
    ZooKeeperProvider::new(ensemble.connector()).with_env(|_| None)
}

async fn configured() -> (Tester, InMemoryEnsemble) {
    let (tester, ensemble) = ProviderTester::in_memory();
    assert_ok!(
        tester
            .configure(json!({"servers": "zk1:2181,zk2:2181", "session_timeout": 10}))
            .await
    );
    (tester, ensemble)
}

#[tokio::test]
async fn znode_full_lifecycle() {
    let (tester, ensemble) = configured().await;

    let created = assert_ok!(
        tester
            .lifecycle_create(ZNODE, json!({"path": "/app/config", "data": "v1"}))
            .await
    );
    assert_eq!(created["path"], "/app/config");
    assert_eq!(created["data"], "v1");
    assert_eq!(created["data_base64"], "djE=");
    assert_eq!(
        created["acl"],
        json!([{"scheme": "world", "id": "anyone", "permissions": 31}])
    );
    assert_eq!(created["stat"]["data_length"], 2);
    assert_eq!(ensemble.paths(), vec!["/", "/app", "/app/config"]);

    let updated = assert_ok!(
        tester
            .lifecycle_update(ZNODE, created, json!({"path": "/app/config", "data": "v2"}))
            .await
    );
    assert_eq!(updated["data"], "v2");
    assert_eq!(updated["stat"]["version"], 1);

    assert_ok!(tester.lifecycle_delete(ZNODE, updated).await);
    assert_eq!(ensemble.paths(), vec!["/", "/app"]);
}

#[tokio::test]
async fn znode_from_base64() {
    let (tester, _) = configured().await;

    let created = assert_ok!(
        tester
            .create(ZNODE, json!({"path": "/bin", "data_base64": "AAEC/w=="}))
            .await
    );
    assert_eq!(created["data_base64"], "AAEC/w==");
    assert_eq!(created["stat"]["data_length"], 4);

    let updated = assert_ok!(
        tester
            .lifecycle_update(ZNODE, created, json!({"path": "/bin", "data_base64": "aGk="}))
            .await
    );
    assert_eq!(updated["data"], "hi");
}

#[tokio::test]
async fn znode_invalid_base64_is_rejected() {
    let (tester, ensemble) = configured().await;
    let err = assert_err!(
        tester
            .create(ZNODE, json!({"path": "/bad", "data_base64": "%%%"}))
            .await
    );
    assert!(err
        .message()
        .starts_with("decoding 'data_base64' from Base64 failed"));
    assert_eq!(ensemble.paths(), vec!["/"]);
}

#[tokio::test]
async fn znode_acl_permissions_out_of_range() {
    let (tester, _) = configured().await;
    let err = assert_err!(
        tester
            .create(
                ZNODE,
                json!({
                    "path": "/acl",
                    "acl": [{"scheme": "world", "id": "anyone", "permissions": 4294967296_i64}]
                }),
            )
            .await
    );
    assert_eq!(
        err.message(),
        "ACL permissions value 4294967296 is out of int32 range"
    );
}

#[tokio::test]
async fn znode_acl_entry_without_scheme_is_rejected() {
    let (tester, ensemble) = configured().await;
    let err = assert_err!(
        tester
            .create(
                ZNODE,
                json!({"path": "/acl", "acl": [{"id": "anyone", "permissions": 31}]}),
            )
            .await
    );
    assert!(matches!(err, ProviderError::Validation(_)));
    assert_eq!(ensemble.paths(), vec!["/"]);
}

#[tokio::test]
async fn znode_with_restricted_acl() {
    let (tester, _) = configured().await;
    let acl = json!([{"scheme": "world", "id": "anyone", "permissions": 17}]);

    let created = assert_ok!(
        tester
            .create(ZNODE, json!({"path": "/ro", "data": "x", "acl": acl.clone()}))
            .await
    );
    assert_eq!(created["acl"], acl);

    // ADMIN without WRITE: the ACL update lands, then the data write is refused.
    let err = assert_err!(
        tester
            .update(
                ZNODE,
                created,
                json!({
                    "path": "/ro",
                    "data": "y",
                    "acl": [{"scheme": "world", "id": "anyone", "permissions": 25}]
                }),
            )
            .await
    );
    assert!(matches!(err, ProviderError::PermissionDenied(_)));

    let current = assert_ok!(tester.read(ZNODE, json!({"path": "/ro"})).await);
    assert_eq!(current["data"], "x");
    assert_eq!(current["acl"][0]["permissions"], 25);
}

#[tokio::test]
async fn znode_conflicts_on_existing_path() {
    let (tester, _) = configured().await;
    assert_ok!(tester.create(ZNODE, json!({"path": "/dup"})).await);

    let err = assert_err!(tester.create(ZNODE, json!({"path": "/dup"})).await);
    assert!(matches!(err, ProviderError::AlreadyExists(_)));

    let err = assert_err!(tester.create(ZNODE, json!({"path": "/dir/"})).await);
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}

#[tokio::test]
async fn read_of_removed_node_drops_state() {
    let (tester, _) = configured().await;
    let created = assert_ok!(tester.create(ZNODE, json!({"path": "/drift"})).await);
    assert_ok!(tester.delete(ZNODE, created.clone()).await);

    assert_eq!(assert_ok!(tester.read(ZNODE, created.clone()).await), Value::Null);
    // Deleting again is a no-op.
    assert_ok!(tester.delete(ZNODE, created).await);
}

#[tokio::test]
async fn changing_path_requires_replacement() {
    let (tester, _) = configured().await;
    let created = assert_ok!(tester.create(ZNODE, json!({"path": "/one", "data": "x"})).await);

    let plan = assert_ok!(
        tester
            .plan_update(ZNODE, created.clone(), json!({"path": "/two", "data": "x"}))
            .await
    );
    assert_plan_replaces(&plan);
    assert_plan_changes_attribute(&plan, "path");

    let plan = assert_ok!(
        tester
            .plan_update(ZNODE, created, json!({"path": "/one", "data": "y"}))
            .await
    );
    assert_plan_updates_in_place(&plan);
}

#[tokio::test]
async fn sequential_znode_lifecycle() {
    let (tester, ensemble) = configured().await;

    let first = assert_ok!(
        tester
            .lifecycle_create(SEQUENTIAL_ZNODE, json!({"path_prefix": "/queue/job-", "data": "a"}))
            .await
    );
    let second = assert_ok!(
        tester
            .lifecycle_create(SEQUENTIAL_ZNODE, json!({"path_prefix": "/queue/job-", "data": "b"}))
            .await
    );
    assert_eq!(first["path"], "/queue/job-0000000000");
    assert_eq!(second["path"], "/queue/job-0000000001");
    assert_eq!(second["path_prefix"], "/queue/job-");

    let updated = assert_ok!(
        tester
            .lifecycle_update(
                SEQUENTIAL_ZNODE,
                first.clone(),
                json!({"path_prefix": "/queue/job-", "data": "c"}),
            )
            .await
    );
    assert_eq!(updated["path"], first["path"]);
    assert_eq!(updated["data"], "c");

    assert_ok!(tester.lifecycle_delete(SEQUENTIAL_ZNODE, updated).await);
    assert_eq!(
        ensemble.paths(),
        vec!["/", "/queue", "/queue/job-0000000001"]
    );
}

#[tokio::test]
async fn import_existing_nodes() {
    let (tester, _) = configured().await;
    assert_ok!(tester.create(ZNODE, json!({"path": "/imported", "data": "x"})).await);
    let seq = assert_ok!(
        tester
            .create(SEQUENTIAL_ZNODE, json!({"path_prefix": "/locks/", "data": "y"}))
            .await
    );

    let imported = assert_ok!(tester.import_resource(ZNODE, "/imported").await);
    assert_eq!(imported[0].resource_type, ZNODE);
    assert_eq!(imported[0].state["data"], "x");

    let imported = assert_ok!(
        tester
            .import_resource(SEQUENTIAL_ZNODE, seq["path"].as_str().unwrap())
            .await
    );
    assert_eq!(imported[0].state["path_prefix"], "/locks/");
    assert_eq!(imported[0].state["data"], "y");

    let err = assert_err!(tester.import_resource(ZNODE, "/nope").await);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn data_source_reads_node() {
    let (tester, _) = configured().await;
    assert_ok!(tester.create(ZNODE, json!({"path": "/ds/node", "data": "value"})).await);

    let state = assert_ok!(
        tester
            .read_data_source(ZNODE, json!({"path": "/ds/node"}))
            .await
    );
    assert_eq!(state["data"], "value");
    assert_eq!(state["stat"]["num_children"], 0);

    let err = assert_err!(tester.read_data_source(ZNODE, json!({"path": "/ds/missing"})).await);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn digest_credentials_are_applied() {
    let ensemble = InMemoryEnsemble::new();
    let owner = ProviderTester::new(isolated(&ensemble));
    assert_ok!(
        owner
            .configure(json!({"servers": "zk:2181", "username": "alice", "password": "secret"}))
            .await
    );

    let digest_id = hemmer_provider_zookeeper::node::digest_id("alice", "secret");
    assert_ok!(
        owner
            .create(
                ZNODE,
                json!({
                    "path": "/private",
                    "data": "s",
                    "acl": [{"scheme": "digest", "id": digest_id, "permissions": 31}]
                }),
            )
            .await
    );

    let stranger = ProviderTester::new(isolated(&ensemble));
    assert_ok!(stranger.configure(json!({"servers": "zk:2181"})).await);
    let err = assert_err!(stranger.read(ZNODE, json!({"path": "/private"})).await);
    assert!(matches!(err, ProviderError::PermissionDenied(_)));
}

#[tokio::test]
async fn one_sided_credentials_are_rejected() {
    let (tester, _) = ProviderTester::in_memory();
    assert_err!(
        tester
            .configure(json!({"servers": "zk:2181", "username": "alice"}))
            .await
    );
    assert!(tester.provider().pool().is_empty().await);
}

#[tokio::test]
async fn failed_connect_is_retried() {
    let ensemble = InMemoryEnsemble::new();
    let connector = ensemble.connector();
    connector.refuse_next(1);
    let handle = ProviderHandle::new(ZooKeeperProvider::new(connector).with_env(|_| None));

    let diagnostics = handle.configure(json!({"servers": "zk:2181"})).await;
    assert_has_errors(&diagnostics);
    assert_error_contains(&diagnostics, "unable to connect to ZooKeeper servers 'zk:2181'");

    let diagnostics = handle.configure(json!({"servers": "zk:2181"})).await;
    assert_no_errors(&diagnostics);
    assert_eq!(handle.provider().pool().connector().connect_count(), 1);
}

#[tokio::test]
async fn handle_reports_errors_as_diagnostics() {
    let ensemble = InMemoryEnsemble::new();
    let handle = ProviderHandle::new(isolated(&ensemble));

    let response = handle.create(ZNODE, json!({"path": "/early"})).await;
    assert!(response.value.is_none());
    assert_error_contains(&response.diagnostics, "not configured");

    assert_no_errors(&handle.configure(json!({"servers": "zk:2181"})).await);
    assert_has_errors(
        &handle
            .validate_resource_config(
                ZNODE,
                json!({"path": "/a", "data": "x", "data_base64": "eA=="}),
            )
            .await,
    );

    let response = handle.create(ZNODE, json!({"path": "/a", "data": "x"})).await;
    assert_no_errors(&response.diagnostics);
    let state = response.value.unwrap();

    let response = handle.read("zookeeper_unknown", state.clone()).await;
    assert_error_contains(&response.diagnostics, "Unknown resource type");

    ensemble.set_available(false);
    let response = handle.read(ZNODE, state).await;
    assert_error_contains(&response.diagnostics, "Service unavailable");
}
