mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{gateway_for, memory_store, site_details};
use serde_json::json;
use starfish_core::ResourceType;
use starfish_sync::{
    CmSource, HttpSiteRegistry, ReconciliationEngine, SiteRegistry, StaticSiteRegistry,
    SyncConfig, SyncOrchestrator, SyncOutcome,
};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn orchestrator(
    server: &MockServer,
    registry: Arc<dyn SiteRegistry>,
    config: SyncConfig,
) -> (SyncOrchestrator, Arc<starfish_db_memory::InMemoryInventoryStore>) {
    let store = memory_store();
    let engine = ReconciliationEngine::new(store.clone());
    (
        SyncOrchestrator::new(registry, gateway_for(server), engine, config),
        store,
    )
}

async fn mount_site(server: &MockServer, site: &str, cm: &str) {
    Mock::given(method("GET"))
        .and(path("/site"))
        .and(query_param("SiteName", site))
        .respond_with(ResponseTemplate::new(200).set_body_json(site_details(site, cm)))
        .mount(server)
        .await;
}

async fn mount_resources_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/resource/(station|huntgroup|pickupgroup)/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "active"})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_static_servers_with_failing_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/resource/station/.+$"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let config = SyncConfig {
        cm_source: CmSource::Static,
        station_ids: "1000,1001".into(),
        server_names: "CM1,CM2".into(),
        ..Default::default()
    };
    let (orchestrator, _) = orchestrator(&server, Arc::new(StaticSiteRegistry::default()), config);

    let outcome = orchestrator.sync_resource_type(ResourceType::Station).await;
    assert_eq!(
        outcome.summary(),
        "Station resource sync completed. Success: 0, Failed: 4"
    );
}

#[tokio::test]
async fn test_site_details_source_skips_site_without_details() {
    let server = MockServer::start().await;
    mount_site(&server, "NYC", "CM1").await;
    Mock::given(method("GET"))
        .and(path("/site"))
        .and(query_param("SiteName", "LON"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_resources_ok(&server).await;

    let config = SyncConfig {
        huntgroup_ids: "2000, 2001".into(),
        ..Default::default()
    };
    let registry = Arc::new(StaticSiteRegistry::new(["NYC", "LON"]));
    let (orchestrator, store) = orchestrator(&server, registry, config);

    let outcome = orchestrator.sync_resource_type(ResourceType::HuntGroup).await;
    assert_eq!(
        outcome,
        SyncOutcome::Completed("Hunt group resource sync completed. Success: 2, Failed: 0".into())
    );
    // A single-type pass does not reconcile.
    assert!(store.systems().is_empty());
}

#[tokio::test]
async fn test_sync_all_reconciles_and_counts_every_type() {
    let server = MockServer::start().await;
    mount_site(&server, "NYC", "CM1").await;
    mount_resources_ok(&server).await;

    let registry = Arc::new(StaticSiteRegistry::new(["NYC"]));
    let (orchestrator, store) = orchestrator(&server, registry, SyncConfig::default());

    let outcome = orchestrator.sync_all().await;
    assert_eq!(
        outcome.summary(),
        "All resources sync completed. Station (Success: 3, Failed: 0), HuntGroup (Success: 3, Failed: 0), PickupGroup (Success: 3, Failed: 0)"
    );
    assert_eq!(store.systems().len(), 1);
    assert_eq!(store.reservations().len(), 2);
}

#[tokio::test]
async fn test_sync_sites_summary() {
    let server = MockServer::start().await;
    mount_site(&server, "NYC", "CM1").await;

    let registry = Arc::new(StaticSiteRegistry::new(["NYC"]));
    let (orchestrator, _) = orchestrator(&server, registry, SyncConfig::default());

    let first = orchestrator.sync_sites().await;
    assert_eq!(
        first.summary(),
        "Site sync completed. Results: 1, Skipped: 0, Ranges (Updated: 0, Inserted: 1), Reservations (Updated: 0, Inserted: 2)"
    );

    let second = orchestrator.sync_sites().await;
    assert_eq!(
        second.summary(),
        "Site sync completed. Results: 1, Skipped: 0, Ranges (Updated: 1, Inserted: 0), Reservations (Updated: 2, Inserted: 0)"
    );
}

#[tokio::test]
async fn test_empty_site_list_is_skipped() {
    let server = MockServer::start().await;
    let (orchestrator, _) = orchestrator(
        &server,
        Arc::new(StaticSiteRegistry::default()),
        SyncConfig::default(),
    );

    assert_eq!(
        orchestrator.sync_resource_type(ResourceType::PickupGroup).await,
        SyncOutcome::Skipped("Pickup group resource sync skipped - No sites available".into())
    );
    assert_eq!(
        orchestrator.sync_all().await.summary(),
        "All resource sync skipped - No sites available"
    );
    assert_eq!(
        orchestrator.sync_sites().await.summary(),
        "Site sync skipped - No sites available"
    );
}

#[tokio::test]
async fn test_static_source_without_servers_is_skipped() {
    let server = MockServer::start().await;
    let config = SyncConfig {
        cm_source: CmSource::Static,
        server_names: " , ".into(),
        ..Default::default()
    };
    let (orchestrator, _) = orchestrator(&server, Arc::new(StaticSiteRegistry::default()), config);

    assert_eq!(
        orchestrator.sync_all().await.summary(),
        "All resource sync skipped - No servers configured"
    );
}

#[tokio::test]
async fn test_registry_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let registry =
        Arc::new(HttpSiteRegistry::new(&server.uri(), Duration::from_secs(5)).unwrap());
    let (orchestrator, _) = orchestrator(&server, registry, SyncConfig::default());

    let outcome = orchestrator.sync_resource_type(ResourceType::Station).await;
    assert!(matches!(outcome, SyncOutcome::Failed(_)));
    assert!(
        outcome
            .summary()
            .starts_with("Station resource sync failed: Site registry returned status 503")
    );

    let outcome = orchestrator.sync_all().await;
    assert!(outcome.summary().starts_with("Complete resource sync failed: "));
}

#[tokio::test]
async fn test_http_registry_lists_sites() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"siteName": "NYC"}, {"siteName": ""}])),
        )
        .mount(&server)
        .await;
    mount_site(&server, "NYC", "CM1").await;

    let registry =
        Arc::new(HttpSiteRegistry::new(&server.uri(), Duration::from_secs(5)).unwrap());
    let (orchestrator, store) = orchestrator(&server, registry, SyncConfig::default());

    assert!(orchestrator.sync_sites().await.is_completed());
    assert_eq!(store.systems().len(), 1);
}

#[tokio::test]
async fn test_concurrent_resource_pass_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/resource/station/.+$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"state": "active"}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let config = SyncConfig {
        cm_source: CmSource::Static,
        station_ids: "1000".into(),
        server_names: "CM1".into(),
        ..Default::default()
    };
    let (orchestrator, _) = orchestrator(&server, Arc::new(StaticSiteRegistry::default()), config);

    let (first, second) = tokio::join!(
        orchestrator.sync_resource_type(ResourceType::Station),
        orchestrator.sync_all()
    );
    assert_eq!(
        first.summary(),
        "Station resource sync completed. Success: 1, Failed: 0"
    );
    assert_eq!(
        second.summary(),
        "All resource sync skipped - Another sync is in progress"
    );
}

#[tokio::test]
async fn test_concurrent_site_pass_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/site"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(site_details("NYC", "CM1"))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let registry = Arc::new(StaticSiteRegistry::new(["NYC"]));
    let (orchestrator, _) = orchestrator(&server, registry, SyncConfig::default());

    let (first, second) = tokio::join!(orchestrator.sync_sites(), orchestrator.sync_sites());
    let summaries = [first.summary(), second.summary()];
    assert!(summaries.contains(&"Site sync skipped - Another sync is in progress"));
    assert!(summaries.iter().any(|s| s.starts_with("Site sync completed.")));
}

#[tokio::test]
async fn test_slow_site_pass_does_not_block_resource_pass() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/site"))
        .and(query_param("SiteName", "NYC"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(site_details("NYC", "CM1"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_resources_ok(&server).await;

    let registry = Arc::new(StaticSiteRegistry::new(["NYC"]));
    let (orchestrator, store) = orchestrator(&server, registry, SyncConfig::default());
    let orchestrator = Arc::new(orchestrator);

    let sites = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.sync_sites().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let resources = orchestrator.sync_all().await;
    let sites = sites.await.unwrap();

    assert!(sites.summary().starts_with("Site sync completed. Results: 1"));
    assert_eq!(
        resources.summary(),
        "All resources sync completed. Station (Success: 3, Failed: 0), HuntGroup (Success: 3, Failed: 0), PickupGroup (Success: 3, Failed: 0)"
    );
    assert_eq!(store.systems().len(), 1);
    assert_eq!(store.reservations().len(), 2);
}
