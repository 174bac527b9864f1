mod common;

use std::{sync::Arc, time::Duration};

use copilot_panel::{
    domain::{
        traits::{Gateway, Reloader},
        value_objects::SuccessCodes,
    },
    error::AppError,
    services::version_reconciler::{ReconcilerSettings, VersionReconciler},
};

use common::{advance, json, settle, CountingReloader, FakeGateway, Reply};

const LOCAL_130: &str =
    r#"{"code":0,"data":{"version":"1.3.0","buildDate":"2024-01-01T00:00:00Z"}}"#;
const LOCAL_140: &str = r#"{"code":0,"data":{"version":"1.4.0","buildDate":"2024-02-01T00:00:00Z"}}"#;
const REMOTE_140: &str = r#"{"code":0,"data":{"remoteVersion":"1.4.0"}}"#;

fn reconciler(gateway: &Arc<FakeGateway>, reloader: &Arc<CountingReloader>) -> VersionReconciler {
    let gateway: Arc<dyn Gateway> = gateway.clone();
    let reloader: Arc<dyn Reloader> = reloader.clone();
    VersionReconciler::new(
        gateway,
        reloader,
        ReconcilerSettings::default(),
        SuccessCodes::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn newer_remote_signals_update() {
    let gateway = FakeGateway::new();
    gateway.local.set(vec![json(LOCAL_130)]);
    gateway.remote.set(vec![json(REMOTE_140)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    let snapshot = reconciler.refresh_now().await.unwrap();
    assert!(snapshot.has_backend_update);
    assert_eq!(snapshot.backend_version, "1.3.0");
    assert_eq!(snapshot.remote_version, "1.4.0");
    assert_eq!(snapshot.build_date, "2024-01-01T00:00:00Z");
    assert!(snapshot.checked_at.is_some());
    assert_eq!(reconciler.observe(), snapshot);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_keeps_previous_remote() {
    let gateway = FakeGateway::new();
    gateway.local.set(vec![json(LOCAL_130), json(LOCAL_140)]);
    gateway
        .remote
        .set(vec![json(REMOTE_140), Reply::Transport("timeout")]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    assert!(reconciler.refresh_now().await.unwrap().has_backend_update);

    advance(30_000).await;
    let snapshot = reconciler.refresh_now().await.unwrap();
    assert_eq!(snapshot.backend_version, "1.4.0");
    assert_eq!(snapshot.remote_version, "1.4.0");
    assert!(!snapshot.has_backend_update);
    assert_eq!(gateway.remote.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_on_first_run_leaves_unknown() {
    let gateway = FakeGateway::new();
    gateway.local.set(vec![json(LOCAL_130)]);
    gateway
        .remote
        .set(vec![json(r#"{"code":500,"msg":"registry unreachable"}"#)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    let snapshot = reconciler.refresh_now().await.unwrap();
    assert_eq!(snapshot.backend_version, "1.3.0");
    assert_eq!(snapshot.remote_version, "unknown");
    assert!(!snapshot.has_backend_update);
}

#[tokio::test(start_paused = true)]
async fn local_failure_resets_everything() {
    let gateway = FakeGateway::new();
    gateway
        .local
        .set(vec![json(LOCAL_130), Reply::Transport("connection reset")]);
    gateway.remote.set(vec![json(REMOTE_140)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    assert!(reconciler.refresh_now().await.unwrap().has_backend_update);

    advance(30_000).await;
    let err = reconciler.refresh_now().await.unwrap_err();
    assert!(err.is_transport());

    let snapshot = reconciler.snapshot();
    assert_eq!(snapshot.backend_version, "unknown");
    assert_eq!(snapshot.remote_version, "unknown");
    assert_eq!(snapshot.build_date, "");
    assert!(!snapshot.has_backend_update);
    // remote is not consulted without a local version
    assert_eq!(gateway.remote.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn unparsable_remote_is_not_an_update() {
    let gateway = FakeGateway::new();
    gateway.local.set(vec![json(LOCAL_130)]);
    gateway
        .remote
        .set(vec![json(r#"{"code":200,"data":"v1.4.0"}"#)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    let snapshot = reconciler.refresh_now().await.unwrap();
    assert_eq!(snapshot.remote_version, "v1.4.0");
    assert!(!snapshot.has_backend_update);
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_within_window_is_cached() {
    let gateway = FakeGateway::new();
    gateway.local.set(vec![json(LOCAL_130)]);
    gateway.remote.set(vec![json(REMOTE_140)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    reconciler.refresh_now().await.unwrap();
    advance(29_999).await;
    reconciler.check_for_updates().await.unwrap();
    assert_eq!(gateway.local.calls(), 1);

    advance(1).await;
    reconciler.check_for_updates().await.unwrap();
    assert_eq!(gateway.local.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn periodic_refresh_runs_every_minute() {
    let gateway = FakeGateway::new();
    gateway.local.set(vec![json(LOCAL_130)]);
    gateway.remote.set(vec![json(REMOTE_140)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);
    let mut watch = reconciler.watch();

    let sub = reconciler.start().expect("loop starts");
    assert!(reconciler.start().is_none());
    settle().await;
    assert_eq!(gateway.local.calls(), 1);
    assert!(watch.has_changed().unwrap());
    assert!(watch.borrow_and_update().has_backend_update);

    advance(59_999).await;
    assert_eq!(gateway.local.calls(), 1);
    advance(1).await;
    assert_eq!(gateway.local.calls(), 2);

    sub.dispose();
    advance(120_000).await;
    assert_eq!(gateway.local.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn successful_update_reloads_after_grace_period() {
    let gateway = FakeGateway::new();
    gateway.update.set(vec![json(r#"{"code":200,"msg":"updating"}"#)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    reconciler.update_backend().await.unwrap();
    assert!(reconciler.snapshot().show_update_prompt);
    settle().await;

    advance(2_999).await;
    assert_eq!(reloader.count(), 0);
    advance(1).await;
    assert_eq!(reloader.count(), 1);

    advance(10_000).await;
    assert_eq!(reloader.count(), 1);
    assert_eq!(gateway.update.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_update_never_reloads() {
    let gateway = FakeGateway::new();
    gateway
        .update
        .set(vec![json(r#"{"code":500,"msg":"docker socket unavailable"}"#)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    match reconciler.update_backend().await {
        Err(AppError::ManualRestartRequired(source)) => assert!(source.is_application()),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!reconciler.snapshot().show_update_prompt);

    gateway.update.set(vec![Reply::Transport("connection refused")]);
    let err = reconciler.update_backend().await.unwrap_err();
    assert!(matches!(err, AppError::ManualRestartRequired(_)));

    advance(10_000).await;
    assert_eq!(reloader.count(), 0);
    // no automatic retry
    assert_eq!(gateway.update.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_pending_reload_and_discards_late_versions() {
    let gateway = FakeGateway::new();
    gateway.update.set(vec![json(r#"{"code":0}"#)]);
    gateway.local.set(vec![json(LOCAL_130)]);
    gateway.remote.set(vec![json(REMOTE_140)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    reconciler.update_backend().await.unwrap();
    gateway.set_delay(Duration::from_millis(5_000));
    let _sub = reconciler.start().expect("loop starts");
    settle().await;
    assert_eq!(gateway.local.calls(), 1);

    advance(1_000).await;
    reconciler.dispose();
    assert!(reconciler.is_disposed());

    advance(10_000).await;
    assert_eq!(reloader.count(), 0);
    assert_eq!(reconciler.snapshot().backend_version, "unknown");
    assert_eq!(gateway.remote.calls(), 0);
    assert!(reconciler.start().is_none());
}

#[tokio::test(start_paused = true)]
async fn update_prompt_can_be_dismissed() {
    let gateway = FakeGateway::new();
    gateway.update.set(vec![json(r#"{"code":0}"#)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    reconciler.update_backend().await.unwrap();
    reconciler.set_show_update_prompt(false);
    assert!(!reconciler.snapshot().show_update_prompt);
}

#[tokio::test(start_paused = true)]
async fn failed_cycle_is_not_served_from_cache() {
    let gateway = FakeGateway::new();
    gateway.local.set(vec![
        json(LOCAL_130),
        json(LOCAL_130),
        Reply::Transport("connection reset"),
        json(LOCAL_130),
    ]);
    gateway.remote.set(vec![json(REMOTE_140)]);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = reconciler(&gateway, &reloader);

    let _sub = reconciler.start().expect("loop starts");
    settle().await;
    assert_eq!(gateway.local.calls(), 1);

    advance(50_000).await;
    reconciler.check_for_updates().await.unwrap();
    assert_eq!(gateway.local.calls(), 2);

    // periodic cycle at 60s fails locally
    advance(10_000).await;
    assert_eq!(gateway.local.calls(), 3);
    assert_eq!(reconciler.snapshot().backend_version, "unknown");

    advance(5_000).await;
    let snapshot = reconciler.check_for_updates().await.unwrap();
    assert_eq!(gateway.local.calls(), 4);
    assert_eq!(snapshot.backend_version, "1.3.0");
    assert!(snapshot.has_backend_update);
}
