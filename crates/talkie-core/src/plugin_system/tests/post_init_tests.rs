use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use super::common::*;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::executor::{PostInitExecutor, TokioExecutor};
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::traits::PluginError;

fn linkage_failure(_: usize) -> Result<(), PluginError> {
    Err(PluginError::PlatformLinkage("libopus.so not found".into()))
}

#[test]
fn test_foreground_runs_after_initialize_in_registration_order() {
    let log = event_log();
    let mut manager = PluginManager::new();
    for name in ["z", "a", "m"] {
        manager.register_plugin(MockPlugin::new(name).with_log(&log).build());
    }

    manager.configure(context()).unwrap();

    let after: Vec<String> = events(&log).into_iter().filter(|event| event.starts_with("after:")).collect();
    assert_eq!(after, vec!["after:z", "after:a", "after:m"]);
}

#[test]
fn test_foreground_failure_propagates_and_stops_the_batch() {
    let failing = MockPlugin::new("failing")
        .with_after_initialize(|_| Err(PluginError::ExecutionError("speaker busy".into())))
        .build();
    let later = MockPlugin::new("later").build();
    let mut manager = PluginManager::new();
    manager.register_plugin(failing).register_plugin(later.clone());

    match manager.configure(context()) {
        Err(PluginSystemError::PostInitialization { plugin, source }) => {
            assert_eq!(plugin, "failing");
            assert!(matches!(source, PluginError::ExecutionError(_)));
        }
        other => panic!("Expected PostInitialization, got {:?}", other),
    }
    assert_eq!(later.after_calls(), 0);
}

#[test]
fn test_linkage_failure_is_fatal_outside_tests() {
    let plugin = MockPlugin::new("native").with_after_initialize(linkage_failure).build();
    let mut manager = PluginManager::new();
    manager.register_plugin(plugin);

    assert!(matches!(
        manager.configure(context()),
        Err(PluginSystemError::PostInitialization { source: PluginError::PlatformLinkage(_), .. })
    ));
}

#[test]
fn test_under_test_swallows_linkage_failures_only() {
    let native = MockPlugin::new("native").with_after_initialize(linkage_failure).build();
    let later = MockPlugin::new("later").build();
    let mut manager = PluginManager::new().under_test(true);
    manager.register_plugin(native).register_plugin(later.clone());

    manager.configure(context()).unwrap();
    assert_eq!(later.after_calls(), 1, "The batch continues past a swallowed failure");

    let broken = MockPlugin::new("broken")
        .with_after_initialize(|_| Err(PluginError::ExecutionError("boom".into())))
        .build();
    let mut manager = PluginManager::new().under_test(true);
    manager.register_plugin(broken);
    assert!(manager.configure(context()).is_err());
}

#[test]
fn test_under_test_does_not_affect_initialize() {
    let plugin = MockPlugin::new("native")
        .with_initialize(linkage_failure)
        .build();
    let mut manager = PluginManager::new().under_test(true);
    manager.register_plugin(plugin);

    assert!(matches!(
        manager.configure(context()),
        Err(PluginSystemError::InfiniteInitialization { .. })
    ));
}

#[test]
fn test_background_returns_before_post_init_and_wait_blocks() {
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let slow = MockPlugin::new("slow")
        .with_after_initialize(move |_| {
            let _ = release_rx.lock().unwrap().recv_timeout(Duration::from_secs(5));
            Ok(())
        })
        .build();
    let mut manager = PluginManager::new().do_after_initialize_on_background(true);
    manager.register_plugin(slow.clone());

    manager.configure(context()).unwrap();
    assert_eq!(slow.init_calls(), 1);

    release_tx.send(()).unwrap();
    manager.wait_post_initialize();
    assert_eq!(slow.after_calls(), 1);
}

#[test]
fn test_background_failure_goes_to_error_sink() {
    let reported: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let failing = MockPlugin::new("failing")
        .with_after_initialize(|_| Err(PluginError::ExecutionError("mic unplugged".into())))
        .build();
    let later = MockPlugin::new("later").build();
    let mut manager = PluginManager::new()
        .do_after_initialize_on_background(true)
        .with_error_sink(move |error: PluginSystemError| sink.lock().unwrap().push(error.to_string()));
    manager.register_plugin(failing).register_plugin(later.clone());

    assert!(manager.configure(context()).is_ok());
    manager.wait_post_initialize();

    let reported = reported.lock().unwrap();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].contains("failing"));
    assert!(reported[0].contains("mic unplugged"));
    assert_eq!(later.after_calls(), 0);
}

#[test]
fn test_wait_without_background_work_returns() {
    let mut manager = PluginManager::new();
    manager.register_plugin(MockPlugin::new("plugin").build());
    manager.configure(context()).unwrap();
    manager.wait_post_initialize();
    assert!(manager.take_post_init_handle().is_none());
}

struct RefusingExecutor;

impl PostInitExecutor for RefusingExecutor {
    fn spawn(&self, _job: crate::plugin_system::executor::Job) -> crate::plugin_system::error::Result<()> {
        Err(PluginSystemError::BackgroundDispatch { message: "pool shut down".into() })
    }
}

#[test]
fn test_dispatch_failure_is_reported_by_configure() {
    let plugin = MockPlugin::new("plugin").build();
    let mut manager = PluginManager::new()
        .do_after_initialize_on_background(true)
        .with_executor(RefusingExecutor);
    manager.register_plugin(plugin.clone());

    assert!(matches!(
        manager.configure(context()),
        Err(PluginSystemError::BackgroundDispatch { .. })
    ));
    assert_eq!(plugin.after_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_executor_runs_post_init_on_blocking_pool() {
    let log = event_log();
    let executor = TokioExecutor::current().expect("inside a runtime");
    let mut manager = PluginManager::new()
        .do_after_initialize_on_background(true)
        .with_executor(executor);
    manager
        .register_plugin(MockPlugin::new("first").with_log(&log).build())
        .register_plugin(MockPlugin::new("second").with_log(&log).build());

    manager.configure(context()).unwrap();
    let handle = manager.take_post_init_handle().expect("background batch started");
    tokio::time::timeout(Duration::from_secs(5), handle.finished())
        .await
        .expect("post-initialization finished");

    let after: Vec<String> = events(&log).into_iter().filter(|event| event.starts_with("after:")).collect();
    assert_eq!(after, vec!["after:first", "after:second"]);
}

#[test]
fn test_tokio_executor_outside_runtime_is_unavailable() {
    assert!(TokioExecutor::current().is_none());
}
