//! Watching a real directory through the platform notification source

use qw_core::{WatchConfig, WatchEvent};
use std::fs;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;
use watcher::WatchDispatcher;

fn config(root: &std::path::Path) -> WatchConfig {
    WatchConfig {
        root_path: root.to_path_buf(),
        file_extensions: vec![".csv".to_string()],
        initial_quiet_period_secs: 1,
        ..WatchConfig::default()
    }
}

async fn next_event(rx: &mut broadcast::Receiver<WatchEvent>) -> WatchEvent {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("no watch event within 10s")
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_written_file_reported_ready() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = WatchDispatcher::configure(&config(temp_dir.path())).unwrap();
    let mut rx = dispatcher.subscribe();
    let source = dispatcher.start().unwrap();

    match next_event(&mut rx).await {
        WatchEvent::Message(msg) => assert!(msg.starts_with("Watching folder: ")),
        other => panic!("unexpected event {other:?}"),
    }

    fs::create_dir(temp_dir.path().join("daily")).unwrap();
    let path = temp_dir.path().join("daily/report.csv");
    let mut file = fs::File::create(&path).unwrap();
    for chunk in 0..5 {
        writeln!(file, "row,{}", chunk).unwrap();
        file.flush().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    drop(file);

    // Ignored: wrong extension
    fs::write(temp_dir.path().join("notes.txt"), b"skip me").unwrap();

    let ready = loop {
        if let WatchEvent::Ready(result) = next_event(&mut rx).await {
            break result;
        }
    };
    assert_eq!(ready.file_name, format!("daily{}report.csv", std::path::MAIN_SEPARATOR));
    assert!(ready.seconds_since_last_update >= 1.0);
    assert_eq!(dispatcher.tracker_count(), 1);

    source.stop();
    dispatcher.shutdown();
}

#[tokio::test]
async fn test_missing_root_fails_to_start() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist");
    let dispatcher = WatchDispatcher::configure(&config(&missing)).unwrap();

    let err = dispatcher.start().err().unwrap();
    assert!(matches!(err, qw_core::Error::Source(_)));
}
