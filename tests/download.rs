//! End-to-end download tests over channel and replay transports.

use futures::StreamExt;
use racebox::config::RetryPolicy;
use racebox::protocol::{ChecksumValidator, DOWNLOAD_COMMAND};
use racebox::{
    ChannelHandle, ChannelTransport, Config, DownloadController, DownloadPhase, MemorySink,
    RaceBox, RawRecord, ReplayTransport, SchemaVariant, TelemetryError, UpdateRate,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn frame(id: u8, payload: &[u8]) -> Vec<u8> {
    ChecksumValidator::encode_frame(0xFF, id, payload)
}

fn record(itow: u32, second: u8) -> Vec<u8> {
    let raw = RawRecord {
        itow,
        year: 2024,
        month: 7,
        day: 21,
        hour: 14,
        minute: 30,
        second,
        fix_status: 3,
        longitude: 123_456_789,
        latitude: 476_543_210,
        speed: 15_000,
        ..Default::default()
    };
    frame(0x21, &raw.to_bytes())
}

fn start(count: u32) -> Vec<u8> {
    frame(0x23, &count.to_le_bytes())
}

fn ack() -> Vec<u8> {
    frame(0x02, &[0xFF, 0x23])
}

fn nack() -> Vec<u8> {
    frame(0x03, &[0xFF, 0x23])
}

fn boundary() -> Vec<u8> {
    frame(0x26, &[0x00])
}

/// Wait for the download command, then deliver `bytes` in `chunk`-sized pieces.
async fn serve(handle: &mut ChannelHandle, bytes: &[u8], chunk: usize) {
    let command = handle.next_command().await.expect("controller dropped");
    assert_eq!(command, DOWNLOAD_COMMAND.to_vec());
    for piece in bytes.chunks(chunk) {
        handle.push(piece.to_vec()).await.expect("transport closed");
    }
}

#[tokio::test]
async fn announced_records_are_received_and_completed() {
    let mut stream = start(3);
    stream.extend(record(1_000, 1));
    stream.extend(record(1_040, 1));
    stream.extend(record(1_080, 1));
    stream.extend(ack());

    let (mut transport, mut handle) = ChannelTransport::pair("device");
    let device = tokio::spawn(async move {
        serve(&mut handle, &stream, 20).await;
        handle
    });

    let controller = DownloadController::new(&Config::default());
    let report = controller.run(&mut transport, Vec::new(), CancellationToken::new()).await;
    drop(device.await.unwrap());

    assert!(report.is_completed(), "{:?}", report.error());
    assert_eq!(report.state.expected_record_count, Some(3));
    assert_eq!(report.state.received_count, 3);
    assert!(report.state.completed);
    assert_eq!(report.retained.len(), 1);
    assert_eq!(report.retained[0].record_count(), 3);
}

#[tokio::test]
async fn boundary_splits_into_disjoint_sessions() {
    let mut stream = start(3);
    stream.extend(record(10, 0));
    stream.extend(record(20, 1));
    stream.extend(boundary());
    stream.extend(record(30, 2));
    stream.extend(ack());

    let sink = MemorySink::new();
    let controller = DownloadController::new(&Config::default());
    let mut transport = ReplayTransport::new(stream).with_chunk_size(7);
    let report = controller
        .run(&mut transport, vec![Box::new(sink.clone())], CancellationToken::new())
        .await;

    assert!(report.is_completed());
    let sessions = sink.sessions();
    assert_eq!(sessions.iter().map(|s| s.record_count()).collect::<Vec<_>>(), vec![2, 1]);

    let first: Vec<u32> = sessions[0].records.iter().map(|r| r.itow()).collect();
    let second: Vec<u32> = sessions[1].records.iter().map(|r| r.itow()).collect();
    assert_eq!(first, vec![10, 20]);
    assert_eq!(second, vec![30]);
    assert_eq!(sessions[0].id, "20240721143000_20240721143001");
}

#[tokio::test]
async fn disconnect_fails_but_keeps_flushed_sessions() {
    let mut stream = start(5);
    stream.extend(record(10, 0));
    stream.extend(record(20, 1));
    stream.extend(boundary());
    stream.extend(record(30, 2));

    let (mut transport, mut handle) = ChannelTransport::pair("device");
    let device = tokio::spawn(async move {
        serve(&mut handle, &stream, 64).await;
        handle.disconnect();
    });

    let sink = MemorySink::new();
    let controller = DownloadController::new(&Config::default());
    let progress = controller.progress();
    let report = controller
        .run(&mut transport, vec![Box::new(sink.clone())], CancellationToken::new())
        .await;
    device.await.unwrap();

    assert!(matches!(report.error(), Some(TelemetryError::Disconnected)));
    assert!(!report.state.completed);
    assert_eq!(report.state.received_count, 3);
    assert_eq!(sink.sessions().iter().map(|s| s.record_count()).collect::<Vec<_>>(), vec![2, 1]);
    assert_eq!(progress.borrow().phase, DownloadPhase::Failed);
}

#[tokio::test(start_paused = true)]
async fn silent_device_times_out() {
    let mut config = Config::default();
    config.download.timeout_ms = Some(5_000);

    let (mut transport, mut handle) = ChannelTransport::pair("device");
    let device = tokio::spawn(async move {
        serve(&mut handle, &start(10), 64).await;
        // Stay connected without sending anything else
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let controller = DownloadController::new(&config);
    let report = controller.run(&mut transport, Vec::new(), CancellationToken::new()).await;
    device.abort();

    match report.error() {
        Some(TelemetryError::Timeout { duration }) => assert_eq!(*duration, Duration::from_secs(5)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(report.state.expected_record_count, Some(10));
}

#[tokio::test(start_paused = true)]
async fn idle_link_hits_chunk_timeout() {
    let mut config = Config::default();
    config.download.chunk_timeout_ms = Some(250);

    let (mut transport, mut handle) = ChannelTransport::pair("device");
    let device = tokio::spawn(async move {
        let _ = handle.next_command().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let report = DownloadController::new(&config)
        .run(&mut transport, Vec::new(), CancellationToken::new())
        .await;
    device.abort();

    assert!(matches!(
        report.error(),
        Some(TelemetryError::Timeout { duration }) if *duration == Duration::from_millis(250)
    ));
}

#[tokio::test]
async fn cancellation_flushes_open_session() {
    let mut stream = start(100);
    stream.extend(record(10, 0));
    stream.extend(record(20, 1));

    let (transport, mut handle) = ChannelTransport::pair("device");
    let cancel = CancellationToken::new();
    let controller = DownloadController::new(&Config::default());
    let mut progress = controller.progress();
    let task = controller.spawn(transport, Vec::new(), cancel.clone());

    serve(&mut handle, &stream, 32).await;
    progress.wait_for(|p| p.received == 2).await.unwrap();
    cancel.cancel();

    let report = task.await.unwrap();
    assert!(matches!(report.error(), Some(TelemetryError::Cancelled)));
    assert_eq!(report.retained.len(), 1);
    assert_eq!(report.retained[0].record_count(), 2);
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn negative_ack_is_retried_when_configured() {
    let mut config = Config::default();
    config.download.nack_retry = RetryPolicy { max_attempts: 1, backoff_ms: 200 };

    let mut stream = start(1);
    stream.extend(record(10, 0));
    stream.extend(ack());

    let (mut transport, mut handle) = ChannelTransport::pair("device");
    let device = tokio::spawn(async move {
        serve(&mut handle, &nack(), 64).await;
        serve(&mut handle, &stream, 64).await;
        handle
    });

    let controller = DownloadController::new(&config);
    let report = controller.run(&mut transport, Vec::new(), CancellationToken::new()).await;
    drop(device.await.unwrap());

    assert!(report.is_completed(), "{:?}", report.error());
    assert_eq!(report.nacks, 1);
    assert_eq!(report.dispatch.nacks, 1);
    assert_eq!(report.state.received_count, 1);
}

#[tokio::test(start_paused = true)]
async fn negative_ack_budget_is_enforced() {
    let mut config = Config::default();
    config.download.nack_retry = RetryPolicy { max_attempts: 1, backoff_ms: 200 };

    let (mut transport, mut handle) = ChannelTransport::pair("device");
    let device = tokio::spawn(async move {
        serve(&mut handle, &nack(), 64).await;
        serve(&mut handle, &nack(), 64).await;
        handle
    });

    let report = DownloadController::new(&config)
        .run(&mut transport, Vec::new(), CancellationToken::new())
        .await;
    drop(device.await.unwrap());

    assert!(matches!(report.error(), Some(TelemetryError::NegativeAck { attempt: 2 })));
}

#[tokio::test]
async fn corrupted_and_unknown_frames_do_not_stop_the_download() {
    let mut stream = start(2);
    let mut bad = record(10, 0);
    let last = bad.len() - 1;
    bad[last] ^= 0x5A;
    stream.extend(bad);
    stream.extend(ChecksumValidator::encode_frame(0x0A, 0x04, &[1, 2, 3]));
    stream.extend([0x00, 0x42, 0x17]);
    stream.extend(record(20, 1));
    stream.extend(ack());

    let controller = DownloadController::new(&Config::default());
    let mut transport = ReplayTransport::new(stream).with_chunk_size(5);
    let report = controller.run(&mut transport, Vec::new(), CancellationToken::new()).await;

    assert!(report.is_completed());
    assert_eq!(report.reassembly.checksum_errors, 1);
    assert_eq!(report.dispatch.unknown_messages, 1);
    assert_eq!(report.state.received_count, 1);
    assert_eq!(report.retained[0].records[0].itow(), 20);
}

#[tokio::test]
async fn extended_variant_flows_through_to_sessions() {
    let mut config = Config::default();
    config.decoder.variant = SchemaVariant::Extended;

    let mut stream = start(1);
    stream.extend(record(10, 0));
    stream.extend(ack());

    let mut transport = ReplayTransport::new(stream);
    let controller = DownloadController::new(&config);
    let mut records = controller.records(UpdateRate::Max(5));
    let report = controller.run(&mut transport, Vec::new(), CancellationToken::new()).await;

    let session = &report.retained[0];
    assert_eq!(session.variant, SchemaVariant::Extended);
    assert!(session.records[0].extended().is_some());

    let latest = records.next().await.unwrap();
    assert_eq!(latest.itow(), 10);
}

#[tokio::test]
async fn csv_output_from_config() {
    let dir = std::env::temp_dir().join(format!("racebox-it-csv-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut config = Config::default();
    config.output.csv_dir = Some(dir.clone());
    config.output.device_name = "Mini S".to_string();

    let mut stream = start(2);
    stream.extend(record(10, 5));
    stream.extend(boundary());
    stream.extend(record(20, 9));
    stream.extend(ack());
    let mut transport = ReplayTransport::new(stream);

    let report = RaceBox::download(&config, &mut transport, CancellationToken::new()).await;
    assert!(report.is_completed());
    assert!(report.sinks.as_ref().is_some_and(|s| s.is_clean()));

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "racebox_data_Mini_S_20240721_143005.csv".to_string(),
            "racebox_data_Mini_S_20240721_143009.csv".to_string(),
        ]
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn decode_capture_flushes_trailing_session() {
    let path = std::env::temp_dir().join(format!("racebox-it-capture-{}.bin", std::process::id()));
    let mut stream = start(2);
    stream.extend(record(10, 0));
    stream.extend(record(20, 1));
    std::fs::write(&path, &stream).unwrap();

    let sessions = RaceBox::decode_capture(&Config::default(), &path).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].record_count(), 2);

    let _ = std::fs::remove_file(&path);
}
