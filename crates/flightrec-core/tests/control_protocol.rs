//! Message bus and control protocol over in-process streams and TCP.

use std::sync::Arc;
use std::time::Duration;

use flightrec_core::fakes::MemorySinkFactory;
use flightrec_core::transport::{handle_line, serve_connection};
use flightrec_core::{
    pump_envelopes, send_request, serve_control, subscribe_pending, ChannelConfig,
    ControlRequest, ControlResponse, DumpRequest, ObservedChannels, Recorder, RetentionWindow,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn recorder(sinks: Arc<MemorySinkFactory>) -> Arc<Recorder> {
    let channels = ["/odom", "/imu"]
        .iter()
        .map(|n| ChannelConfig {
            name: n.to_string(),
            retention: RetentionWindow::new(Duration::from_secs(60)),
        })
        .collect();
    Arc::new(Recorder::new(channels, "/tmp/flightrec-ctl", sinks))
}

fn envelope_line(channel: &str, secs: u32) -> String {
    format!(
        r#"{{"channel":"{channel}","type":"nav/Odometry","stamp":"2024-03-09T07:05:{secs:02}Z","payload":{{"seq":{secs}}}}}"#
    )
}

#[tokio::test]
async fn bus_messages_buffer_only_after_subscription() {
    let rec = recorder(Arc::new(MemorySinkFactory::new()));
    let observed = ObservedChannels::new();

    let early: String = (0..3).map(|i| envelope_line("/odom", i) + "\n").collect();
    let stats = pump_envelopes(early.as_bytes(), &rec, &observed).await.unwrap();
    assert_eq!(stats.lines, 3);
    assert_eq!(stats.buffered, 0);
    assert_eq!(stats.dropped, 3);

    assert_eq!(subscribe_pending(&rec, &observed), 1);
    assert_eq!(
        rec.channel("/odom").unwrap().message_type(),
        Some("nav/Odometry")
    );

    let mut later: String = (3..8).map(|i| envelope_line("/odom", i) + "\n").collect();
    later.push_str("not json\n\n");
    later.push_str(&envelope_line("/unknown", 9));
    let stats = pump_envelopes(later.as_bytes(), &rec, &observed).await.unwrap();
    assert_eq!(stats.buffered, 5);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(rec.status().total_buffered(), 5);
}

#[tokio::test]
async fn handle_line_reports_bad_requests() {
    let rec = recorder(Arc::new(MemorySinkFactory::new()));

    let resp = handle_line(Arc::clone(&rec), "{\"op\":\"explode\"}").await;
    assert!(!resp.ok);
    assert!(resp.status_text.starts_with("invalid request"));

    let resp = handle_line(Arc::clone(&rec), r#"{"op":"dump","duration":-2}"#).await;
    assert!(!resp.ok);
    assert!(resp.status_text.contains("invalid dump duration"));
}

#[tokio::test]
async fn connection_answers_status_then_dump() {
    let sinks = Arc::new(MemorySinkFactory::new());
    let rec = recorder(sinks.clone());
    rec.activate("/odom", "nav/Odometry");
    let observed = ObservedChannels::new();
    let lines: String = (0..4).map(|i| envelope_line("/odom", i) + "\n").collect();
    pump_envelopes(lines.as_bytes(), &rec, &observed).await.unwrap();

    let (client, server) = tokio::io::duplex(8 * 1024);
    let server_task = tokio::spawn(serve_connection(server, Arc::clone(&rec)));

    let (read_half, mut write_half) = tokio::io::split(client);
    let mut responses = BufReader::new(read_half).lines();

    write_half.write_all(b"{\"op\":\"status\"}\n").await.unwrap();
    let status: ControlResponse =
        serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
    assert!(status.ok);
    assert!(status.status_text.contains("4 messages buffered"));
    assert!(status.status_text.contains("/imu [pending]"));

    write_half
        .write_all(b"{\"op\":\"dump\",\"name\":\"ctl\",\"duration\":0}\n")
        .await
        .unwrap();
    let dump: ControlResponse =
        serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
    assert!(dump.ok, "{}", dump.status_text);
    assert!(dump.status_text.starts_with("Exported 4 messages"));
    assert!(dump.status_text.contains("ctl.mem"));

    write_half.shutdown().await.unwrap();
    server_task.await.unwrap().unwrap();
    assert_eq!(sinks.last_log().unwrap().records.len(), 4);
}

#[tokio::test]
async fn tcp_round_trip() {
    let sinks = Arc::new(MemorySinkFactory::new());
    let rec = recorder(sinks.clone());
    rec.activate("/imu", "sensor/Imu");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_control(listener, Arc::clone(&rec)));

    let resp = send_request(addr, &ControlRequest::Dump(DumpRequest::new("tcp", 5.0)))
        .await
        .unwrap();
    assert!(resp.ok, "{}", resp.status_text);
    assert!(resp.status_text.contains("/imu [active] 0 messages"));
    assert_eq!(sinks.logs().len(), 1);

    server.abort();
}
