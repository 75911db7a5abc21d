use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

use dataset_pulse::{
    AdaptiveSampler, DashboardQuery, DatasetsServerSource, Histograms, PulseError, RemoteConfig,
    ResultCache, SampleBudget,
};

struct FakeRowsServer {
    endpoint: String,
    request_lines: Arc<Mutex<Vec<String>>>,
}

fn query_param(request_line: &str, key: &str) -> Option<usize> {
    let target = request_line.split_whitespace().nth(1)?;
    let (_, query) = target.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == key)
        .and_then(|(_, value)| value.parse().ok())
}

fn respond(stream: &mut TcpStream, status_line: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Serves `rows` through a datasets-server style `/rows` endpoint, answering
/// 422 past the end. `throttle_first` answers the first N requests with 429.
fn spawn_rows_server(rows: Vec<Value>, throttle_first: usize) -> FakeRowsServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let request_lines = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&request_lines);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
                continue;
            }
            loop {
                let mut header = String::new();
                let read = reader.read_line(&mut header).unwrap_or(0);
                if read == 0 || header == "\r\n" || header == "\n" {
                    break;
                }
            }
            let request_line = request_line.trim().to_string();
            let served = {
                let mut seen = seen.lock().unwrap();
                seen.push(request_line.clone());
                seen.len()
            };
            if served <= throttle_first {
                respond(&mut stream, "429 Too Many Requests", r#"{"error":"slow down"}"#);
                continue;
            }
            let offset = query_param(&request_line, "offset").unwrap_or(0);
            let length = query_param(&request_line, "length").unwrap_or(100);
            if offset >= rows.len() {
                respond(
                    &mut stream,
                    "422 Unprocessable Entity",
                    r#"{"error":"Offset must be less than the number of rows"}"#,
                );
                continue;
            }
            let end = (offset + length).min(rows.len());
            let page: Vec<Value> = rows[offset..end]
                .iter()
                .enumerate()
                .map(|(idx, row)| json!({ "row_idx": offset + idx, "row": row, "truncated_cells": [] }))
                .collect();
            let body = json!({ "features": [], "rows": page, "num_rows_total": rows.len() });
            respond(&mut stream, "200 OK", &body.to_string());
        }
    });
    FakeRowsServer {
        endpoint: format!("http://{addr}/rows"),
        request_lines,
    }
}

fn build_query(endpoint: String, budget: SampleBudget) -> DashboardQuery<DatasetsServerSource> {
    let source = DatasetsServerSource::new(RemoteConfig {
        source_id: "fake_remote".to_string(),
        endpoint,
        dataset: "owner/name".to_string(),
        ..RemoteConfig::default()
    });
    DashboardQuery::new(
        AdaptiveSampler::new(source).with_pause(Duration::ZERO),
        Arc::new(ResultCache::<Histograms>::new(Duration::from_secs(3600))),
        budget,
    )
}

fn dataset_rows(count: usize) -> Vec<Value> {
    (0..count)
        .map(|idx| {
            json!({
                "source": if idx % 4 == 0 { "human" } else { "model" },
                "timestamp": format!("2024-02-{:02}T08:30:00Z", 1 + idx % 3),
            })
        })
        .collect()
}

#[test]
fn samples_remote_pages_until_end_of_data() {
    let server = spawn_rows_server(dataset_rows(130), 0);
    let query = build_query(server.endpoint.clone(), SampleBudget::default());

    let response = query.handle().unwrap();
    assert_eq!(response.processed_count, Some(130));
    assert_eq!(response.source_breakdown[0].name, "model");
    assert_eq!(response.source_breakdown[0].value, 97);
    assert_eq!(response.source_breakdown[1].name, "human");
    assert_eq!(response.source_breakdown[1].value, 33);
    assert_eq!(response.time_series.len(), 3);
    assert_eq!(response.time_series[0].date, "2024-02-01");

    let lines = server.request_lines.lock().unwrap().clone();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("offset=0"));
    assert!(lines[1].contains("offset=100"));
    assert!(lines[2].contains("offset=130"));
    assert!(lines.iter().all(|line| line.contains("length=100")));

    assert!(query.handle().unwrap().cached);
    assert_eq!(server.request_lines.lock().unwrap().len(), 3);
}

#[test]
fn throttled_first_pass_retries_with_downsized_budget() {
    let server = spawn_rows_server(dataset_rows(500), 1);
    let query = build_query(server.endpoint.clone(), SampleBudget::for_target(200));

    let response = query.handle().unwrap();
    assert_eq!(response.processed_count, Some(100));
    let lines = server.request_lines.lock().unwrap().clone();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("offset=0"));
}

#[test]
fn persistent_throttling_is_an_upstream_failure() {
    let server = spawn_rows_server(dataset_rows(10), usize::MAX);
    let query = build_query(server.endpoint.clone(), SampleBudget::default());

    let err = query.handle().unwrap_err();
    assert!(matches!(err, PulseError::RetryExhausted { attempts: 2, .. }));
    assert!(err.is_upstream());
    assert!(query.cache().is_empty());
}
