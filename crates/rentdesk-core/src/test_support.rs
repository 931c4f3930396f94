//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::models::{Collection, DateRange, Record, RecordId};
use crate::sync::PollSource;
use crate::view::SnapshotSource;
use crate::{Error, Result};

/// Minimal record: identity, creation time and an unread marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub unread: bool,
}

impl Row {
    pub fn read(mut self) -> Self {
        self.unread = false;
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap()
    }
}

impl Record for Row {
    const COLLECTION: Collection = Collection::Consultations;

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn is_unread(&self) -> bool {
        self.unread
    }
}

/// A fixed instant plus `secs` seconds.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap()
}

/// A fresh unread row created at `at(secs)`.
pub fn row(secs: i64) -> Row {
    Row {
        id: RecordId::new(),
        created_at: at(secs),
        unread: true,
    }
}

/// Backend double: a table of rows plus a log of every poll's cursor.
///
/// Each poll pops one entry off `poll_delays` and takes that long before
/// reading the table.
#[derive(Default)]
pub struct FakeTable {
    pub rows: Mutex<Vec<Row>>,
    pub queries: Mutex<Vec<DateTime<Utc>>>,
    pub poll_delays: Mutex<VecDeque<Duration>>,
    pub fail_next: Mutex<usize>,
    pub fail_snapshot: Mutex<bool>,
}

impl FakeTable {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn insert(&self, row: Row) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn delay_polls(&self, delays: impl IntoIterator<Item = Duration>) {
        self.poll_delays.lock().unwrap().extend(delays);
    }

    pub fn queries(&self) -> Vec<DateTime<Utc>> {
        self.queries.lock().unwrap().clone()
    }

    fn newest_first(&self, keep: impl Fn(&Row) -> bool) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| keep(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}

impl PollSource<Row> for FakeTable {
    async fn created_after(&self, _collection: &str, after: DateTime<Utc>) -> Result<Vec<Row>> {
        self.queries.lock().unwrap().push(after);
        let delay = self.poll_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut fail_next = self.fail_next.lock().unwrap();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(Error::Api("connection reset (503)".to_string()));
            }
        }
        Ok(self.newest_first(|row| row.created_at > after))
    }
}

impl SnapshotSource<Row> for FakeTable {
    async fn fetch_all(&self, _collection: &str, range: DateRange) -> Result<Vec<Row>> {
        if *self.fail_snapshot.lock().unwrap() {
            return Err(Error::Api("service unavailable (503)".to_string()));
        }
        Ok(self.newest_first(|row| range.contains(row.created_at)))
    }
}

/// Serve one canned HTTP response and hand back the raw request.
pub async fn serve_once(
    status_line: &str,
    extra_headers: &str,
    body: &str,
) -> (String, JoinHandle<String>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let address = listener.local_addr().expect("local address");
    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n{extra_headers}content-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return String::new();
        };
        let request = read_request(&mut socket).await;
        let _ = socket.write_all(response.as_bytes()).await;
        request
    });

    (format!("http://{address}"), handle)
}

/// Read a request head plus its `content-length` body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.unwrap_or(0);
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        let text = String::from_utf8_lossy(&raw).into_owned();
        let Some(head_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let body_len = text[..head_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        if raw.len() >= head_end + 4 + body_len {
            break;
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// First line of a raw request with percent-escapes decoded.
pub fn decoded_request_line(raw: &str) -> String {
    let line = raw.lines().next().unwrap_or_default();
    urlencoding::decode(line).unwrap().into_owned()
}
