//! Fakes shared by the unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use url::Url;

use crate::config::SyncConfig;
use crate::db;
use crate::error::{Result, SyncError};
use crate::fetch::Fetch;

pub fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

pub fn seed_class(
    conn: &Connection,
    grade_id: i64,
    course_id: i64,
    class_id: i64,
    file_name: &str,
    proc_file_name: &str,
) {
    conn.execute(
        "INSERT OR IGNORE INTO grade (id, name) VALUES (?1, ?2)",
        rusqlite::params![grade_id, format!("Grade {grade_id}")],
    )
    .unwrap();
    conn.execute(
        "INSERT OR IGNORE INTO course (id, grade_id, name) VALUES (?1, ?2, ?3)",
        rusqlite::params![course_id, grade_id, format!("Course {course_id}")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO text_class (id, course_id, file_name, proc_file_name, title)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![class_id, course_id, file_name, proc_file_name, format!("Class {class_id}")],
    )
    .unwrap();
}

/// Config rooted in a temp dir, serving from `http://base/`.
pub fn config_in(root: &Path) -> SyncConfig {
    SyncConfig {
        db_path: root.join("test.db").to_string_lossy().into_owned(),
        sync_dir: root.join("sync").to_string_lossy().into_owned(),
        base_path: "http://base".into(),
        polling_rate_ms: 20,
        user_agent: "mdsync-test".into(),
    }
    .normalized()
    .unwrap()
}

enum Canned {
    Body(Vec<u8>),
    Unreachable,
}

/// In-memory stand-in for the network. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Canned>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(url: &str) -> String {
        Url::parse(url).unwrap().to_string()
    }

    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(Self::key(url), Canned::Body(body.into()));
        self
    }

    pub fn unreachable(mut self, url: &str) -> Self {
        self.responses.insert(Self::key(url), Canned::Unreachable);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        let key = Self::key(url);
        self.calls().iter().filter(|c| **c == key).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for FakeFetcher {
    async fn get(&self, url: &Url) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.responses.get(url.as_str()) {
            Some(Canned::Body(body)) => Ok(body.clone()),
            Some(Canned::Unreachable) => Err(SyncError::Io {
                path: url.as_str().into(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ),
            }),
            None => Err(SyncError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
