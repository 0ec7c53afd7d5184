use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::core::error::GuardError;
use crate::core::sink::{DetectionLog, ReportSink, SiteReport};

/// SQLite history of detections and user reports.
pub struct DetectionStore {
    conn: Mutex<Connection>,
}

impl DetectionStore {
    pub fn open(path: &Path) -> Result<Self, GuardError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, GuardError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, GuardError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS detections (
              fingerprint TEXT NOT NULL,
              url TEXT NOT NULL,
              hostname TEXT NOT NULL,
              category TEXT NOT NULL,
              severity TEXT NOT NULL,
              message TEXT NOT NULL,
              timestamp TEXT NOT NULL,
              data_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_detections_host ON detections(hostname);
            CREATE INDEX IF NOT EXISTS idx_detections_fp ON detections(fingerprint);

            CREATE TABLE IF NOT EXISTS reports (
              url TEXT NOT NULL,
              hostname TEXT NOT NULL,
              timestamp TEXT NOT NULL,
              data_json TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, GuardError> {
        self.conn
            .lock()
            .map_err(|_| GuardError::Db("connection lock poisoned".into()))
    }

    pub fn insert_log(&self, log: &DetectionLog) -> Result<(), GuardError> {
        let data_json = serde_json::to_string(log)?;
        self.conn()?.execute(
            "INSERT INTO detections
             (fingerprint, url, hostname, category, severity, message, timestamp, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                log.fingerprint,
                log.url,
                log.hostname,
                log.category.as_str(),
                log.severity.to_string(),
                log.message,
                log.timestamp.to_rfc3339(),
                data_json
            ],
        )?;
        Ok(())
    }

    pub fn insert_report(&self, report: &SiteReport) -> Result<(), GuardError> {
        let data_json = serde_json::to_string(report)?;
        self.conn()?.execute(
            "INSERT INTO reports (url, hostname, timestamp, data_json) VALUES (?1, ?2, ?3, ?4)",
            params![
                report.url,
                report.hostname,
                report.timestamp.to_rfc3339(),
                data_json
            ],
        )?;
        Ok(())
    }

    pub fn logs_for_host(&self, hostname: &str) -> Result<Vec<DetectionLog>, GuardError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT data_json FROM detections WHERE hostname = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![hostname], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    pub fn reports(&self) -> Result<Vec<SiteReport>, GuardError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT data_json FROM reports ORDER BY timestamp ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl ReportSink for DetectionStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn on_report(&self, report: &SiteReport) -> Result<(), GuardError> {
        self.insert_report(report)
    }

    async fn on_log(&self, log: &DetectionLog) -> Result<(), GuardError> {
        self.insert_log(log)
    }
}
