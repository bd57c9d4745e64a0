// Archivo: journal.rs
// Propósito: helper ergonómico sobre `EventRepository` que calcula cursor y
// versión esperada al agregar registros.
use crate::errors::{EventError, Result};
use crate::record::{EventRecord, PersistResult};
use crate::repository::EventRepository;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

/// Reintentos ante `PersistResult::Conflict` antes de rendirse.
const MAX_APPEND_ATTEMPTS: usize = 3;

/// Bitácora de eventos por stream.
#[derive(Clone)]
pub struct EventLog {
    repo: Arc<dyn EventRepository>,
}

impl EventLog {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    /// Agrega un evento al final del stream y devuelve la nueva versión.
    ///
    /// Si otro escritor avanzó el stream entre la lectura de la versión y
    /// la escritura, se relee y se reintenta.
    pub fn record(&self, stream: &str, key: &str, payload: JsonValue, command_id: Option<Uuid>) -> Result<i64> {
        for _ in 0..MAX_APPEND_ATTEMPTS {
            let version = self.repo.stream_version(stream)?;
            let record = EventRecord { id: Uuid::new_v4(),
                                       stream: stream.to_string(),
                                       cursor: version + 1,
                                       key: key.to_string(),
                                       payload: payload.clone(),
                                       metadata: serde_json::json!({ "source": "workflow" }),
                                       command_id,
                                       created_at: Utc::now() };
            match self.repo.append(&record, version)? {
                PersistResult::Ok { new_version } => return Ok(new_version),
                PersistResult::Conflict => continue,
            }
        }
        Err(EventError::Conflict(format!("stream {} en disputa", stream)))
    }

    pub fn history(&self, stream: &str) -> Result<Vec<EventRecord>> {
        self.repo.read_stream(stream, 0)
    }

    pub fn all(&self) -> Result<Vec<EventRecord>> {
        self.repo.read_all()
    }
}
