// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// Incluye la bitácora en memoria (`InMemoryEventRepository`) y
// notificadores de prueba. No son durables.
use crate::dispatcher::NotificationDispatcher;
use crate::errors::{EventError, Result};
use crate::record::{EventRecord, PersistResult};
use crate::repository::EventRepository;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

// Minimal in-memory event log (not durable)
pub struct InMemoryEventRepository {
    /// Registros por stream, en orden de cursor.
    streams: Mutex<HashMap<String, Vec<EventRecord>>>,
    /// Orden global de inserción (stream, cursor).
    order: Mutex<Vec<(String, i64)>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self { streams: Mutex::new(HashMap::new()), order: Mutex::new(Vec::new()) }
    }

    /// Helper para mapear `Mutex::lock()` en un `Result` con
    /// `EventError::Storage`.
    fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> std::result::Result<MutexGuard<'a, T>, EventError> {
        m.lock().map_err(|e| EventError::Storage(format!("mutex poisoned: {:?}", e)))
    }
}

impl Default for InMemoryEventRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRepository for InMemoryEventRepository {
    fn stream_version(&self, stream: &str) -> Result<i64> {
        let streams = self.lock(&self.streams)?;
        Ok(streams.get(stream).map(|v| v.len() as i64).unwrap_or(0))
    }

    fn append(&self, record: &EventRecord, expected_version: i64) -> Result<PersistResult> {
        let mut streams = self.lock(&self.streams)?;
        let mut order = self.lock(&self.order)?;
        let list = streams.entry(record.stream.clone()).or_default();
        let current = list.len() as i64;

        // Idempotency: a repeated command keeps the current version
        if let Some(cmd_id) = record.command_id {
            if list.iter().any(|r| r.command_id == Some(cmd_id)) {
                return Ok(PersistResult::Ok { new_version: current });
            }
        }
        if current != expected_version {
            return Ok(PersistResult::Conflict);
        }
        if record.cursor != current + 1 {
            return Err(EventError::Conflict(format!("cursor {} no sigue a {}", record.cursor, current)));
        }
        list.push(record.clone());
        order.push((record.stream.clone(), record.cursor));
        Ok(PersistResult::Ok { new_version: current + 1 })
    }

    fn read_stream(&self, stream: &str, from_cursor: i64) -> Result<Vec<EventRecord>> {
        let streams = self.lock(&self.streams)?;
        Ok(streams.get(stream)
                  .map(|v| v.iter().filter(|r| r.cursor > from_cursor).cloned().collect())
                  .unwrap_or_default())
    }

    fn read_all(&self) -> Result<Vec<EventRecord>> {
        let streams = self.lock(&self.streams)?;
        let order = self.lock(&self.order)?;
        Ok(order.iter()
                .filter_map(|(stream, cursor)| {
                    streams.get(stream).and_then(|v| v.iter().find(|r| r.cursor == *cursor)).cloned()
                })
                .collect())
    }
}

/// Notificador que guarda cada envío para inspección.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, JsonValue)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copia de los envíos recibidos, en orden.
    pub fn sent(&self) -> Vec<(String, JsonValue)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Envíos de un tipo de evento.
    pub fn sent_of(&self, event_kind: &str) -> Vec<JsonValue> {
        self.sent()
            .into_iter()
            .filter(|(k, _)| k == event_kind)
            .map(|(_, p)| p)
            .collect()
    }
}

impl NotificationDispatcher for RecordingNotifier {
    fn send(&self, event_kind: &str, payload: &JsonValue) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((event_kind.to_string(), payload.clone()));
        Ok(())
    }
}

/// Notificador que siempre falla (servicio caído).
#[derive(Debug, Default)]
pub struct FailingNotifier;

impl NotificationDispatcher for FailingNotifier {
    fn send(&self, event_kind: &str, _payload: &JsonValue) -> Result<()> {
        Err(EventError::Delivery(format!("servicio de notificaciones caído ({})", event_kind)))
    }
}

/// Notificador que tarda `delay` en responder.
#[derive(Debug)]
pub struct SlowNotifier {
    pub delay: Duration,
}

impl NotificationDispatcher for SlowNotifier {
    fn send(&self, _event_kind: &str, _payload: &JsonValue) -> Result<()> {
        thread::sleep(self.delay);
        Ok(())
    }
}
