// Archivo: record.rs
// Propósito: tipos persistidos de la bitácora.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Registro autocontenido de un evento del flujo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    /// Stream al que pertenece (id de la entidad afectada).
    pub stream: String,
    /// Posición dentro del stream, empezando en 1.
    pub cursor: i64,
    /// Tipo de evento (`flow_request_created`, `assignment_created`...).
    pub key: String,
    pub payload: JsonValue,
    pub metadata: JsonValue,
    /// Para idempotencia: un mismo comando no se registra dos veces.
    pub command_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Resultado de un `append` con locking optimista.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistResult {
    Ok { new_version: i64 },
    Conflict,
}
