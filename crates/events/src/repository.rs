// Archivo: repository.rs
// Propósito: contrato de persistencia de la bitácora. Lo implementan el
// repositorio en memoria y el de Diesel.
use crate::errors::Result;
use crate::record::{EventRecord, PersistResult};

pub trait EventRepository: Send + Sync {
    /// Versión actual del stream (número de registros). 0 si no existe.
    fn stream_version(&self, stream: &str) -> Result<i64>;

    /// Agrega un registro al stream. `expected_version` debe coincidir con
    /// la versión actual; si el `command_id` ya fue registrado en el stream
    /// no se duplica y se devuelve la versión vigente.
    fn append(&self, record: &EventRecord, expected_version: i64) -> Result<PersistResult>;

    /// Lee registros del stream con `cursor > from_cursor`, ordenados.
    fn read_stream(&self, stream: &str, from_cursor: i64) -> Result<Vec<EventRecord>>;

    /// Todos los registros en orden de creación.
    fn read_all(&self) -> Result<Vec<EventRecord>>;
}
