// Archivo: errors.rs
// Propósito: errores de la bitácora de eventos y del despacho, y el alias
// Result<T> usado por las APIs del crate.
use thiserror::Error;
/// Errores comunes de la bitácora.
///
/// - `NotFound`: stream o registro inexistente.
/// - `Conflict`: versión esperada o cursor inconsistente.
/// - `Storage`: error al acceder al almacenamiento.
/// - `Delivery`: el destinatario de una notificación la rechazó.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("No encontrado: {0}")]
    NotFound(String),
    #[error("Conflicto: {0}")]
    Conflict(String),
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
    #[error("Error de entrega: {0}")]
    Delivery(String),
}
/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, EventError>;
