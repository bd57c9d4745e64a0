// errors.rs
use thiserror::Error;

/// Errores devueltos por los colaboradores externos.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// El lote no existe en el registro externo.
    #[error("Lote desconocido: {0}")]
    UnknownLot(String),
    /// El colaborador no respondió o rechazó la operación.
    #[error("Colaborador no disponible: {0}")]
    Unavailable(String),
}
