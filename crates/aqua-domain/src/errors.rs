// errors.rs
use aqua_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
  #[error("Error de validación: {0}")]
  ValidationError(String),
  #[error("Error externo: {0}")]
  ExternalError(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
  #[error("No encontrado: {0}")]
  NotFound(String),
  /// Restricción de unicidad violada al confirmar la unidad de trabajo.
  #[error("Conflicto: {0}")]
  Conflict(String),
  #[error("La petición {0} ya está finalizada")]
  AlreadyFinalized(String),
  #[error("El informe {0} ya fue aprobado")]
  AlreadyApproved(String),
  #[error("Transición inválida: {0}")]
  InvalidTransition(String),
}

impl From<ProviderError> for DomainError {
  fn from(e: ProviderError) -> Self {
    Self::ExternalError(e.to_string())
  }
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}
