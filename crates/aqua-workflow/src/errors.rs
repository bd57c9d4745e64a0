use aqua_domain::DomainError;
use aqua_providers::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// Errores del flujo de solicitudes.
//
// Cada variante corresponde a una categoría que el llamador puede
// distinguir: entrada inválida, falta de derechos, id desconocido, guardas
// de idempotencia y fallos de colaboradores externos o del almacenamiento.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
  /// Forma de la entrada o regla de negocio violada.
  #[error("Error de validación: {0}")]
  Validation(String),

  /// El solicitante no es dueño del lote.
  #[error("Error de propiedad: {0}")]
  Ownership(String),

  /// El actor no tiene la capacidad requerida.
  #[error("Permiso denegado: {0}")]
  Permission(String),

  #[error("No encontrado: {0}")]
  NotFound(String),

  #[error("La petición {0} ya está finalizada")]
  AlreadyFinalized(String),

  #[error("El informe {0} ya fue aprobado")]
  AlreadyApproved(String),

  /// El tipo de solicitud no admite delegación.
  #[error("No delegable: {0}")]
  NotDelegable(String),

  /// Registro de válvulas, registro de lotes o notificador inaccesible.
  #[error("Dependencia externa: {0}")]
  ExternalDependency(String),

  #[error("Error de persistencia: {0}")]
  Persistence(String),

  #[error("Error de serialización: {0}")]
  Serialization(String),
}

/// Categoría legible por máquina de un `WorkflowError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Validation,
  Ownership,
  Permission,
  NotFound,
  AlreadyFinalized,
  AlreadyApproved,
  NotDelegable,
  ExternalDependency,
  Persistence,
  Serialization,
}

impl ErrorKind {
  pub fn code(&self) -> &'static str {
    match self {
      ErrorKind::Validation => "validation",
      ErrorKind::Ownership => "ownership",
      ErrorKind::Permission => "permission",
      ErrorKind::NotFound => "not_found",
      ErrorKind::AlreadyFinalized => "already_finalized",
      ErrorKind::AlreadyApproved => "already_approved",
      ErrorKind::NotDelegable => "not_delegable",
      ErrorKind::ExternalDependency => "external_dependency",
      ErrorKind::Persistence => "persistence",
      ErrorKind::Serialization => "serialization",
    }
  }

  /// Código HTTP equivalente.
  pub fn status(&self) -> u16 {
    match self {
      ErrorKind::Validation | ErrorKind::NotDelegable => 400,
      ErrorKind::Ownership | ErrorKind::Permission => 403,
      ErrorKind::NotFound => 404,
      ErrorKind::AlreadyFinalized | ErrorKind::AlreadyApproved => 409,
      ErrorKind::ExternalDependency => 502,
      ErrorKind::Persistence | ErrorKind::Serialization => 500,
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.code())
  }
}

/// Error estructurado devuelto a cualquier transporte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
  pub kind: ErrorKind,
  pub status: u16,
  pub message: String,
}

impl WorkflowError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      WorkflowError::Validation(_) => ErrorKind::Validation,
      WorkflowError::Ownership(_) => ErrorKind::Ownership,
      WorkflowError::Permission(_) => ErrorKind::Permission,
      WorkflowError::NotFound(_) => ErrorKind::NotFound,
      WorkflowError::AlreadyFinalized(_) => ErrorKind::AlreadyFinalized,
      WorkflowError::AlreadyApproved(_) => ErrorKind::AlreadyApproved,
      WorkflowError::NotDelegable(_) => ErrorKind::NotDelegable,
      WorkflowError::ExternalDependency(_) => ErrorKind::ExternalDependency,
      WorkflowError::Persistence(_) => ErrorKind::Persistence,
      WorkflowError::Serialization(_) => ErrorKind::Serialization,
    }
  }

  pub fn to_body(&self) -> ErrorBody {
    let kind = self.kind();
    ErrorBody { kind, status: kind.status(), message: self.to_string() }
  }
}

impl From<DomainError> for WorkflowError {
  fn from(e: DomainError) -> Self {
    match e {
      DomainError::ValidationError(m) => WorkflowError::Validation(m),
      // Una restricción de unicidad al confirmar es una regla de negocio
      // que otro escritor ganó primero.
      DomainError::Conflict(m) => WorkflowError::Validation(m),
      DomainError::InvalidTransition(m) => WorkflowError::Validation(m),
      DomainError::NotFound(m) => WorkflowError::NotFound(m),
      DomainError::AlreadyFinalized(id) => WorkflowError::AlreadyFinalized(id),
      DomainError::AlreadyApproved(id) => WorkflowError::AlreadyApproved(id),
      DomainError::SerializationError(m) => WorkflowError::Serialization(m),
      DomainError::ExternalError(m) => WorkflowError::Persistence(m),
    }
  }
}

impl From<ProviderError> for WorkflowError {
  fn from(e: ProviderError) -> Self {
    match e {
      ProviderError::UnknownLot(lot) => WorkflowError::NotFound(format!("lote {}", lot)),
      ProviderError::Unavailable(m) => WorkflowError::ExternalDependency(m),
    }
  }
}

impl From<serde_json::Error> for WorkflowError {
  fn from(e: serde_json::Error) -> Self {
    WorkflowError::Serialization(e.to_string())
  }
}
