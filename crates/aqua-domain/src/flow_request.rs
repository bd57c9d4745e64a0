// Archivo: flow_request.rs
// Propósito: solicitud de caudal sobre un lote y sus reglas de forma
// (rango de caudal y observaciones). Las reglas que dependen del estado de
// la válvula o de otras solicitudes viven en el workflow.
use crate::lifecycle::{Lifecycle, RecordStatus};
use crate::{DomainError, RecordId};
use aqua_providers::{LotId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Etiqueta fija del tipo de petición para solicitudes.
pub const REQUEST_RECORD_TYPE: &str = "Solicitud";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
  ChangeFlow,
  TemporaryCancel,
  DefinitiveCancel,
  Activation,
}

impl RequestKind {
  pub const ALL: [RequestKind; 4] =
    [RequestKind::ChangeFlow, RequestKind::TemporaryCancel, RequestKind::DefinitiveCancel, RequestKind::Activation];

  pub fn label(&self) -> &'static str {
    match self {
      RequestKind::ChangeFlow => "Solicitud de Cambio de Caudal",
      RequestKind::TemporaryCancel => "Solicitud de Cancelación Temporal de Caudal",
      RequestKind::DefinitiveCancel => "Solicitud de Cancelación Definitiva de Caudal",
      RequestKind::Activation => "Solicitud de Activación de Caudal",
    }
  }

  /// Código estable usado en almacenamiento.
  pub fn code(&self) -> &'static str {
    match self {
      RequestKind::ChangeFlow => "change_flow",
      RequestKind::TemporaryCancel => "temporary_cancel",
      RequestKind::DefinitiveCancel => "definitive_cancel",
      RequestKind::Activation => "activation",
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|k| k.code() == code)
  }

  /// Sólo la cancelación definitiva se delega a un técnico.
  pub fn requires_delegation(&self) -> bool {
    matches!(self, RequestKind::DefinitiveCancel)
  }

  /// Indica si la solicitud lleva un caudal pedido.
  pub fn carries_flow(&self) -> bool {
    matches!(self, RequestKind::ChangeFlow | RequestKind::Activation)
  }

  pub fn is_cancellation(&self) -> bool {
    matches!(self, RequestKind::TemporaryCancel | RequestKind::DefinitiveCancel)
  }

  /// Tipos de solicitud abierta sobre el mismo lote que impiden crear una
  /// nueva de este tipo.
  pub fn blocked_by(&self) -> &'static [RequestKind] {
    match self {
      RequestKind::ChangeFlow => {
        &[RequestKind::ChangeFlow, RequestKind::TemporaryCancel, RequestKind::DefinitiveCancel]
      }
      RequestKind::TemporaryCancel => &[RequestKind::TemporaryCancel, RequestKind::DefinitiveCancel],
      RequestKind::DefinitiveCancel => &[RequestKind::DefinitiveCancel],
      RequestKind::Activation => &[RequestKind::Activation, RequestKind::DefinitiveCancel],
    }
  }
}

impl fmt::Display for RequestKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.label())
  }
}

/// Rango admitido de caudal en L/s: `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowRange {
  pub min: f64,
  pub max: f64,
}

impl Default for FlowRange {
  fn default() -> Self {
    Self { min: 1.0, max: 11.7 }
  }
}

impl FlowRange {
  pub fn contains(&self, flow: f64) -> bool {
    flow.is_finite() && flow >= self.min && flow < self.max
  }

  /// Valida presencia y rango del caudal pedido según el tipo.
  pub fn check(&self, kind: RequestKind, requested_flow: Option<f64>) -> Result<(), DomainError> {
    match (kind.carries_flow(), requested_flow) {
      (true, None) => Err(DomainError::ValidationError("El caudal solicitado es obligatorio".to_string())),
      (true, Some(flow)) if !self.contains(flow) => {
        Err(DomainError::ValidationError(format!("El caudal solicitado debe estar en el rango [{}, {}) L/s",
                                                 self.min, self.max)))
      }
      (false, Some(_)) => {
        Err(DomainError::ValidationError(format!("{} no admite caudal solicitado", kind.label())))
      }
      _ => Ok(()),
    }
  }
}

/// Reglas de observaciones por tipo de solicitud:
/// cancelaciones obligatorias de 5 a 200 caracteres, activación obligatoria
/// hasta 300, cambio de caudal opcional hasta 300.
pub fn validate_request_observations(kind: RequestKind, observations: Option<&str>) -> Result<(), DomainError> {
  let text = observations.map(str::trim).filter(|s| !s.is_empty());
  let len = text.map(|s| s.chars().count()).unwrap_or(0);
  match kind {
    RequestKind::TemporaryCancel | RequestKind::DefinitiveCancel => {
      if text.is_none() {
        return Err(DomainError::ValidationError("Las observaciones son obligatorias para cancelar".to_string()));
      }
      if !(5..=200).contains(&len) {
        return Err(DomainError::ValidationError("Las observaciones deben tener entre 5 y 200 caracteres"
                                                  .to_string()));
      }
    }
    RequestKind::Activation => {
      if text.is_none() {
        return Err(DomainError::ValidationError("Las observaciones son obligatorias para activar".to_string()));
      }
      if len > 300 {
        return Err(DomainError::ValidationError("Las observaciones no pueden exceder 300 caracteres".to_string()));
      }
    }
    RequestKind::ChangeFlow => {
      if len > 300 {
        return Err(DomainError::ValidationError("Las observaciones no pueden exceder 300 caracteres".to_string()));
      }
    }
  }
  Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRequest {
  id: RecordId,
  kind: RequestKind,
  lot: LotId,
  requested_flow: Option<f64>,
  requires_delegation: bool,
  created_by: UserId,
  observations: Option<String>,
  decision_notes: Option<String>,
  lifecycle: Lifecycle,
}

impl FlowRequest {
  /// Crea una solicitud en estado Pendiente. Valida la presencia del caudal
  /// según el tipo y las observaciones; el rango lo valida `FlowRange`.
  pub fn new(id: RecordId,
             kind: RequestKind,
             lot: LotId,
             requested_flow: Option<f64>,
             created_by: UserId,
             observations: Option<String>,
             now: DateTime<Utc>)
             -> Result<Self, DomainError> {
    if kind.carries_flow() != requested_flow.is_some() {
      return Err(DomainError::ValidationError(format!("{}: caudal solicitado inconsistente con el tipo", kind.label())));
    }
    validate_request_observations(kind, observations.as_deref())?;
    let observations = observations.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Ok(Self { id,
              kind,
              lot,
              requested_flow,
              requires_delegation: kind.requires_delegation(),
              created_by,
              observations,
              decision_notes: None,
              lifecycle: Lifecycle::new(now) })
  }

  pub fn id(&self) -> &RecordId {
    &self.id
  }

  pub fn kind(&self) -> RequestKind {
    self.kind
  }

  pub fn record_type(&self) -> &'static str {
    REQUEST_RECORD_TYPE
  }

  pub fn lot(&self) -> &LotId {
    &self.lot
  }

  pub fn requested_flow(&self) -> Option<f64> {
    self.requested_flow
  }

  /// Caudal que la válvula debe tomar al aprobarse.
  pub fn target_flow(&self) -> f64 {
    if self.kind.carries_flow() {
      self.requested_flow.unwrap_or(0.0)
    } else {
      0.0
    }
  }

  pub fn requires_delegation(&self) -> bool {
    self.requires_delegation
  }

  pub fn created_by(&self) -> &UserId {
    &self.created_by
  }

  pub fn observations(&self) -> Option<&str> {
    self.observations.as_deref()
  }

  /// Motivo registrado al decidir (rechazo o finalización automática).
  pub fn decision_notes(&self) -> Option<&str> {
    self.decision_notes.as_deref()
  }

  pub fn status(&self) -> RecordStatus {
    self.lifecycle.status()
  }

  pub fn is_approved(&self) -> Option<bool> {
    self.lifecycle.is_approved()
  }

  pub fn is_open(&self) -> bool {
    self.lifecycle.is_open()
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.lifecycle.created_at()
  }

  pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
    self.lifecycle.finalized_at()
  }

  pub fn ensure_open(&self) -> Result<(), DomainError> {
    self.lifecycle.ensure_open(self.id.as_str())
  }

  pub fn start_progress(&mut self) -> Result<(), DomainError> {
    self.lifecycle.start_progress(self.id.as_str())
  }

  pub fn await_approval(&mut self) -> Result<(), DomainError> {
    self.lifecycle.await_approval(self.id.as_str())
  }

  pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
    self.lifecycle.finalize(self.id.as_str(), true, now)
  }

  pub fn reject(&mut self, notes: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
    self.lifecycle.finalize(self.id.as_str(), false, now)?;
    self.decision_notes = Some(notes.to_string());
    Ok(())
  }
}
