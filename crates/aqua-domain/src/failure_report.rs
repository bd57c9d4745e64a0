// failure_report.rs
use crate::lifecycle::{Lifecycle, RecordStatus};
use crate::{DomainError, RecordId};
use aqua_providers::{LotId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Etiqueta fija del tipo de petición para reportes de fallo.
pub const REPORT_RECORD_TYPE: &str = "Reporte";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
  /// Fallo físico en el suministro; siempre ligado a un lote.
  WaterSupply,
  /// Fallo del aplicativo; no se liga a ningún lote.
  Application,
}

impl FailureKind {
  pub fn label(&self) -> &'static str {
    match self {
      FailureKind::WaterSupply => "Fallo en el Suministro del Agua",
      FailureKind::Application => "Fallo en el Aplicativo",
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      FailureKind::WaterSupply => "water_supply",
      FailureKind::Application => "application",
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    match code {
      "water_supply" => Some(FailureKind::WaterSupply),
      "application" => Some(FailureKind::Application),
      _ => None,
    }
  }

  pub fn requires_lot(&self) -> bool {
    matches!(self, FailureKind::WaterSupply)
  }
}

impl fmt::Display for FailureKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.label())
  }
}

/// Observaciones de un reporte: obligatorias, de 10 a 200 caracteres.
pub fn validate_report_observations(observations: &str) -> Result<(), DomainError> {
  let len = observations.trim().chars().count();
  if len == 0 {
    return Err(DomainError::ValidationError("Las observaciones del reporte son obligatorias".to_string()));
  }
  if !(10..=200).contains(&len) {
    return Err(DomainError::ValidationError("Las observaciones del reporte deben tener entre 10 y 200 caracteres"
                                              .to_string()));
  }
  Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
  id: RecordId,
  kind: FailureKind,
  lot: Option<LotId>,
  created_by: UserId,
  observations: String,
  lifecycle: Lifecycle,
}

impl FailureReport {
  pub fn new(id: RecordId,
             kind: FailureKind,
             lot: Option<LotId>,
             created_by: UserId,
             observations: &str,
             now: DateTime<Utc>)
             -> Result<Self, DomainError> {
    match (kind.requires_lot(), lot.is_some()) {
      (true, false) => {
        return Err(DomainError::ValidationError(format!("{} requiere un lote", kind.label())));
      }
      (false, true) => {
        return Err(DomainError::ValidationError(format!("{} no se asocia a un lote", kind.label())));
      }
      _ => {}
    }
    validate_report_observations(observations)?;
    Ok(Self { id,
              kind,
              lot,
              created_by,
              observations: observations.trim().to_string(),
              lifecycle: Lifecycle::new(now) })
  }

  pub fn id(&self) -> &RecordId {
    &self.id
  }

  pub fn kind(&self) -> FailureKind {
    self.kind
  }

  pub fn record_type(&self) -> &'static str {
    REPORT_RECORD_TYPE
  }

  pub fn lot(&self) -> Option<&LotId> {
    self.lot.as_ref()
  }

  /// Los reportes siempre se atienden por un técnico.
  pub fn requires_delegation(&self) -> bool {
    true
  }

  pub fn created_by(&self) -> &UserId {
    &self.created_by
  }

  pub fn observations(&self) -> &str {
    &self.observations
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

  pub fn resolve(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
    self.lifecycle.finalize(self.id.as_str(), true, now)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn water_supply_needs_lot() {
    let err = FailureReport::new(RecordId::new("20000001"),
                                 FailureKind::WaterSupply,
                                 None,
                                 UserId::new("1001"),
                                 "no llega agua al lote",
                                 Utc::now());
    assert!(matches!(err, Err(DomainError::ValidationError(_))));
  }

  #[test]
  fn application_report_has_no_lot() {
    let report = FailureReport::new(RecordId::new("20000002"),
                                    FailureKind::Application,
                                    None,
                                    UserId::new("1001"),
                                    "  la app no carga el historial  ",
                                    Utc::now()).unwrap();
    assert!(report.lot().is_none());
    assert!(report.requires_delegation());
    assert_eq!(report.observations(), "la app no carga el historial");
    assert_eq!(report.record_type(), "Reporte");
  }

  #[test]
  fn observations_are_bounded() {
    assert!(validate_report_observations("corto").is_err());
    assert!(validate_report_observations(&"x".repeat(201)).is_err());
    assert!(validate_report_observations("diez chars").is_ok());
  }
}
