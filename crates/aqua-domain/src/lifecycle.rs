// Archivo: lifecycle.rs
// Propósito: máquina de estados compartida por solicitudes de caudal y
// reportes de fallo.
//
//   Pendiente -> En proceso -> A espera de aprobación -> Finalizado
//
// Una decisión directa de administrador puede pasar de Pendiente a
// Finalizado. Finalizado es terminal.
use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
  #[serde(rename = "Pendiente")]
  Pending,
  #[serde(rename = "En proceso")]
  InProgress,
  #[serde(rename = "A espera de aprobación")]
  AwaitingApproval,
  #[serde(rename = "Finalizado")]
  Finalized,
}

impl RecordStatus {
  pub fn label(&self) -> &'static str {
    match self {
      RecordStatus::Pending => "Pendiente",
      RecordStatus::InProgress => "En proceso",
      RecordStatus::AwaitingApproval => "A espera de aprobación",
      RecordStatus::Finalized => "Finalizado",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    match label {
      "Pendiente" => Some(RecordStatus::Pending),
      "En proceso" => Some(RecordStatus::InProgress),
      "A espera de aprobación" => Some(RecordStatus::AwaitingApproval),
      "Finalizado" => Some(RecordStatus::Finalized),
      _ => None,
    }
  }
}

impl fmt::Display for RecordStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.label())
  }
}

/// Resultado de la decisión. Sólo tiene sentido una vez finalizado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
  Undecided,
  Approved,
  Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
  status: RecordStatus,
  outcome: Outcome,
  created_at: DateTime<Utc>,
  finalized_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
  pub fn new(created_at: DateTime<Utc>) -> Self {
    Self { status: RecordStatus::Pending, outcome: Outcome::Undecided, created_at, finalized_at: None }
  }

  pub fn status(&self) -> RecordStatus {
    self.status
  }

  pub fn outcome(&self) -> Outcome {
    self.outcome
  }

  /// `Some(true|false)` una vez decidido; `None` mientras siga abierto.
  pub fn is_approved(&self) -> Option<bool> {
    match self.outcome {
      Outcome::Undecided => None,
      Outcome::Approved => Some(true),
      Outcome::Rejected => Some(false),
    }
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
    self.finalized_at
  }

  pub fn is_open(&self) -> bool {
    self.status != RecordStatus::Finalized
  }

  pub fn ensure_open(&self, id: &str) -> Result<(), DomainError> {
    if self.is_open() {
      Ok(())
    } else {
      Err(DomainError::AlreadyFinalized(id.to_string()))
    }
  }

  /// Pasa a "En proceso". Una reasignación puede volver aquí desde
  /// "A espera de aprobación".
  pub fn start_progress(&mut self, id: &str) -> Result<(), DomainError> {
    self.ensure_open(id)?;
    self.status = RecordStatus::InProgress;
    Ok(())
  }

  /// Pasa a "A espera de aprobación"; exige estar "En proceso".
  pub fn await_approval(&mut self, id: &str) -> Result<(), DomainError> {
    self.ensure_open(id)?;
    if self.status != RecordStatus::InProgress {
      return Err(DomainError::InvalidTransition(format!("{}: {} -> {}",
                                                        id,
                                                        self.status,
                                                        RecordStatus::AwaitingApproval)));
    }
    self.status = RecordStatus::AwaitingApproval;
    Ok(())
  }

  pub fn finalize(&mut self, id: &str, approved: bool, now: DateTime<Utc>) -> Result<(), DomainError> {
    self.ensure_open(id)?;
    self.status = RecordStatus::Finalized;
    self.outcome = if approved { Outcome::Approved } else { Outcome::Rejected };
    self.finalized_at = Some(now);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_path_reaches_finalized() {
    let mut lc = Lifecycle::new(Utc::now());
    assert_eq!(lc.status(), RecordStatus::Pending);
    assert_eq!(lc.is_approved(), None);
    lc.start_progress("x").unwrap();
    lc.await_approval("x").unwrap();
    lc.finalize("x", true, Utc::now()).unwrap();
    assert_eq!(lc.status(), RecordStatus::Finalized);
    assert_eq!(lc.is_approved(), Some(true));
    assert!(lc.finalized_at().is_some());
  }

  #[test]
  fn finalized_is_terminal() {
    let mut lc = Lifecycle::new(Utc::now());
    lc.finalize("x", false, Utc::now()).unwrap();
    let snapshot = lc.clone();
    assert_eq!(lc.finalize("x", true, Utc::now()), Err(DomainError::AlreadyFinalized("x".into())));
    assert!(lc.start_progress("x").is_err());
    assert_eq!(lc, snapshot);
  }

  #[test]
  fn awaiting_approval_requires_progress() {
    let mut lc = Lifecycle::new(Utc::now());
    match lc.await_approval("x") {
      Err(DomainError::InvalidTransition(_)) => {}
      other => panic!("expected InvalidTransition, got {:?}", other),
    }
  }

  #[test]
  fn status_labels_round_trip() {
    for s in [RecordStatus::Pending, RecordStatus::InProgress, RecordStatus::AwaitingApproval, RecordStatus::Finalized] {
      assert_eq!(RecordStatus::from_label(s.label()), Some(s));
    }
  }
}
