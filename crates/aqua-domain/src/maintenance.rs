// Archivo: maintenance.rs
// Propósito: informe del técnico tras intervenir. Uno por asignación; una
// vez aprobado queda como historial de sólo lectura.
use crate::{Assignment, AssignmentTarget, DomainError, RecordId};
use aqua_providers::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterventionStatus {
  #[serde(rename = "Finalizado")]
  Finished,
  #[serde(rename = "Requiere nueva intervención")]
  NeedsFurtherIntervention,
}

impl InterventionStatus {
  pub fn label(&self) -> &'static str {
    match self {
      InterventionStatus::Finished => "Finalizado",
      InterventionStatus::NeedsFurtherIntervention => "Requiere nueva intervención",
    }
  }
}

impl fmt::Display for InterventionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.label())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
  id: RecordId,
  assignment_id: RecordId,
  target: AssignmentTarget,
  filed_by: UserId,
  intervention_date: DateTime<Utc>,
  description: Option<String>,
  images: Vec<String>,
  status: InterventionStatus,
  approved: bool,
  approved_by: Option<UserId>,
  approved_at: Option<DateTime<Utc>>,
  created_at: DateTime<Utc>,
}

impl MaintenanceReport {
  /// Valida fecha de intervención, contenido y longitud de la descripción.
  pub fn new(id: RecordId,
             assignment: &Assignment,
             intervention_date: DateTime<Utc>,
             description: Option<String>,
             images: Vec<String>,
             status: InterventionStatus,
             now: DateTime<Utc>)
             -> Result<Self, DomainError> {
    if intervention_date > now {
      return Err(DomainError::ValidationError("La fecha de intervención no puede estar en el futuro".to_string()));
    }
    let description = description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    let images: Vec<String> = images.into_iter().filter(|i| !i.trim().is_empty()).collect();
    if description.is_none() && images.is_empty() {
      return Err(DomainError::ValidationError("Debe incluir una descripción o imágenes de la intervención".to_string()));
    }
    if status == InterventionStatus::Finished && description.is_none() {
      return Err(DomainError::ValidationError("La descripción es obligatoria si el estado es 'Finalizado'"
                                                .to_string()));
    }
    if description.as_ref().map(|d| d.chars().count() > 1000).unwrap_or(false) {
      return Err(DomainError::ValidationError("La descripción no puede exceder 1000 caracteres".to_string()));
    }
    Ok(Self { id,
              assignment_id: assignment.id().clone(),
              target: assignment.target().clone(),
              filed_by: assignment.assigned_to().clone(),
              intervention_date,
              description,
              images,
              status,
              approved: false,
              approved_by: None,
              approved_at: None,
              created_at: now })
  }

  pub fn id(&self) -> &RecordId {
    &self.id
  }

  pub fn assignment_id(&self) -> &RecordId {
    &self.assignment_id
  }

  pub fn target(&self) -> &AssignmentTarget {
    &self.target
  }

  pub fn filed_by(&self) -> &UserId {
    &self.filed_by
  }

  pub fn intervention_date(&self) -> DateTime<Utc> {
    self.intervention_date
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn images(&self) -> &[String] {
    &self.images
  }

  pub fn status(&self) -> InterventionStatus {
    self.status
  }

  pub fn is_approved(&self) -> bool {
    self.approved
  }

  pub fn approved_by(&self) -> Option<&UserId> {
    self.approved_by.as_ref()
  }

  pub fn approved_at(&self) -> Option<DateTime<Utc>> {
    self.approved_at
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn approve(&mut self, supervisor: &UserId, now: DateTime<Utc>) -> Result<(), DomainError> {
    if self.approved {
      return Err(DomainError::AlreadyApproved(self.id.to_string()));
    }
    self.approved = true;
    self.approved_by = Some(supervisor.clone());
    self.approved_at = Some(now);
    Ok(())
  }
}
