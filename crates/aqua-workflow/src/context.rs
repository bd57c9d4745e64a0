// Archivo: context.rs
// Propósito: colaboradores compartidos por los servicios del flujo y las
// comprobaciones que todos repiten (capacidades, carga por id, ids libres).
use crate::config::WorkflowConfig;
use crate::errors::WorkflowError;
use aqua_domain::{Assignment, DomainRepository, EntityKind, FailureReport, FlowRequest, IdGenerator, MaintenanceReport,
                  RecordId};
use aqua_providers::{Capability, CapabilityOracle, LotOwnership, UserId, ValveRegistry};
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;

#[derive(Clone)]
pub struct WorkflowContext {
  pub repo: Arc<dyn DomainRepository>,
  pub lots: Arc<dyn LotOwnership>,
  pub valves: Arc<dyn ValveRegistry>,
  pub oracle: Arc<dyn CapabilityOracle>,
  pub ids: Arc<dyn IdGenerator>,
  pub config: WorkflowConfig,
}

impl WorkflowContext {
  pub fn new(repo: Arc<dyn DomainRepository>,
             lots: Arc<dyn LotOwnership>,
             valves: Arc<dyn ValveRegistry>,
             oracle: Arc<dyn CapabilityOracle>,
             ids: Arc<dyn IdGenerator>,
             config: WorkflowConfig)
             -> Self {
    Self { repo,
           lots,
           valves,
           oracle,
           ids,
           config }
  }

  pub(crate) fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }

  /// Pide ids al generador hasta encontrar uno que el repositorio no use.
  pub(crate) fn allocate_id(&self, kind: EntityKind) -> Result<RecordId, WorkflowError> {
    for attempt in 1..=self.config.max_id_attempts {
      let candidate = self.ids.next_id(kind);
      if !self.repo.id_exists(&candidate)? {
        return Ok(candidate);
      }
      debug!("id {} ocupado (intento {} de {})", candidate, attempt, self.config.max_id_attempts);
    }
    Err(WorkflowError::Persistence(format!("sin ids libres con prefijo {} tras {} intentos",
                                           kind.prefix(),
                                           self.config.max_id_attempts)))
  }

  pub(crate) fn require(&self, actor: &UserId, capability: Capability, action: &str) -> Result<(), WorkflowError> {
    if self.oracle.has(actor, capability) {
      Ok(())
    } else {
      Err(WorkflowError::Permission(format!("{} no tiene la capacidad '{}' para {}", actor, capability.code(), action)))
    }
  }

  pub(crate) fn load_flow_request(&self, id: &RecordId) -> Result<FlowRequest, WorkflowError> {
    self.repo
        .get_flow_request(id)?
        .ok_or_else(|| WorkflowError::NotFound(format!("solicitud {}", id)))
  }

  pub(crate) fn load_failure_report(&self, id: &RecordId) -> Result<FailureReport, WorkflowError> {
    self.repo
        .get_failure_report(id)?
        .ok_or_else(|| WorkflowError::NotFound(format!("reporte {}", id)))
  }

  pub(crate) fn load_assignment(&self, id: &RecordId) -> Result<Assignment, WorkflowError> {
    self.repo
        .get_assignment(id)?
        .ok_or_else(|| WorkflowError::NotFound(format!("asignación {}", id)))
  }

  pub(crate) fn load_maintenance_report(&self, id: &RecordId) -> Result<MaintenanceReport, WorkflowError> {
    self.repo
        .get_maintenance_report(id)?
        .ok_or_else(|| WorkflowError::NotFound(format!("informe de mantenimiento {}", id)))
  }
}
