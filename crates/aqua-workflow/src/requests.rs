// Archivo: requests.rs
// Propósito: creación y decisión de solicitudes de caudal.
//
// Toda validación corre antes de escribir. La unidad de trabajo repite la
// comprobación de solicitudes abiertas y la aprobación mueve la válvula
// dentro de la misma confirmación.
use crate::context::WorkflowContext;
use crate::errors::WorkflowError;
use crate::notifications::{EventKind, WorkflowEvent};
use crate::outcome::WorkflowOutcome;
use crate::valve::{commit_with_valve, ValveEffect};
use aqua_domain::{validate_request_observations, AssignmentTarget, ChangeSet, EntityKind, FlowRequest, RecordId,
                  RequestKind};
use aqua_providers::{Capability, LotId, UserId};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

/// Observación con la que se cierra una cancelación temporal cuando el
/// dueño pide la definitiva.
pub const SUPERSEDED_NOTE: &str =
  "Finalizado de forma automática: El usuario ha solicitado una cancelación definitiva.";

/// Datos de una nueva solicitud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFlowRequest {
  pub lot: LotId,
  pub kind: RequestKind,
  pub requested_flow: Option<f64>,
  pub observations: Option<String>,
}

impl NewFlowRequest {
  pub fn change_flow(lot: &LotId, flow: f64, observations: Option<&str>) -> Self {
    Self { lot: lot.clone(),
           kind: RequestKind::ChangeFlow,
           requested_flow: Some(flow),
           observations: observations.map(str::to_string) }
  }

  pub fn activation(lot: &LotId, flow: f64, observations: &str) -> Self {
    Self { lot: lot.clone(),
           kind: RequestKind::Activation,
           requested_flow: Some(flow),
           observations: Some(observations.to_string()) }
  }

  pub fn temporary_cancel(lot: &LotId, observations: &str) -> Self {
    Self { lot: lot.clone(),
           kind: RequestKind::TemporaryCancel,
           requested_flow: None,
           observations: Some(observations.to_string()) }
  }

  pub fn definitive_cancel(lot: &LotId, observations: &str) -> Self {
    Self { lot: lot.clone(),
           kind: RequestKind::DefinitiveCancel,
           requested_flow: None,
           observations: Some(observations.to_string()) }
  }
}

fn same_flow(a: f64, b: f64) -> bool {
  (a - b).abs() < 1e-9
}

/// Guarda de decisión directa: la solicitud no debe haber cambiado de
/// estado entre la lectura y la confirmación.
fn still_pending(request: &FlowRequest) -> ChangeSet {
  ChangeSet::new().guard_status(&AssignmentTarget::FlowRequest(request.id().clone()), request.status())
}

pub(crate) fn decision_event(request: &FlowRequest, actor: &UserId, now: DateTime<Utc>) -> WorkflowEvent {
  WorkflowEvent::new(EventKind::FlowRequestDecided,
                     request.id(),
                     request.record_type(),
                     request.kind().label(),
                     actor,
                     now).notify(&[request.created_by()])
                         .with_status(request.status(), request.is_approved())
}

pub struct RequestService {
  ctx: WorkflowContext,
}

impl RequestService {
  pub fn new(ctx: WorkflowContext) -> Self {
    Self { ctx }
  }

  /// Valida y registra una solicitud en estado Pendiente.
  ///
  /// Orden de comprobaciones: dueño del lote, lote habilitado, válvula,
  /// caudal, estado de la válvula, solicitudes abiertas y observaciones.
  /// Una cancelación definitiva cierra como rechazada la temporal abierta
  /// del mismo lote en la misma unidad de trabajo.
  pub fn create(&self, requester: &UserId, input: NewFlowRequest) -> Result<WorkflowOutcome<FlowRequest>, WorkflowError> {
    let NewFlowRequest { lot,
                         kind,
                         requested_flow,
                         observations, } = input;

    let owner = self.ctx.lots.resolve_owner(&lot)?;
    if &owner != requester {
      return Err(WorkflowError::Ownership(format!("{} no es dueño del lote {}", requester, lot)));
    }
    if !self.ctx.lots.is_active(&lot)? {
      return Err(WorkflowError::Validation(format!("El lote {} está inhabilitado", lot)));
    }
    if !self.ctx.valves.has_valve(&lot)? {
      return Err(WorkflowError::Validation(format!("El lote {} no tiene una válvula asociada", lot)));
    }
    self.ctx.config.flow_range.check(kind, requested_flow)?;
    self.check_valve_state(&lot, kind, requested_flow)?;

    let open = self.ctx.repo.list_open_requests_for_lot(&lot)?;
    if let Some(blocking) = open.iter().find(|r| kind.blocked_by().contains(&r.kind())) {
      return Err(WorkflowError::Validation(format!("Ya existe una {} en curso ({}) para el lote {}",
                                                   blocking.kind().label(),
                                                   blocking.id(),
                                                   lot)));
    }
    validate_request_observations(kind, observations.as_deref())?;

    let now = self.ctx.now();
    let id = self.ctx.allocate_id(EntityKind::FlowRequest)?;
    let request = FlowRequest::new(id, kind, lot.clone(), requested_flow, requester.clone(), observations, now)?;

    let mut changes = ChangeSet::new().guard_open_requests(&lot, kind.blocked_by());
    let mut superseded = Vec::new();
    if kind == RequestKind::DefinitiveCancel {
      for mut temporary in open.into_iter().filter(|r| r.kind() == RequestKind::TemporaryCancel) {
        changes = changes.guard_status(&AssignmentTarget::FlowRequest(temporary.id().clone()), temporary.status());
        temporary.reject(SUPERSEDED_NOTE, now)?;
        superseded.push(temporary);
      }
    }

    for temporary in &superseded {
      changes = changes.put_flow_request(temporary.clone());
    }
    changes = changes.put_flow_request(request.clone());
    self.ctx.repo.apply(changes)?;
    info!("solicitud {} ({}) creada para el lote {}", request.id(), kind.code(), lot);

    let mut events = Vec::new();
    for temporary in &superseded {
      info!("solicitud {} finalizada por la cancelación definitiva {}", temporary.id(), request.id());
      events.push(WorkflowEvent::new(EventKind::FlowRequestSuperseded,
                                     temporary.id(),
                                     temporary.record_type(),
                                     temporary.kind().label(),
                                     requester,
                                     now).related_to(request.id())
                                         .notify(&[temporary.created_by()])
                                         .with_status(temporary.status(), temporary.is_approved()));
    }
    events.push(WorkflowEvent::new(EventKind::FlowRequestCreated,
                                   request.id(),
                                   request.record_type(),
                                   kind.label(),
                                   requester,
                                   now).notify(&[requester])
                                       .with_status(request.status(), None));
    Ok(WorkflowOutcome::new(request, events))
  }

  fn check_valve_state(&self, lot: &LotId, kind: RequestKind, requested_flow: Option<f64>) -> Result<(), WorkflowError> {
    let current = self.ctx.valves.get_current_flow(lot)?.unwrap_or(0.0);
    let active = current > 0.0;
    match kind {
      RequestKind::ChangeFlow => {
        if !active {
          return Err(WorkflowError::Validation(format!("El caudal del lote {} está inactivo; solicite primero una activación", lot)));
        }
        if requested_flow.map(|f| same_flow(f, current)).unwrap_or(false) {
          return Err(WorkflowError::Validation(format!("El lote {} ya tiene un caudal de {} L/s", lot, current)));
        }
      }
      RequestKind::TemporaryCancel => {
        if !active {
          return Err(WorkflowError::Validation(format!("El caudal del lote {} ya está inactivo", lot)));
        }
      }
      RequestKind::Activation => {
        if active {
          return Err(WorkflowError::Validation(format!("El caudal del lote {} ya está activo", lot)));
        }
      }
      RequestKind::DefinitiveCancel => {}
    }
    Ok(())
  }

  /// Carga una solicitud que un administrador puede decidir directamente.
  fn decidable(&self, actor: &UserId, id: &RecordId, action: &str) -> Result<FlowRequest, WorkflowError> {
    self.ctx.require(actor, Capability::Administrator, action)?;
    let request = self.ctx.load_flow_request(id)?;
    request.ensure_open()?;
    if request.requires_delegation() {
      return Err(WorkflowError::Validation(format!("La {} {} requiere delegación a un técnico",
                                                   request.kind().label(),
                                                   id)));
    }
    Ok(request)
  }

  pub fn approve(&self, actor: &UserId, id: &RecordId) -> Result<WorkflowOutcome<FlowRequest>, WorkflowError> {
    let mut request = self.decidable(actor, id, "aprobar solicitudes")?;
    let guarded = still_pending(&request);
    let now = self.ctx.now();
    request.approve(now)?;
    let effect = ValveEffect::for_approved(&request);
    commit_with_valve(&self.ctx, guarded.put_flow_request(request.clone()), &effect)?;
    info!("solicitud {} aprobada por {}", id, actor);
    let event = decision_event(&request, actor, now);
    Ok(WorkflowOutcome::new(request, vec![event]))
  }

  /// Rechaza con observaciones obligatorias; la válvula no se toca.
  pub fn reject(&self,
                actor: &UserId,
                id: &RecordId,
                observations: &str)
                -> Result<WorkflowOutcome<FlowRequest>, WorkflowError> {
    let mut request = self.decidable(actor, id, "rechazar solicitudes")?;
    let notes = observations.trim();
    if notes.is_empty() {
      return Err(WorkflowError::Validation("El rechazo requiere observaciones".to_string()));
    }
    let guarded = still_pending(&request);
    let now = self.ctx.now();
    request.reject(notes, now)?;
    self.ctx.repo.apply(guarded.put_flow_request(request.clone()))?;
    info!("solicitud {} rechazada por {}", id, actor);
    let event = decision_event(&request, actor, now);
    Ok(WorkflowOutcome::new(request, vec![event]))
  }

  /// Cierre de una solicitud delegada tras aprobarse su informe de
  /// mantenimiento. Devuelve el efecto que debe aplicarse al confirmar.
  pub(crate) fn approve_from_maintenance(&self,
                                         request: &mut FlowRequest,
                                         now: DateTime<Utc>)
                                         -> Result<ValveEffect, WorkflowError> {
    request.approve(now)?;
    Ok(ValveEffect::for_approved(request))
  }
}
