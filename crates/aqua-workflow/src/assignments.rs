// Archivo: assignments.rs
// Propósito: delegación de solicitudes y reportes a técnicos.
//
// Las asignaciones nunca se modifican: una reasignación agrega una nueva
// fila marcada `reassigned` y la anterior queda como historial. La
// asignación vigente de una petición es la más reciente.
use crate::context::WorkflowContext;
use crate::errors::WorkflowError;
use crate::notifications::{EventKind, WorkflowEvent};
use crate::outcome::WorkflowOutcome;
use crate::work_item::WorkItem;
use aqua_domain::{current_assignment, Assignment, AssignmentTarget, ChangeSet, EntityKind, RecordId};
use aqua_providers::{Capability, UserId};
use chrono::{DateTime, Utc};
use log::info;

pub struct AssignmentManager {
  ctx: WorkflowContext,
}

impl AssignmentManager {
  pub fn new(ctx: WorkflowContext) -> Self {
    Self { ctx }
  }

  /// Comprobaciones comunes a la asignación y la reasignación.
  fn delegable_item(&self, actor: &UserId, target: &AssignmentTarget) -> Result<WorkItem, WorkflowError> {
    self.ctx.require(actor, Capability::CanAssign, "asignar")?;
    let item = WorkItem::load(&self.ctx, target)?;
    if !item.requires_delegation() {
      return Err(WorkflowError::NotDelegable(format!("La {} {} no admite delegación", item.subtype(), item.id())));
    }
    item.ensure_open()?;
    Ok(item)
  }

  fn check_assignee(&self, actor: &UserId, assigned_to: &UserId) -> Result<(), WorkflowError> {
    if assigned_to == actor {
      return Err(WorkflowError::Validation("No puede asignarse una petición a sí mismo".to_string()));
    }
    if !self.ctx.oracle.has(assigned_to, Capability::CanBeAssigned) {
      return Err(WorkflowError::Validation(format!("{} no puede recibir asignaciones",
                                                   self.ctx.oracle.display_name(assigned_to))));
    }
    Ok(())
  }

  pub fn create(&self,
                actor: &UserId,
                assigned_to: &UserId,
                target: &AssignmentTarget)
                -> Result<WorkflowOutcome<Assignment>, WorkflowError> {
    let item = self.delegable_item(actor, target)?;
    self.check_assignee(actor, assigned_to)?;

    let existing = self.ctx.repo.list_assignments_for_target(target)?;
    if existing.iter().any(|a| a.assigned_to() == assigned_to && !a.reassigned()) {
      return Err(WorkflowError::Validation(format!("{} {} ya está asignada a {}",
                                                   item.record_type(),
                                                   item.id(),
                                                   self.ctx.oracle.display_name(assigned_to))));
    }
    if let Some(current) = current_assignment(&existing) {
      return Err(WorkflowError::Validation(format!("{} {} ya está asignada ({}); use la reasignación",
                                                   item.record_type(),
                                                   item.id(),
                                                   current.id())));
    }
    self.assign(actor, assigned_to, item, None)
  }

  /// Entrega la petición de `assignment_id` a otro técnico.
  ///
  /// Si ya había un informe pendiente de aprobación, la petición vuelve a
  /// "En proceso" y el nuevo técnico debe presentar el suyo.
  pub fn reassign(&self,
                  actor: &UserId,
                  assignment_id: &RecordId,
                  new_assigned_to: &UserId)
                  -> Result<WorkflowOutcome<Assignment>, WorkflowError> {
    let previous = self.ctx.load_assignment(assignment_id)?;
    let item = self.delegable_item(actor, previous.target())?;
    self.check_assignee(actor, new_assigned_to)?;

    let existing = self.ctx.repo.list_assignments_for_target(previous.target())?;
    let current = current_assignment(&existing).ok_or_else(|| {
                    WorkflowError::NotFound(format!("{} no tiene asignación vigente", previous.target()))
                  })?;
    if current.assigned_to() == new_assigned_to {
      return Err(WorkflowError::Validation(format!("{} {} ya está asignada a {}",
                                                   item.record_type(),
                                                   item.id(),
                                                   self.ctx.oracle.display_name(new_assigned_to))));
    }
    let replaced = current.id().clone();
    self.assign(actor, new_assigned_to, item, Some(replaced))
  }

  /// `replaced` es la asignación vigente que se sustituye; `None` en la
  /// primera asignación. Ambas cosas se vuelven a comprobar al confirmar.
  fn assign(&self,
            actor: &UserId,
            assigned_to: &UserId,
            mut item: WorkItem,
            replaced: Option<RecordId>)
            -> Result<WorkflowOutcome<Assignment>, WorkflowError> {
    let now = self.ctx.now();
    let target = item.target();
    let guarded = item.guard(ChangeSet::new()).guard_current_assignment(&target, replaced.as_ref());
    item.start_progress()?;
    let id = self.ctx.allocate_id(EntityKind::Assignment)?;
    let reassigned = replaced.is_some();
    let assignment = Assignment::new(id, target, actor.clone(), assigned_to.clone(), now, reassigned)?;
    let event = assignment_event(&assignment, &item, now);
    self.ctx.repo.apply(item.stage(guarded).put_assignment(assignment.clone()))?;
    info!("{} {} asignada a {} por {}{}",
          assignment.target().record_type(),
          assignment.target().id(),
          assigned_to,
          actor,
          if reassigned { " (reasignación)" } else { "" });
    Ok(WorkflowOutcome::new(assignment, vec![event]))
  }

  /// Cola de trabajo de un técnico, de la más reciente a la más antigua.
  pub fn list_assigned_to(&self, user: &UserId) -> Result<Vec<Assignment>, WorkflowError> {
    let mut assignments = self.ctx.repo.list_assignments_for_user(user)?;
    assignments.sort_by(|a, b| b.assignment_date().cmp(&a.assignment_date()));
    Ok(assignments)
  }
}

fn assignment_event(assignment: &Assignment, item: &WorkItem, now: DateTime<Utc>) -> WorkflowEvent {
  WorkflowEvent::new(EventKind::AssignmentCreated,
                     assignment.id(),
                     "Asignación",
                     item.subtype(),
                     assignment.assigned_by(),
                     now).related_to(item.id())
                         .notify(&[assignment.assigned_by(), assignment.assigned_to()])
                         .with_status(item.status(), None)
}
