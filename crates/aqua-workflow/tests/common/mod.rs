#![allow(dead_code)]

use aqua_domain::DomainStubs;
use aqua_providers::{InMemoryDistrict, LotId, UserId};
use aqua_workflow::IrrigationWorkflow;
use events::RecordingNotifier;
use std::sync::Arc;

pub struct Harness {
  pub district: Arc<InMemoryDistrict>,
  pub notifier: Arc<RecordingNotifier>,
  pub workflow: IrrigationWorkflow,
}

/// Flujo en memoria sobre el distrito de ejemplo.
pub fn harness() -> Harness {
  let district = Arc::new(DomainStubs::sample_district());
  let notifier = Arc::new(RecordingNotifier::new());
  let workflow = IrrigationWorkflow::in_memory(district.clone(), notifier.clone());
  Harness { district,
            notifier,
            workflow }
}

pub fn owner() -> UserId {
  UserId::new(DomainStubs::OWNER)
}

pub fn neighbour() -> UserId {
  UserId::new(DomainStubs::NEIGHBOUR)
}

pub fn technician() -> UserId {
  UserId::new(DomainStubs::TECHNICIAN)
}

pub fn second_technician() -> UserId {
  UserId::new(DomainStubs::SECOND_TECHNICIAN)
}

pub fn admin() -> UserId {
  UserId::new(DomainStubs::ADMIN)
}

pub fn active_lot() -> LotId {
  LotId::new(DomainStubs::ACTIVE_LOT)
}

pub fn idle_lot() -> LotId {
  LotId::new(DomainStubs::IDLE_LOT)
}

pub fn bare_lot() -> LotId {
  LotId::new(DomainStubs::BARE_LOT)
}
