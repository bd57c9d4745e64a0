mod common;

use aqua_domain::{RecordId, RecordStatus, RequestKind};
use aqua_providers::{LotId, ValveRegistry};
use aqua_workflow::{NewFlowRequest, WorkflowError, SUPERSEDED_NOTE};
use common::*;
use std::sync::Barrier;

#[test]
fn change_flow_outside_range_is_rejected() {
  let h = harness();
  for flow in [0.0, 0.99, 11.7, 12.0, -3.0] {
    let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), flow, None));
    assert!(matches!(res, Err(WorkflowError::Validation(_))), "caudal {} aceptado: {:?}", flow, res);
  }
  // El mínimo es inclusivo.
  let request = h.workflow
                 .create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 1.0, None))
                 .unwrap();
  assert_eq!(request.requested_flow(), Some(1.0));
  assert_eq!(request.status(), RecordStatus::Pending);
  assert!(!request.requires_delegation());
}

#[test]
fn change_flow_equal_to_current_is_rejected() {
  let h = harness();
  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 4.0, None));
  match res {
    Err(WorkflowError::Validation(msg)) => assert!(msg.contains("ya tiene un caudal")),
    other => panic!("se esperaba Validation, llegó {:?}", other),
  }
}

#[test]
fn change_flow_on_inactive_valve_asks_for_activation() {
  let h = harness();
  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&idle_lot(), 5.5, None));
  match res {
    Err(WorkflowError::Validation(msg)) => assert!(msg.contains("inactivo") && msg.contains("activación")),
    other => panic!("se esperaba Validation, llegó {:?}", other),
  }
  assert!(h.workflow.list_open_items().unwrap().is_empty());
}

#[test]
fn ownership_lot_state_and_valve_are_checked_first() {
  let h = harness();
  let res = h.workflow.create_flow_request(&neighbour(), NewFlowRequest::change_flow(&active_lot(), 5.0, None));
  assert!(matches!(res, Err(WorkflowError::Ownership(_))));

  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&LotId::new("L99"), 5.0, None));
  assert!(matches!(res, Err(WorkflowError::NotFound(_))));

  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&bare_lot(), 5.0, None));
  match res {
    Err(WorkflowError::Validation(msg)) => assert!(msg.contains("válvula")),
    other => panic!("se esperaba Validation, llegó {:?}", other),
  }

  h.district.set_lot_active(&active_lot(), false);
  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 5.0, None));
  match res {
    Err(WorkflowError::Validation(msg)) => assert!(msg.contains("inhabilitado")),
    other => panic!("se esperaba Validation, llegó {:?}", other),
  }
}

#[test]
fn activation_requires_an_inactive_valve() {
  let h = harness();
  let res = h.workflow
             .create_flow_request(&owner(), NewFlowRequest::activation(&active_lot(), 3.0, "Inicio de temporada"));
  match res {
    Err(WorkflowError::Validation(msg)) => assert!(msg.contains("ya está activo")),
    other => panic!("se esperaba Validation, llegó {:?}", other),
  }

  let request = h.workflow
                 .create_flow_request(&owner(), NewFlowRequest::activation(&idle_lot(), 3.0, "Inicio de temporada"))
                 .unwrap();
  assert_eq!(request.kind(), RequestKind::Activation);
  assert!(!request.requires_delegation());

  h.workflow.approve_flow_request(&admin(), request.id()).unwrap();
  assert_eq!(h.district.get_current_flow(&idle_lot()).unwrap(), Some(3.0));
}

#[test]
fn cancellation_observations_are_bounded() {
  let h = harness();
  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::temporary_cancel(&active_lot(), "abc"));
  assert!(matches!(res, Err(WorkflowError::Validation(_))));
  let long = "x".repeat(201);
  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::temporary_cancel(&active_lot(), &long));
  assert!(matches!(res, Err(WorkflowError::Validation(_))));
  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::temporary_cancel(&active_lot(), "Poda"));
  assert!(matches!(res, Err(WorkflowError::Validation(_))));
  h.workflow
   .create_flow_request(&owner(), NewFlowRequest::temporary_cancel(&active_lot(), "Cosecha"))
   .unwrap();
}

#[test]
fn open_requests_block_conflicting_kinds() {
  let h = harness();
  h.workflow
   .create_flow_request(&owner(), NewFlowRequest::temporary_cancel(&active_lot(), "Mantenimiento de acequia"))
   .unwrap();

  let res = h.workflow
             .create_flow_request(&owner(), NewFlowRequest::temporary_cancel(&active_lot(), "Otra cancelación"));
  assert!(matches!(res, Err(WorkflowError::Validation(_))));

  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None));
  match res {
    Err(WorkflowError::Validation(msg)) => assert!(msg.contains("Cancelación Temporal") || msg.contains("en curso")),
    other => panic!("se esperaba Validation, llegó {:?}", other),
  }
}

#[test]
fn definitive_cancel_supersedes_open_temporary_cancel() {
  let h = harness();
  let temporary = h.workflow
                   .create_flow_request(&owner(), NewFlowRequest::temporary_cancel(&active_lot(), "Cosecha anticipada"))
                   .unwrap();
  let definitive = h.workflow
                    .create_flow_request(&owner(),
                                         NewFlowRequest::definitive_cancel(&active_lot(), "Venta del lote"))
                    .unwrap();

  assert!(definitive.requires_delegation());
  assert_eq!(definitive.status(), RecordStatus::Pending);

  let temporary = h.workflow.flow_request(temporary.id()).unwrap();
  assert_eq!(temporary.status(), RecordStatus::Finalized);
  assert_eq!(temporary.is_approved(), Some(false));
  assert_eq!(temporary.decision_notes(), Some(SUPERSEDED_NOTE));
  assert!(temporary.finalized_at().is_some());

  let superseded = h.notifier.sent_of("flow_request_superseded");
  assert_eq!(superseded.len(), 1);
  assert_eq!(superseded[0]["id"], temporary.id().as_str());
  assert_eq!(superseded[0]["related_id"], definitive.id().as_str());

  // Con la definitiva abierta no caben nuevas solicitudes.
  let res = h.workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None));
  assert!(matches!(res, Err(WorkflowError::Validation(_))));
  let res = h.workflow
             .create_flow_request(&owner(), NewFlowRequest::definitive_cancel(&active_lot(), "Venta del lote"));
  assert!(matches!(res, Err(WorkflowError::Validation(_))));
}

#[test]
fn admin_rejects_change_flow_without_touching_the_valve() {
  let h = harness();
  let request = h.workflow
                 .create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 9.0, None))
                 .unwrap();
  let rejected = h.workflow
                  .reject_flow_request(&admin(), request.id(), "exceeds capacity")
                  .unwrap();

  assert_eq!(rejected.status(), RecordStatus::Finalized);
  assert_eq!(rejected.is_approved(), Some(false));
  assert_eq!(rejected.decision_notes(), Some("exceeds capacity"));
  assert_eq!(h.district.get_current_flow(&active_lot()).unwrap(), Some(4.0));

  let decided = h.notifier.sent_of("flow_request_decided");
  assert_eq!(decided.len(), 1);
  assert_eq!(decided[0]["recipients"][0]["id"], "1001");
  assert_eq!(decided[0]["status"], "Finalizado");
  assert_eq!(decided[0]["is_approved"], false);
}

#[test]
fn approval_applies_the_requested_flow() {
  let h = harness();
  let request = h.workflow
                 .create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None))
                 .unwrap();
  let approved = h.workflow.approve_flow_request(&admin(), request.id()).unwrap();
  assert_eq!(approved.is_approved(), Some(true));
  assert!(approved.finalized_at().is_some());
  assert_eq!(h.district.get_current_flow(&active_lot()).unwrap(), Some(6.0));

  let cancel = h.workflow
                .create_flow_request(&owner(), NewFlowRequest::temporary_cancel(&active_lot(), "Cosecha anticipada"))
                .unwrap();
  h.workflow.approve_flow_request(&admin(), cancel.id()).unwrap();
  assert_eq!(h.district.get_current_flow(&active_lot()).unwrap(), Some(0.0));
}

#[test]
fn deciding_twice_is_reported_and_leaves_the_request_unchanged() {
  let h = harness();
  let request = h.workflow
                 .create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None))
                 .unwrap();
  let first = h.workflow.approve_flow_request(&admin(), request.id()).unwrap();

  let second = h.workflow.approve_flow_request(&admin(), request.id());
  assert!(matches!(second, Err(WorkflowError::AlreadyFinalized(_))));
  let reject = h.workflow.reject_flow_request(&admin(), request.id(), "tarde");
  assert!(matches!(reject, Err(WorkflowError::AlreadyFinalized(_))));

  let stored = h.workflow.flow_request(request.id()).unwrap();
  assert_eq!(stored, first);
  assert_eq!(h.notifier.sent_of("flow_request_decided").len(), 1);
}

#[test]
fn direct_decisions_need_an_administrator_and_a_non_delegated_request() {
  let h = harness();
  let request = h.workflow
                 .create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None))
                 .unwrap();
  let res = h.workflow.approve_flow_request(&technician(), request.id());
  assert!(matches!(res, Err(WorkflowError::Permission(_))));

  let res = h.workflow.reject_flow_request(&admin(), request.id(), "   ");
  assert!(matches!(res, Err(WorkflowError::Validation(_))));
  assert_eq!(h.workflow.flow_request(request.id()).unwrap().status(), RecordStatus::Pending);

  let res = h.workflow.approve_flow_request(&admin(), &RecordId::new("10123456"));
  assert!(matches!(res, Err(WorkflowError::NotFound(_))));

  let definitive = h.workflow
                    .create_flow_request(&owner(),
                                         NewFlowRequest::definitive_cancel(&idle_lot(), "Venta del lote"))
                    .unwrap();
  let res = h.workflow.approve_flow_request(&admin(), definitive.id());
  match res {
    Err(WorkflowError::Validation(msg)) => assert!(msg.contains("delegación")),
    other => panic!("se esperaba Validation, llegó {:?}", other),
  }
}

#[test]
fn concurrent_approve_and_reject_settle_once() {
  for _ in 0..20 {
    let h = harness();
    let request = h.workflow
                   .create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None))
                   .unwrap();
    let barrier = Barrier::new(2);
    let (approved, rejected) = std::thread::scope(|s| {
      let approve = s.spawn(|| {
                       barrier.wait();
                       h.workflow.approve_flow_request(&admin(), request.id())
                     });
      let reject = s.spawn(|| {
                      barrier.wait();
                      h.workflow.reject_flow_request(&admin(), request.id(), "Sin cupo en el canal")
                    });
      (approve.join().unwrap(), reject.join().unwrap())
    });
    assert!(approved.is_ok() != rejected.is_ok());

    let stored = h.workflow.flow_request(request.id()).unwrap();
    assert_eq!(stored.status(), RecordStatus::Finalized);
    assert_eq!(stored.is_approved(), Some(approved.is_ok()));
    let expected_flow = if approved.is_ok() { 6.0 } else { 4.0 };
    assert_eq!(h.district.get_current_flow(&active_lot()).unwrap(), Some(expected_flow));
    assert_eq!(h.notifier.sent_of("flow_request_decided").len(), 1);
  }
}

#[test]
fn valve_failure_aborts_the_approval() {
  let h = harness();
  let request = h.workflow
                 .create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None))
                 .unwrap();
  h.district.set_valves_offline(true);
  let res = h.workflow.approve_flow_request(&admin(), request.id());
  assert!(matches!(res, Err(WorkflowError::ExternalDependency(_))));
  h.district.set_valves_offline(false);

  let stored = h.workflow.flow_request(request.id()).unwrap();
  assert_eq!(stored.status(), RecordStatus::Pending);
  assert_eq!(stored.is_approved(), None);
  assert_eq!(h.district.get_current_flow(&active_lot()).unwrap(), Some(4.0));
  assert!(h.notifier.sent_of("flow_request_decided").is_empty());

  h.workflow.approve_flow_request(&admin(), request.id()).unwrap();
  assert_eq!(h.district.get_current_flow(&active_lot()).unwrap(), Some(6.0));
}
