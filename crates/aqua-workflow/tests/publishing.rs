mod common;

use aqua_domain::{AssignmentTarget, DomainRepository, DomainStubs, HashedIdGenerator, InMemoryDomainRepository,
                  RecordStatus, SequentialIdGenerator};
use aqua_persistence::{build_pool, DieselDomainRepository, DieselEventRepository};
use aqua_providers::{LotOwnership, ValveRegistry};
use aqua_workflow::{IrrigationWorkflow, NewFlowRequest, NewMaintenanceReport, WorkflowConfig, WorkflowContext};
use chrono::Utc;
use common::*;
use events::{FailingNotifier, InMemoryEventRepository, RecordingNotifier, SlowNotifier};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[test]
fn notification_failure_does_not_undo_the_operation() {
  let district = Arc::new(DomainStubs::sample_district());
  let workflow = IrrigationWorkflow::in_memory(district.clone(), Arc::new(FailingNotifier));

  let request = workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None))
                        .unwrap();
  assert_eq!(workflow.flow_request(request.id()).unwrap().status(), RecordStatus::Pending);

  workflow.approve_flow_request(&admin(), request.id()).unwrap();
  assert_eq!(district.get_current_flow(&active_lot()).unwrap(), Some(6.0));

  let history = workflow.history(request.id()).unwrap();
  let keys: Vec<_> = history.iter().map(|r| r.key.clone()).collect();
  assert_eq!(keys, vec!["flow_request_created", "flow_request_decided"]);
  assert_eq!(history[0].cursor, 1);
  assert_eq!(history[1].payload["status"], "Finalizado");
}

#[test]
fn slow_notifier_is_abandoned_after_the_timeout() {
  let district = Arc::new(DomainStubs::sample_district());
  let config = WorkflowConfig { notification_timeout: Duration::from_millis(50),
                                creation_notice_target: Duration::from_millis(10),
                                ..WorkflowConfig::default() };
  let ctx = WorkflowContext::new(Arc::new(InMemoryDomainRepository::new()),
                                 district.clone(),
                                 district.clone(),
                                 district,
                                 Arc::new(SequentialIdGenerator::new()),
                                 config);
  let workflow = IrrigationWorkflow::new(ctx,
                                         Arc::new(InMemoryEventRepository::new()),
                                         Arc::new(SlowNotifier { delay: Duration::from_secs(3) }));

  let started = Instant::now();
  let request = workflow.create_flow_request(&owner(), NewFlowRequest::change_flow(&active_lot(), 6.0, None))
                        .unwrap();
  assert!(started.elapsed() < Duration::from_secs(2));
  assert_eq!(request.id().as_str(), "10000001");
  assert_eq!(workflow.history(request.id()).unwrap().len(), 1);
}

#[test]
fn every_recipient_gets_names_and_timestamp() {
  let h = harness();
  let request = h.workflow
                 .create_flow_request(&owner(), NewFlowRequest::definitive_cancel(&active_lot(), "Venta del lote"))
                 .unwrap();
  let created = h.notifier.sent_of("flow_request_created");
  assert_eq!(created.len(), 1);
  let payload = &created[0];
  assert_eq!(payload["id"], request.id().as_str());
  assert_eq!(payload["type"], "Solicitud");
  assert_eq!(payload["kind"], "Solicitud de Cancelación Definitiva de Caudal");
  assert_eq!(payload["actor"]["name"], "Ana Dueña");
  assert_eq!(payload["status"], "Pendiente");
  assert!(payload["timestamp"].as_str().is_some());
}

#[test]
fn delegated_cycle_on_sqlite() {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only workflow test because 'pg' feature is enabled");
    return;
  }
  let path = std::env::temp_dir().join(format!("aqua_workflow_{}.db", Uuid::new_v4()));
  let pool = Arc::new(build_pool(path.to_str().unwrap()).expect("pool"));
  let repo: Arc<dyn DomainRepository> = Arc::new(DieselDomainRepository::from_pool(pool.clone()));
  let district = Arc::new(DomainStubs::sample_district());
  let ctx = WorkflowContext::new(repo,
                                 district.clone(),
                                 district.clone(),
                                 district.clone(),
                                 Arc::new(HashedIdGenerator),
                                 WorkflowConfig::default());
  let notifier = Arc::new(RecordingNotifier::new());
  let workflow = IrrigationWorkflow::new(ctx, Arc::new(DieselEventRepository::from_pool(pool)), notifier.clone());

  let temporary = workflow.create_flow_request(&owner(),
                                               NewFlowRequest::temporary_cancel(&active_lot(), "Cosecha anticipada"))
                          .unwrap();
  let request = workflow.create_flow_request(&owner(),
                                             NewFlowRequest::definitive_cancel(&active_lot(), "Venta del lote"))
                        .unwrap();
  assert_eq!(workflow.flow_request(temporary.id()).unwrap().status(), RecordStatus::Finalized);

  let target = AssignmentTarget::FlowRequest(request.id().clone());
  let assignment = workflow.create_assignment(&admin(), &technician(), &target).unwrap();
  let report = workflow.file_maintenance_report(&technician(),
                                                assignment.id(),
                                                NewMaintenanceReport::finished(Utc::now(), "Válvula sellada"))
                       .unwrap();
  workflow.approve_maintenance_report(&admin(), report.id()).unwrap();

  let request = workflow.flow_request(request.id()).unwrap();
  assert_eq!(request.status(), RecordStatus::Finalized);
  assert_eq!(request.is_approved(), Some(true));
  assert!(!district.is_active(&active_lot()).unwrap());
  assert!(workflow.list_open_items().unwrap().is_empty());
  assert_eq!(workflow.history(request.id()).unwrap().len(), 2);
  assert_eq!(notifier.sent_of("maintenance_report_approved").len(), 1);

  let _ = std::fs::remove_file(&path);
}
