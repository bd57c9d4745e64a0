use aqua_domain::{Assignment, AssignmentTarget, ChangeSet, DomainError, DomainRepository, DomainStubs, FailureKind,
                  FailureReport, FlowRequest, InterventionStatus, MaintenanceReport, RecordId, RecordStatus,
                  RequestKind};
use aqua_persistence::{new_domain_from_env, DieselDomainRepository};
use aqua_providers::{LotId, UserId};
use chrono::Utc;
use std::sync::Barrier;
use uuid::Uuid;

fn temp_db() -> std::path::PathBuf {
  std::env::temp_dir().join(format!("aqua_test_{}.db", Uuid::new_v4()))
}

fn definitive_cancel(id: &str) -> FlowRequest {
  FlowRequest::new(RecordId::new(id),
                   RequestKind::DefinitiveCancel,
                   LotId::new(DomainStubs::ACTIVE_LOT),
                   None,
                   UserId::new(DomainStubs::OWNER),
                   Some("venta del predio".into()),
                   Utc::now()).expect("request")
}

#[test]
fn diesel_domain_round_trip_through_workflow_states() {
  // If crate was built with the `pg` feature, skip this sqlite-only test at
  // runtime.
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return;
  }
  let tmp_path = temp_db();
  let repo = DieselDomainRepository::new(tmp_path.to_str().unwrap()).expect("repo");

  let mut request = definitive_cancel("10000001");
  repo.apply(ChangeSet::new().put_flow_request(request.clone())).expect("insert request");
  assert!(repo.id_exists(request.id()).unwrap());
  assert_eq!(repo.get_flow_request(request.id()).unwrap(), Some(request.clone()));

  let target = AssignmentTarget::FlowRequest(request.id().clone());
  let assignment = Assignment::new(RecordId::new("30000001"),
                                   target.clone(),
                                   UserId::new(DomainStubs::ADMIN),
                                   UserId::new(DomainStubs::TECHNICIAN),
                                   Utc::now(),
                                   false).unwrap();
  request.start_progress().unwrap();
  repo.apply(ChangeSet::new().put_assignment(assignment.clone()).put_flow_request(request.clone()))
      .expect("assign");
  assert_eq!(repo.list_assignments_for_user(&UserId::new(DomainStubs::TECHNICIAN)).unwrap(), vec![assignment.clone()]);
  assert_eq!(repo.list_assignments_for_target(&target).unwrap().len(), 1);
  assert_eq!(repo.get_flow_request(request.id()).unwrap().map(|r| r.status()), Some(RecordStatus::InProgress));

  let now = Utc::now();
  let report = MaintenanceReport::new(RecordId::new("40000001"),
                                      &assignment,
                                      now,
                                      Some("válvula retirada".into()),
                                      vec!["antes.jpg".into()],
                                      InterventionStatus::Finished,
                                      now).unwrap();
  repo.apply(ChangeSet::new().put_maintenance_report(report.clone())).expect("report");
  assert_eq!(repo.find_report_for_assignment(assignment.id()).unwrap(), Some(report.clone()));
  assert_eq!(repo.get_maintenance_report(report.id()).unwrap(), Some(report));

  let app = FailureReport::new(RecordId::new("20000001"),
                               FailureKind::Application,
                               None,
                               UserId::new(DomainStubs::OWNER),
                               "la aplicación no abre",
                               Utc::now()).unwrap();
  repo.apply(ChangeSet::new().put_failure_report(app.clone())).expect("failure report");
  assert_eq!(repo.list_failure_reports().unwrap(), vec![app]);

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn open_request_index_and_guards_raise_conflict() {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return;
  }
  let tmp_path = temp_db();
  let repo = DieselDomainRepository::new(tmp_path.to_str().unwrap()).expect("repo");
  repo.apply(ChangeSet::new().put_flow_request(definitive_cancel("10000001"))).unwrap();

  // Same (lot, kind) while the first is open: the partial unique index fires.
  match repo.apply(ChangeSet::new().put_flow_request(definitive_cancel("10000002"))) {
    Err(DomainError::Conflict(_)) => {}
    other => panic!("expected Conflict from unique index, got {:?}", other),
  }

  // A temporary cancel guarded by the conflict table is refused too.
  let temporary = FlowRequest::new(RecordId::new("10000003"),
                                   RequestKind::TemporaryCancel,
                                   LotId::new(DomainStubs::ACTIVE_LOT),
                                   None,
                                   UserId::new(DomainStubs::OWNER),
                                   Some("mantenimiento".into()),
                                   Utc::now()).unwrap();
  let guarded = ChangeSet::new().guard_open_requests(temporary.lot(), RequestKind::TemporaryCancel.blocked_by())
                                .put_flow_request(temporary.clone());
  assert!(matches!(repo.apply(guarded), Err(DomainError::Conflict(_))));
  assert!(!repo.id_exists(temporary.id()).unwrap());
  assert_eq!(repo.list_open_requests_for_lot(temporary.lot()).unwrap().len(), 1);

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn assignment_index_and_guards_raise_conflict() {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return;
  }
  let tmp_path = temp_db();
  let repo = DieselDomainRepository::new(tmp_path.to_str().unwrap()).expect("repo");
  let mut request = definitive_cancel("10000001");
  repo.apply(ChangeSet::new().put_flow_request(request.clone())).unwrap();
  let target = AssignmentTarget::FlowRequest(request.id().clone());
  let assign = |id: &str, to: &str, reassigned: bool| {
    Assignment::new(RecordId::new(id),
                    target.clone(),
                    UserId::new(DomainStubs::ADMIN),
                    UserId::new(to),
                    Utc::now(),
                    reassigned).unwrap()
  };

  let first = assign("30000001", DomainStubs::TECHNICIAN, false);
  request.start_progress().unwrap();
  repo.apply(ChangeSet::new().guard_status(&target, RecordStatus::Pending)
                             .guard_current_assignment(&target, None)
                             .put_assignment(first.clone())
                             .put_flow_request(request.clone()))
      .expect("first assignment");

  // A second initial assignment without guards hits the partial unique index.
  match repo.apply(ChangeSet::new().put_assignment(assign("30000002", DomainStubs::SECOND_TECHNICIAN, false))) {
    Err(DomainError::Conflict(_)) => {}
    other => panic!("expected Conflict from unique index, got {:?}", other),
  }

  // The request already left Pending.
  let stale = ChangeSet::new().guard_status(&target, RecordStatus::Pending)
                              .put_assignment(assign("30000003", DomainStubs::SECOND_TECHNICIAN, true));
  assert!(matches!(repo.apply(stale), Err(DomainError::Conflict(_))));

  let handover = ChangeSet::new().guard_status(&target, RecordStatus::InProgress)
                                 .guard_current_assignment(&target, Some(first.id()))
                                 .put_assignment(assign("30000004", DomainStubs::SECOND_TECHNICIAN, true));
  repo.apply(handover).expect("reassignment");

  // Another handover computed from the same read loses.
  let late = ChangeSet::new().guard_current_assignment(&target, Some(first.id()))
                             .put_assignment(assign("30000005", DomainStubs::TECHNICIAN, true));
  assert!(matches!(repo.apply(late), Err(DomainError::Conflict(_))));
  assert_eq!(repo.list_assignments_for_target(&target).unwrap().len(), 2);

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn concurrent_guarded_commits_admit_a_single_winner() {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return;
  }
  let tmp_path = temp_db();
  let repo = DieselDomainRepository::new(tmp_path.to_str().unwrap()).expect("repo");
  let request = FlowRequest::new(RecordId::new("10000001"),
                                 RequestKind::TemporaryCancel,
                                 LotId::new(DomainStubs::ACTIVE_LOT),
                                 None,
                                 UserId::new(DomainStubs::OWNER),
                                 Some("limpieza del canal".into()),
                                 Utc::now()).unwrap();
  repo.apply(ChangeSet::new().put_flow_request(request.clone())).unwrap();
  let target = AssignmentTarget::FlowRequest(request.id().clone());

  let mut approved = request.clone();
  approved.approve(Utc::now()).unwrap();
  let mut rejected = request.clone();
  rejected.reject("sin cupo", Utc::now()).unwrap();

  let barrier = Barrier::new(2);
  let decide = |decided: &FlowRequest| {
    let changes = ChangeSet::new().guard_status(&target, RecordStatus::Pending)
                                  .put_flow_request(decided.clone());
    barrier.wait();
    repo.apply(changes)
  };
  let results = std::thread::scope(|s| {
    let a = s.spawn(|| decide(&approved));
    let b = s.spawn(|| decide(&rejected));
    [a.join().unwrap(), b.join().unwrap()]
  });

  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  assert!(results.iter().any(|r| matches!(r, Err(DomainError::Conflict(_)))));
  let stored = repo.get_flow_request(request.id()).unwrap().unwrap();
  assert_eq!(stored.is_approved(), Some(results[0].is_ok()));

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn failing_hook_rolls_back_the_transaction() {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return;
  }
  let tmp_path = temp_db();
  let repo = DieselDomainRepository::new(tmp_path.to_str().unwrap()).expect("repo");
  let mut request = definitive_cancel("10000001");
  repo.apply(ChangeSet::new().put_flow_request(request.clone())).unwrap();

  request.approve(Utc::now()).unwrap();
  let res = repo.commit(ChangeSet::new().put_flow_request(request.clone()),
                        &mut || Err::<(), _>(DomainError::ExternalError("válvula sin respuesta".into())));
  assert!(matches!(res, Err(DomainError::ExternalError(_))));
  let stored = repo.get_flow_request(request.id()).unwrap().unwrap();
  assert_eq!(stored.status(), RecordStatus::Pending);

  let _ = std::fs::remove_file(tmp_path);
}

#[test]
fn repository_from_env_uses_aqua_db_url() {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return;
  }
  let tmp_path = temp_db();
  std::env::set_var("AQUA_DB_URL", tmp_path.to_str().unwrap());
  let repo = new_domain_from_env().expect("failed to create repo");
  assert!(repo.list_flow_requests().unwrap().is_empty());
  assert!(tmp_path.exists());
  let _ = std::fs::remove_file(tmp_path);
}
