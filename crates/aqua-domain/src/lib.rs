//! Crate `aqua-domain`: entidades del flujo de solicitudes de caudal
//!
//! Contiene las solicitudes de caudal, los reportes de fallo, las
//! asignaciones a técnicos y los informes de mantenimiento, junto con el
//! ciclo de vida compartido (`Lifecycle`), la generación de identificadores
//! y el contrato de repositorio con su unidad de trabajo (`ChangeSet`).
mod assignment;
mod domain_repository;
mod domain_stubs;
mod errors;
mod failure_report;
mod flow_request;
mod ids;
mod lifecycle;
mod maintenance;

pub use assignment::{current_assignment, Assignment, AssignmentTarget};
pub use domain_repository::{Change, ChangeSet, CommitHook, DomainRepository, Guard, InMemoryDomainRepository};
pub use domain_stubs::DomainStubs;
pub use errors::DomainError;
pub use failure_report::{validate_report_observations, FailureKind, FailureReport, REPORT_RECORD_TYPE};
pub use flow_request::{validate_request_observations, FlowRange, FlowRequest, RequestKind, REQUEST_RECORD_TYPE};
pub use ids::{EntityKind, HashedIdGenerator, IdGenerator, RecordId, SequentialIdGenerator};
pub use lifecycle::{Lifecycle, Outcome, RecordStatus};
pub use maintenance::{InterventionStatus, MaintenanceReport};
