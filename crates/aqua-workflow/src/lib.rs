//! aqua-workflow: flujo de solicitudes de caudal del distrito de riego
//!
//! Reúne la creación y decisión de solicitudes (`RequestService`), los
//! reportes de fallo (`FailureReportService`), la delegación a técnicos
//! (`AssignmentManager`) y el ciclo de informes de mantenimiento
//! (`MaintenanceService`). `IrrigationWorkflow` expone las operaciones
//! sobre `aqua_domain::DomainRepository` y publica los eventos resultantes
//! en `events::EventLog` y `events::EventDispatcher`.

pub mod assignments;
pub mod config;
pub mod context;
pub mod errors;
pub mod facade;
pub mod failure_reports;
pub mod maintenance;
pub mod notifications;
pub mod outcome;
pub mod requests;
pub mod valve;
mod work_item;

pub use assignments::AssignmentManager;
pub use config::WorkflowConfig;
pub use context::WorkflowContext;
pub use errors::{ErrorBody, ErrorKind, WorkflowError};
pub use facade::{IrrigationWorkflow, OpenItem};
pub use failure_reports::FailureReportService;
pub use maintenance::{MaintenanceService, NewMaintenanceReport};
pub use notifications::{EventKind, WorkflowEvent};
pub use outcome::WorkflowOutcome;
pub use requests::{NewFlowRequest, RequestService, SUPERSEDED_NOTE};
pub use valve::ValveEffect;
