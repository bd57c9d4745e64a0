//! Crate `events`: bitácora de eventos y despacho de notificaciones
//!
//! Define el registro de auditoría (`EventRecord`), el contrato de
//! persistencia `EventRepository` con locking optimista por stream e
//! idempotencia por `command_id`, y la tabla de despacho (`EventDispatcher`)
//! que entrega cada evento a los `NotificationDispatcher` registrados.
//!
//! Diseño resumido:
//! - Un stream por entidad (id de solicitud, reporte, asignación...). Cada
//!   registro lleva un `cursor` monótono dentro de su stream.
//! - `append` recibe la versión esperada del stream; si no coincide devuelve
//!   `PersistResult::Conflict` en lugar de escribir.
//! - El despacho es "fire-and-forget": los fallos y los tiempos agotados se
//!   registran en el log y se resumen en un `DispatchReport`, nunca se
//!   propagan.
//!
//! Ejemplo rápido:
//! ```rust
//! use events::{EventDispatcher, EventLog, InMemoryEventRepository, RecordingNotifier};
//! use std::sync::Arc;
//! use std::time::Duration;
//! let log = EventLog::new(Arc::new(InMemoryEventRepository::new()));
//! let notifier = Arc::new(RecordingNotifier::new());
//! let mut dispatcher = EventDispatcher::new(Duration::from_secs(5));
//! dispatcher.register_all(notifier.clone());
//! let payload = serde_json::json!({"id": "10000001"});
//! log.record("10000001", "flow_request_created", payload.clone(), None).unwrap();
//! dispatcher.dispatch("flow_request_created", &payload);
//! assert_eq!(notifier.sent().len(), 1);
//! ```
pub mod dispatcher;
pub mod errors;
pub mod journal;
pub mod record;
pub mod repository;
pub mod stubs;

pub use dispatcher::*;
pub use errors::*;
pub use journal::*;
pub use record::*;
pub use repository::*;
pub use stubs::*;
