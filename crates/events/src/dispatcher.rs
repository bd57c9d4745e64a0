// Archivo: dispatcher.rs
// Propósito: tabla de despacho de eventos hacia los notificadores.
//
// Cada entrega corre en un hilo propio y se espera como máximo `timeout`.
// Una entrega tardía se abandona (no se reintenta) y un fallo sólo se
// registra: el despacho nunca devuelve error al llamador.
use crate::errors::Result;
use log::{debug, warn};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Destinatario externo de notificaciones (correo, push, SMS...).
pub trait NotificationDispatcher: Send + Sync {
    fn send(&self, event_kind: &str, payload: &JsonValue) -> Result<()>;
}

/// Resumen de un despacho.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub elapsed: Duration,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

enum Delivery {
    Delivered,
    Failed,
    TimedOut,
}

pub struct EventDispatcher {
    routes: HashMap<String, Vec<Arc<dyn NotificationDispatcher>>>,
    /// Notificadores que reciben todos los tipos de evento.
    catch_all: Vec<Arc<dyn NotificationDispatcher>>,
    timeout: Duration,
}

impl EventDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { routes: HashMap::new(), catch_all: Vec::new(), timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Registra un notificador para un tipo de evento concreto.
    pub fn register(&mut self, event_kind: &str, handler: Arc<dyn NotificationDispatcher>) {
        self.routes.entry(event_kind.to_string()).or_default().push(handler);
    }

    /// Registra un notificador para todos los tipos de evento.
    pub fn register_all(&mut self, handler: Arc<dyn NotificationDispatcher>) {
        self.catch_all.push(handler);
    }

    pub fn handler_count(&self, event_kind: &str) -> usize {
        self.routes.get(event_kind).map(|v| v.len()).unwrap_or(0) + self.catch_all.len()
    }

    /// Entrega el evento a cada notificador registrado.
    pub fn dispatch(&self, event_kind: &str, payload: &JsonValue) -> DispatchReport {
        let started = Instant::now();
        let mut report = DispatchReport::default();
        let handlers = self.routes.get(event_kind).into_iter().flatten().chain(self.catch_all.iter());
        for handler in handlers {
            match self.deliver(handler.clone(), event_kind, payload) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Failed => report.failed += 1,
                Delivery::TimedOut => report.timed_out += 1,
            }
        }
        report.elapsed = started.elapsed();
        debug!("evento {} despachado: {:?}", event_kind, report);
        report
    }

    fn deliver(&self, handler: Arc<dyn NotificationDispatcher>, event_kind: &str, payload: &JsonValue) -> Delivery {
        let (tx, rx) = mpsc::channel();
        let kind = event_kind.to_string();
        let body = payload.clone();
        let spawned = thread::Builder::new().name(format!("notify-{}", event_kind))
                                            .spawn(move || {
                                                // El receptor puede haber desistido.
                                                let _ = tx.send(handler.send(&kind, &body));
                                            });
        if let Err(e) = spawned {
            warn!("no se pudo lanzar la entrega de {}: {}", event_kind, e);
            return Delivery::Failed;
        }
        match rx.recv_timeout(self.timeout) {
            Ok(Ok(())) => Delivery::Delivered,
            Ok(Err(e)) => {
                warn!("notificación {} falló: {}", event_kind, e);
                Delivery::Failed
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("notificación {} abandonada tras {:?}", event_kind, self.timeout);
                Delivery::TimedOut
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                warn!("notificación {} terminó sin respuesta", event_kind);
                Delivery::Failed
            }
        }
    }
}
