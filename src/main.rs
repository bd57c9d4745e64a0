use aqua_domain::{AssignmentTarget, DomainStubs, FailureKind, InterventionStatus, RecordId, RequestKind};
use aqua_providers::{LotId, UserId};
use aqua_workflow::{IrrigationWorkflow, NewFlowRequest, NewMaintenanceReport, WorkflowError};
use events::NotificationDispatcher;
use serde_json::Value as JsonValue;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

/// Notificador de consola: imprime cada evento despachado.
struct ConsoleNotifier;

impl NotificationDispatcher for ConsoleNotifier {
    fn send(&self, event_kind: &str, payload: &JsonValue) -> events::Result<()> {
        println!("  [notificación] {} -> {}", event_kind, payload);
        Ok(())
    }
}

/// Pequeño menú interactivo sobre el flujo de riego.
///
/// Lotes, usuarios y capacidades vienen del distrito de ejemplo
/// (`DomainStubs::sample_district`); la base de datos se toma de
/// `AQUA_DB_URL`/`DATABASE_URL` o, si no hay, de SQLite en memoria.
fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let district = Arc::new(DomainStubs::sample_district());
    let workflow = IrrigationWorkflow::from_env(district, Arc::new(ConsoleNotifier))?;

    println!("Usuarios: dueño {}, vecino {}, técnicos {} y {}, supervisor {}",
             DomainStubs::OWNER,
             DomainStubs::NEIGHBOUR,
             DomainStubs::TECHNICIAN,
             DomainStubs::SECOND_TECHNICIAN,
             DomainStubs::ADMIN);
    println!("Lotes: {} (activo), {} (sin caudal), {} (sin válvula)",
             DomainStubs::ACTIVE_LOT,
             DomainStubs::IDLE_LOT,
             DomainStubs::BARE_LOT);

    loop {
        println!("\n== AquaSmart ==");
        println!("1) Ver solicitudes y reportes pendientes");
        println!("2) Crear solicitud de caudal");
        println!("3) Aprobar solicitud");
        println!("4) Rechazar solicitud");
        println!("5) Reportar fallo");
        println!("6) Asignar a un técnico");
        println!("7) Reasignar");
        println!("8) Ver asignaciones de un usuario");
        println!("9) Presentar informe de mantenimiento");
        println!("10) Aprobar informe de mantenimiento");
        println!("11) Historial de una entidad");
        println!("0) Salir");
        let choice = prompt("Elige una opción: ")?;
        let result = match choice.trim() {
            "1" => workflow.list_open_items().map(|items| {
                println!("\nID       | TIPO      | SUBTIPO                                        | ESTADO");
                println!("-------------------------------------------------------------------------------------");
                for i in items {
                    println!("{} | {:9} | {:46} | {}", i.id, i.record_type, i.subtype, i.status);
                }
            }),
            "2" => create_request(&workflow)?,
            "3" => {
                let actor = user(prompt("Usuario que aprueba: ")?);
                let id = record(prompt("Id de la solicitud: ")?);
                workflow.approve_flow_request(&actor, &id).map(show)
            }
            "4" => {
                let actor = user(prompt("Usuario que rechaza: ")?);
                let id = record(prompt("Id de la solicitud: ")?);
                let notes = prompt("Observaciones: ")?;
                workflow.reject_flow_request(&actor, &id, notes.trim()).map(show)
            }
            "5" => {
                let actor = user(prompt("Usuario que reporta: ")?);
                let kind = prompt("Tipo (water_supply/application): ")?;
                let Some(kind) = FailureKind::from_code(kind.trim()) else {
                    eprintln!("Tipo inválido");
                    continue;
                };
                let lot = prompt("Lote (enter si no aplica): ")?;
                let lot = if lot.trim().is_empty() { None } else { Some(LotId::new(lot.trim())) };
                let obs = prompt("Observaciones: ")?;
                workflow.file_failure_report(&actor, kind, lot, obs.trim()).map(show)
            }
            "6" => {
                let actor = user(prompt("Usuario que asigna: ")?);
                let to = user(prompt("Técnico: ")?);
                let id = record(prompt("Id de la solicitud o reporte: ")?);
                let target = if id.as_str().starts_with("20") {
                    AssignmentTarget::FailureReport(id)
                } else {
                    AssignmentTarget::FlowRequest(id)
                };
                workflow.create_assignment(&actor, &to, &target).map(show)
            }
            "7" => {
                let actor = user(prompt("Usuario que reasigna: ")?);
                let id = record(prompt("Id de la asignación: ")?);
                let to = user(prompt("Nuevo técnico: ")?);
                workflow.reassign_assignment(&actor, &id, &to).map(show)
            }
            "8" => {
                let who = user(prompt("Usuario: ")?);
                workflow.list_assignments_for_user(&who).map(show)
            }
            "9" => {
                let tech = user(prompt("Técnico: ")?);
                let id = record(prompt("Id de la asignación: ")?);
                let description = prompt("Descripción (enter para vacío): ")?;
                let images = prompt("Imágenes separadas por coma (enter para ninguna): ")?;
                let finished = prompt("¿Intervención finalizada? (s/n): ")?;
                let input = NewMaintenanceReport { intervention_date: chrono::Utc::now(),
                                                   description: Some(description.trim().to_string())
                                                       .filter(|d| !d.is_empty()),
                                                   images: images.split(',')
                                                                 .map(|s| s.trim().to_string())
                                                                 .filter(|s| !s.is_empty())
                                                                 .collect(),
                                                   status: if finished.trim().eq_ignore_ascii_case("s") {
                                                       InterventionStatus::Finished
                                                   } else {
                                                       InterventionStatus::NeedsFurtherIntervention
                                                   } };
                workflow.file_maintenance_report(&tech, &id, input).map(show)
            }
            "10" => {
                let actor = user(prompt("Supervisor: ")?);
                let id = record(prompt("Id del informe: ")?);
                workflow.approve_maintenance_report(&actor, &id).map(show)
            }
            "11" => {
                let id = record(prompt("Id: ")?);
                workflow.history(&id).map(|records| {
                    for r in records {
                        println!("{} #{} {} {}", r.created_at, r.cursor, r.key, r.payload);
                    }
                })
            }
            "0" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
                continue;
            }
        };
        if let Err(e) = result {
            report(&e);
        }
    }

    Ok(())
}

fn create_request(workflow: &IrrigationWorkflow) -> io::Result<Result<(), WorkflowError>> {
    let requester = user(prompt("Usuario solicitante: ")?);
    let lot = LotId::new(prompt("Lote: ")?.trim());
    let kind = prompt("Tipo (change_flow/temporary_cancel/definitive_cancel/activation): ")?;
    let Some(kind) = RequestKind::from_code(kind.trim()) else {
        eprintln!("Tipo inválido");
        return Ok(Ok(()));
    };
    let requested_flow = if kind.carries_flow() {
        match prompt("Caudal (L/s): ")?.trim().parse::<f64>() {
            Ok(f) => Some(f),
            Err(_) => {
                eprintln!("Caudal inválido");
                return Ok(Ok(()));
            }
        }
    } else {
        None
    };
    let obs = prompt("Observaciones (enter para vacío): ")?;
    let observations = Some(obs.trim().to_string()).filter(|o| !o.is_empty());
    let input = NewFlowRequest { lot,
                                 kind,
                                 requested_flow,
                                 observations };
    Ok(workflow.create_flow_request(&requester, input).map(show))
}

fn show<T: serde::Serialize>(entity: T) {
    match serde_json::to_string_pretty(&entity) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("No se pudo mostrar el resultado: {}", e),
    }
}

fn report(e: &WorkflowError) {
    match serde_json::to_string(&e.to_body()) {
        Ok(body) => eprintln!("Error: {}", body),
        Err(_) => eprintln!("Error: {}", e),
    }
}

fn user(raw: String) -> UserId {
    UserId::new(raw.trim())
}

fn record(raw: String) -> RecordId {
    RecordId::new(raw.trim())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
