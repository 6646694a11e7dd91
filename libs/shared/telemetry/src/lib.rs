// [libs/shared/telemetry/src/lib.rs]
/*!
 * =================================================================
 * APARATO: TELEMETRY OBSERVER (V1.0 - GOLD MASTER)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: GESTION DE TRAZADO ESTRUCTURADO Y CAPTURA DE PANICOS
 *
 * Inicializa `tracing` para el coordinador y los trabajadores con el
 * mismo filtro de entorno y el mismo blindaje de panico en ambos
 * procesos, para que un colapso en un hilo secundario (sesion de
 * worker, daemon de fondo) deje rastro antes de terminar el proceso.
 * =================================================================
 */

use std::panic;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, EnvFilter};

/// Inicializa el sistema de trazas con blindaje de panicos.
///
/// En depuracion emite logs compactos y legibles; en produccion emite
/// JSON plano apto para ingesta por un colector externo.
///
/// # Panics
/// Entra en panico si otro suscriptor global ya fue inicializado en el proceso.
pub fn init_tracing(service_identifier: &str) {
    let environmental_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},tower_http=warn,axum=warn,libsql=error",
            service_identifier,
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().json().flatten_event(true))
            .init();
    }

    let service_id_snapshot = service_identifier.to_string();
    panic::set_hook(Box::new(move |panic_metadata| {
        let panic_location = panic_metadata
            .location()
            .map(|location| format!("{}:{}:{}", location.file(), location.line(), location.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let panic_payload_message = panic_metadata
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_metadata.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");

        error!(
            target: "panic_monitor",
            service = %service_id_snapshot,
            location = %panic_location,
            "thread panicked: {}",
            panic_payload_message
        );
    }));

    info!("👁️  [TELEMETRY_ONLINE]: Tracing initialized for [{}].", service_identifier);
}
