// [apps/coordinator/src/state/registry.rs]
/*!
 * Worker Registry (C2): el mapa en memoria de sesiones de worker vivas.
 * Vive detras de un unico `Mutex` tomado brevemente, nunca a traves de una
 * suspension de red: cada metodo adquiere el cerrojo, muta, y lo libera
 * antes de volver a `await` nada.
 *
 * El remitente (`outbound`) es el unico puente entre este mapa y el socket
 * fisico de cada worker; el Job nunca apunta al socket, solo a este
 * `worker_id`, y es este registro el que sabe como hablarle: no guarda
 * punteros de vuelta al contenido del job, solo al id.
 */

use chrono::{DateTime, Utc};
use gridx_domain_models::protocol::SessionMessage;
use gridx_domain_models::worker::{JobRequirements, WorkerCapabilities, WorkerSessionView, WorkerStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

pub struct WorkerSession {
    pub owner: String,
    pub capabilities: WorkerCapabilities,
    pub status: WorkerStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub current_job: Option<Uuid>,
    outbound: UnboundedSender<SessionMessage>,
}

struct RegistryInner {
    sessions: HashMap<Uuid, WorkerSession>,
    /// Orden de llegada; `pick_idle` escanea en este orden.
    arrival_order: Vec<Uuid>,
}

pub struct WorkerRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self { inner: Mutex::new(RegistryInner { sessions: HashMap::new(), arrival_order: Vec::new() }) }
    }

    /// Registra una sesion nueva, o la reactiva si `worker_id` ya existia
    /// (reconexion con la misma identidad): su posicion en `arrival_order`
    /// se conserva, de modo que `/workers` siga mostrando una unica entrada
    /// a traves de la reconexion.
    pub fn register(
        &self,
        worker_id: Uuid,
        owner: String,
        capabilities: WorkerCapabilities,
        outbound: UnboundedSender<SessionMessage>,
    ) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        let is_new = !guard.sessions.contains_key(&worker_id);

        guard.sessions.insert(
            worker_id,
            WorkerSession {
                owner,
                capabilities,
                status: WorkerStatus::Idle,
                last_heartbeat: Utc::now(),
                current_job: None,
                outbound,
            },
        );

        if is_new {
            guard.arrival_order.push(worker_id);
            info!("🆕 [REGISTRY]: Worker [{}] registered.", worker_id);
        } else {
            info!("🔄 [REGISTRY]: Worker [{}] reconnected; identity preserved.", worker_id);
        }
    }

    /// Retira una sesion por completo (barrido de eviccion de larga data).
    pub fn deregister(&self, worker_id: Uuid) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        if guard.sessions.remove(&worker_id).is_some() {
            guard.arrival_order.retain(|id| id != &worker_id);
            info!("🗑️ [REGISTRY]: Worker [{}] evicted from the registry.", worker_id);
        }
    }

    /// Primera sesion `idle` en orden de llegada cuyas capacidades
    /// satisfacen `requirements`.
    pub fn pick_idle(&self, requirements: &JobRequirements) -> Option<Uuid> {
        let guard = self.inner.lock().expect("registry poisoned");
        guard.arrival_order.iter().find_map(|id| {
            let session = guard.sessions.get(id)?;
            (session.status == WorkerStatus::Idle && session.capabilities.satisfies(requirements)).then_some(*id)
        })
    }

    pub fn mark_busy(&self, worker_id: Uuid, job_id: Uuid) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        if let Some(session) = guard.sessions.get_mut(&worker_id) {
            session.status = WorkerStatus::Busy;
            session.current_job = Some(job_id);
        }
    }

    pub fn mark_idle(&self, worker_id: Uuid) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        if let Some(session) = guard.sessions.get_mut(&worker_id) {
            session.status = WorkerStatus::Idle;
            session.current_job = None;
        }
    }

    pub fn touch(&self, worker_id: Uuid) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        if let Some(session) = guard.sessions.get_mut(&worker_id) {
            session.last_heartbeat = Utc::now();
        }
    }

    /// Sesiones `idle`/`busy` cuyo ultimo latido antecede a `threshold`,
    /// junto con el job que sostenian (si alguno). Usado por el barrido de
    /// staleness; no muta nada por si mismo.
    pub fn find_stale(&self, threshold: DateTime<Utc>) -> Vec<(Uuid, Option<Uuid>)> {
        let guard = self.inner.lock().expect("registry poisoned");
        guard
            .sessions
            .iter()
            .filter(|(_, s)| s.status != WorkerStatus::Offline && s.last_heartbeat < threshold)
            .map(|(id, s)| (*id, s.current_job))
            .collect()
    }

    /// Sesiones `offline` desde antes de `threshold`: candidatas a eviccion
    /// total (el umbral largo de inactividad, p.ej. 24h).
    pub fn find_evictable(&self, threshold: DateTime<Utc>) -> Vec<Uuid> {
        let guard = self.inner.lock().expect("registry poisoned");
        guard
            .sessions
            .iter()
            .filter(|(_, s)| s.status == WorkerStatus::Offline && s.last_heartbeat < threshold)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn mark_offline(&self, worker_id: Uuid) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        if let Some(session) = guard.sessions.get_mut(&worker_id) {
            if session.status != WorkerStatus::Offline {
                warn!("📴 [REGISTRY]: Worker [{}] marked offline.", worker_id);
            }
            session.status = WorkerStatus::Offline;
            session.current_job = None;
        }
    }

    pub fn owner_of(&self, worker_id: Uuid) -> Option<String> {
        let guard = self.inner.lock().expect("registry poisoned");
        guard.sessions.get(&worker_id).map(|s| s.owner.clone())
    }

    /// Job que la sesion sostenia al momento de perderse (cierre de
    /// transporte); `None` si no tenia ninguno asignado.
    pub fn current_job_of(&self, worker_id: Uuid) -> Option<Uuid> {
        let guard = self.inner.lock().expect("registry poisoned");
        guard.sessions.get(&worker_id).and_then(|s| s.current_job)
    }

    /// Envia un frame al socket fisico del worker; `None` si ya no hay
    /// sesion viva con ese id (la tarea de socket ya cerro su extremo).
    pub fn send_to(&self, worker_id: Uuid, message: SessionMessage) -> Option<()> {
        let guard = self.inner.lock().expect("registry poisoned");
        let session = guard.sessions.get(&worker_id)?;
        session.outbound.send(message).ok()
    }

    pub fn snapshot(&self) -> Vec<WorkerSessionView> {
        let guard = self.inner.lock().expect("registry poisoned");
        guard
            .arrival_order
            .iter()
            .filter_map(|id| {
                guard.sessions.get(id).map(|s| WorkerSessionView {
                    worker_id: *id,
                    owner: s.owner.clone(),
                    status: s.status,
                    capabilities: s.capabilities,
                    last_heartbeat: s.last_heartbeat,
                    current_job: s.current_job,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn channel() -> UnboundedSender<SessionMessage> {
        mpsc::unbounded_channel().0
    }

    fn caps() -> WorkerCapabilities {
        WorkerCapabilities { cpu_cores: 2, accelerator_count: 0, memory_mb: 1024 }
    }

    #[test]
    fn pick_idle_respects_arrival_order() {
        let registry = WorkerRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.register(first, "bob".into(), caps(), channel());
        registry.register(second, "carol".into(), caps(), channel());

        let requirements = JobRequirements { cpu_cores: 1, memory_mb: 256, accelerator_required: false };
        assert_eq!(registry.pick_idle(&requirements), Some(first));
    }

    #[test]
    fn busy_sessions_are_skipped() {
        let registry = WorkerRegistry::new();
        let worker = Uuid::new_v4();
        registry.register(worker, "bob".into(), caps(), channel());
        registry.mark_busy(worker, Uuid::new_v4());

        let requirements = JobRequirements { cpu_cores: 1, memory_mb: 256, accelerator_required: false };
        assert_eq!(registry.pick_idle(&requirements), None);
    }

    #[test]
    fn reconnect_preserves_identity_and_arrival_slot() {
        let registry = WorkerRegistry::new();
        let worker = Uuid::new_v4();
        registry.register(worker, "bob".into(), caps(), channel());
        registry.mark_offline(worker);
        registry.register(worker, "bob".into(), caps(), channel());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].worker_id, worker);
        assert_eq!(snapshot[0].status, WorkerStatus::Idle);
    }

    #[test]
    fn find_stale_reports_sessions_past_the_threshold() {
        let registry = WorkerRegistry::new();
        let worker = Uuid::new_v4();
        registry.register(worker, "bob".into(), caps(), channel());
        registry.mark_busy(worker, Uuid::new_v4());

        let future_threshold = Utc::now() + chrono::Duration::seconds(60);
        let stale = registry.find_stale(future_threshold);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0, worker);
    }
}
