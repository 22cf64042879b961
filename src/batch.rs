// Ejecuciones independientes en paralelo sobre el pool bloqueante de tokio.
//
// Cada solicitud corre en su propio `spawn_blocking` con su propio estado; el
// catálogo es lo único compartido. Un semáforo global del tamaño de
// `num_cpus` limita cuántas corren a la vez.
use crate::algorithm::{CancelFlag, Planner};
use crate::catalog::CatalogAccessor;
use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::models::{Plan, PlanRequest};
use futures_util::future::join_all;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

fn global_semaphore() -> Arc<Semaphore> {
    static GLOBAL_SEM: OnceLock<Arc<Semaphore>> = OnceLock::new();
    GLOBAL_SEM
        .get_or_init(|| Arc::new(Semaphore::new(std::cmp::max(1, num_cpus::get()))))
        .clone()
}

/// Corre una solicitud en el pool bloqueante. Con `timeout`, al vencer se
/// levanta la bandera de cancelación (la tarea se detiene en el siguiente
/// límite entre colocaciones) y se devuelve `TimedOut`.
pub async fn plan_one<C>(
    catalog: Arc<C>,
    request: PlanRequest,
    config: PlannerConfig,
    timeout: Option<Duration>,
) -> Result<Plan, PlanError>
where
    C: CatalogAccessor + ?Sized + 'static,
{
    let permit = global_semaphore()
        .acquire_owned()
        .await
        .map_err(|e| PlanError::WorkerFailed(e.to_string()))?;

    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let start = Instant::now();
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        Planner::new(&*catalog).with_config(config).with_cancel(flag).plan(&request)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(j) => j,
            Err(_) => {
                cancel.cancel();
                let after_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                warn!(after_ms, "planning run timed out, cancel flag raised");
                return Err(PlanError::TimedOut { after_ms });
            }
        },
        None => handle.await,
    };
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "planning run joined");
    joined.map_err(|e| PlanError::WorkerFailed(e.to_string()))?
}

/// Corre todas las solicitudes y devuelve los resultados en el mismo orden.
pub async fn plan_concurrently<C>(
    catalog: Arc<C>,
    requests: Vec<PlanRequest>,
    config: PlannerConfig,
    timeout: Option<Duration>,
) -> Vec<Result<Plan, PlanError>>
where
    C: CatalogAccessor + ?Sized + 'static,
{
    let futures = requests
        .into_iter()
        .map(|req| plan_one(catalog.clone(), req, config.clone(), timeout));
    join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::{Course, CourseRef, Quarter, Requirement, Term};

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_course(Course::new("CSC 1230", 5))
            .with_course(
                Course::new("CSC 2430", 5)
                    .with_prerequisites(Requirement::all_of(vec![CourseRef::new("CSC 1230", 5)])),
            )
            .with_course(Course::new("MAT 1720", 5))
    }

    #[tokio::test]
    async fn test_results_keep_request_order() {
        let t = Term::new(2024, Quarter::Autumn);
        let requests = vec![
            PlanRequest::new(10, &["CSC 2430"], t),
            PlanRequest::new(0, &["MAT 1720"], t),
            PlanRequest::new(5, &["MAT 1720"], t),
        ];
        let out = plan_concurrently(Arc::new(catalog()), requests, PlannerConfig::default(), None).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().quarter_of("CSC 2430"), Some(1));
        assert!(matches!(out[1], Err(PlanError::InvalidRequest(_))));
        assert_eq!(out[2].as_ref().unwrap().course_count(), 1);
    }

    #[tokio::test]
    async fn test_generous_timeout_still_plans() {
        let t = Term::new(2024, Quarter::Autumn);
        let res = plan_one(
            Arc::new(catalog()),
            PlanRequest::new(15, &["CSC 2430", "MAT 1720"], t),
            PlannerConfig::default(),
            Some(Duration::from_secs(30)),
        )
        .await;
        assert_eq!(res.unwrap().course_count(), 3);
    }
}
