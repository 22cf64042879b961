// Errores tipados del catálogo y del planificador.
use serde::Serialize;

/// Fallos al consultar o cargar el catálogo de cursos y secciones.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("courses not found in catalog: {}", ids.join(", "))]
    NotFound { ids: Vec<String> },

    #[error("catalog storage error: {0}")]
    Storage(String),

    #[error("could not decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("catalog file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Storage(e.to_string())
    }
}

/// Por qué un curso no cupo en ningún trimestre del horizonte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    StandingNeverReached,
    CreditCapTooLow,
    NoConflictFreeSection,
    HorizonExhausted,
    CorequisiteQuarterUnavailable,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlockReason::StandingNeverReached => "eligible standing is never reached",
            BlockReason::CreditCapTooLow => "credit cap is too low",
            BlockReason::NoConflictFreeSection => "no conflict-free section combination",
            BlockReason::HorizonExhausted => "prerequisite chain exceeds the planning horizon",
            BlockReason::CorequisiteQuarterUnavailable => "the quarter of an already placed corequisite cannot take it",
        };
        f.write_str(s)
    }
}

/// Fallos estructurales de una ejecución: abortan el plan completo.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("catalog lookup failed: {0}")]
    CatalogLookupFailure(#[from] CatalogError),

    #[error("prerequisite cycle between: {}", courses.join(", "))]
    UnsatisfiableOrdering { courses: Vec<String> },

    #[error("course {course} cannot be placed: {reason}")]
    UnplaceableCourse { course: String, reason: BlockReason },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("planning run was cancelled")]
    Cancelled,

    #[error("planning run timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },

    #[error("planning worker failed: {0}")]
    WorkerFailed(String),
}

impl PlanError {
    /// Código estable para serializar el error hacia el llamador.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::CatalogLookupFailure(_) => "catalog_lookup_failure",
            PlanError::UnsatisfiableOrdering { .. } => "unsatisfiable_ordering",
            PlanError::UnplaceableCourse { .. } => "unplaceable_course",
            PlanError::InvalidRequest(_) => "invalid_request",
            PlanError::Cancelled => "cancelled",
            PlanError::TimedOut { .. } => "timed_out",
            PlanError::WorkerFailed(_) => "worker_failed",
        }
    }
}
