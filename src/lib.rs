// Biblioteca raíz del crate `quickplan`.
// Reexporta los módulos principales y proporciona `generate_plan`, la
// función de conveniencia que arma un `Planner` y ejecuta una solicitud.
pub mod algorithm;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod requirements;

pub use algorithm::{AlternativeStrategy, CancelFlag, MinRemainingCredits, Planner};
pub use catalog::{CachedCatalog, CatalogAccessor, InMemoryCatalog, SqliteCatalog};
pub use config::PlannerConfig;
pub use error::{BlockReason, CatalogError, PlanError};
pub use models::{Course, Plan, PlanRequest, QuarterBucket, Section, Standing, Term};

/// Ejecuta una solicitud con la heurística por defecto.
pub fn generate_plan<C: CatalogAccessor + ?Sized>(
    catalog: &C,
    request: &PlanRequest,
    config: PlannerConfig,
) -> Result<Plan, PlanError> {
    Planner::new(catalog).with_config(config).plan(request)
}
