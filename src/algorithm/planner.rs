// planner.rs - Orquestador del pipeline de planificación.
//
// PHASE 1: expand     - cierre transitivo de prerequisitos pendientes
// PHASE 2: sequence   - orden topológico (Kahn) sobre las aristas elegidas
// PHASE 3: assign     - colocación trimestre a trimestre con secciones
// PHASE 4: assemble   - plan final ordenado
//
// Cualquier fallo estructural aborta la ejecución completa: nunca se
// devuelve un plan parcial.

use crate::algorithm::assign::{PlanState, QuarterAssigner};
use crate::algorithm::expand::{expand, AlternativeStrategy, MinRemainingCredits};
use crate::algorithm::plan::assemble;
use crate::algorithm::sequence::sequence;
use crate::algorithm::CancelFlag;
use crate::catalog::CatalogAccessor;
use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::models::{Plan, PlanRequest};
use tracing::{debug, info};

pub struct Planner<'a, C: CatalogAccessor + ?Sized> {
    catalog: &'a C,
    config: PlannerConfig,
    strategy: Box<dyn AlternativeStrategy + 'a>,
    cancel: Option<CancelFlag>,
}

impl<'a, C: CatalogAccessor + ?Sized> Planner<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Planner {
            catalog,
            config: PlannerConfig::default(),
            strategy: Box::new(MinRemainingCredits),
            cancel: None,
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Reemplaza la heurística de elección de alternativas.
    pub fn with_strategy<S: AlternativeStrategy + 'a>(mut self, strategy: S) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, request: &PlanRequest) -> Result<Plan, PlanError> {
        if request.max_credits == 0 {
            return Err(PlanError::InvalidRequest("maxCredits must be positive".to_string()));
        }
        let reference_term = request
            .reference_term
            .ok_or_else(|| PlanError::InvalidRequest("referenceTerm is required".to_string()))?;

        info!(
            courses = request.final_courses.len(),
            completed = request.completed_courses.len(),
            cap = request.max_credits,
            reference = %reference_term,
            "planning run started"
        );

        // PHASE 1
        let expansion = expand(
            self.catalog,
            &request.final_courses,
            &request.completed_courses,
            self.strategy.as_ref(),
        )?;

        // PHASE 2
        let order = sequence(&expansion)?;
        debug!(order = ?order, "course sequence");

        // PHASE 3
        let state = PlanState::new(
            request.final_courses.clone(),
            request.completed_courses.clone(),
            request.completed_credits,
            reference_term.next(self.config.include_summer),
        );
        let state = QuarterAssigner::new(self.catalog, &self.config, request.max_credits, state)
            .with_cancel(self.cancel.clone())
            .assign_all(&order, &expansion)?;

        // PHASE 4
        let plan = assemble(reference_term, request.max_credits, state.buckets);
        info!(quarters = plan.quarters.len(), courses = plan.course_count(), "planning run finished");
        Ok(plan)
    }
}
