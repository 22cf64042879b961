// Módulo de alto nivel del planificador de trimestres
// Declarar submódulos (archivos en la carpeta `src/algorithm`)
pub mod assign;
pub mod conflict;
pub mod expand;
pub mod plan;
pub mod planner;
pub mod section_selector;
pub mod sequence;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Reexportar sólo la API pública que se usa desde fuera
pub use expand::{AlternativeStrategy, MinRemainingCredits, PrereqEdge, PrerequisiteAlternative};
pub use planner::Planner;

/// Bandera de cancelación compartida entre el llamador y una ejecución.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
