// Expansión de dependencias: cierre transitivo de prerequisitos no cumplidos.
use crate::catalog::CatalogAccessor;
use crate::error::PlanError;
use crate::models::{Course, CourseRef, Requirement};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Arista elegida prerequisito -> dependiente.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PrereqEdge {
    pub prerequisite: String,
    pub dependent: String,
    /// El prerequisito puede cursarse en el mismo trimestre que el dependiente.
    pub concurrent: bool,
}

/// Estado de una alternativa respecto a los cursos aprobados.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerequisiteAlternative {
    pub index: usize,
    pub unmet: Vec<CourseRef>,
    pub unmet_count: usize,
    pub unmet_credits: u32,
}

impl PrerequisiteAlternative {
    pub fn is_satisfied(&self) -> bool {
        self.unmet_count == 0
    }
}

/// Evalúa cada alternativa del requisito contra los cursos aprobados.
pub fn evaluate_alternatives(req: &Requirement, completed: &BTreeSet<String>) -> Vec<PrerequisiteAlternative> {
    req.alternatives
        .iter()
        .enumerate()
        .map(|(index, alt)| {
            let unmet: Vec<CourseRef> = alt
                .members
                .iter()
                .filter(|m| !completed.contains(&m.course_id))
                .cloned()
                .collect();
            let unmet_credits = unmet.iter().map(|m| m.credits).sum();
            PrerequisiteAlternative { index, unmet_count: unmet.len(), unmet, unmet_credits }
        })
        .collect()
}

/// Política para elegir una alternativa cuando ninguna está cumplida.
/// Es una heurística; un solver exacto puede reemplazarla.
pub trait AlternativeStrategy: Send + Sync {
    /// Devuelve el índice (dentro de `options`) de la alternativa elegida.
    /// `options` nunca está vacío y ninguna opción está cumplida.
    fn choose(&self, course: &Course, options: &[PrerequisiteAlternative]) -> usize;
}

/// Greedy: menos créditos pendientes, luego menos miembros pendientes,
/// luego la primera en el orden del catálogo.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinRemainingCredits;

impl AlternativeStrategy for MinRemainingCredits {
    fn choose(&self, _course: &Course, options: &[PrerequisiteAlternative]) -> usize {
        options
            .iter()
            .enumerate()
            .min_by_key(|(_, o)| (o.unmet_credits, o.unmet_count, o.index))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Conjunto a planificar (semilla ∪ prerequisitos transitivos) y aristas elegidas.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub courses: BTreeMap<String, Course>,
    pub edges: Vec<PrereqEdge>,
}

impl Expansion {
    /// Aristas entrantes (prerequisitos elegidos) de `course_id`.
    pub fn prerequisites_of<'a>(&'a self, course_id: &'a str) -> impl Iterator<Item = &'a PrereqEdge> + 'a {
        self.edges.iter().filter(move |e| e.dependent == course_id)
    }

    /// `course_id` más sus corequisitos, transitivamente, limitado a los
    /// cursos del conjunto expandido.
    pub fn corequisite_group(&self, course_id: &str) -> BTreeSet<String> {
        let mut group: BTreeSet<String> = BTreeSet::new();
        let mut stack = vec![course_id.to_string()];
        while let Some(code) = stack.pop() {
            if !group.insert(code.clone()) {
                continue;
            }
            if let Some(c) = self.courses.get(&code) {
                for co in c.corequisites.iter() {
                    if self.courses.contains_key(co) && !group.contains(co) {
                        stack.push(co.clone());
                    }
                }
            }
        }
        group
    }

    /// Componentes conexas de la relación de corequisitos, sin dirección.
    /// Cada curso del conjunto expandido cae en exactamente una; los cursos
    /// sin corequisitos forman la suya propia.
    pub fn corequisite_clusters(&self) -> Vec<BTreeSet<String>> {
        let mut adjacent: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (code, c) in self.courses.iter() {
            adjacent.entry(code.as_str()).or_default();
            for co in c.corequisites.iter().filter(|co| self.courses.contains_key(*co) && *co != code) {
                adjacent.entry(code.as_str()).or_default().insert(co.as_str());
                adjacent.entry(co.as_str()).or_default().insert(code.as_str());
            }
        }

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut clusters = Vec::new();
        for start in adjacent.keys() {
            if seen.contains(start) {
                continue;
            }
            let mut cluster: BTreeSet<String> = BTreeSet::new();
            let mut stack = vec![*start];
            while let Some(code) = stack.pop() {
                if !seen.insert(code) {
                    continue;
                }
                cluster.insert(code.to_string());
                if let Some(next) = adjacent.get(code) {
                    stack.extend(next.iter().filter(|n| !seen.contains(*n)));
                }
            }
            clusters.push(cluster);
        }
        clusters
    }

    /// Un curso espera a otro que lo declara corequisito y que no está en su
    /// propio grupo: se coloca junto con ese curso.
    pub fn group_leaders_of(&self, course_id: &str) -> Vec<&str> {
        let own = self.corequisite_group(course_id);
        self.courses
            .values()
            .filter(|c| c.course_id != course_id && !own.contains(&c.course_id))
            .filter(|c| c.corequisites.iter().any(|co| co == course_id))
            .map(|c| c.course_id.as_str())
            .collect()
    }
}

/// Recorre la frontera pasada a pasada: trae los registros, elige una
/// alternativa por curso y agrega sus miembros pendientes y los corequisitos
/// a la siguiente frontera. Cada curso se visita una sola vez, así que un
/// grafo cíclico termina aquí y se reporta al secuenciar.
pub fn expand<C: CatalogAccessor + ?Sized>(
    catalog: &C,
    seed: &BTreeSet<String>,
    completed: &BTreeSet<String>,
    strategy: &dyn AlternativeStrategy,
) -> Result<Expansion, PlanError> {
    let mut out = Expansion::default();
    let mut frontier: BTreeSet<String> = seed.iter().filter(|c| !completed.contains(*c)).cloned().collect();
    let mut pass = 0usize;

    while !frontier.is_empty() {
        pass += 1;
        let ids: Vec<String> = frontier.iter().filter(|c| !out.courses.contains_key(*c)).cloned().collect();
        frontier.clear();
        if ids.is_empty() {
            break;
        }
        debug!(pass, courses = ids.len(), "expanding prerequisite frontier");
        let fetched = catalog.get_courses(&ids)?;

        let mut next: BTreeSet<String> = BTreeSet::new();
        for course in fetched {
            let options = evaluate_alternatives(&course.prerequisites, completed);
            if !options.is_empty() && !options.iter().any(|o| o.is_satisfied()) {
                let pick = strategy.choose(&course, &options);
                let chosen = options.get(pick).unwrap_or(&options[0]);
                for m in chosen.unmet.iter() {
                    out.edges.push(PrereqEdge {
                        prerequisite: m.course_id.clone(),
                        dependent: course.course_id.clone(),
                        concurrent: m.concurrent_available,
                    });
                    next.insert(m.course_id.clone());
                }
            }
            for co in course.corequisites.iter() {
                if !completed.contains(co) {
                    next.insert(co.clone());
                }
            }
            out.courses.insert(course.course_id.clone(), course);
        }
        frontier = next.into_iter().filter(|c| !out.courses.contains_key(c)).collect();
    }

    out.edges.sort();
    out.edges.dedup();
    debug!(courses = out.courses.len(), edges = out.edges.len(), passes = pass, "expansion finished");
    Ok(out)
}
