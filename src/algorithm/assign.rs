// Asignación de cursos a trimestres: el planificador principal.
//
// Recorre el orden topológico y coloca cada curso (con sus corequisitos) en
// el primer trimestre que cumpla nivel, tope de créditos y secciones sin
// choques. Los trimestres se crean a medida que se necesitan.
use crate::algorithm::expand::{Expansion, PrereqEdge};
use crate::algorithm::section_selector::{select_non_conflicting_sections, CandidateGroup, Resolution};
use crate::algorithm::CancelFlag;
use crate::catalog::CatalogAccessor;
use crate::config::PlannerConfig;
use crate::error::{BlockReason, PlanError};
use crate::models::{Course, PlacedCourse, QuarterBucket, Section, Term, TermRange};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Estado de una ejecución. No se comparte entre ejecuciones.
#[derive(Debug, Clone)]
pub struct PlanState {
    pub mandatory: BTreeSet<String>,
    pub completed: BTreeSet<String>,
    pub completed_credits: u32,
    pub assigned: BTreeMap<String, usize>,
    pub chosen_prereqs: BTreeMap<String, Vec<PrereqEdge>>,
    pub buckets: Vec<QuarterBucket>,
}

impl PlanState {
    /// Estado inicial con un único trimestre: el siguiente al de referencia.
    pub fn new(
        mandatory: BTreeSet<String>,
        completed: BTreeSet<String>,
        completed_credits: u32,
        first_term: Term,
    ) -> Self {
        PlanState {
            mandatory,
            completed,
            completed_credits,
            assigned: BTreeMap::new(),
            chosen_prereqs: BTreeMap::new(),
            buckets: vec![QuarterBucket::new(0, first_term, completed_credits)],
        }
    }
}

enum Attempt {
    Placed,
    Standing,
    Cap,
    Sections,
}

pub struct QuarterAssigner<'a, C: CatalogAccessor + ?Sized> {
    catalog: &'a C,
    config: &'a PlannerConfig,
    max_credits: u32,
    cancel: Option<CancelFlag>,
    state: PlanState,
    // candidatos por (curso, término) consultados en esta ejecución
    section_memo: HashMap<(String, Term), Vec<Section>>,
}

impl<'a, C: CatalogAccessor + ?Sized> QuarterAssigner<'a, C> {
    pub fn new(catalog: &'a C, config: &'a PlannerConfig, max_credits: u32, state: PlanState) -> Self {
        QuarterAssigner {
            catalog,
            config,
            max_credits,
            cancel: None,
            state,
            section_memo: HashMap::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: Option<CancelFlag>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Coloca todos los cursos de `order` y devuelve el estado final.
    /// La cancelación se revisa sólo entre colocaciones.
    pub fn assign_all(mut self, order: &[String], exp: &Expansion) -> Result<PlanState, PlanError> {
        for course_id in order {
            if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return Err(PlanError::Cancelled);
            }
            if self.state.assigned.contains_key(course_id) || self.state.completed.contains(course_id) {
                continue;
            }
            // se coloca después, junto con el curso que lo declara corequisito
            if exp.group_leaders_of(course_id).iter().any(|l| !self.state.assigned.contains_key(*l)) {
                debug!(course = course_id.as_str(), "deferred to its corequisite group");
                continue;
            }
            self.place(course_id, exp)?;
        }
        Ok(self.state)
    }

    fn place(&mut self, course_id: &str, exp: &Expansion) -> Result<(), PlanError> {
        let course = exp.courses.get(course_id).ok_or_else(|| {
            PlanError::CatalogLookupFailure(crate::error::CatalogError::NotFound { ids: vec![course_id.to_string()] })
        })?;

        // Grupo: el curso más sus corequisitos (transitivos) aún no aprobados ni colocados.
        let mut group: Vec<&Course> = vec![course];
        for co in exp.corequisite_group(course_id).iter() {
            if co == course_id || self.state.completed.contains(co) || self.state.assigned.contains_key(co) {
                continue;
            }
            if let Some(c) = exp.courses.get(co) {
                group.push(c);
            }
        }
        let in_group: BTreeSet<&str> = group.iter().map(|c| c.course_id.as_str()).collect();

        let (earliest, pinned) = self.earliest_bucket(&group, &in_group, exp)?;
        let group_credits: u32 = group.iter().map(|c| c.credits).sum();

        if group_credits > self.max_credits {
            return Err(PlanError::UnplaceableCourse {
                course: course_id.to_string(),
                reason: BlockReason::CreditCapTooLow,
            });
        }
        if earliest >= self.config.horizon {
            return Err(PlanError::UnplaceableCourse {
                course: course_id.to_string(),
                reason: BlockReason::HorizonExhausted,
            });
        }
        // un corequisito ya colocado fija el trimestre: sólo se prueba ése
        let range = match pinned {
            Some(q) if earliest > q => {
                return Err(PlanError::UnplaceableCourse {
                    course: course_id.to_string(),
                    reason: BlockReason::CorequisiteQuarterUnavailable,
                });
            }
            Some(q) => q..q + 1,
            None => earliest..self.config.horizon,
        };

        let (mut saw_standing, mut saw_cap, mut saw_sections) = (false, false, false);
        for idx in range {
            self.ensure_bucket(idx);
            match self.try_bucket(idx, &group, group_credits)? {
                Attempt::Placed => {
                    debug!(course = course_id, bucket = idx, group = group.len(), credits = group_credits, "course placed");
                    return Ok(());
                }
                Attempt::Standing => saw_standing = true,
                Attempt::Cap => saw_cap = true,
                Attempt::Sections => saw_sections = true,
            }
        }

        let reason = if saw_sections {
            BlockReason::NoConflictFreeSection
        } else if saw_cap {
            BlockReason::CreditCapTooLow
        } else if saw_standing {
            BlockReason::StandingNeverReached
        } else {
            BlockReason::HorizonExhausted
        };
        Err(PlanError::UnplaceableCourse { course: course_id.to_string(), reason })
    }

    /// max(asignado[p] + 1) sobre los prerequisitos elegidos del grupo, o
    /// asignado[p] cuando p puede cursarse en paralelo. Si algún corequisito
    /// del grupo ya está colocado, también devuelve su trimestre.
    fn earliest_bucket(
        &mut self,
        group: &[&Course],
        in_group: &BTreeSet<&str>,
        exp: &Expansion,
    ) -> Result<(usize, Option<usize>), PlanError> {
        let mut earliest = 0usize;
        let mut pinned: Option<usize> = None;
        for member in group.iter() {
            let edges: Vec<PrereqEdge> = exp.prerequisites_of(&member.course_id).cloned().collect();
            for e in edges.iter() {
                if in_group.contains(e.prerequisite.as_str()) || self.state.completed.contains(&e.prerequisite) {
                    continue;
                }
                match self.state.assigned.get(&e.prerequisite) {
                    Some(&q) => earliest = earliest.max(if e.concurrent { q } else { q + 1 }),
                    None => {
                        return Err(PlanError::UnsatisfiableOrdering {
                            courses: vec![e.prerequisite.clone(), member.course_id.clone()],
                        })
                    }
                }
            }
            for co in member.corequisites.iter() {
                let Some(&q) = self.state.assigned.get(co) else { continue };
                match pinned {
                    Some(p) if p != q => {
                        return Err(PlanError::UnplaceableCourse {
                            course: group[0].course_id.clone(),
                            reason: BlockReason::CorequisiteQuarterUnavailable,
                        })
                    }
                    _ => pinned = Some(q),
                }
            }
            self.state.chosen_prereqs.insert(member.course_id.clone(), edges);
        }
        Ok((earliest, pinned))
    }

    fn ensure_bucket(&mut self, idx: usize) {
        while self.state.buckets.len() <= idx {
            let next = match self.state.buckets.last() {
                Some(prev) => QuarterBucket::new(
                    prev.index + 1,
                    prev.term.next(self.config.include_summer),
                    prev.projected_credits + prev.credits,
                ),
                // PlanState::new siempre crea el primer trimestre
                None => return,
            };
            self.state.buckets.push(next);
        }
    }

    fn candidates(&mut self, course_id: &str, term: Term) -> Result<Vec<Section>, PlanError> {
        let key = (course_id.to_string(), term);
        if let Some(v) = self.section_memo.get(&key) {
            return Ok(v.clone());
        }
        let v = self.catalog.get_sections(course_id, &TermRange::single(term))?;
        self.section_memo.insert(key, v.clone());
        Ok(v)
    }

    fn try_bucket(&mut self, idx: usize, group: &[&Course], group_credits: u32) -> Result<Attempt, PlanError> {
        let (standing, credits, term) = {
            let b = &self.state.buckets[idx];
            (b.standing(), b.credits, b.term)
        };
        if let Some(c) = group.iter().find(|c| !c.is_eligible(standing)) {
            debug!(course = %c.course_id, bucket = idx, ?standing, "standing not eligible");
            return Ok(Attempt::Standing);
        }
        if credits + group_credits > self.max_credits {
            debug!(bucket = idx, credits, adding = group_credits, cap = self.max_credits, "credit cap reached");
            return Ok(Attempt::Cap);
        }

        let mut groups: Vec<CandidateGroup> = Vec::new();
        for c in group.iter() {
            let cands = self.candidates(&c.course_id, term)?;
            if !cands.is_empty() {
                groups.push(CandidateGroup { course_id: c.course_id.clone(), candidates: cands });
            }
        }
        // Sin secciones ofrecidas para este término: se acepta sin más.
        if groups.is_empty() {
            self.commit(idx, group, group_credits, Vec::new());
            return Ok(Attempt::Placed);
        }

        let committed: Vec<String> = self.state.buckets[idx].courses.iter().map(|p| p.course_id.clone()).collect();
        for code in committed {
            let cands = self.candidates(&code, term)?;
            if !cands.is_empty() {
                groups.push(CandidateGroup { course_id: code, candidates: cands });
            }
        }

        match select_non_conflicting_sections(&groups, self.config.max_resolver_steps) {
            Resolution::Found(sections) => {
                let chosen: Vec<(String, Section)> =
                    groups.into_iter().map(|g| g.course_id).zip(sections).collect();
                self.commit(idx, group, group_credits, chosen);
                Ok(Attempt::Placed)
            }
            Resolution::Conflict => {
                debug!(bucket = idx, term = %term, "no conflict-free section combination");
                Ok(Attempt::Sections)
            }
            Resolution::BudgetExhausted => {
                warn!(bucket = idx, term = %term, steps = self.config.max_resolver_steps, "section search budget exhausted");
                Ok(Attempt::Sections)
            }
        }
    }

    fn commit(&mut self, idx: usize, group: &[&Course], group_credits: u32, chosen: Vec<(String, Section)>) {
        let bucket = &mut self.state.buckets[idx];
        for c in group.iter() {
            bucket.courses.push(PlacedCourse::unsectioned(&c.course_id, c.credits));
        }
        bucket.credits += group_credits;
        // las secciones de cursos ya comprometidos pueden cambiar
        for (code, section) in chosen.iter() {
            if let Some(p) = bucket.courses.iter_mut().find(|p| p.course_id == *code) {
                p.set_section(section);
            }
        }
        for later in self.state.buckets.iter_mut().skip(idx + 1) {
            later.projected_credits += group_credits;
        }
        for c in group.iter() {
            self.state.assigned.insert(c.course_id.clone(), idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::expand::{expand, MinRemainingCredits};
    use crate::algorithm::sequence::sequence;
    use crate::catalog::InMemoryCatalog;
    use crate::models::{CourseRef, Meeting, Quarter, Requirement, Standing, Weekday};

    fn first_term() -> Term {
        Term::new(2025, Quarter::Winter)
    }

    fn section(course: &str, id: &str, term: Term, day: Weekday, start: &str, end: &str) -> Section {
        Section {
            section_id: id.to_string(),
            course_id: course.to_string(),
            term,
            meetings: vec![Meeting::new(day, start, end)],
            location: "OMH 128".to_string(),
            instructor: "Staff".to_string(),
        }
    }

    fn run(cat: &InMemoryCatalog, seed: &[&str], cap: u32, completed_credits: u32) -> Result<PlanState, PlanError> {
        let seed: BTreeSet<String> = seed.iter().map(|s| s.to_string()).collect();
        let exp = expand(cat, &seed, &BTreeSet::new(), &MinRemainingCredits)?;
        let order = sequence(&exp)?;
        let cfg = PlannerConfig { horizon: 8, ..PlannerConfig::default() };
        let state = PlanState::new(seed, BTreeSet::new(), completed_credits, first_term());
        QuarterAssigner::new(cat, &cfg, cap, state).assign_all(&order, &exp)
    }

    #[test]
    fn test_cap_pushes_course_to_next_bucket() {
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("CSC 1230", 5))
            .with_course(Course::new("MAT 1720", 5));
        let st = run(&cat, &["CSC 1230", "MAT 1720"], 5, 0).unwrap();
        assert_eq!(st.assigned["CSC 1230"], 0);
        assert_eq!(st.assigned["MAT 1720"], 1);
        assert_eq!(st.buckets[1].projected_credits, 5);
    }

    #[test]
    fn test_corequisites_share_bucket_and_credits() {
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("CHM 1211", 5).with_corequisites(&["CHM 1214"]))
            .with_course(Course::new("CHM 1214", 1));
        let st = run(&cat, &["CHM 1211"], 6, 0).unwrap();
        assert_eq!(st.assigned["CHM 1211"], st.assigned["CHM 1214"]);
        assert_eq!(st.buckets[0].credits, 6);
    }

    #[test]
    fn test_group_above_cap_fails_fast() {
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("CHM 1211", 5).with_corequisites(&["CHM 1214"]))
            .with_course(Course::new("CHM 1214", 1));
        match run(&cat, &["CHM 1211"], 5, 0) {
            Err(PlanError::UnplaceableCourse { reason, .. }) => assert_eq!(reason, BlockReason::CreditCapTooLow),
            other => panic!("expected cap failure, got {:?}", other),
        }
    }

    #[test]
    fn test_prerequisite_held_by_another_group_is_placed_first() {
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("AAA 1000", 5).with_corequisites(&["AAA 1001"]))
            .with_course(
                Course::new("AAA 1001", 5)
                    .with_prerequisites(Requirement::all_of(vec![CourseRef::new("BBB 1000", 5)])),
            )
            .with_course(Course::new("BBB 1000", 5))
            .with_course(Course::new("ZZZ 1000", 5).with_corequisites(&["BBB 1000"]));
        let st = run(&cat, &["AAA 1000", "ZZZ 1000"], 15, 0).unwrap();
        assert_eq!(st.assigned["BBB 1000"], 0);
        assert_eq!(st.assigned["ZZZ 1000"], 0);
        assert_eq!(st.assigned["AAA 1000"], 1);
        assert_eq!(st.assigned["AAA 1001"], 1);
    }

    #[test]
    fn test_shared_corequisite_keeps_both_courses_in_its_quarter() {
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("CHM 1211", 5).with_corequisites(&["CHM 1214"]))
            .with_course(Course::new("CHM 1212", 10).with_corequisites(&["CHM 1214"]))
            .with_course(Course::new("CHM 1214", 1));
        let st = run(&cat, &["CHM 1211", "CHM 1212"], 16, 0).unwrap();
        assert_eq!(st.assigned["CHM 1211"], 0);
        assert_eq!(st.assigned["CHM 1212"], 0);
        assert_eq!(st.assigned["CHM 1214"], 0);
    }

    #[test]
    fn test_shared_corequisite_quarter_full_is_unplaceable() {
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("CHM 1211", 5).with_corequisites(&["CHM 1214"]))
            .with_course(Course::new("CHM 1212", 10).with_corequisites(&["CHM 1214"]))
            .with_course(Course::new("CHM 1214", 1));
        match run(&cat, &["CHM 1211", "CHM 1212"], 11, 0) {
            Err(PlanError::UnplaceableCourse { course, reason }) => {
                assert_eq!(course, "CHM 1212");
                assert_eq!(reason, BlockReason::CreditCapTooLow);
            }
            other => panic!("expected CHM 1212 to be unplaceable, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_prerequisite_may_share_bucket() {
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("MAT 1221", 5))
            .with_course(
                Course::new("PHY 1121", 5)
                    .with_prerequisites(Requirement::all_of(vec![CourseRef::new("MAT 1221", 5).concurrent()])),
            );
        let st = run(&cat, &["PHY 1121"], 15, 0).unwrap();
        assert_eq!(st.assigned["MAT 1221"], 0);
        assert_eq!(st.assigned["PHY 1121"], 0);
    }

    #[test]
    fn test_standing_waits_for_enough_credits() {
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("CSC 1230", 5))
            .with_course(Course::new("CSC 4899", 5).with_standings(&[Standing::Senior]));
        let st = run(&cat, &["CSC 1230", "CSC 4899"], 5, 130).unwrap();
        assert_eq!(st.assigned["CSC 1230"], 0);
        let idx = st.assigned["CSC 4899"];
        assert!(st.buckets[idx].projected_credits >= 135);
        assert_eq!(idx, 1);
    }

    #[test]
    fn test_standing_never_reached() {
        let cat = InMemoryCatalog::new().with_course(Course::new("CSC 4899", 5).with_standings(&[Standing::Senior]));
        match run(&cat, &["CSC 4899"], 15, 0) {
            Err(PlanError::UnplaceableCourse { reason, .. }) => assert_eq!(reason, BlockReason::StandingNeverReached),
            other => panic!("expected standing failure, got {:?}", other),
        }
    }

    #[test]
    fn test_committed_section_is_rechosen_to_fit_newcomer() {
        let t = first_term();
        let cat = InMemoryCatalog::new()
            .with_course(Course::new("CSC 1230", 5))
            .with_course(Course::new("MAT 1720", 5))
            .with_section(section("CSC 1230", "100", t, Weekday::Monday, "9:00 AM", "9:50 AM"))
            .with_section(section("CSC 1230", "101", t, Weekday::Monday, "11:00 AM", "11:50 AM"))
            .with_section(section("MAT 1720", "200", t, Weekday::Monday, "9:00", "9:50"));
        let st = run(&cat, &["CSC 1230", "MAT 1720"], 15, 0).unwrap();
        assert_eq!(st.assigned["MAT 1720"], 0);
        let b = &st.buckets[0];
        let csc = b.courses.iter().find(|c| c.course_id == "CSC 1230").unwrap();
        let mat = b.courses.iter().find(|c| c.course_id == "MAT 1720").unwrap();
        assert_eq!(csc.section_id.as_deref(), Some("101"));
        assert_eq!(mat.section_id.as_deref(), Some("200"));
    }

    #[test]
    fn test_cancel_is_observed_before_placement() {
        let cat = InMemoryCatalog::new().with_course(Course::new("MAT 1720", 5));
        let seed: BTreeSet<String> = ["MAT 1720".to_string()].into_iter().collect();
        let exp = expand(&cat, &seed, &BTreeSet::new(), &MinRemainingCredits).unwrap();
        let order = sequence(&exp).unwrap();
        let cfg = PlannerConfig::default();
        let flag = CancelFlag::new();
        flag.cancel();
        let state = PlanState::new(seed, BTreeSet::new(), 0, first_term());
        let res = QuarterAssigner::new(&cat, &cfg, 15, state).with_cancel(Some(flag)).assign_all(&order, &exp);
        assert!(matches!(res, Err(PlanError::Cancelled)));
    }
}
