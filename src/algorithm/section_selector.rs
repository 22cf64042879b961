use crate::algorithm::conflict::{section_slots, slot_lists_conflict, Slot};
use crate::models::Section;

/// Candidatos de un curso dentro de un trimestre.
#[derive(Debug, Clone)]
pub struct CandidateGroup {
    pub course_id: String,
    pub candidates: Vec<Section>,
}

/// Resultado de la búsqueda de secciones para un trimestre.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Una sección por grupo, en el mismo orden que los grupos de entrada.
    Found(Vec<Section>),
    /// No existe combinación sin choques.
    Conflict,
    /// Se agotó el presupuesto de pasos antes de decidir.
    BudgetExhausted,
}

struct Search<'a> {
    groups: Vec<Vec<(&'a Section, Vec<Slot>)>>,
    chosen: Vec<usize>,
    steps: usize,
    max_steps: usize,
}

enum Step {
    Done,
    Dead,
    OutOfBudget,
}

impl<'a> Search<'a> {
    fn backtrack(&mut self, pos: usize) -> Step {
        if pos == self.groups.len() {
            return Step::Done;
        }
        for cand in 0..self.groups[pos].len() {
            self.steps += 1;
            if self.steps > self.max_steps {
                return Step::OutOfBudget;
            }
            let slots = &self.groups[pos][cand].1;
            let clashes = self
                .chosen
                .iter()
                .enumerate()
                .any(|(g, &c)| slot_lists_conflict(&self.groups[g][c].1, slots));
            if clashes {
                continue;
            }
            self.chosen.push(cand);
            match self.backtrack(pos + 1) {
                Step::Done => return Step::Done,
                Step::OutOfBudget => return Step::OutOfBudget,
                Step::Dead => {
                    self.chosen.pop();
                }
            }
        }
        Step::Dead
    }
}

/// Elige exactamente una `Section` por grupo sin solapamientos semanales.
///
/// Estrategia: backtracking en el orden dado (el llamador pone primero los
/// cursos que se están colocando y después los ya comprometidos en el
/// trimestre); dentro de cada grupo las secciones se prueban ordenadas por
/// `section_id`, así que el resultado es determinista. `max_steps` acota el
/// número de candidatos probados.
pub fn select_non_conflicting_sections(groups: &[CandidateGroup], max_steps: usize) -> Resolution {
    if groups.is_empty() {
        return Resolution::Found(Vec::new());
    }
    if groups.iter().any(|g| g.candidates.is_empty()) {
        return Resolution::Conflict;
    }

    let prepared: Vec<Vec<(&Section, Vec<Slot>)>> = groups
        .iter()
        .map(|g| {
            let mut v: Vec<&Section> = g.candidates.iter().collect();
            v.sort_by(|a, b| a.section_id.cmp(&b.section_id));
            v.into_iter().map(|s| (s, section_slots(s))).collect()
        })
        .collect();

    let mut search = Search {
        groups: prepared,
        chosen: Vec::with_capacity(groups.len()),
        steps: 0,
        max_steps,
    };

    match search.backtrack(0) {
        Step::Done => Resolution::Found(
            search
                .chosen
                .iter()
                .enumerate()
                .map(|(g, &c)| search.groups[g][c].0.clone())
                .collect(),
        ),
        Step::Dead => Resolution::Conflict,
        Step::OutOfBudget => Resolution::BudgetExhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meeting, Quarter, Term, Weekday};

    fn sec(course: &str, id: &str, day: Weekday, start: &str, end: &str) -> Section {
        Section {
            section_id: id.to_string(),
            course_id: course.to_string(),
            term: Term::new(2025, Quarter::Winter),
            meetings: vec![Meeting::new(day, start, end)],
            location: String::new(),
            instructor: String::new(),
        }
    }

    fn group(course: &str, candidates: Vec<Section>) -> CandidateGroup {
        CandidateGroup { course_id: course.to_string(), candidates }
    }

    #[test]
    fn test_backtracks_to_second_candidate() {
        let groups = vec![
            group("A", vec![
                sec("A", "a1", Weekday::Monday, "9:00 AM", "9:50 AM"),
                sec("A", "a2", Weekday::Monday, "11:00 AM", "11:50 AM"),
            ]),
            group("B", vec![sec("B", "b1", Weekday::Monday, "9:00 AM", "9:50 AM")]),
        ];
        match select_non_conflicting_sections(&groups, 1000) {
            Resolution::Found(secs) => {
                assert_eq!(secs[0].section_id, "a2");
                assert_eq!(secs[1].section_id, "b1");
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_all_clash_is_conflict() {
        let groups = vec![
            group("A", vec![sec("A", "a1", Weekday::Monday, "9:00 AM", "9:50 AM")]),
            group("B", vec![sec("B", "b1", Weekday::Monday, "9:10 AM", "10:00 AM")]),
        ];
        assert_eq!(select_non_conflicting_sections(&groups, 1000), Resolution::Conflict);
    }

    #[test]
    fn test_budget_is_enforced() {
        let many: Vec<Section> = (0..50)
            .map(|i| sec("A", &format!("a{:02}", i), Weekday::Monday, "9:00 AM", "9:50 AM"))
            .collect();
        let groups = vec![
            group("A", many),
            group("B", vec![sec("B", "b1", Weekday::Monday, "9:00 AM", "9:50 AM")]),
        ];
        assert_eq!(select_non_conflicting_sections(&groups, 10), Resolution::BudgetExhausted);
    }

    #[test]
    fn test_deterministic_choice_by_section_id() {
        let groups = vec![group("A", vec![
            sec("A", "z9", Weekday::Tuesday, "9:00 AM", "9:50 AM"),
            sec("A", "a1", Weekday::Tuesday, "1:00 PM", "1:50 PM"),
        ])];
        match select_non_conflicting_sections(&groups, 100) {
            Resolution::Found(secs) => assert_eq!(secs[0].section_id, "a1"),
            other => panic!("expected Found, got {:?}", other),
        }
    }
}
