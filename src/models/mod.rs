// Estructuras de datos principales
mod term;

pub use term::{Quarter, Term, TermRange};

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Nivel de clase derivado de los créditos acumulados.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    Freshman,
    Sophomore,
    Junior,
    Senior,
}

impl Standing {
    pub const ALL: [Standing; 4] = [Standing::Freshman, Standing::Sophomore, Standing::Junior, Standing::Senior];

    /// Umbrales: <45 freshman, <90 sophomore, <135 junior, resto senior.
    pub fn from_credits(credits: u32) -> Standing {
        match credits {
            0..=44 => Standing::Freshman,
            45..=89 => Standing::Sophomore,
            90..=134 => Standing::Junior,
            _ => Standing::Senior,
        }
    }

    pub fn parse(label: &str) -> Option<Standing> {
        match label.trim().to_lowercase().as_str() {
            "freshman" => Some(Standing::Freshman),
            "sophomore" => Some(Standing::Sophomore),
            "junior" => Some(Standing::Junior),
            "senior" => Some(Standing::Senior),
            _ => None,
        }
    }
}

/// Un miembro de una alternativa de prerequisitos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    pub course_id: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub credits: u32,
    #[serde(default)]
    pub concurrent_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_grade: Option<String>,
}

impl CourseRef {
    pub fn new(course_id: &str, credits: u32) -> Self {
        CourseRef {
            course_id: course_id.to_string(),
            credits,
            concurrent_available: false,
            min_grade: None,
        }
    }

    pub fn concurrent(mut self) -> Self {
        self.concurrent_available = true;
        self
    }
}

/// Lista AND de miembros: se cumple cuando todos están aprobados.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alternative {
    pub members: Vec<CourseRef>,
}

impl Alternative {
    pub fn new(members: Vec<CourseRef>) -> Self {
        Alternative { members }
    }
}

/// OR de alternativas. Sin alternativas = sin prerequisitos.
///
/// En JSON se representa como `[[{course_id, ...}, ...], ...]`, el mismo
/// formato que guarda la columna `prerequisites` del catálogo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirement {
    pub alternatives: Vec<Alternative>,
}

impl Requirement {
    pub fn none() -> Self {
        Requirement::default()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Requisito de una sola alternativa con todos los miembros dados.
    pub fn all_of(members: Vec<CourseRef>) -> Self {
        Requirement { alternatives: vec![Alternative::new(members)] }
    }

    /// Requisito con una alternativa por miembro.
    pub fn any_of(members: Vec<CourseRef>) -> Self {
        Requirement {
            alternatives: members.into_iter().map(|m| Alternative::new(vec![m])).collect(),
        }
    }

    /// Completa los créditos de cada miembro usando `lookup` (el texto del
    /// catálogo no trae créditos por miembro).
    pub fn with_credits<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<u32>,
    {
        for alt in self.alternatives.iter_mut() {
            for m in alt.members.iter_mut() {
                if m.credits == 0 {
                    if let Some(c) = lookup(&m.course_id) {
                        m.credits = c;
                    }
                }
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(alias = "code")]
    pub course_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub credits: u32,
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Vacío = todos los niveles son elegibles.
    #[serde(default, alias = "standing")]
    pub eligible_standings: BTreeSet<Standing>,
    #[serde(default)]
    pub prerequisites: Requirement,
    #[serde(default)]
    pub corequisites: Vec<String>,
}

impl Course {
    pub fn new(course_id: &str, credits: u32) -> Self {
        Course {
            course_id: course_id.to_string(),
            name: String::new(),
            credits,
            attributes: Vec::new(),
            eligible_standings: BTreeSet::new(),
            prerequisites: Requirement::none(),
            corequisites: Vec::new(),
        }
    }

    pub fn with_prerequisites(mut self, req: Requirement) -> Self {
        self.prerequisites = req;
        self
    }

    pub fn with_corequisites(mut self, coreqs: &[&str]) -> Self {
        self.corequisites = coreqs.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_standings(mut self, standings: &[Standing]) -> Self {
        self.eligible_standings = standings.iter().copied().collect();
        self
    }

    pub fn is_eligible(&self, standing: Standing) -> bool {
        self.eligible_standings.is_empty() || self.eligible_standings.contains(&standing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "M", alias = "Mon", alias = "Monday")]
    Monday,
    #[serde(rename = "T", alias = "Tu", alias = "Tue", alias = "Tuesday")]
    Tuesday,
    #[serde(rename = "W", alias = "Wed", alias = "Wednesday")]
    Wednesday,
    #[serde(rename = "R", alias = "Th", alias = "Thu", alias = "Thursday")]
    Thursday,
    #[serde(rename = "F", alias = "Fri", alias = "Friday")]
    Friday,
    #[serde(rename = "S", alias = "Sat", alias = "Saturday")]
    Saturday,
    #[serde(rename = "U", alias = "Sun", alias = "Sunday")]
    Sunday,
}

impl Weekday {
    pub fn parse(token: &str) -> Option<Weekday> {
        let t = token.trim().to_lowercase();
        match t.as_str() {
            "m" | "mo" | "mon" | "monday" => Some(Weekday::Monday),
            "t" | "tu" | "tue" | "tues" | "tuesday" => Some(Weekday::Tuesday),
            "w" | "we" | "wed" | "wednesday" => Some(Weekday::Wednesday),
            "r" | "th" | "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thursday),
            "f" | "fr" | "fri" | "friday" => Some(Weekday::Friday),
            "s" | "sa" | "sat" | "saturday" => Some(Weekday::Saturday),
            "u" | "su" | "sun" | "sunday" => Some(Weekday::Sunday),
            _ => None,
        }
    }
}

/// Una reunión semanal. Las horas se guardan tal como vienen del catálogo
/// ("1:30 PM", "13:30"); se normalizan a minutos al comparar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub weekday: Weekday,
    pub start_time: String,
    pub end_time: String,
}

impl Meeting {
    pub fn new(weekday: Weekday, start_time: &str, end_time: &str) -> Self {
        Meeting {
            weekday,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub section_id: String,
    pub course_id: String,
    pub term: Term,
    #[serde(default, alias = "classes")]
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub instructor: String,
}

/// Curso asignado a un trimestre, con la sección elegida si la hay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedCourse {
    pub course_id: String,
    pub credits: u32,
    pub section_id: Option<String>,
    pub location: Option<String>,
    pub instructor: Option<String>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
}

impl PlacedCourse {
    pub fn unsectioned(course_id: &str, credits: u32) -> Self {
        PlacedCourse {
            course_id: course_id.to_string(),
            credits,
            section_id: None,
            location: None,
            instructor: None,
            meetings: Vec::new(),
        }
    }

    pub fn set_section(&mut self, section: &Section) {
        self.section_id = Some(section.section_id.clone());
        self.location = Some(section.location.clone());
        self.instructor = Some(section.instructor.clone());
        self.meetings = section.meetings.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterBucket {
    /// 0 = el término siguiente al de referencia.
    pub index: usize,
    pub term: Term,
    /// Créditos acumulados antes de empezar este trimestre.
    pub projected_credits: u32,
    pub credits: u32,
    pub courses: Vec<PlacedCourse>,
}

impl QuarterBucket {
    pub fn new(index: usize, term: Term, projected_credits: u32) -> Self {
        QuarterBucket {
            index,
            term,
            projected_credits,
            credits: 0,
            courses: Vec::new(),
        }
    }

    pub fn standing(&self) -> Standing {
        Standing::from_credits(self.projected_credits)
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.courses.iter().any(|c| c.course_id == course_id)
    }
}

/// Resultado final: trimestres en orden cronológico.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub reference_term: Term,
    pub max_credits: u32,
    pub quarters: Vec<QuarterBucket>,
}

impl Plan {
    pub fn quarter_of(&self, course_id: &str) -> Option<usize> {
        self.quarters.iter().find(|q| q.contains(course_id)).map(|q| q.index)
    }

    pub fn course_count(&self) -> usize {
        self.quarters.iter().map(|q| q.courses.len()).sum()
    }

    pub fn total_credits(&self) -> u32 {
        self.quarters.iter().map(|q| q.credits).sum()
    }
}

/// Entrada del llamador.
///
/// ```json
/// {
///   "maxCredits": 15,
///   "completedCredits": 30,
///   "completedCourses": ["CSC 1230"],
///   "finalCourses": ["CSC 2430", "CSC 2431"],
///   "referenceTerm": { "year": 2024, "quarter": "autumn" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub max_credits: u32,
    #[serde(alias = "mandatoryCourses")]
    pub final_courses: BTreeSet<String>,
    #[serde(default)]
    pub completed_courses: BTreeSet<String>,
    #[serde(default)]
    pub completed_credits: u32,
    #[serde(default)]
    pub reference_term: Option<Term>,
}

impl PlanRequest {
    pub fn new(max_credits: u32, final_courses: &[&str], reference_term: Term) -> Self {
        PlanRequest {
            max_credits,
            final_courses: final_courses.iter().map(|c| c.to_string()).collect(),
            completed_courses: BTreeSet::new(),
            completed_credits: 0,
            reference_term: Some(reference_term),
        }
    }

    pub fn with_completed(mut self, courses: &[&str], credits: u32) -> Self {
        self.completed_courses = courses.iter().map(|c| c.to_string()).collect();
        self.completed_credits = credits;
        self
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(0))
}
