// Acceso al catálogo de cursos y secciones (sólo lectura durante una ejecución).
mod cache;
pub mod excel;
mod sqlite;

pub use cache::CachedCatalog;
pub use sqlite::SqliteCatalog;

use crate::error::CatalogError;
use crate::models::{Course, Section, TermRange};
use crate::requirements::CourseText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Fuente de cursos y secciones. Las implementaciones deben ser seguras
/// para compartir entre ejecuciones concurrentes.
pub trait CatalogAccessor: Send + Sync {
    /// Devuelve un registro por id solicitado. Si falta alguno, falla con
    /// `CatalogError::NotFound` listando todos los ids desconocidos.
    fn get_courses(&self, ids: &[String]) -> Result<Vec<Course>, CatalogError>;

    /// Secciones ofrecidas para `course_id` en los términos del rango.
    fn get_sections(&self, course_id: &str, range: &TermRange) -> Result<Vec<Section>, CatalogError>;
}

impl<C: CatalogAccessor + ?Sized> CatalogAccessor for std::sync::Arc<C> {
    fn get_courses(&self, ids: &[String]) -> Result<Vec<Course>, CatalogError> {
        (**self).get_courses(ids)
    }

    fn get_sections(&self, course_id: &str, range: &TermRange) -> Result<Vec<Section>, CatalogError> {
        (**self).get_sections(course_id, range)
    }
}

/// Documento JSON del catálogo: `{ "courses": [...], "sections": [...] }`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// Catálogo en memoria, usado por los tests y por el loader JSON.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    courses: BTreeMap<String, Course>,
    sections: BTreeMap<String, Vec<Section>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        InMemoryCatalog::default()
    }

    pub fn with_course(mut self, course: Course) -> Self {
        self.insert_course(course);
        self
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.insert_section(section);
        self
    }

    pub fn insert_course(&mut self, course: Course) {
        self.courses.insert(course.course_id.clone(), course);
    }

    pub fn insert_section(&mut self, section: Section) {
        self.sections.entry(section.course_id.clone()).or_default().push(section);
    }

    pub fn extend_sections<I: IntoIterator<Item = Section>>(&mut self, sections: I) {
        for s in sections {
            self.insert_section(s);
        }
    }

    /// Agrega cursos desde filas de texto del catálogo. Los créditos de los
    /// miembros de prerequisitos se buscan en el lote y luego en lo ya cargado.
    pub fn import_course_texts(&mut self, rows: &[CourseText]) -> usize {
        let batch: BTreeMap<&str, u32> =
            rows.iter().filter_map(|r| r.credits.map(|c| (r.code.as_str(), c))).collect();
        let courses: Vec<Course> = rows
            .iter()
            .filter(|r| !r.code.is_empty())
            .map(|r| r.to_course(|code| batch.get(code).copied().or_else(|| self.courses.get(code).map(|c| c.credits))))
            .collect();
        let n = courses.len();
        for c in courses {
            self.insert_course(c);
        }
        n
    }

    pub fn course_count(&self) -> usize {
        self.courses.len()
    }

    pub fn section_count(&self) -> usize {
        self.sections.values().map(|v| v.len()).sum()
    }

    pub fn from_document(doc: CatalogDocument) -> Self {
        let mut cat = InMemoryCatalog::new();
        for c in doc.courses {
            cat.insert_course(c);
        }
        cat.extend_sections(doc.sections);
        cat
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(json).map_err(|e| CatalogError::Decode {
            what: "catalog document".to_string(),
            reason: e.to_string(),
        })?;
        Ok(InMemoryCatalog::from_document(doc))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cat = InMemoryCatalog::from_json_str(&raw)?;
        info!(
            path = %path.as_ref().display(),
            courses = cat.course_count(),
            sections = cat.section_count(),
            "catalog loaded from JSON"
        );
        Ok(cat)
    }
}

impl CatalogAccessor for InMemoryCatalog {
    fn get_courses(&self, ids: &[String]) -> Result<Vec<Course>, CatalogError> {
        let mut out = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.courses.get(id) {
                Some(c) => out.push(c.clone()),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(CatalogError::NotFound { ids: missing });
        }
        Ok(out)
    }

    fn get_sections(&self, course_id: &str, range: &TermRange) -> Result<Vec<Section>, CatalogError> {
        Ok(self
            .sections
            .get(course_id)
            .map(|v| v.iter().filter(|s| range.contains(&s.term)).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Quarter, Term};

    #[test]
    fn test_missing_courses_are_all_reported() {
        let cat = InMemoryCatalog::new().with_course(Course::new("MAT 1720", 5));
        let ids = vec!["MAT 1720".to_string(), "CSC 1230".to_string(), "CSC 2430".to_string()];
        match cat.get_courses(&ids) {
            Err(CatalogError::NotFound { ids }) => assert_eq!(ids, vec!["CSC 1230", "CSC 2430"]),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_json_document_with_original_column_shapes() {
        let json = r#"{
            "courses": [
                {"code": "CSC 2430", "credits": 5, "standing": ["sophomore", "junior"],
                 "prerequisites": [[{"course_id": "CSC 1230", "min_grade": "C-", "concurrent_available": false}]],
                 "corequisites": []},
                {"course_id": "CSC 1230", "credits": null}
            ],
            "sections": [
                {"section_id": "20341", "course_id": "CSC 2430", "term": {"year": 2025, "quarter": "winter"},
                 "classes": [{"weekday": "M", "start_time": "9:00 AM", "end_time": "9:50 AM"}],
                 "location": "OMH 128", "instructor": "Ada"}
            ]
        }"#;
        let cat = InMemoryCatalog::from_json_str(json).unwrap();
        let courses = cat.get_courses(&["CSC 2430".to_string(), "CSC 1230".to_string()]).unwrap();
        assert_eq!(courses[0].prerequisites.alternatives.len(), 1);
        assert_eq!(courses[0].prerequisites.alternatives[0].members[0].min_grade.as_deref(), Some("C-"));
        assert_eq!(courses[1].credits, 0);
        let winter = TermRange::single(Term::new(2025, Quarter::Winter));
        assert_eq!(cat.get_sections("CSC 2430", &winter).unwrap().len(), 1);
        let spring = TermRange::single(Term::new(2025, Quarter::Spring));
        assert!(cat.get_sections("CSC 2430", &spring).unwrap().is_empty());
    }
}
