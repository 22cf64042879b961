// Catálogo respaldado por SQLite. Mismas tablas `course` y `section` que
// genera el importador: prerequisitos, corequisitos y reuniones (`classes`)
// van como JSON; atributos y nivel como texto separado por comas.

use super::CatalogAccessor;
use crate::error::CatalogError;
use crate::models::{Course, Meeting, Quarter, Requirement, Section, Standing, Term, TermRange};
use crate::requirements::{parse_standing_restriction, CourseText};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteCatalog(..)")
    }
}

fn decode<T: serde::de::DeserializeOwned>(what: &str, raw: &str) -> Result<T, CatalogError> {
    serde_json::from_str(raw).map_err(|e| CatalogError::Decode {
        what: what.to_string(),
        reason: e.to_string(),
    })
}

fn encode<T: serde::Serialize>(what: &str, value: &T) -> Result<String, CatalogError> {
    serde_json::to_string(value).map_err(|e| CatalogError::Decode {
        what: what.to_string(),
        reason: e.to_string(),
    })
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.filter(|s| !s.eq_ignore_ascii_case("null"))
        .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
        .unwrap_or_default()
}

fn standing_column(set: &BTreeSet<Standing>) -> Option<String> {
    if set.is_empty() {
        return None;
    }
    let names: Vec<&str> = set
        .iter()
        .map(|s| match s {
            Standing::Freshman => "Freshman",
            Standing::Sophomore => "Sophomore",
            Standing::Junior => "Junior",
            Standing::Senior => "Senior",
        })
        .collect();
    Some(names.join(", "))
}

// La columna standing manda; restrictions ("Senior students only") sólo
// cuando standing está vacía.
fn eligible_standings(standing: Option<String>, restrictions: Option<String>) -> BTreeSet<Standing> {
    let parsed = standing.map(|s| parse_standing_restriction(&s)).unwrap_or_default();
    if !parsed.is_empty() {
        return parsed;
    }
    restrictions.map(|r| parse_standing_restriction(&r)).unwrap_or_default()
}

impl SqliteCatalog {
    /// Abre (o crea) la base y asegura que existan las tablas.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        let cat = SqliteCatalog { conn: Mutex::new(conn) };
        cat.init_schema()?;
        info!(path = %path.as_ref().display(), "sqlite catalog opened");
        Ok(cat)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let cat = SqliteCatalog { conn: Mutex::new(Connection::open_in_memory()?) };
        cat.init_schema()?;
        Ok(cat)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Storage("sqlite connection mutex poisoned".to_string()))
    }

    pub fn init_schema(&self) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS course (
                code TEXT PRIMARY KEY,
                name TEXT,
                description TEXT,
                credits INTEGER,
                attributes TEXT,
                standing TEXT,
                restrictions TEXT,
                prerequisites TEXT,
                corequisites TEXT,
                approval_required INTEGER DEFAULT 0
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS section (
                section_id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                year INTEGER NOT NULL,
                quarter TEXT NOT NULL,
                classes TEXT,
                location TEXT,
                instructor TEXT
            )",
            [],
        )?;
        conn.execute("CREATE INDEX IF NOT EXISTS section_course ON section (course_id, year, quarter)", [])?;
        Ok(())
    }

    pub fn insert_course(&self, course: &Course) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        SqliteCatalog::write_course(&conn, course, None, None)
    }

    /// Importa filas de texto del catálogo. Los créditos de cada miembro de
    /// un prerequisito salen del propio lote o, si no está ahí, de la base.
    /// Devuelve cuántos cursos se escribieron.
    pub fn import_course_texts(&self, rows: &[CourseText]) -> Result<usize, CatalogError> {
        let batch: BTreeMap<&str, u32> =
            rows.iter().filter_map(|r| r.credits.map(|c| (r.code.as_str(), c))).collect();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        for row in rows.iter().filter(|r| !r.code.is_empty()) {
            let course = row.to_course(|code| {
                batch.get(code).copied().or_else(|| {
                    tx.query_row("SELECT credits FROM course WHERE code = ?1", params![code], |r| r.get::<_, Option<i64>>(0))
                        .optional()
                        .ok()
                        .flatten()
                        .flatten()
                        .and_then(|c| u32::try_from(c).ok())
                })
            });
            let restrictions = Some(row.restrictions.trim()).filter(|r| !r.is_empty());
            let description = Some(row.description.trim()).filter(|d| !d.is_empty());
            SqliteCatalog::write_course(&tx, &course, restrictions, description)?;
            tx.execute(
                "UPDATE course SET approval_required = ?2 WHERE code = ?1",
                params![course.course_id, row.approval_required],
            )?;
            written += 1;
        }
        tx.commit()?;
        debug!(courses = written, "catalog text rows imported");
        Ok(written)
    }

    fn write_course(
        conn: &Connection,
        course: &Course,
        restrictions: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), CatalogError> {
        let prereqs = if course.prerequisites.is_empty() {
            None
        } else {
            Some(encode("prerequisites", &course.prerequisites)?)
        };
        let coreqs = if course.corequisites.is_empty() {
            None
        } else {
            Some(encode("corequisites", &course.corequisites)?)
        };
        let attributes = if course.attributes.is_empty() { None } else { Some(course.attributes.join(",")) };
        conn.execute(
            "INSERT OR REPLACE INTO course
                (code, name, description, credits, attributes, standing, restrictions, prerequisites, corequisites)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                course.course_id,
                course.name,
                description,
                course.credits,
                attributes,
                standing_column(&course.eligible_standings),
                restrictions,
                prereqs,
                coreqs,
            ],
        )?;
        Ok(())
    }

    pub fn insert_section(&self, section: &Section) -> Result<(), CatalogError> {
        let classes = encode("classes", &section.meetings)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO section (section_id, course_id, year, quarter, classes, location, instructor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                section.section_id,
                section.course_id,
                section.term.year,
                section.term.quarter.label(),
                classes,
                section.location,
                section.instructor,
            ],
        )?;
        Ok(())
    }

    fn load_course(conn: &Connection, code: &str) -> Result<Option<Course>, CatalogError> {
        let row = conn
            .query_row(
                "SELECT code, name, credits, attributes, standing, prerequisites, corequisites, restrictions
                 FROM course WHERE code = ?1",
                params![code],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, Option<String>>(1)?,
                        r.get::<_, Option<i64>>(2)?,
                        r.get::<_, Option<String>>(3)?,
                        r.get::<_, Option<String>>(4)?,
                        r.get::<_, Option<String>>(5)?,
                        r.get::<_, Option<String>>(6)?,
                        r.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((code, name, credits, attributes, standing, prereqs, coreqs, restrictions)) = row else {
            return Ok(None);
        };
        let prerequisites: Requirement = match prereqs.filter(|p| !p.eq_ignore_ascii_case("null")) {
            Some(raw) => decode(&format!("prerequisites of {}", code), &raw)?,
            None => Requirement::none(),
        };
        let corequisites: Vec<String> = match coreqs.filter(|p| !p.eq_ignore_ascii_case("null")) {
            Some(raw) => decode(&format!("corequisites of {}", code), &raw)?,
            None => Vec::new(),
        };
        Ok(Some(Course {
            course_id: code,
            name: name.unwrap_or_default(),
            credits: credits.and_then(|c| u32::try_from(c).ok()).unwrap_or(0),
            attributes: split_list(attributes),
            eligible_standings: eligible_standings(standing, restrictions),
            prerequisites,
            corequisites,
        }))
    }
}

impl CatalogAccessor for SqliteCatalog {
    fn get_courses(&self, ids: &[String]) -> Result<Vec<Course>, CatalogError> {
        let conn = self.lock()?;
        let mut out = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match SqliteCatalog::load_course(&conn, id)? {
                Some(c) => out.push(c),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(CatalogError::NotFound { ids: missing });
        }
        Ok(out)
    }

    fn get_sections(&self, course_id: &str, range: &TermRange) -> Result<Vec<Section>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT section_id, year, quarter, classes, location, instructor
             FROM section WHERE course_id = ?1 AND year BETWEEN ?2 AND ?3
             ORDER BY section_id",
        )?;
        let rows = stmt.query_map(params![course_id, range.start.year, range.end.year], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i32>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, Option<String>>(4)?,
                r.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (section_id, year, quarter, classes, location, instructor) = row?;
            let Some(quarter) = Quarter::parse(&quarter) else {
                return Err(CatalogError::Decode {
                    what: format!("quarter of section {}", section_id),
                    reason: format!("unknown quarter label '{}'", quarter),
                });
            };
            let term = Term::new(year, quarter);
            if !range.contains(&term) {
                continue;
            }
            let meetings: Vec<Meeting> = match classes.filter(|c| !c.trim().is_empty()) {
                Some(raw) => decode(&format!("classes of section {}", section_id), &raw)?,
                None => Vec::new(),
            };
            out.push(Section {
                section_id,
                course_id: course_id.to_string(),
                term,
                meetings,
                location: location.unwrap_or_default(),
                instructor: instructor.unwrap_or_default(),
            });
        }
        Ok(out)
    }
}
