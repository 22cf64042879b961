// Importación desde planillas (xlsx/xls/ods): la oferta de secciones y,
// aparte, la hoja de cursos del catálogo.
//
// Columnas esperadas (se buscan por encabezado, sin importar el orden):
// CRN, Course, Year, Term, Days, Times, Location, Instructor y opcionalmente
// Dates. "Term" puede traer el año ("Winter 2025"), en cuyo caso la columna
// Year es opcional.
use crate::error::CatalogError;
use crate::models::{Quarter, Section, Term};
use crate::requirements::{expand_meetings, normalize_location, CourseText};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Convierte una celda de calamine a texto; los enteros guardados como
/// flotante (CRN, año) se imprimen sin decimales.
pub fn data_to_string(d: &Data) -> String {
    match d {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if (f.floor() - f).abs() < f64::EPSILON {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(s) => s.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Empty | Data::Error(_) => String::new(),
    }
}

fn normalize_header(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}

struct Columns {
    crn: usize,
    course: usize,
    year: Option<usize>,
    term: usize,
    days: usize,
    times: usize,
    dates: Option<usize>,
    location: Option<usize>,
    instructor: Option<usize>,
}

impl Columns {
    fn from_header(header: &[String]) -> Result<Columns, CatalogError> {
        let norm: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
        let find = |names: &[&str]| norm.iter().position(|h| names.contains(&h.as_str()));
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| CatalogError::Spreadsheet(format!("missing column '{}'", names[0])))
        };
        Ok(Columns {
            crn: require(&["crn", "sectionid", "section"])?,
            course: require(&["course", "courseid", "code"])?,
            year: find(&["year"]),
            term: require(&["term", "quarter"])?,
            days: require(&["days", "day"])?,
            times: require(&["times", "time"])?,
            dates: find(&["dates", "date"]),
            location: find(&["location", "room"]),
            instructor: find(&["instructor", "instructors"]),
        })
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.as_str()).unwrap_or("")
}

// Celda opcional; "NULL" cuenta como vacía.
fn optional_cell(row: &[String], idx: Option<usize>) -> String {
    let raw = idx.map(|i| cell(row, i).trim()).unwrap_or("");
    if raw.eq_ignore_ascii_case("null") { String::new() } else { raw.to_string() }
}

fn parse_term(term_cell: &str, year_cell: Option<&str>) -> Option<Term> {
    let mut quarter = None;
    let mut year = year_cell.and_then(|y| y.trim().parse::<i32>().ok());
    for tok in term_cell.split_whitespace() {
        if let Some(q) = Quarter::parse(tok) {
            quarter = Some(q);
        } else if let Ok(y) = tok.parse::<i32>() {
            year = Some(y);
        }
    }
    Some(Term::new(year?, quarter?))
}

/// Convierte filas ya leídas (la primera es el encabezado) en secciones.
/// Filas sin CRN, sin curso o con término ilegible se omiten; un CRN
/// repetido conserva la primera fila.
pub fn rows_to_sections(rows: Vec<Vec<String>>) -> Result<Vec<Section>, CatalogError> {
    let mut iter = rows.into_iter();
    let Some(header) = iter.next() else {
        return Ok(Vec::new());
    };
    let cols = Columns::from_header(&header)?;

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();
    for (i, row) in iter.enumerate() {
        let crn = cell(&row, cols.crn).trim().to_string();
        let course = cell(&row, cols.course).split_whitespace().collect::<Vec<_>>().join(" ");
        if crn.is_empty() || course.is_empty() {
            continue;
        }
        let Some(term) = parse_term(cell(&row, cols.term), cols.year.map(|y| cell(&row, y))) else {
            warn!(row = i + 2, crn = %crn, "skipping section with unreadable term");
            continue;
        };
        if !seen.insert(crn.clone()) {
            debug!(crn = %crn, "duplicate section row ignored");
            continue;
        }
        let meetings = expand_meetings(
            cell(&row, cols.days),
            cell(&row, cols.times),
            cols.dates.map(|d| cell(&row, d)),
        );
        out.push(Section {
            section_id: crn,
            course_id: course,
            term,
            meetings,
            location: cols.location.map(|l| normalize_location(cell(&row, l))).unwrap_or_default(),
            instructor: cols
                .instructor
                .map(|c| cell(&row, c).replace("**", "").trim().to_string())
                .unwrap_or_default(),
        });
    }
    Ok(out)
}

fn read_first_sheet(path: &Path) -> Result<(String, Vec<Vec<String>>), CatalogError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| CatalogError::Spreadsheet(e.to_string()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| CatalogError::Spreadsheet("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| CatalogError::Spreadsheet(e.to_string()))?;
    let rows = range.rows().map(|r| r.iter().map(data_to_string).collect()).collect();
    Ok((sheet_name, rows))
}

/// Lee la primera hoja del libro y la convierte en secciones.
pub fn load_sections_xlsx<P: AsRef<Path>>(path: P) -> Result<Vec<Section>, CatalogError> {
    let (sheet_name, rows) = read_first_sheet(path.as_ref())?;
    let sections = rows_to_sections(rows)?;
    info!(path = %path.as_ref().display(), sheet = %sheet_name, sections = sections.len(), "sections imported from workbook");
    Ok(sections)
}

// Hoja de cursos: code y credits son obligatorias, el resto opcionales.
struct CourseColumns {
    code: usize,
    credits: usize,
    name: Option<usize>,
    description: Option<usize>,
    attributes: Option<usize>,
    standing: Option<usize>,
    restrictions: Option<usize>,
    prerequisites: Option<usize>,
    corequisites: Option<usize>,
    approval: Option<usize>,
}

impl CourseColumns {
    fn from_header(header: &[String]) -> Result<CourseColumns, CatalogError> {
        let norm: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
        let find = |names: &[&str]| norm.iter().position(|h| names.contains(&h.as_str()));
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| CatalogError::Spreadsheet(format!("missing column '{}'", names[0])))
        };
        Ok(CourseColumns {
            code: require(&["code", "course", "courseid"])?,
            credits: require(&["credits", "credit"])?,
            name: find(&["name", "title"]),
            description: find(&["description"]),
            attributes: find(&["attributes"]),
            standing: find(&["standing"]),
            restrictions: find(&["restrictions", "restriction"]),
            prerequisites: find(&["prerequisites", "prerequisite"]),
            corequisites: find(&["corequisites", "corequisite"]),
            approval: find(&["approvalrequired", "approval"]),
        })
    }
}

/// Convierte filas de la hoja de cursos (la primera es el encabezado) en
/// filas de texto listas para `SqliteCatalog::import_course_texts`.
/// Créditos ilegibles quedan sin valor; un código repetido conserva la
/// primera fila.
pub fn rows_to_course_texts(rows: Vec<Vec<String>>) -> Result<Vec<CourseText>, CatalogError> {
    let mut iter = rows.into_iter();
    let Some(header) = iter.next() else {
        return Ok(Vec::new());
    };
    let cols = CourseColumns::from_header(&header)?;

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();
    for row in iter {
        let credits_cell = cell(&row, cols.credits).trim();
        let mut course = CourseText::new(cell(&row, cols.code), credits_cell.parse::<u32>().ok());
        if course.code.is_empty() || !seen.insert(course.code.clone()) {
            continue;
        }
        if course.credits.is_none() && !credits_cell.is_empty() {
            warn!(course = %course.code, credits = credits_cell, "unreadable credits, using 0");
        }
        course.name = optional_cell(&row, cols.name);
        course.description = optional_cell(&row, cols.description);
        course.attributes = optional_cell(&row, cols.attributes);
        course.standing = optional_cell(&row, cols.standing);
        course.restrictions = optional_cell(&row, cols.restrictions);
        course.prerequisites = optional_cell(&row, cols.prerequisites);
        course.corequisites = optional_cell(&row, cols.corequisites);
        course.approval_required = matches!(optional_cell(&row, cols.approval).to_lowercase().as_str(), "1" | "true" | "yes");
        out.push(course);
    }
    Ok(out)
}

/// Lee la primera hoja de un libro de cursos.
pub fn load_course_texts_xlsx<P: AsRef<Path>>(path: P) -> Result<Vec<CourseText>, CatalogError> {
    let (sheet_name, rows) = read_first_sheet(path.as_ref())?;
    let courses = rows_to_course_texts(rows)?;
    info!(path = %path.as_ref().display(), sheet = %sheet_name, courses = courses.len(), "courses imported from workbook");
    Ok(courses)
}
