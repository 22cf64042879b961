//! Parsers para los formatos de texto del catálogo: prerequisitos,
//! corequisitos, restricciones de nivel, filas de cursos y celdas de
//! días/horas de secciones.
//!
//! Formato de prerequisitos tal como lo publica el catálogo:
//!
//! ```text
//! CSC 1230: C- or better AND (MAT 1720: C or better OR MAT 1221 can be taken concurrently: C or better)
//! ```
//!
//! `AND` liga más fuerte que `OR`; los paréntesis agrupan. El resultado se
//! entrega en forma normal disyuntiva como `Requirement` (OR de listas AND).

use crate::models::{Alternative, Course, CourseRef, Meeting, Requirement, Standing, Weekday};
use std::collections::BTreeSet;
use tracing::debug;

const CONCURRENT_MARK: &str = "can be taken concurrently";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Member(String),
}

#[derive(Debug)]
enum Expr {
    Member(CourseRef),
    /// Examen de ubicación u otro requisito que no es un curso.
    Exam,
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

/// Resultado del parseo de prerequisitos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPrerequisites {
    pub requirement: Requirement,
    /// true si alguna rama era un examen (descartada del requisito).
    pub has_exam_alternative: bool,
}

fn is_keyword_at(chars: &[char], i: usize, kw: &str) -> bool {
    let kw: Vec<char> = kw.chars().collect();
    if i + kw.len() > chars.len() {
        return false;
    }
    if chars[i..i + kw.len()] != kw[..] {
        return false;
    }
    let before_ok = i == 0 || !chars[i - 1].is_alphanumeric();
    let after_ok = i + kw.len() == chars.len() || !chars[i + kw.len()].is_alphanumeric();
    before_ok && after_ok
}

fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let lower: Vec<char> = chars.iter().map(|c| c.to_ascii_lowercase()).collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '(' {
            tokens.push(Token::Open);
            i += 1;
            continue;
        }
        if c == ')' {
            tokens.push(Token::Close);
            i += 1;
            continue;
        }
        if is_keyword_at(&chars, i, "AND") {
            tokens.push(Token::And);
            i += 3;
            continue;
        }
        if is_keyword_at(&chars, i, "OR") {
            tokens.push(Token::Or);
            i += 2;
            continue;
        }
        // Miembro: hasta " or better" (inclusive) o hasta el siguiente separador.
        let start = i;
        let mut end = chars.len();
        let mut j = i;
        while j < chars.len() {
            if lower[j..].starts_with(&['o', 'r', ' ', 'b', 'e', 't', 't', 'e', 'r']) {
                end = j + "or better".len();
                break;
            }
            if chars[j] == '(' || chars[j] == ')' || is_keyword_at(&chars, j, "AND") || is_keyword_at(&chars, j, "OR") {
                end = j;
                break;
            }
            j += 1;
        }
        let text: String = chars[start..end].iter().collect();
        let text = text.trim().to_string();
        if !text.is_empty() {
            tokens.push(Token::Member(text));
        }
        i = end.max(start + 1);
    }
    tokens
}

fn member_from_text(text: &str) -> Expr {
    let (head, grade) = match text.split_once(':') {
        Some((h, g)) => (h.trim(), Some(g.trim())),
        None => (text.trim(), None),
    };
    let (course_id, concurrent) = match head.find(CONCURRENT_MARK) {
        Some(pos) => (head[..pos].trim(), true),
        None => (head, false),
    };
    let course_id = course_id.split_whitespace().collect::<Vec<_>>().join(" ");
    // los ids de curso tienen entre 7 y 10 caracteres ("CSC 1230", "MAT 1720L")
    if course_id.len() < 7 || course_id.len() > 10 {
        return Expr::Exam;
    }
    let min_grade = grade
        .map(|g| {
            let g = g.trim();
            let lg = g.to_lowercase();
            match lg.find("or better") {
                Some(pos) => g[..pos].trim().to_string(),
                None => g.to_string(),
            }
        })
        .filter(|g| !g.is_empty());
    Expr::Member(CourseRef {
        course_id,
        credits: 0,
        concurrent_available: concurrent,
        min_grade,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    // or_expr := and_expr (OR and_expr)*
    fn or_expr(&mut self) -> Expr {
        let mut items = vec![self.and_expr()];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            items.push(self.and_expr());
        }
        if items.len() == 1 { items.remove(0) } else { Expr::Or(items) }
    }

    // and_expr := atom (AND atom)*
    fn and_expr(&mut self) -> Expr {
        let mut items = vec![self.atom()];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            items.push(self.atom());
        }
        if items.len() == 1 { items.remove(0) } else { Expr::And(items) }
    }

    fn atom(&mut self) -> Expr {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Open) => {
                self.pos += 1;
                let e = self.or_expr();
                if self.peek() == Some(&Token::Close) {
                    self.pos += 1;
                }
                e
            }
            Some(Token::Member(text)) => {
                self.pos += 1;
                member_from_text(&text)
            }
            // Conectores sueltos o paréntesis de cierre sin pareja: se ignoran.
            Some(_) => {
                self.pos += 1;
                Expr::Exam
            }
            None => Expr::Exam,
        }
    }
}

/// `None` = neutro (examen): no aporta miembros ni alternativas.
fn to_dnf(expr: Expr, saw_exam: &mut bool) -> Option<Vec<Vec<CourseRef>>> {
    match expr {
        Expr::Member(m) => Some(vec![vec![m]]),
        Expr::Exam => {
            *saw_exam = true;
            None
        }
        Expr::Or(items) => {
            let mut out: Vec<Vec<CourseRef>> = Vec::new();
            let mut any = false;
            for it in items {
                if let Some(d) = to_dnf(it, saw_exam) {
                    any = true;
                    out.extend(d);
                }
            }
            if any { Some(out) } else { None }
        }
        Expr::And(items) => {
            let mut acc: Option<Vec<Vec<CourseRef>>> = None;
            for it in items {
                let Some(d) = to_dnf(it, saw_exam) else { continue };
                acc = Some(match acc {
                    None => d,
                    Some(prev) => {
                        let mut next = Vec::with_capacity(prev.len() * d.len());
                        for left in prev.iter() {
                            for right in d.iter() {
                                let mut merged = left.clone();
                                for m in right {
                                    if !merged.iter().any(|x| x.course_id == m.course_id) {
                                        merged.push(m.clone());
                                    }
                                }
                                next.push(merged);
                            }
                        }
                        next
                    }
                });
            }
            acc
        }
    }
}

/// Parsea el texto de prerequisitos del catálogo. Texto vacío o "NULL" = sin requisitos.
pub fn parse_prerequisites(input: &str) -> ParsedPrerequisites {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return ParsedPrerequisites { requirement: Requirement::none(), has_exam_alternative: false };
    }
    let mut parser = Parser { tokens: tokenize(trimmed), pos: 0 };
    let mut items = vec![parser.or_expr()];
    // Texto sobrante tras un cierre desbalanceado: se une con AND.
    while parser.pos < parser.tokens.len() {
        parser.pos += 1;
        if parser.pos < parser.tokens.len() {
            items.push(parser.or_expr());
        }
    }
    let expr = if items.len() == 1 { items.remove(0) } else { Expr::And(items) };
    let mut saw_exam = false;
    let alternatives = to_dnf(expr, &mut saw_exam)
        .unwrap_or_default()
        .into_iter()
        .filter(|members| !members.is_empty())
        .map(Alternative::new)
        .collect();
    ParsedPrerequisites {
        requirement: Requirement { alternatives },
        has_exam_alternative: saw_exam,
    }
}

/// "CSC 2431, CSC 2432" -> ["CSC 2431", "CSC 2432"]
pub fn parse_corequisites(input: &str) -> Vec<String> {
    let t = input.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("null") {
        return Vec::new();
    }
    t.split(',')
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Restricción de nivel del catálogo. Conjunto vacío = todos elegibles.
///
/// - "Junior, Senior students only" -> {Junior, Senior}
/// - "Freshman students excluded" -> {Sophomore, Junior, Senior}
pub fn parse_standing_restriction(input: &str) -> BTreeSet<Standing> {
    let lower = input.to_lowercase();
    let listed = |text: &str| -> BTreeSet<Standing> {
        let head = match text.find("student") {
            Some(pos) => &text[..pos],
            None => text,
        };
        head.split(',').filter_map(Standing::parse).collect()
    };
    if lower.contains("excluded") {
        let excluded = listed(&lower);
        let allowed: BTreeSet<Standing> = Standing::ALL.iter().copied().filter(|s| !excluded.contains(s)).collect();
        if allowed.len() == Standing::ALL.len() { BTreeSet::new() } else { allowed }
    } else if lower.contains("only") {
        listed(&lower)
    } else {
        // lista simple separada por comas ("Junior, Senior") o vacío
        listed(&lower)
    }
}

/// Convierte las celdas Days/Times(/Dates) de la oferta en reuniones semanales.
///
/// - "M,W,F" + "9:00 AM-9:50 AM" -> tres reuniones;
/// - celdas multilínea se emparejan línea a línea;
/// - las líneas "Arranged" se descartan;
/// - si hay fechas, sólo se conservan las líneas con la misma fecha que la primera;
/// - un mismo día aparece una sola vez (gana la primera línea).
pub fn expand_meetings(days: &str, times: &str, dates: Option<&str>) -> Vec<Meeting> {
    let split = |s: &str| -> Vec<String> { s.split('\n').map(|l| l.replace('\r', "").trim().to_string()).collect() };
    let day_lines = split(days);
    let time_lines = split(times);
    let date_lines: Vec<String> = dates.map(split).unwrap_or_default();

    let mut rows: Vec<(String, String, Option<String>)> = Vec::new();
    for (i, d) in day_lines.iter().enumerate() {
        if d.is_empty() || d.eq_ignore_ascii_case("arranged") {
            continue;
        }
        let Some(t) = time_lines.get(i).or_else(|| time_lines.first()) else { continue };
        rows.push((d.clone(), t.clone(), date_lines.get(i).cloned()));
    }
    if let Some(first_date) = rows.first().and_then(|r| r.2.clone()) {
        rows.retain(|r| r.2.as_ref().map_or(true, |d| *d == first_date));
    }

    let mut seen: BTreeSet<Weekday> = BTreeSet::new();
    let mut out = Vec::new();
    for (d, t, _) in rows {
        let Some((start, end)) = t.split_once('-') else { continue };
        for token in d.split(|c| c == ',' || c == ' ').filter(|s| !s.is_empty()) {
            let Some(wd) = Weekday::parse(token) else { continue };
            if seen.insert(wd) {
                out.push(Meeting::new(wd, start.trim(), end.trim()));
            }
        }
    }
    out
}

/// Ubicación como la guarda el catálogo: multilínea -> "Multiple Locations", sin marca "**".
pub fn normalize_location(raw: &str) -> String {
    if raw.contains('\n') {
        return "Multiple Locations".to_string();
    }
    raw.replace("**", "").trim().to_string()
}

/// Fila de curso tal como la publica el catálogo: todo en texto, con las
/// columnas code, name, description, credits, attributes, standing,
/// restrictions, prerequisites, corequisites y approval_required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseText {
    pub code: String,
    pub name: String,
    pub description: String,
    pub credits: Option<u32>,
    pub attributes: String,
    pub standing: String,
    pub restrictions: String,
    pub prerequisites: String,
    pub corequisites: String,
    pub approval_required: bool,
}

impl CourseText {
    pub fn new(code: &str, credits: Option<u32>) -> Self {
        CourseText {
            code: code.split_whitespace().collect::<Vec<_>>().join(" "),
            credits,
            ..CourseText::default()
        }
    }

    /// Convierte la fila en un `Course`. El texto de prerequisitos no trae
    /// créditos por miembro: se completan con `credits_of`. El nivel sale de
    /// la columna standing y, si está vacía, de restrictions.
    pub fn to_course<F>(&self, credits_of: F) -> Course
    where
        F: Fn(&str) -> Option<u32>,
    {
        let parsed = parse_prerequisites(&self.prerequisites);
        if parsed.has_exam_alternative {
            debug!(course = %self.code, "placement exam alternative dropped from prerequisites");
        }
        let mut standings = parse_standing_restriction(&self.standing);
        if standings.is_empty() {
            standings = parse_standing_restriction(&self.restrictions);
        }
        let attributes = self.attributes.trim();
        Course {
            course_id: self.code.clone(),
            name: self.name.trim().to_string(),
            credits: self.credits.unwrap_or(0),
            attributes: if attributes.is_empty() || attributes.eq_ignore_ascii_case("null") {
                Vec::new()
            } else {
                attributes.split(',').map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect()
            },
            eligible_standings: standings,
            prerequisites: parsed.requirement.with_credits(credits_of),
            corequisites: parse_corequisites(&self.corequisites),
        }
    }
}
