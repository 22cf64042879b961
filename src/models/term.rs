// Términos académicos (año + trimestre) y su aritmética.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trimestre del año calendario, en orden cronológico.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quarter {
    Winter,
    Spring,
    Summer,
    #[serde(alias = "fall")]
    Autumn,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Winter, Quarter::Spring, Quarter::Summer, Quarter::Autumn];

    fn index(self) -> i32 {
        match self {
            Quarter::Winter => 0,
            Quarter::Spring => 1,
            Quarter::Summer => 2,
            Quarter::Autumn => 3,
        }
    }

    /// Acepta las etiquetas que aparecen en el catálogo ("Autumn", "Fall", "WI", ...).
    pub fn parse(label: &str) -> Option<Quarter> {
        let l = label.trim().to_lowercase();
        match l.as_str() {
            "winter" | "wi" | "win" => Some(Quarter::Winter),
            "spring" | "sp" | "spr" => Some(Quarter::Spring),
            "summer" | "su" | "sum" => Some(Quarter::Summer),
            "autumn" | "fall" | "au" | "fa" | "aut" => Some(Quarter::Autumn),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quarter::Winter => "Winter",
            Quarter::Spring => "Spring",
            Quarter::Summer => "Summer",
            Quarter::Autumn => "Autumn",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Un término concreto del calendario, p.ej. Autumn 2024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term {
    pub year: i32,
    pub quarter: Quarter,
}

impl Term {
    pub fn new(year: i32, quarter: Quarter) -> Self {
        Term { year, quarter }
    }

    /// Término que contiene la fecha dada (ene-mar invierno, abr-jun primavera,
    /// jul-ago verano, sep-dic otoño).
    pub fn containing(date: NaiveDate) -> Self {
        let quarter = match date.month() {
            1..=3 => Quarter::Winter,
            4..=6 => Quarter::Spring,
            7 | 8 => Quarter::Summer,
            _ => Quarter::Autumn,
        };
        Term::new(date.year(), quarter)
    }

    fn ordinal(self) -> i32 {
        self.year * 4 + self.quarter.index()
    }

    fn from_ordinal(ord: i32) -> Self {
        let year = ord.div_euclid(4);
        let quarter = Quarter::ALL[ord.rem_euclid(4) as usize];
        Term::new(year, quarter)
    }

    /// Siguiente término planificable. Con `include_summer == false` el verano se salta.
    pub fn next(self, include_summer: bool) -> Self {
        let mut t = Term::from_ordinal(self.ordinal() + 1);
        if !include_summer && t.quarter == Quarter::Summer {
            t = Term::from_ordinal(t.ordinal() + 1);
        }
        t
    }

    /// Avanza `steps` términos planificables.
    pub fn advance(self, steps: usize, include_summer: bool) -> Self {
        let mut t = self;
        for _ in 0..steps {
            t = t.next(include_summer);
        }
        t
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quarter, self.year)
    }
}

/// Rango cerrado de términos `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermRange {
    pub start: Term,
    pub end: Term,
}

impl TermRange {
    pub fn single(term: Term) -> Self {
        TermRange { start: term, end: term }
    }

    pub fn contains(&self, term: &Term) -> bool {
        *term >= self.start && *term <= self.end
    }
}
