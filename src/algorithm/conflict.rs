// Funciones para normalizar horas y detectar choques de horario entre secciones.
use crate::models::{Section, Weekday};
use tracing::debug;

/// Franja semanal normalizada: (día, inicio, fin) en minutos desde medianoche.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub weekday: Weekday,
    pub start: u32,
    pub end: u32,
}

/// Convierte una etiqueta horaria a minutos del día (formato 24h).
///
/// Acepta "13:30", "1:30 PM", "1:30pm", "09.30", "0930" y "9 AM".
/// "12:xx AM" es medianoche y "12:xx PM" mediodía.
pub fn to_minutes(label: &str) -> Option<u32> {
    let mut tok = label.trim().to_uppercase().replace('.', ":");
    let mut meridiem: Option<bool> = None; // Some(true) = PM
    for (suffix, pm) in [("PM", true), ("AM", false), ("P", true), ("A", false)] {
        if tok.ends_with(suffix) {
            meridiem = Some(pm);
            tok = tok[..tok.len() - suffix.len()].trim().to_string();
            break;
        }
    }
    let (hh, mm) = match tok.split_once(':') {
        Some((h, m)) => (h.trim().parse::<u32>().ok()?, m.trim().parse::<u32>().ok()?),
        None => {
            let n = tok.parse::<u32>().ok()?;
            if tok.len() >= 3 { (n / 100, n % 100) } else { (n, 0) }
        }
    };
    if mm >= 60 {
        return None;
    }
    let hh = match meridiem {
        Some(pm) => {
            if hh == 0 || hh > 12 {
                return None;
            }
            (hh % 12) + if pm { 12 } else { 0 }
        }
        None => {
            if hh > 23 {
                return None;
            }
            hh
        }
    };
    Some(hh * 60 + mm)
}

/// Franjas de una sección. Reuniones con horas ilegibles o invertidas se
/// omiten (se tratan como "por definir").
pub fn section_slots(section: &Section) -> Vec<Slot> {
    let mut out = Vec::with_capacity(section.meetings.len());
    for m in section.meetings.iter() {
        match (to_minutes(&m.start_time), to_minutes(&m.end_time)) {
            (Some(start), Some(end)) if start < end => out.push(Slot { weekday: m.weekday, start, end }),
            _ => {
                debug!(
                    section = %section.section_id,
                    start = %m.start_time,
                    end = %m.end_time,
                    "skipping meeting with unreadable time range"
                );
            }
        }
    }
    out
}

/// Mismo día y rangos que se intersectan (los bordes que se tocan no chocan).
pub fn slots_overlap(a: &Slot, b: &Slot) -> bool {
    a.weekday == b.weekday && a.start < b.end && b.start < a.end
}

/// True si alguna franja de `a` solapa con alguna de `b`.
pub fn slot_lists_conflict(a: &[Slot], b: &[Slot]) -> bool {
    a.iter().any(|x| b.iter().any(|y| slots_overlap(x, y)))
}

/// True si las dos secciones se reúnen el mismo día en horas que se solapan.
pub fn sections_conflict(a: &Section, b: &Section) -> bool {
    slot_lists_conflict(&section_slots(a), &section_slots(b))
}
