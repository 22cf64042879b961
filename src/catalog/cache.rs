//! Caché en memoria delante de cualquier `CatalogAccessor`.
//!
//! Guarda los cursos por id y las listas de secciones por (curso, rango).
//! Los registros son inmutables durante una ejecución, así que compartir el
//! caché entre ejecuciones concurrentes es seguro.
//!
//! Notas:
//! - el Mutex se mantiene sólo para leer o insertar en la tabla, nunca
//!   mientras se consulta el catálogo subyacente;
//! - los errores del catálogo subyacente no se guardan en caché.

use super::CatalogAccessor;
use crate::error::CatalogError;
use crate::models::{Course, Section, TermRange};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type SectionKey = (String, TermRange);

pub struct CachedCatalog<C> {
    inner: C,
    courses: Mutex<HashMap<String, Arc<Course>>>,
    sections: Mutex<HashMap<SectionKey, Arc<Vec<Section>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<C: CatalogAccessor> CachedCatalog<C> {
    pub fn new(inner: C) -> Self {
        CachedCatalog {
            inner,
            courses: Mutex::new(HashMap::new()),
            sections: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// (hits, misses, entradas)
    pub fn stats(&self) -> (usize, usize, usize) {
        let entries = self.courses.lock().map(|g| g.len()).unwrap_or(0)
            + self.sections.lock().map(|g| g.len()).unwrap_or(0);
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed), entries)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

fn poisoned() -> CatalogError {
    CatalogError::Storage("catalog cache mutex poisoned".to_string())
}

impl<C: CatalogAccessor> CatalogAccessor for CachedCatalog<C> {
    fn get_courses(&self, ids: &[String]) -> Result<Vec<Course>, CatalogError> {
        // Primero: separar lo que ya está en caché
        let mut found: HashMap<String, Arc<Course>> = HashMap::new();
        let mut pending: Vec<String> = Vec::new();
        {
            let guard = self.courses.lock().map_err(|_| poisoned())?;
            for id in ids {
                match guard.get(id) {
                    Some(c) => {
                        found.insert(id.clone(), Arc::clone(c));
                    }
                    None => pending.push(id.clone()),
                }
            }
        }
        self.hits.fetch_add(found.len(), Ordering::Relaxed);

        if !pending.is_empty() {
            self.misses.fetch_add(pending.len(), Ordering::Relaxed);
            let fetched = self.inner.get_courses(&pending)?;
            let mut guard = self.courses.lock().map_err(|_| poisoned())?;
            for c in fetched {
                let arc = Arc::new(c);
                guard.insert(arc.course_id.clone(), Arc::clone(&arc));
                found.insert(arc.course_id.clone(), arc);
            }
        }

        // Respetar el orden pedido
        let mut out = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match found.get(id) {
                Some(c) => out.push((**c).clone()),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(CatalogError::NotFound { ids: missing });
        }
        Ok(out)
    }

    fn get_sections(&self, course_id: &str, range: &TermRange) -> Result<Vec<Section>, CatalogError> {
        let key = (course_id.to_string(), *range);
        {
            let guard = self.sections.lock().map_err(|_| poisoned())?;
            if let Some(existing) = guard.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok((**existing).clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let fetched = Arc::new(self.inner.get_sections(course_id, range)?);
        let mut guard = self.sections.lock().map_err(|_| poisoned())?;
        guard.insert(key, Arc::clone(&fetched));
        Ok((*fetched).clone())
    }
}
