// Configuración leída del entorno (y de `.env` si existe).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::warn;

/// Trimestres que se recorren antes de declarar un curso imposible de colocar.
pub const DEFAULT_HORIZON: usize = 24;
/// Tope de pasos de backtracking por intento de trimestre.
pub const DEFAULT_MAX_RESOLVER_STEPS: usize = 200_000;

// carga .env si existe
fn load_dotenv() {
    let _ = dotenv::dotenv();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub horizon: usize,
    pub max_resolver_steps: usize,
    /// En false se salta el verano: después de primavera viene otoño.
    pub include_summer: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            horizon: DEFAULT_HORIZON,
            max_resolver_steps: DEFAULT_MAX_RESOLVER_STEPS,
            include_summer: false,
        }
    }
}

impl PlannerConfig {
    /// Lee QUICKPLAN_HORIZON, QUICKPLAN_MAX_RESOLVER_STEPS y
    /// QUICKPLAN_INCLUDE_SUMMER. Un valor ilegible deja el predeterminado.
    pub fn from_env() -> Self {
        load_dotenv();
        let mut cfg = PlannerConfig::default();
        if let Some(h) = read_var::<usize>("QUICKPLAN_HORIZON") {
            if h > 0 {
                cfg.horizon = h;
            } else {
                warn!("QUICKPLAN_HORIZON must be positive, keeping {}", cfg.horizon);
            }
        }
        if let Some(s) = read_var::<usize>("QUICKPLAN_MAX_RESOLVER_STEPS") {
            cfg.max_resolver_steps = s;
        }
        if let Some(b) = read_var::<bool>("QUICKPLAN_INCLUDE_SUMMER") {
            cfg.include_summer = b;
        }
        cfg
    }
}

fn read_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

/// De dónde lee el binario su catálogo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Sqlite(PathBuf),
    Json(PathBuf),
}

impl CatalogSource {
    /// QUICKPLAN_CATALOG_DB tiene prioridad sobre QUICKPLAN_CATALOG_JSON. La
    /// base puede darse como ruta o como URL sqlite:// o file://.
    pub fn from_env() -> Option<Self> {
        load_dotenv();
        if let Ok(p) = env::var("QUICKPLAN_CATALOG_DB") {
            return Some(CatalogSource::Sqlite(sqlite_path_from_url(&p)));
        }
        if let Ok(p) = env::var("QUICKPLAN_CATALOG_JSON") {
            return Some(CatalogSource::Json(PathBuf::from(p)));
        }
        None
    }
}

/// Planilla opcional con más secciones ofrecidas (QUICKPLAN_SECTIONS_XLSX).
pub fn sections_workbook_from_env() -> Option<PathBuf> {
    load_dotenv();
    env::var("QUICKPLAN_SECTIONS_XLSX").ok().map(PathBuf::from)
}

/// Hoja opcional de cursos en texto del catálogo (QUICKPLAN_COURSES_XLSX).
pub fn courses_workbook_from_env() -> Option<PathBuf> {
    load_dotenv();
    env::var("QUICKPLAN_COURSES_XLSX").ok().map(PathBuf::from)
}

/// Quita el esquema sqlite:// o file:// si lo hay.
pub fn sqlite_path_from_url(url: &str) -> PathBuf {
    if let Some(rest) = url.strip_prefix("sqlite://") {
        PathBuf::from(rest)
    } else if let Some(rest) = url.strip_prefix("file://") {
        PathBuf::from(rest)
    } else {
        PathBuf::from(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PlannerConfig::default();
        assert_eq!(cfg.horizon, 24);
        assert!(!cfg.include_summer);
    }

    #[test]
    fn test_sqlite_url_schemes() {
        assert_eq!(sqlite_path_from_url("sqlite://data/catalog.db"), PathBuf::from("data/catalog.db"));
        assert_eq!(sqlite_path_from_url("file:///tmp/c.db"), PathBuf::from("/tmp/c.db"));
        assert_eq!(sqlite_path_from_url("catalog.db"), PathBuf::from("catalog.db"));
    }

    #[test]
    fn test_partial_json_config_uses_defaults() {
        let cfg: PlannerConfig = serde_json::from_str(r#"{"horizon": 8}"#).unwrap();
        assert_eq!(cfg.horizon, 8);
        assert_eq!(cfg.max_resolver_steps, DEFAULT_MAX_RESOLVER_STEPS);
    }
}
