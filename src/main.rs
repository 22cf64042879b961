// --- Generador de planes de estudio - Archivo principal ---
//
// Uso: quickplan [solicitud.json]   (sin argumento lee la solicitud de stdin)

use quickplan::catalog::excel::{load_course_texts_xlsx, load_sections_xlsx};
use quickplan::config::{courses_workbook_from_env, sections_workbook_from_env, CatalogSource};
use quickplan::{
    generate_plan, CachedCatalog, CatalogAccessor, CatalogError, InMemoryCatalog, PlanError, PlanRequest,
    PlannerConfig, SqliteCatalog, Term,
};
use serde_json::json;
use std::io::Read;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn load_catalog() -> Result<Box<dyn CatalogAccessor>, PlanError> {
    let extra = match sections_workbook_from_env() {
        Some(path) => load_sections_xlsx(&path)?,
        None => Vec::new(),
    };
    let course_rows = match courses_workbook_from_env() {
        Some(path) => load_course_texts_xlsx(&path)?,
        None => Vec::new(),
    };
    match CatalogSource::from_env() {
        Some(CatalogSource::Sqlite(path)) => {
            let cat = SqliteCatalog::open(&path)?;
            if !course_rows.is_empty() {
                cat.import_course_texts(&course_rows)?;
            }
            for s in extra.iter() {
                cat.insert_section(s)?;
            }
            Ok(Box::new(CachedCatalog::new(cat)))
        }
        Some(CatalogSource::Json(path)) => {
            let mut cat = InMemoryCatalog::from_json_file(&path)?;
            cat.import_course_texts(&course_rows);
            cat.extend_sections(extra);
            Ok(Box::new(cat))
        }
        None => Err(PlanError::InvalidRequest(
            "no catalog configured: set QUICKPLAN_CATALOG_DB or QUICKPLAN_CATALOG_JSON".to_string(),
        )),
    }
}

fn read_request() -> Result<PlanRequest, PlanError> {
    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).map_err(CatalogError::from)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map_err(CatalogError::from)?;
            buf
        }
    };
    let mut request: PlanRequest =
        serde_json::from_str(&raw).map_err(|e| PlanError::InvalidRequest(format!("malformed request: {}", e)))?;
    if request.reference_term.is_none() {
        request.reference_term = Some(Term::containing(chrono::Local::now().date_naive()));
    }
    Ok(request)
}

async fn run() -> Result<String, PlanError> {
    let config = PlannerConfig::from_env();
    let request = read_request()?;
    // La carga del catálogo y el plan son bloqueantes (SQLite, calamine).
    tokio::task::spawn_blocking(move || {
        let catalog = load_catalog()?;
        info!(?config, "catalog ready");
        let plan = generate_plan(&*catalog, &request, config)?;
        serde_json::to_string_pretty(&plan).map_err(|e| PlanError::WorkerFailed(e.to_string()))
    })
    .await
    .map_err(|e| PlanError::WorkerFailed(e.to_string()))?
}

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(out) => println!("{}", out),
        Err(e) => {
            let body = json!({ "error": { "kind": e.kind(), "message": e.to_string() } });
            println!("{}", body);
            std::process::exit(1);
        }
    }
}
