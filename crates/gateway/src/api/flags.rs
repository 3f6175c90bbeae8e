//! Feature flags — named booleans with an optional description,
//! persisted as JSONL so they survive restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use al_domain::error::Result;

use crate::state::AppState;

use super::api_error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

pub struct FlagStore {
    flags: RwLock<HashMap<String, Flag>>,
    log_path: PathBuf,
}

impl FlagStore {
    pub fn open(state_path: &Path) -> Result<Self> {
        let log_path = state_path.join("flags.jsonl");
        let mut flags = HashMap::new();
        if let Ok(raw) = std::fs::read_to_string(&log_path) {
            for line in raw.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<Flag>(line) {
                    Ok(flag) => {
                        flags.insert(flag.name.clone(), flag);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping malformed flag line");
                    }
                }
            }
        }
        Ok(Self {
            flags: RwLock::new(flags),
            log_path,
        })
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.flags.read().get(name).map(|f| f.enabled).unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<Flag> {
        self.flags.read().get(name).cloned()
    }

    pub fn set(&self, name: &str, enabled: bool, description: Option<String>) -> Result<Flag> {
        let flag = {
            let mut flags = self.flags.write();
            let entry = flags.entry(name.to_string()).or_insert_with(|| Flag {
                name: name.to_string(),
                enabled,
                description: String::new(),
                updated_at: Utc::now(),
            });
            entry.enabled = enabled;
            if let Some(desc) = description {
                entry.description = desc;
            }
            entry.updated_at = Utc::now();
            entry.clone()
        };

        use std::io::Write;
        let json = serde_json::to_string(&flag)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{json}")?;
        Ok(flag)
    }

    pub fn list(&self) -> Vec<Flag> {
        let mut out: Vec<Flag> = self.flags.read().values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_flags(State(state): State<AppState>) -> impl IntoResponse {
    let flags = state.flags.list();
    Json(serde_json::json!({ "flags": flags, "count": flags.len() }))
}

pub async fn get_flag(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> impl IntoResponse {
    match state.flags.get(&name) {
        Some(flag) => Json(serde_json::json!(flag)).into_response(),
        None => Json(serde_json::json!({
            "name": name,
            "enabled": false,
        }))
        .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetFlagRequest {
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn set_flag(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
    Json(req): Json<SetFlagRequest>,
) -> impl IntoResponse {
    match state.flags.set(&name, req.enabled, req.description) {
        Ok(flag) => Json(serde_json::json!(flag)).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
