//! Repository API endpoints

use axum::{
    Json,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;

use crate::SharedState;
use crate::registry::{RepoConfig, VariableDefinition};

/// Summary row for the repository selector
#[derive(Debug, Serialize)]
pub struct RepoSummary {
    pub id: String,
    pub variable_count: usize,
}

/// One form field: dropdown when `options` is set, free text otherwise
#[derive(Debug, Serialize)]
pub struct VariableField {
    pub name: String,
    pub default_value: String,
    pub description: Option<String>,
    pub options: Option<Vec<String>>,
}

impl From<&VariableDefinition> for VariableField {
    fn from(def: &VariableDefinition) -> Self {
        Self {
            name: def.name.clone(),
            default_value: def.effective_default().to_string(),
            description: def.description.clone(),
            options: def.options().map(|o| o.to_vec()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RepoForm {
    pub id: String,
    pub variables: Vec<VariableField>,
}

impl From<&RepoConfig> for RepoForm {
    fn from(repo: &RepoConfig) -> Self {
        Self {
            id: repo.repo_id.clone(),
            variables: repo.variables.iter().map(VariableField::from).collect(),
        }
    }
}

/// GET /api/repos - Repository ids in declared order
pub async fn list_repos(AxumState(state): AxumState<SharedState>) -> Json<serde_json::Value> {
    let repos: Vec<RepoSummary> = state
        .registry
        .repos()
        .iter()
        .map(|r| RepoSummary {
            id: r.repo_id.clone(),
            variable_count: r.variables.len(),
        })
        .collect();

    Json(json!({
        "repos": repos,
        "count": repos.len(),
        "ref": state.config.git_ref,
    }))
}

/// GET /api/repos/{repo_id} - Form fields for one repository
pub async fn get_repo(
    AxumState(state): AxumState<SharedState>,
    Path(repo_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_config(&repo_id) {
        Ok(repo) => Json(RepoForm::from(repo)).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
