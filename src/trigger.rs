//! Turns a repository selection into a pipeline trigger payload and
//! interprets the endpoint's answer.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::TOKEN_ENV_VAR;
use crate::error::{Result, TriggerError};
use crate::registry::{ConfigRegistry, REPO_NAME_VARIABLE};

/// Replaces the token in anything shown to the user or written to logs
pub const MASK: &str = "****MASKED****";

/// HTTP status the pipeline endpoint answers with when a pipeline was created
pub const CREATED: u16 = 201;

/// How values outside a variable's allowed options are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptionPolicy {
    /// Forward the value as-is and ignore undeclared variables
    #[default]
    Permissive,
    /// Reject values outside the allowed options and undeclared variables
    Strict,
}

/// Everything sent to the pipeline endpoint for one submission
#[derive(Debug)]
pub struct TriggerPayload {
    pub secret_token: SecretString,
    pub git_ref: String,
    pub repo_name: String,
    /// Declared variables in config order
    pub variables: Vec<(String, String)>,
}

impl TriggerPayload {
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Form fields as transmitted, token included
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.fields_with_token(self.secret_token.expose_secret())
    }

    fn fields_with_token(&self, token: &str) -> Vec<(String, String)> {
        let mut fields = Vec::with_capacity(self.variables.len() + 3);
        fields.push(("token".to_string(), token.to_string()));
        fields.push(("ref".to_string(), self.git_ref.clone()));
        fields.push((form_key(REPO_NAME_VARIABLE), self.repo_name.clone()));
        for (name, value) in &self.variables {
            fields.push((form_key(name), value.clone()));
        }
        fields
    }
}

fn form_key(name: &str) -> String {
    format!("variables[{}]", name)
}

/// Copy of the payload's fields with the token replaced by [`MASK`]
pub fn redact_for_display(payload: &TriggerPayload) -> Map<String, Value> {
    payload
        .fields_with_token(MASK)
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

/// Builds trigger payloads against a registry
#[derive(Debug, Clone, Copy)]
pub struct TriggerRequestBuilder<'a> {
    registry: &'a ConfigRegistry,
    policy: OptionPolicy,
}

impl<'a> TriggerRequestBuilder<'a> {
    pub fn new(registry: &'a ConfigRegistry) -> Self {
        Self {
            registry,
            policy: OptionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OptionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve `repo_id`, fill every declared variable from `values` or its
    /// effective default, and attach the token and ref.
    pub fn build_payload(
        &self,
        repo_id: &str,
        values: &HashMap<String, String>,
        secret_token: &str,
        git_ref: &str,
    ) -> Result<TriggerPayload> {
        if secret_token.is_empty() {
            return Err(TriggerError::MissingCredential(TOKEN_ENV_VAR.to_string()));
        }

        let config = self.registry.get_config(repo_id)?;

        for name in values.keys() {
            if config.variable(name).is_some() {
                continue;
            }
            if self.policy == OptionPolicy::Strict {
                return Err(TriggerError::UnknownVariable {
                    repo_id: repo_id.to_string(),
                    variable: name.clone(),
                });
            }
            warn!("Ignoring undeclared variable {} for '{}'", name, repo_id);
        }

        let mut variables = Vec::with_capacity(config.variables.len());
        for def in &config.variables {
            let value = match values.get(&def.name) {
                Some(supplied) => {
                    if !def.accepts(supplied) {
                        if self.policy == OptionPolicy::Strict {
                            return Err(TriggerError::InvalidOption {
                                variable: def.name.clone(),
                                value: supplied.clone(),
                                allowed: def.options().unwrap_or_default().to_vec(),
                            });
                        }
                        debug!(
                            "Passing through '{}' for {} although it is not an allowed option",
                            supplied, def.name
                        );
                    }
                    supplied.clone()
                }
                None => def.effective_default().to_string(),
            };
            variables.push((def.name.clone(), value));
        }

        Ok(TriggerPayload {
            secret_token: SecretString::from(secret_token.to_string()),
            git_ref: git_ref.to_string(),
            repo_name: config.repo_id.clone(),
            variables,
        })
    }
}

/// Outcome of one trigger attempt, kept only for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerResult {
    pub succeeded: bool,
    pub pipeline_url: Option<String>,
    pub status_code: u16,
    pub raw_body: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct CreatedPipeline {
    web_url: Option<String>,
}

impl TriggerResult {
    /// Interpret the endpoint's status and body.
    /// 201 means success; `web_url` is read from the JSON body when present.
    pub fn from_response(status_code: u16, raw_body: String) -> Self {
        let succeeded = status_code == CREATED;
        let pipeline_url = if succeeded {
            serde_json::from_str::<CreatedPipeline>(&raw_body)
                .ok()
                .and_then(|p| p.web_url)
        } else {
            None
        };

        Self {
            succeeded,
            pipeline_url,
            status_code,
            raw_body,
            completed_at: Utc::now(),
        }
    }

    /// Turn a failed result into a RemoteRejection error
    pub fn error_for_status(self) -> Result<Self> {
        if self.succeeded {
            Ok(self)
        } else {
            Err(TriggerError::RemoteRejection {
                status: self.status_code,
                body: self.raw_body,
            })
        }
    }
}
