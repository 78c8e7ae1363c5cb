//! Repository configs: which variables each repository's pipeline accepts

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::{Result, TriggerError};

/// Variable name the trigger always fills with the selected repository id
pub const REPO_NAME_VARIABLE: &str = "REPO_NAME";

/// A single user-overridable pipeline variable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "value", default)]
    pub default_value: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "options", default)]
    pub allowed_options: Option<Vec<String>>,
}

impl VariableDefinition {
    pub fn new(name: &str, default_value: &str) -> Self {
        Self {
            name: name.to_string(),
            default_value: default_value.to_string(),
            description: None,
            allowed_options: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.allowed_options = Some(options.iter().map(|o| o.to_string()).collect());
        self
    }

    /// Allowed options, or None when the variable is free text.
    /// An empty option list counts as free text.
    pub fn options(&self) -> Option<&[String]> {
        self.allowed_options
            .as_deref()
            .filter(|options| !options.is_empty())
    }

    /// The value used when the user supplies nothing.
    /// If the declared default is not one of the allowed options, the first option wins.
    pub fn effective_default(&self) -> &str {
        match self.options() {
            Some(options) if !options.contains(&self.default_value) => &options[0],
            _ => &self.default_value,
        }
    }

    /// Returns true if `value` is acceptable for this variable
    pub fn accepts(&self, value: &str) -> bool {
        self.options()
            .map(|options| options.iter().any(|o| o == value))
            .unwrap_or(true)
    }
}

/// Ordered variable definitions for one repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepoConfig {
    #[serde(rename = "id")]
    pub repo_id: String,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
}

impl RepoConfig {
    pub fn new(repo_id: &str, variables: Vec<VariableDefinition>) -> Self {
        Self {
            repo_id: repo_id.to_string(),
            variables,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Read-only mapping from repository id to its config, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRegistry {
    repos: Vec<RepoConfig>,
}

static BUILTIN: LazyLock<ConfigRegistry> = LazyLock::new(|| ConfigRegistry {
    repos: builtin_repos(),
});

impl ConfigRegistry {
    /// Build a registry, rejecting duplicate ids, duplicate variables
    /// and any variable that shadows REPO_NAME.
    pub fn new(repos: Vec<RepoConfig>) -> Result<Self> {
        let mut seen_repos = HashSet::new();
        for repo in &repos {
            if repo.repo_id.is_empty() {
                return Err(TriggerError::ConfigError(
                    "Repository id must not be empty".to_string(),
                ));
            }
            if !seen_repos.insert(repo.repo_id.as_str()) {
                return Err(TriggerError::ConfigError(format!(
                    "Duplicate repository '{}'",
                    repo.repo_id
                )));
            }

            let mut seen_vars = HashSet::new();
            for var in &repo.variables {
                if var.name == REPO_NAME_VARIABLE {
                    return Err(TriggerError::ConfigError(format!(
                        "Repository '{}' declares reserved variable {}",
                        repo.repo_id, REPO_NAME_VARIABLE
                    )));
                }
                if !seen_vars.insert(var.name.as_str()) {
                    return Err(TriggerError::ConfigError(format!(
                        "Repository '{}' declares variable {} more than once",
                        repo.repo_id, var.name
                    )));
                }
            }
        }

        Ok(Self { repos })
    }

    /// The table compiled into the binary
    pub fn builtin() -> &'static ConfigRegistry {
        &BUILTIN
    }

    pub fn list_repo_ids(&self) -> Vec<&str> {
        self.repos.iter().map(|r| r.repo_id.as_str()).collect()
    }

    pub fn get_config(&self, repo_id: &str) -> Result<&RepoConfig> {
        self.repos
            .iter()
            .find(|r| r.repo_id == repo_id)
            .ok_or_else(|| TriggerError::UnknownRepo(repo_id.to_string()))
    }

    pub fn repos(&self) -> &[RepoConfig] {
        &self.repos
    }
}

fn builtin_repos() -> Vec<RepoConfig> {
    vec![
        RepoConfig::new(
            "cosmos-transfer1",
            vec![
                VariableDefinition::new("PR_NUMBER", "-1").with_description(
                    "Pull request number to be tested in the CI pipeline. If set to -1 (default), \
                     the pipeline will run on the 'nvidia-cosmos/cosmos-transfer1' repository \
                     and the 'main' branch.",
                ),
                VariableDefinition::new("CLONE_METHOD", "https")
                    .with_description("Method used to clone the repository")
                    .with_options(&["ssh", "https", "https-with-token"]),
                VariableDefinition::new("TEST_EXTERNAL_USER_PR", "false")
                    .with_description("Set to 'true' to Run tests on external user pull requests")
                    .with_options(&["true", "false"]),
                VariableDefinition::new("REFRESH_CHECKPOINTS", "false")
                    .with_description(
                        "Refresh the checkpoints. This will delete the existing checkpoints \
                         and download the latest ones.",
                    )
                    .with_options(&["true", "false"]),
            ],
        ),
        RepoConfig::new(
            "cosmos-predict1",
            vec![
                VariableDefinition::new("DUMMY_VARIABLE1", "resnet50"),
                VariableDefinition::new("DUMMY_VARIABLE2", "0.5"),
            ],
        ),
        RepoConfig::new(
            "cosmos-predict2",
            vec![
                VariableDefinition::new("DUMMY_VARIABLE3", "fast"),
                VariableDefinition::new("DUMMY_VARIABLE4", "true").with_options(&["true", "false"]),
            ],
        ),
    ]
}
