// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Access policy evaluation
//!
//! The policy document maps user names to a namespace, a set of repositories
//! and a set of actions:
//!
//! ```yaml
//! users:
//!   alice:
//!     namespace: alice-space
//!     repos: [app-api, app-ui]
//!     actions: [pull]
//! ```
//!
//! Two evaluation modes are offered:
//!
//! - **Enforcement** ([`Policy::allowed_access`]) intersects a caller-supplied
//!   list of requested scopes with what the user may have. Unknown users get
//!   nothing, requests outside the user's namespace or repositories are
//!   dropped, and each surviving scope keeps only the permitted actions.
//! - **Generation** ([`Policy::generate_for`]) manufactures the complete
//!   entitlement of a user straight from the document, for trusted
//!   provisioning flows that do not request scopes. An unknown user is an
//!   error here since there is nothing to fall back to.

mod source;

pub use source::PolicySource;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::claims::ClaimMap;
use crate::error::{Result, TokenError};
use crate::scope::{parse_scopes, split_scope_list, Scope};

/// Entitlement of a single user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// The only namespace the user may reach
    #[serde(default)]
    pub namespace: String,

    /// Repositories inside `namespace`
    #[serde(default)]
    pub repos: Vec<String>,

    /// Actions granted on every listed repository
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Parsed policy file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub users: BTreeMap<String, UserEntry>,
}

/// Claims manufactured by [`Policy::generate_for`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedClaims {
    /// The user name
    pub sub: String,
    /// Space-joined wire form of every generated scope
    pub scope: String,
    /// Structured form of the same scopes
    pub access: Vec<Scope>,
}

impl GeneratedClaims {
    /// Merge into a claim map, overwriting `sub`, `scope` and `access`
    pub fn merge_into(self, claims: &mut ClaimMap) {
        claims.insert("sub".to_string(), Value::String(self.sub));
        claims.insert("scope".to_string(), Value::String(self.scope));
        claims.insert("access".to_string(), access_value(&self.access));
    }
}

/// Render scopes as the JSON `access` claim
pub fn access_value(access: &[Scope]) -> Value {
    serde_json::to_value(access).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// Policy evaluator over one loaded [`PolicyDocument`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    document: PolicyDocument,
}

impl Policy {
    pub fn new(document: PolicyDocument) -> Self {
        Self { document }
    }

    /// Load a policy from a YAML file
    ///
    /// A missing file is an empty policy: enforcement then denies everyone and
    /// generation fails for every user.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Policy file {:?} not found, using an empty policy", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            TokenError::configuration(format!("Failed to read policy file {:?}: {}", path, e))
        })?;
        Self::from_yaml_str(&contents).map_err(|e| match e {
            TokenError::Configuration { reason } => {
                TokenError::configuration(format!("{} ({:?})", reason, path))
            }
            other => other,
        })
    }

    /// Parse a policy from YAML text; blank text is an empty policy
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let document: Option<PolicyDocument> = serde_yml::from_str(contents)
            .map_err(|e| TokenError::configuration(format!("Invalid policy document: {}", e)))?;
        Ok(Self::new(document.unwrap_or_default()))
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    fn user(&self, user: &str) -> Option<&UserEntry> {
        self.document.users.get(user)
    }

    /// Filter requested scope strings down to what `user` may receive
    ///
    /// Never fails: unknown users, foreign namespaces, unlisted repositories,
    /// fully denied action lists and malformed entries all simply produce no
    /// output entry. Output order follows request order.
    pub fn allowed_access<S: AsRef<str>>(&self, user: &str, requested: &[S]) -> Vec<Scope> {
        let Some(entry) = self.user(user) else {
            debug!("User '{}' has no policy entry, denying all scopes", user);
            return Vec::new();
        };

        let mut access = Vec::new();
        for raw in requested {
            let Some(scope) = Scope::parse(raw.as_ref()) else {
                continue;
            };
            let Some((namespace, repo)) = scope.namespace_and_repo() else {
                debug!("Scope name '{}' is not registry/namespace/repo", scope.name);
                continue;
            };
            if namespace != entry.namespace || !entry.repos.iter().any(|r| r == repo) {
                debug!("Scope '{}' is outside the policy of '{}'", scope, user);
                continue;
            }

            let permitted: Vec<String> = scope
                .actions
                .iter()
                .filter(|action| entry.actions.contains(action))
                .cloned()
                .collect();
            if permitted.is_empty() {
                continue;
            }
            access.push(Scope {
                kind: scope.kind,
                name: scope.name,
                actions: permitted,
            });
        }
        access
    }

    /// Synthesize the full entitlement of `user`
    ///
    /// One `repository` scope named `namespace/repo` per listed repository,
    /// each carrying the complete action set of the user.
    pub fn generate_for(&self, user: &str) -> Result<GeneratedClaims> {
        let entry = self.user(user).ok_or_else(|| TokenError::UnknownUser {
            user: user.to_string(),
        })?;

        let access: Vec<Scope> = entry
            .repos
            .iter()
            .map(|repo| Scope {
                kind: "repository".to_string(),
                name: format!("{}/{}", entry.namespace, repo),
                actions: entry.actions.clone(),
            })
            .collect();
        let scope = access
            .iter()
            .map(Scope::to_string)
            .collect::<Vec<_>>()
            .join(" ");

        Ok(GeneratedClaims {
            sub: user.to_string(),
            scope,
            access,
        })
    }
}

/// Identity a claim set is issued for: `sub`, then `user`, then `"unknown"`
pub fn claimed_identity(claims: &ClaimMap) -> String {
    ["sub", "user"]
        .iter()
        .filter_map(|key| claims.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Run the policy stage of an issuance over caller-provided claims
///
/// With `generate`, the user's full entitlement replaces any requested scope
/// and `access` is parsed back from the generated `scope`. Otherwise the
/// requested `scope` is enforced, after first falling back to the generated
/// entitlement when the claims request nothing at all.
pub fn apply_policy(policy: &Policy, mut claims: ClaimMap, generate: bool) -> Result<ClaimMap> {
    let user = claimed_identity(&claims);

    if generate {
        policy.generate_for(&user)?.merge_into(&mut claims);
        let scopes = requested_scopes(&claims);
        claims.insert("access".to_string(), access_value(&parse_scopes(&scopes)));
        return Ok(claims);
    }

    if !claims.contains_key("scope") && !claims.contains_key("access") {
        policy.generate_for(&user)?.merge_into(&mut claims);
    }
    let scopes = requested_scopes(&claims);
    let access = policy.allowed_access(&user, &scopes);
    claims.insert("access".to_string(), access_value(&access));
    Ok(claims)
}

fn requested_scopes(claims: &ClaimMap) -> Vec<String> {
    claims
        .get("scope")
        .and_then(Value::as_str)
        .map(split_scope_list)
        .unwrap_or_default()
}
