// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Docker-registry style scope strings
//!
//! A scope travels on the wire as `type:name:actions`, for example
//! `repository:registry.example.com/alice/app:pull,push`. Several scopes are
//! joined with single spaces in the `scope` claim. Inside a token the same
//! information is carried as a list of `{"type","name","actions"}` objects in
//! the `access` claim, which is exactly how [`Scope`] serializes.
//!
//! Parsing is lenient: an entry without three `:`-separated parts is skipped
//! rather than reported, so one bad scope never poisons a whole request.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

/// A single permission unit: resource type, resource name and actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Resource type, usually `repository`
    #[serde(rename = "type")]
    pub kind: String,

    /// Resource name, `registry/namespace/repo` for registry scopes
    pub name: String,

    /// Requested or granted actions, in request order
    pub actions: Vec<String>,
}

impl Scope {
    /// Parse one scope string, returning `None` when it is malformed
    ///
    /// The string is split on `:` into at most three parts, so a colon inside
    /// the action list stays in the last part. Actions are split on `,`,
    /// trimmed, and empty tokens are dropped; a scope left with no action
    /// at all is malformed too.
    pub fn parse(raw: &str) -> Option<Scope> {
        let mut parts = raw.splitn(3, ':');
        let (kind, name, actions) = match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(name), Some(actions)) => (kind, name, actions),
            _ => {
                debug!("Skipping malformed scope '{}'", raw);
                return None;
            }
        };

        let actions = split_actions(actions);
        if actions.is_empty() {
            debug!("Skipping scope '{}' without actions", raw);
            return None;
        }

        Some(Scope {
            kind: kind.to_string(),
            name: name.to_string(),
            actions,
        })
    }

    /// Split a registry name into `(namespace, repo)`
    ///
    /// Names follow `registry/namespace/repo`; everything after the second `/`
    /// belongs to the repository, so nested repositories keep their slashes.
    pub fn namespace_and_repo(&self) -> Option<(&str, &str)> {
        let mut segments = self.name.splitn(3, '/');
        let _registry = segments.next()?;
        let namespace = segments.next()?;
        let repo = segments.next()?;
        Some((namespace, repo))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.name, self.actions.join(","))
    }
}

/// Split a comma separated action list, trimming and dropping empty tokens
pub fn split_actions(actions: &str) -> Vec<String> {
    actions
        .split(',')
        .map(str::trim)
        .filter(|action| !action.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a list of scope strings, silently dropping malformed entries
pub fn parse_scopes<S: AsRef<str>>(scopes: &[S]) -> Vec<Scope> {
    scopes
        .iter()
        .filter_map(|raw| Scope::parse(raw.as_ref()))
        .collect()
}

/// Render scopes in wire format, joined by single spaces
pub fn format_scopes(scopes: &[Scope]) -> String {
    scopes
        .iter()
        .map(Scope::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a space-delimited `scope` value into individual scope strings
pub fn split_scope_list(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(kind: &str, name: &str, actions: &[&str]) -> Scope {
        Scope {
            kind: kind.to_string(),
            name: name.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_single_and_multiple() {
        assert_eq!(
            parse_scopes(&["repository:foo/bar:pull"]),
            vec![scope("repository", "foo/bar", &["pull"])]
        );
        assert_eq!(
            parse_scopes(&["repository:foo/bar:pull", "repository:foo/baz:pull,push"]),
            vec![
                scope("repository", "foo/bar", &["pull"]),
                scope("repository", "foo/baz", &["pull", "push"]),
            ]
        );
        assert!(parse_scopes::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_malformed_scope_skipped() {
        let parsed = parse_scopes(&["repository:foo/bar", "repository:foo/baz:pull"]);
        assert_eq!(parsed, vec![scope("repository", "foo/baz", &["pull"])]);
    }

    #[test]
    fn test_actions_trimmed_and_empty_dropped() {
        let parsed = parse_scopes(&["repository:ns/repo:pull, push,,  ,delete"]);
        assert_eq!(
            parsed,
            vec![scope("repository", "ns/repo", &["pull", "push", "delete"])]
        );
    }

    #[test]
    fn test_scope_without_actions_is_malformed() {
        assert!(Scope::parse("repository:ns/repo:").is_none());
        assert!(Scope::parse("repository:ns/repo: , ").is_none());
    }

    #[test]
    fn test_colon_in_actions_stays_in_last_part() {
        let parsed = Scope::parse("registry:catalog:*:extra").unwrap();
        assert_eq!(parsed.name, "catalog");
        assert_eq!(parsed.actions, vec!["*:extra"]);
    }

    #[test]
    fn test_format_then_parse_restores_scopes() {
        let scopes = vec![
            scope("repository", "registry.example.com/alice/app", &["pull", "push"]),
            scope("repository", "registry.example.com/alice/nested/app", &["pull"]),
        ];
        let wire = format_scopes(&scopes);
        assert_eq!(
            wire,
            "repository:registry.example.com/alice/app:pull,push \
             repository:registry.example.com/alice/nested/app:pull"
        );
        assert_eq!(parse_scopes(&split_scope_list(&wire)), scopes);
    }

    #[test]
    fn test_namespace_and_repo_keeps_nested_repo() {
        let nested = scope("repository", "registry.example.com/alice/team/app", &["pull"]);
        assert_eq!(nested.namespace_and_repo(), Some(("alice", "team/app")));

        let short = scope("repository", "alice/app", &["pull"]);
        assert_eq!(short.namespace_and_repo(), None);
    }

    #[test]
    fn test_access_claim_shape() {
        let value = serde_json::to_value(scope("repository", "demo", &["pull"])).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "repository", "name": "demo", "actions": ["pull"]})
        );
    }
}
