use anyhow::Result;
use keypebble::claims::ClaimMap;
use keypebble::policy::{apply_policy, Policy, PolicySource};
use keypebble::scope::{format_scopes, parse_scopes, Scope};
use keypebble::TokenError;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

const POLICY: &str = r#"
users:
  alice:
    namespace: alice-space
    repos: [app-api, app-ui]
    actions: [pull]
  bob:
    namespace: bob-space
    repos: [app-api]
    actions: [pull, push]
"#;

fn policy() -> Policy {
    Policy::from_yaml_str(POLICY).unwrap()
}

#[test]
fn test_push_is_stripped_for_pull_only_user() {
    let access = policy().allowed_access(
        "alice",
        &["repository:registry.example.com/alice-space/app-api:pull,push"],
    );
    assert_eq!(
        serde_json::to_value(&access).unwrap(),
        json!([{
            "type": "repository",
            "name": "registry.example.com/alice-space/app-api",
            "actions": ["pull"]
        }])
    );
}

#[test]
fn test_namespace_mismatch_yields_nothing() {
    let access = policy().allowed_access(
        "alice",
        &["repository:registry.example.com/bob-space/app-api:pull"],
    );
    assert!(access.is_empty());
}

#[test]
fn test_unknown_user_gets_nothing() {
    let requested = [
        "repository:registry.example.com/alice-space/app-api:pull",
        "repository:registry.example.com/bob-space/app-api:pull,push",
    ];
    assert!(policy().allowed_access("ghost", &requested).is_empty());
    assert!(Policy::default().allowed_access("alice", &requested).is_empty());
}

#[test]
fn test_enforcement_keeps_request_order_and_skips_bad_entries() {
    let access = policy().allowed_access(
        "bob",
        &[
            "garbage",
            "repository:registry.example.com/bob-space/app-api:push",
            "repository:bob-space/app-api:pull",
            "repository:registry.example.com/bob-space/unknown:pull",
            "repository:registry.example.com/bob-space/app-api:delete",
            "repository:registry.example.com/bob-space/app-api:pull",
        ],
    );
    assert_eq!(
        format_scopes(&access),
        "repository:registry.example.com/bob-space/app-api:push \
         repository:registry.example.com/bob-space/app-api:pull"
    );
}

#[test]
fn test_generate_for_unknown_user_fails() {
    let err = policy().generate_for("ghost").unwrap_err();
    assert!(matches!(err, TokenError::UnknownUser { ref user } if user == "ghost"));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn test_generate_for_builds_full_entitlement() -> Result<()> {
    let generated = policy().generate_for("alice")?;
    assert_eq!(generated.sub, "alice");
    assert_eq!(
        generated.scope,
        "repository:alice-space/app-api:pull repository:alice-space/app-ui:pull"
    );
    assert_eq!(parse_scopes(&generated.scope.split(' ').collect::<Vec<_>>()), generated.access);
    Ok(())
}

#[test]
fn test_scope_round_trip() {
    let scopes = vec![
        Scope {
            kind: "repository".to_string(),
            name: "registry.example.com/alice/app".to_string(),
            actions: vec!["pull".to_string(), "push".to_string()],
        },
        Scope {
            kind: "registry".to_string(),
            name: "catalog".to_string(),
            actions: vec!["*".to_string()],
        },
    ];
    let wire = format_scopes(&scopes);
    let parsed = parse_scopes(&wire.split(' ').collect::<Vec<_>>());
    assert_eq!(parsed, scopes);
}

#[test]
fn test_apply_policy_enforces_requested_scope() -> Result<()> {
    let mut claims = ClaimMap::new();
    claims.insert("sub".to_string(), json!("alice"));
    claims.insert(
        "scope".to_string(),
        json!("repository:registry.example.com/alice-space/app-ui:pull,push"),
    );

    let claims = apply_policy(&policy(), claims, false)?;
    assert_eq!(
        claims["access"],
        json!([{"type": "repository", "name": "registry.example.com/alice-space/app-ui", "actions": ["pull"]}])
    );
    Ok(())
}

#[test]
fn test_apply_policy_generate_mode() -> Result<()> {
    let mut claims = ClaimMap::new();
    claims.insert("user".to_string(), json!("bob"));
    claims.insert("scope".to_string(), json!("repository:elsewhere/x:pull"));

    let claims = apply_policy(&policy(), claims, true)?;
    assert_eq!(claims["sub"], json!("bob"));
    assert_eq!(claims["scope"], json!("repository:bob-space/app-api:pull,push"));
    assert_eq!(
        claims["access"],
        json!([{"type": "repository", "name": "bob-space/app-api", "actions": ["pull", "push"]}])
    );
    Ok(())
}

#[test]
fn test_apply_policy_unknown_identity() {
    let err = apply_policy(&policy(), ClaimMap::new(), true).unwrap_err();
    assert!(matches!(err, TokenError::UnknownUser { ref user } if user == "unknown"));
}

#[test]
fn test_policy_files() -> Result<()> {
    let dir = tempdir()?;

    let missing = Policy::from_file(dir.path().join("absent.yaml"))?;
    assert!(missing.document().users.is_empty());

    let broken = dir.path().join("broken.yaml");
    fs::write(&broken, "users: [unclosed")?;
    assert!(matches!(
        Policy::from_file(&broken),
        Err(TokenError::Configuration { .. })
    ));

    let path = dir.path().join("policy.yaml");
    fs::write(&path, POLICY)?;
    let cached = PolicySource::from_path(&path, false)?;
    let reloading = PolicySource::from_path(&path, true)?;

    fs::write(&path, "users: {}\n")?;
    assert_eq!(cached.load()?.document().users.len(), 2);
    assert!(reloading.load()?.document().users.is_empty());
    Ok(())
}
