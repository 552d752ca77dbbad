use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use keypebble::claims::ClaimMap;
use keypebble::config::IssuerConfig;
use keypebble::jwt::{decode_token, issue_token, parse_certificate_chain};
use keypebble::TokenError;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn rs256_config() -> IssuerConfig {
    IssuerConfig {
        algorithm: "RS256".to_string(),
        issuer: Some("https://keypebble.test".to_string()),
        audience: Some("registry".to_string()),
        rs256_private_key: Some(fixture("rs256_private.pem").display().to_string()),
        rs256_public_key: Some(fixture("rs256_public.pem").display().to_string()),
        ..Default::default()
    }
}

fn raw_header(token: &str) -> Result<Value> {
    let segment = token.split('.').next().unwrap_or_default();
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(segment)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn sub(value: &str) -> ClaimMap {
    let mut claims = ClaimMap::new();
    claims.insert("sub".to_string(), json!(value));
    claims
}

#[test]
fn test_rs256_round_trip_with_public_key() -> Result<()> {
    let config = rs256_config();
    let token = issue_token(&config, sub("alice"))?;

    let header = raw_header(&token)?;
    assert_eq!(header["alg"], json!("RS256"));
    assert_eq!(header["typ"], json!("JWT"));

    let payload = decode_token(&config, &token)?;
    assert_eq!(payload["sub"], json!("alice"));
    assert_eq!(payload["iss"], json!("https://keypebble.test"));
    Ok(())
}

#[test]
fn test_rs256_verification_falls_back_to_private_key() -> Result<()> {
    let mut config = rs256_config();
    let token = issue_token(&config, sub("bob"))?;

    config.rs256_public_key = None;
    let payload = decode_token(&config, &token)?;
    assert_eq!(payload["sub"], json!("bob"));
    Ok(())
}

#[test]
fn test_rs256_inline_pem_keys() -> Result<()> {
    let mut config = rs256_config();
    config.rs256_private_key = Some(fs::read_to_string(fixture("rs256_private.pem"))?);
    config.rs256_public_key = Some(fs::read_to_string(fixture("rs256_public.pem"))?);

    let token = issue_token(&config, sub("carol"))?;
    assert_eq!(decode_token(&config, &token)?["sub"], json!("carol"));
    Ok(())
}

#[test]
fn test_rs256_header_carries_kid_and_x5c() -> Result<()> {
    let mut config = rs256_config();
    config.key_id = Some("keypebble-2025".to_string());
    config.x5c_chain_path = Some(fixture("x5c_chain.pem"));

    let token = issue_token(&config, sub("alice"))?;
    let header = raw_header(&token)?;
    assert_eq!(header["kid"], json!("keypebble-2025"));

    let expected = parse_certificate_chain(&fs::read_to_string(fixture("x5c_chain.pem"))?);
    assert_eq!(expected.len(), 2);
    let x5c = header["x5c"].as_array().expect("x5c must be a list");
    assert_eq!(x5c.len(), 2);
    for (published, certificate) in x5c.iter().zip(&expected) {
        let published = published.as_str().unwrap();
        assert_eq!(published, certificate);
        assert!(!published.contains('\n'));
        assert!(general_purpose::STANDARD.decode(published).is_ok());
    }

    assert!(decode_token(&config, &token).is_ok());
    Ok(())
}

#[test]
fn test_x5c_only_for_rs256() -> Result<()> {
    let config = IssuerConfig {
        hs256_secret: Some("abc123".to_string()),
        x5c_chain_path: Some(fixture("x5c_chain.pem")),
        ..Default::default()
    };
    let header = raw_header(&issue_token(&config, ClaimMap::new())?)?;
    assert!(header.get("x5c").is_none());
    assert!(header.get("kid").is_none());
    Ok(())
}

#[test]
fn test_algorithm_mismatch_is_rejected() -> Result<()> {
    let hs_config = IssuerConfig {
        hs256_secret: Some("abc123".to_string()),
        audience: Some("registry".to_string()),
        ..Default::default()
    };
    let token = issue_token(&hs_config, sub("mallory"))?;

    assert!(matches!(
        decode_token(&rs256_config(), &token),
        Err(TokenError::Verification { .. })
    ));
    Ok(())
}

#[test]
fn test_missing_private_key() {
    let mut config = rs256_config();
    config.rs256_private_key = None;
    let err = issue_token(&config, ClaimMap::new()).unwrap_err();
    assert!(matches!(err, TokenError::Configuration { .. }));
    assert!(err.to_string().contains("rs256_private_key"));

    let mut config = rs256_config();
    config.rs256_private_key = Some("/nonexistent/keypebble/private.pem".to_string());
    assert!(matches!(
        issue_token(&config, ClaimMap::new()),
        Err(TokenError::Configuration { .. })
    ));
}
