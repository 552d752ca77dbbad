// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rcgen::{CertificateParams, DnType, KeyPair};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::EncodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};

/// Generate an RS256 key pair for keypebble, optionally with a self-signed
/// certificate usable as `x5c_chain_path`
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Output path for the public key PEM file
    #[clap(long, default_value = "./rs256_public.pem")]
    out_pub_key: PathBuf,

    /// Output path for the private key PEM file
    #[clap(long, default_value = "./rs256_private.pem")]
    out_private_key: PathBuf,

    /// RSA key length in bits
    #[clap(long, default_value = "2048")]
    length: usize,

    /// Also write a self-signed certificate for the key to this path
    #[clap(long)]
    cert: Option<PathBuf>,

    /// Common name of the certificate
    #[clap(long, default_value = "keypebble")]
    common_name: String,

    /// Certificate validity in days
    #[clap(long, default_value = "365")]
    days: i64,
}

fn write_pem(path: &Path, pem: &str, what: &str) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create {} file at {:?}", what, path))?;
    file.write_all(pem.as_bytes())
        .with_context(|| format!("Failed to write {} to {:?}", what, path))?;
    println!("{} written to: {:?}", what, path);
    Ok(())
}

fn self_signed_certificate(private_key: &RsaPrivateKey, args: &Args) -> Result<String> {
    let pkcs8 = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("Failed to encode private key to PKCS#8")?;
    let key_pair = KeyPair::from_pem(&pkcs8).context("Failed to load RSA key into rcgen")?;

    let mut params = CertificateParams::new(vec![args.common_name.clone()])
        .context("Invalid certificate subject")?;
    params
        .distinguished_name
        .push(DnType::CommonName, args.common_name.clone());
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(args.days);

    let certificate = params
        .self_signed(&key_pair)
        .context("Failed to self-sign certificate")?;
    Ok(certificate.pem())
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Generating RSA key pair with {} bits...", args.length);

    let mut rng = rsa::rand_core::OsRng;

    let private_key =
        RsaPrivateKey::new(&mut rng, args.length).context("Failed to generate RSA private key")?;
    let public_key = RsaPublicKey::from(&private_key);

    // PKCS#1 is what rs256_private_key / rs256_public_key expect
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .context("Failed to encode private key to PEM")?;
    let public_pem = public_key
        .to_pkcs1_pem(LineEnding::LF)
        .context("Failed to encode public key to PEM")?;

    write_pem(&args.out_private_key, &private_pem, "Private key")?;
    write_pem(&args.out_pub_key, &public_pem, "Public key")?;

    if let Some(cert_path) = &args.cert {
        let certificate = self_signed_certificate(&private_key, &args)?;
        write_pem(cert_path, &certificate, "Certificate")?;
    }

    println!();
    println!("Reference the files from the keypebble configuration:");
    println!("  algorithm: RS256");
    println!("  rs256_private_key: {}", args.out_private_key.display());
    println!("  rs256_public_key: {}", args.out_pub_key.display());
    if let Some(cert_path) = &args.cert {
        println!("  x5c_chain_path: {}", cert_path.display());
    }

    Ok(())
}
