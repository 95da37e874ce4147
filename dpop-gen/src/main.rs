use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use clap::Parser;
use dpop::{Ed25519KeyHolder, ProofBuilder, ProofClaims};

/// Generate a DPoP proof JWT (JWS compact serialization) signed with an Ed25519 private key.
///
/// Outputs:
/// - the DPoP proof (value of the `DPoP` request header)
/// - the JWK thumbprint (jkt) the access token must carry in `cnf.jkt`
/// - the access token hash (ath) when an access token is given
#[derive(Parser, Debug)]
#[command(name = "dpop-gen", version, about)]
struct Args {
    /// HTTP method (HTM) e.g. GET/POST/PUT
    #[arg(long, default_value = "GET")]
    method: String,

    /// Full request URL used as HTU (e.g. http://localhost:8080/validate-token)
    #[arg(long)]
    url: String,

    /// Path to the client's Ed25519 private key in PEM (PKCS#8)
    #[arg(long, value_name = "FILE")]
    dpop_private_pem: PathBuf,

    /// Access token string. If provided, ath will be included in the proof.
    #[arg(long)]
    access_token: Option<String>,

    /// Optional server-provided nonce
    #[arg(long)]
    nonce: Option<String>,

    /// Override iat (unix seconds). Default: now.
    #[arg(long)]
    iat: Option<i64>,

    /// Override jti. Default: random UUID v4.
    #[arg(long)]
    jti: Option<String>,

    /// Print only the DPoP token (no extra lines)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn now_unix() -> anyhow::Result<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?;
    Ok(elapsed.as_secs() as i64)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let pem = fs::read_to_string(&args.dpop_private_pem)
        .with_context(|| format!("failed to read {}", args.dpop_private_pem.display()))?;
    let builder = ProofBuilder::new(Ed25519KeyHolder::from_pkcs8_pem(&pem)?);

    let iat = match args.iat {
        Some(iat) => iat,
        None => now_unix()?,
    };

    let mut claims =
        ProofClaims::for_request(&args.method, &args.url, args.access_token.as_deref(), iat)?;
    if let Some(jti) = args.jti {
        claims.jti = Some(jti);
    }
    claims.nonce = args.nonce;

    let proof = builder.sign_claims(&claims)?;

    if args.quiet {
        println!("{}", proof);
        return Ok(());
    }

    println!("DPoP: {}", proof);
    println!("jkt (cnf.jkt): {}", builder.thumbprint()?);
    println!("htm: {}", claims.htm.as_deref().unwrap_or_default());
    println!("htu: {}", claims.htu.as_deref().unwrap_or_default());
    println!("iat: {}", iat);
    println!("jti: {}", claims.jti.as_deref().unwrap_or_default());
    match claims.ath.as_deref() {
        Some(ath) => println!("ath: {}", ath),
        None => println!("ath: (none)"),
    }

    Ok(())
}
