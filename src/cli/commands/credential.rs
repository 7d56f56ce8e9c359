//! Credential command implementation.
//!
//! Key generation, credential issuing and request signing, for driving a
//! local aggregate manager by hand.

use crate::auth::keys::{self, SigningKey};
use crate::auth::{CredentialDocument, WILDCARD_PRIVILEGE};
use crate::core::time::{Clock, SystemClock};
use crate::net::RpcRequest;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// Credential operations.
#[derive(Args, Debug)]
pub struct CredentialArgs {
    #[command(subcommand)]
    pub command: CredentialCommand,
}

/// Credential subcommands.
#[derive(Subcommand, Debug)]
pub enum CredentialCommand {
    /// Generate an Ed25519 key pair.
    Keygen {
        /// Secret key output file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Issue a signed credential.
    Issue(IssueArgs),
    /// Sign a request line as its caller.
    SignRequest(SignRequestArgs),
}

/// Credential issuing arguments.
#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Issuer secret key file.
    #[arg(long)]
    pub key: PathBuf,

    /// Issuing authority URN; must be trusted by the aggregate.
    #[arg(long)]
    pub issuer: String,

    /// Caller subject the credential is issued to.
    #[arg(long)]
    pub owner: String,

    /// Base64 public key of the owner.
    #[arg(long)]
    pub owner_key: String,

    /// Slice URN the privileges apply to.
    #[arg(long)]
    pub target: Option<String>,

    /// Granted privilege; repeatable. Defaults to all privileges.
    #[arg(long = "privilege")]
    pub privileges: Vec<String>,

    /// Lifetime in hours.
    #[arg(long, default_value_t = 24)]
    pub valid_hours: i64,
}

/// Request signing arguments.
#[derive(Args, Debug)]
pub struct SignRequestArgs {
    /// Caller secret key file.
    #[arg(long)]
    pub key: PathBuf,

    /// Caller subject.
    #[arg(long)]
    pub caller: String,

    /// Operation name.
    #[arg(long)]
    pub method: String,

    /// Operation parameters as a JSON object.
    #[arg(long, default_value = "{}")]
    pub params: String,

    /// Request id.
    #[arg(long, default_value_t = 1)]
    pub id: u64,
}

/// Run the credential command.
pub fn run_credential(args: CredentialArgs) -> Result<()> {
    match args.command {
        CredentialCommand::Keygen { output } => keygen(&output),
        CredentialCommand::Issue(args) => {
            let issuer_key = keys::load_signing_key(&args.key)?;
            let document = issue(&args, SystemClock.now())?;
            println!("{}", document.sign(&issuer_key));
            Ok(())
        }
        CredentialCommand::SignRequest(args) => {
            let key = keys::load_signing_key(&args.key)?;
            let request = sign_request(&args, &key)?;
            println!(
                "{}",
                serde_json::to_string(&request).context("failed to render request")?
            );
            Ok(())
        }
    }
}

fn keygen(output: &std::path::Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!("refusing to overwrite {}", output.display());
    }
    let key = keys::generate_signing_key();
    std::fs::write(output, format!("{}\n", keys::encode_signing_key(&key)))
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("{}", keys::encode_public_key(&key.verifying_key()));
    Ok(())
}

fn issue(args: &IssueArgs, now: DateTime<Utc>) -> Result<CredentialDocument> {
    if args.valid_hours <= 0 {
        anyhow::bail!("--valid-hours must be > 0");
    }
    let owner_key = keys::decode_public_key(&args.owner_key).context("invalid --owner-key")?;
    let privileges: Vec<&str> = if args.privileges.is_empty() {
        vec![WILDCARD_PRIVILEGE]
    } else {
        args.privileges.iter().map(String::as_str).collect()
    };
    Ok(CredentialDocument::new(
        args.issuer.as_str(),
        args.owner.as_str(),
        &owner_key,
        args.target.as_deref(),
        &privileges,
        now + Duration::hours(args.valid_hours),
    ))
}

fn sign_request(args: &SignRequestArgs, key: &SigningKey) -> Result<RpcRequest> {
    let params: Value = serde_json::from_str(&args.params).context("--params is not JSON")?;
    if !params.is_object() {
        anyhow::bail!("--params must be a JSON object");
    }
    Ok(RpcRequest::new(
        Value::from(args.id),
        Some(args.caller.clone()),
        args.method.as_str(),
        params,
    )
    .signed(key))
}
