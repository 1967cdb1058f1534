//! sigfault CLI: drive the coprocessor signer, generate keys, and mount the
//! Boneh-DeMillo-Lipton fault attack.
//!
//! Operands cross the boundary as base-10 tokens in the fixed order
//! `p q N d m [f]`; signatures come back as a base-10 line followed by the
//! cycle count, or as a JSON report with `--json`.

use clap::{Parser, Subcommand};
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing::info;

use sigfault_attack::{run_bdl_attack, AttackError, AttackOutcome};
use sigfault_copro::{FaultBranch, FaultSpec};
use sigfault_rsa::{
    KeyPair, KeygenError, SignError, SignMode, Signature, Signer, SignerConfig,
};

/// Exit code for a detected (countermeasure-caught) fault.
const EXIT_FAULT_DETECTED: u8 = 2;

#[derive(Parser)]
#[command(name = "sigfault")]
#[command(version = "0.1.0")]
#[command(about = "Cycle-accurate RSA-CRT signing coprocessor with fault injection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an RSA key pair
    Keygen {
        /// Modulus size in bits
        #[arg(long, value_name = "BITS", default_value = "1024")]
        bits: u64,

        /// RNG seed for reproducible output
        #[arg(long, value_name = "SEED")]
        seed: Option<u64>,

        /// Emit a JSON report instead of one decimal per line
        #[arg(long)]
        json: bool,
    },

    /// Sign a message on the coprocessor
    Sign {
        /// Signing mode (noncrt, crt-direct, crt-shamir)
        #[arg(long, value_name = "MODE", default_value = "crt-direct")]
        mode: String,

        /// Register width in bits (512 or 1024)
        #[arg(long, value_name = "BITS", default_value = "1024")]
        bit_width: u64,

        /// Fault cycle; 0 disables injection (overrides a trailing f token)
        #[arg(long, value_name = "CYCLE")]
        fault_cycle: Option<u64>,

        /// Fault branch (none, p, q)
        #[arg(long, value_name = "BRANCH", default_value = "none")]
        fault_branch: String,

        /// Blinding prime size in bits (crt-shamir only)
        #[arg(long, value_name = "BITS", default_value = "224")]
        blinding_bits: u64,

        /// Read operands from a file instead of stdin
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// RNG seed for reproducible fault positions
        #[arg(long, value_name = "SEED")]
        seed: Option<u64>,

        /// Emit a JSON report instead of signature and cycle count lines
        #[arg(long)]
        json: bool,
    },

    /// Run the fault-cycle scan attack against a fresh key
    Attack {
        /// Modulus size in bits
        #[arg(long, value_name = "BITS", default_value = "512")]
        bits: u64,

        /// Register width in bits (defaults to the modulus size)
        #[arg(long, value_name = "BITS")]
        bit_width: Option<u64>,

        /// RNG seed for a reproducible run
        #[arg(long, value_name = "SEED")]
        seed: Option<u64>,

        /// Emit the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid operand {token:?}: expected a base-10 integer")]
    InvalidOperand { token: String },

    #[error("operand stream ended early: expected p q N d m [f]")]
    MissingOperand,

    #[error("unknown mode {0:?} (expected noncrt, crt-direct or crt-shamir)")]
    UnknownMode(String),

    #[error("unknown fault branch {0:?} (expected none, p or q)")]
    UnknownBranch(String),

    #[error("unsupported register width {0} (expected 512 or 1024)")]
    BadBitWidth(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Keygen(#[from] KeygenError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Attack(#[from] AttackError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Operands in protocol order, with the optional trailing fault cycle.
#[derive(Debug)]
struct Operands {
    p: BigUint,
    q: BigUint,
    n: BigUint,
    d: BigUint,
    m: BigUint,
    fault_cycle: Option<u64>,
}

#[derive(Serialize)]
struct SignReport<'a> {
    mode: &'a str,
    bit_width: u64,
    #[serde(flatten)]
    signature: &'a Signature,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Keygen { bits, seed, json } => keygen_command(bits, seed, json),
        Commands::Sign {
            mode,
            bit_width,
            fault_cycle,
            fault_branch,
            blinding_bits,
            input,
            seed,
            json,
        } => sign_command(
            &mode,
            bit_width,
            fault_cycle,
            &fault_branch,
            blinding_bits,
            input.as_deref(),
            seed,
            json,
        ),
        Commands::Attack {
            bits,
            bit_width,
            seed,
            json,
        } => attack_command(bits, bit_width, seed, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sigfault: {err}");
            if matches!(&err, CliError::Sign(e) if e.is_fault_detected()) {
                ExitCode::from(EXIT_FAULT_DETECTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn keygen_command(bits: u64, seed: Option<u64>, json: bool) -> Result<(), CliError> {
    let mut rng = seeded_rng(seed);
    let key = KeyPair::generate(bits, &mut rng)?;
    info!(bits, "key pair generated");

    if json {
        println!("{}", serde_json::to_string_pretty(&key)?);
    } else {
        println!("{}", key.p);
        println!("{}", key.q);
        println!("{}", key.n);
        println!("{}", key.e);
        println!("{}", key.d);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn sign_command(
    mode: &str,
    bit_width: u64,
    fault_cycle: Option<u64>,
    fault_branch: &str,
    blinding_bits: u64,
    input: Option<&Path>,
    seed: Option<u64>,
    json: bool,
) -> Result<(), CliError> {
    let mode = parse_mode(mode)?;
    let branch = parse_branch(fault_branch)?;
    if bit_width != 512 && bit_width != 1024 {
        return Err(CliError::BadBitWidth(bit_width));
    }

    let text = read_input(input)?;
    let operands = parse_operands(&text)?;
    let fault = FaultSpec {
        // An explicit flag wins over the trailing protocol token.
        cycle: fault_cycle.or(operands.fault_cycle).unwrap_or(0),
        branch,
    };

    let key = KeyPair {
        p: operands.p,
        q: operands.q,
        n: operands.n,
        e: BigUint::default(), // not part of the signing protocol
        d: operands.d,
    };
    let config = SignerConfig {
        mode,
        bit_width,
        blinding_bits,
        blinding: None,
    };
    let mut signer = match seed {
        Some(seed) => Signer::seeded(key, config, seed)?,
        None => Signer::new(key, config)?,
    };

    let signature = signer.sign(&operands.m, fault)?;
    if json {
        let report = SignReport {
            mode: mode_name(mode),
            bit_width,
            signature: &signature,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", signature.value);
        println!("{}", signature.cycles);
    }
    Ok(())
}

fn attack_command(
    bits: u64,
    bit_width: Option<u64>,
    seed: Option<u64>,
    json: bool,
) -> Result<(), CliError> {
    let mut rng = seeded_rng(seed);
    let key = KeyPair::generate(bits, &mut rng)?;
    let config = SignerConfig {
        mode: SignMode::CrtDirect,
        bit_width: bit_width.unwrap_or(bits),
        ..Default::default()
    };
    let mut signer = Signer::seeded(key.clone(), config, rng.gen())?;

    let m = rng.gen_range(2u64..u64::MAX);
    let outcome = run_bdl_attack(&mut signer, &BigUint::from(m))?;
    report_attack(&key, &outcome, json)
}

fn report_attack(key: &KeyPair, outcome: &AttackOutcome, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    println!("p = {}", outcome.p);
    println!("q = {}", outcome.q);
    println!("d = {}", outcome.d);
    println!(
        "recovered after {} faulty signatures (fault cycle {})",
        outcome.attempts, outcome.fault_cycle
    );
    if outcome.d == key.d {
        println!("recovered exponent matches the signer's key");
    }
    Ok(())
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn read_input(input: Option<&Path>) -> Result<String, CliError> {
    match input {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn parse_operands(text: &str) -> Result<Operands, CliError> {
    let mut tokens = text.split_whitespace();
    let mut next = || tokens.next().ok_or(CliError::MissingOperand);
    let p = parse_biguint(next()?)?;
    let q = parse_biguint(next()?)?;
    let n = parse_biguint(next()?)?;
    let d = parse_biguint(next()?)?;
    let m = parse_biguint(next()?)?;
    let fault_cycle = match tokens.next() {
        Some(tok) => Some(parse_u64(tok)?),
        None => None,
    };
    Ok(Operands {
        p,
        q,
        n,
        d,
        m,
        fault_cycle,
    })
}

fn parse_biguint(token: &str) -> Result<BigUint, CliError> {
    token.parse().map_err(|_| CliError::InvalidOperand {
        token: token.to_string(),
    })
}

fn parse_u64(token: &str) -> Result<u64, CliError> {
    token.parse().map_err(|_| CliError::InvalidOperand {
        token: token.to_string(),
    })
}

fn parse_mode(name: &str) -> Result<SignMode, CliError> {
    match name {
        "noncrt" => Ok(SignMode::NonCrt),
        "crt-direct" => Ok(SignMode::CrtDirect),
        "crt-shamir" => Ok(SignMode::CrtShamir),
        other => Err(CliError::UnknownMode(other.to_string())),
    }
}

fn mode_name(mode: SignMode) -> &'static str {
    match mode {
        SignMode::NonCrt => "noncrt",
        SignMode::CrtDirect => "crt-direct",
        SignMode::CrtShamir => "crt-shamir",
    }
}

fn parse_branch(name: &str) -> Result<FaultBranch, CliError> {
    match name {
        "none" => Ok(FaultBranch::None),
        "p" => Ok(FaultBranch::P),
        "q" => Ok(FaultBranch::Q),
        other => Err(CliError::UnknownBranch(other.to_string())),
    }
}
