use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::{error, info};
use tracing_forest::{ForestLayer, util::LevelFilter};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};
use whir_recursive_verifier::{
    FieldElement,
    backend::{ConstraintSystemBackend, NativeBackend, load_or_setup_keys},
    config::ProofConfig,
    errors::Error,
    merkle_tree::QueryBinding,
    r1cs::R1cs,
    spartan::VerificationContext,
};

type F = FieldElement;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Proof configuration: WHIR parameters, IO pattern and transcript.
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// R1CS instance the proof is about.
    #[arg(short = 'r', long)]
    r1cs: PathBuf,

    #[arg(long)]
    pk: Option<PathBuf>,

    #[arg(long)]
    vk: Option<PathBuf>,

    /// Accept deduplicated Merkle openings.
    #[arg(long)]
    membership_queries: bool,
}

fn run(args: &Args) -> Result<(), Error> {
    let config = ProofConfig::from_file(&args.config)?;
    let r1cs = R1cs::<F>::from_file(&args.r1cs)?;
    let context = VerificationContext::new(&config, r1cs)?;
    info!(
        constraints = context.r1cs.num_constraints,
        witnesses = context.r1cs.num_witnesses,
        transcript_len = context.transcript.len(),
        "loaded proof"
    );

    let query_binding = if args.membership_queries {
        QueryBinding::Membership
    } else {
        QueryBinding::Positional
    };
    let backend = NativeBackend::new(query_binding);
    let circuit = ConstraintSystemBackend::<F>::compile(&backend, context)?;
    let (pk, vk) = load_or_setup_keys::<F, _>(
        &backend,
        &circuit,
        args.pk.as_deref(),
        args.vk.as_deref(),
    )?;
    let proof = backend.prove(&pk, &circuit)?;
    backend.verify(&vk, &circuit, &proof)
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    Registry::default()
        .with(env_filter)
        .with(ForestLayer::default())
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => {
            info!("verification succeeded");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
