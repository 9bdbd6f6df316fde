//! `steg`: a thin CLI harness over the core (spec §6 — "not a bulk-load
//! pipeline", assumes pre-built BinDB tables and a vocabulary index
//! already exist on disk).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use stegosys::config::Config;
use stegosys::engine::Engine;
use stegosys::stego::{pk2s, sk2p, Key, Plaintext, Stegotext};

#[derive(Parser)]
#[command(name = "steg", about = "Hide and reveal messages in grammatical stegotext")]
struct Cli {
    /// Directory containing the `{n}gram` BinDB table files.
    #[arg(long, global = true)]
    tables: PathBuf,
    /// Vocabulary index file.
    #[arg(long, global = true)]
    vocab: PathBuf,
    /// Maximum n-gram order the tables were built up to.
    #[arg(long, global = true, default_value_t = 3)]
    n_max: usize,
    /// Back-off leftover-mass weight.
    #[arg(long, global = true, default_value_t = 0.5)]
    alpha: f64,
    /// Back-off context-count weight.
    #[arg(long, global = true, default_value_t = 0.1)]
    beta: f64,
    /// Deterministic RNG seed (omit for OS entropy).
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hide `plaintext` inside grammatical text keyed by `key`.
    Hide {
        plaintext: String,
        key: String,
    },
    /// Recover the plaintext hidden in `stegotext` under `key`.
    Reveal {
        stegotext: String,
        key: String,
    },
    /// Generate a random key of `bits` bits rendered as grammatical text.
    Keygen {
        #[arg(default_value_t = 128)]
        bits: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config {
        n_max: cli.n_max,
        alpha: cli.alpha,
        beta: cli.beta,
        seed: cli.seed,
        ..Config::default()
    };
    let engine = Engine::open(&cli.tables, &cli.vocab, config)
        .with_context(|| "failed to open BinDB tables / vocabulary index")?;

    match cli.command {
        Commands::Hide { plaintext, key } => {
            let mut rng = seeded_rng(cli.seed);
            let p = Plaintext::from_text(&engine, &plaintext)?;
            let k = Key::from_text(&engine, &key)?;
            let s = pk2s(&engine, &p, &k, &mut rng)?;
            println!("{}", s.text());
        }
        Commands::Reveal { stegotext, key } => {
            let s = Stegotext::from_text(&engine, &stegotext)?;
            let k = Key::from_text(&engine, &key)?;
            let p = sk2p(&engine, &s, &k)?;
            println!("{}", p.text());
        }
        Commands::Keygen { bits } => {
            let mut rng = seeded_rng(cli.seed);
            let k = Key::generate(&engine, bits, &mut rng)?;
            println!("{}", k.text());
        }
    }
    Ok(())
}

fn seeded_rng(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(s) => ChaCha20Rng::seed_from_u64(s),
        None => ChaCha20Rng::from_os_rng(),
    }
}
