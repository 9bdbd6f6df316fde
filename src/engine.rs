//! The steganographic engine (spec §5, §9): owns the open BinDB file
//! handles, the vocabulary index, and the model's per-engine LRU cache.
//!
//! Construction is the only place that can fail with I/O errors (missing
//! table files, malformed vocabulary); every operation after that is a
//! pure function over the loaded tables, as spec §5 requires. Not `Sync`:
//! each `BinDb` table holds a file handle with a shared seek pointer, so
//! an engine must not be shared between threads (spec §5) — callers that
//! need concurrency should construct one engine per thread.

use std::io::BufReader;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context as _;
use rand::RngCore;

use crate::bindb::BinDb;
use crate::coder;
use crate::config::Config;
use crate::error::Result;
use crate::interval::Interval;
use crate::model::BackoffModel;
use crate::vocab::Vocabulary;

/// Ties a [`BinDb`], a [`Vocabulary`] and a [`BackoffModel`] together
/// behind the [`Config`] that parameterized them.
pub struct Engine {
    vocab: Rc<Vocabulary>,
    model: BackoffModel,
    config: Config,
}

impl Engine {
    /// Open the BinDB tables under `table_dir` (`{table_dir}/{n}gram` for
    /// `n` in `1..=config.n_max`) and load the vocabulary index file.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(table_dir: P, vocab_path: Q, config: Config) -> Result<Self> {
        let vocab_file = std::fs::File::open(vocab_path.as_ref())
            .with_context(|| format!("cannot open vocabulary index {}", vocab_path.as_ref().display()))?;
        let vocab = Rc::new(Vocabulary::load(BufReader::new(vocab_file))?);
        log::info!(
            "loaded vocabulary of {} tokens from {}",
            vocab.len(),
            vocab_path.as_ref().display()
        );
        if let Some(expected) = config.start_id {
            if expected != vocab.start_id() {
                return Err(crate::error::StegError::Vocabulary(format!(
                    "configured start_id {expected} does not match _START_'s id {} in the loaded vocabulary",
                    vocab.start_id()
                )));
            }
        }
        if let Some(expected) = config.end_id {
            if expected != vocab.end_id() {
                return Err(crate::error::StegError::Vocabulary(format!(
                    "configured end_id {expected} does not match _END_'s id {} in the loaded vocabulary",
                    vocab.end_id()
                )));
            }
        }

        let db = BinDb::open(table_dir.as_ref(), config.n_max)?;
        for n in 1..=config.n_max {
            log::debug!("order-{n} BinDB table has {} records", db.size(n)?);
        }

        let model = BackoffModel::new(db, Rc::clone(&vocab), config.n_max, config.alpha, config.beta);
        log::info!(
            "engine ready: n_max={} alpha={} beta={}",
            config.n_max,
            config.alpha,
            config.beta
        );
        Ok(Engine { vocab, model, config })
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn encode(&self, context: &[u32], tokens: &[u32]) -> Result<Interval> {
        coder::encode(&self.model, context, tokens)
    }

    pub fn decode(&self, context: &[u32], interval: &Interval) -> Result<Vec<u32>> {
        coder::decode(&self.model, context, interval)
    }

    pub fn deep_decode<R: RngCore>(
        &self,
        context: &[u32],
        interval: &Interval,
        end_id: Option<u32>,
        rng: &mut R,
    ) -> Result<Vec<u32>> {
        let decoded = coder::deep_decode(
            &self.model,
            context,
            interval,
            end_id,
            self.config.refinement_bits,
            self.config.max_refinement_rounds,
            rng,
        );
        if let Err(crate::error::StegError::DecodeExhausted { rounds }) = &decoded {
            log::warn!("deep_decode exhausted its refinement budget after {rounds} rounds");
        }
        decoded
    }
}
