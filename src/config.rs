//! Engine configuration (spec §6).
//!
//! Plain record carrying the parameters the core needs to interpret a
//! BinDB/vocabulary pair as a language model, plus the knobs for
//! `deep_decode`'s refinement and RNG seeding. `serde::Deserialize` is
//! behind the optional `serde` feature, the way the teacher gates its own
//! optional dependency.

#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum n-gram order the BinDB tables were built up to.
    pub n_max: usize,
    /// Expected sentinel id for `_START_`. `None` means "trust whatever
    /// the vocabulary index assigns it". When set, [`crate::engine::Engine::open`]
    /// checks it against the id the loaded vocabulary actually resolves
    /// `_START_` to and fails loudly on mismatch, rather than silently
    /// running against the wrong sentinel.
    pub start_id: Option<u32>,
    /// Expected sentinel id for `_END_`, checked the same way as `start_id`.
    pub end_id: Option<u32>,
    /// Leftover-mass scaling weight in the back-off model (spec §4.5).
    pub alpha: f64,
    /// Context-count scaling weight in the back-off model (spec §4.5).
    pub beta: f64,
    /// Random bits drawn per `deep_decode` refinement round.
    pub refinement_bits: usize,
    /// Upper bound on `deep_decode`'s refinement rounds before it reports
    /// [`crate::error::StegError::DecodeExhausted`] instead of hanging.
    pub max_refinement_rounds: usize,
    /// Deterministic RNG seed. `None` uses OS entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    /// `alpha`/`beta` match the original's test fixtures
    /// (`scripts/googlebooks/bindb/test_bindb_lm.py`); `refinement_bits`
    /// is the spec's default of 100. `start_id`/`end_id` default to `None`:
    /// the vocabulary index is the source of truth for sentinel ids (spec
    /// §4.3), these are only an optional sanity check against it.
    fn default() -> Self {
        Config {
            n_max: 3,
            start_id: None,
            end_id: None,
            alpha: 0.5,
            beta: 0.1,
            refinement_bits: 100,
            max_refinement_rounds: 64,
            seed: None,
        }
    }
}
