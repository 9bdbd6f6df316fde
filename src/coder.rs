//! Arithmetic coder over a [`BackoffModel`] (spec §4.6, §4.9).
//!
//! `encode` folds a token sequence into the interval it names under the
//! model's conditional distributions (the dual of [`bits2interval`] one
//! level up). `decode` reads it back out to the point where the interval is
//! unambiguous (shallow decode); `deep_decode` keeps refining with fresh
//! random bits until the decoded interval is provably contained in the
//! input, which is what lets a `Key`/`Stegotext` (spec §4.8-4.9) be read
//! back deterministically despite starting from an ambiguous superinterval.

use rand::RngCore;

use crate::error::{Result, StegError};
use crate::interval::{is_subinterval, random_interval, select_subinterval, Interval};
use crate::model::BackoffModel;

/// Default number of fresh random bits [`deep_decode`] appends per
/// refinement round (spec §4.6); [`crate::config::Config::refinement_bits`]
/// is the caller-facing knob, this is just its default value.
pub const REFINEMENT_BITS_PER_ROUND: usize = 100;

/// Fold `tokens` into the interval the model assigns to that exact sequence.
///
/// `context` seeds the conditional distribution of the first token (empty
/// for a fresh sentence); each subsequent token's interval is selected
/// within the interval accumulated so far.
pub fn encode(model: &BackoffModel, context: &[u32], tokens: &[u32]) -> Result<Interval> {
    let mut interval = Interval::unit();
    let mut history = context.to_vec();
    for &t in tokens {
        let p = model.conditional_interval(t, &history)?;
        interval = select_subinterval(&interval, &p);
        history.push(t);
    }
    Ok(interval)
}

/// Shallow decode: read tokens out of `interval` one at a time, stopping as
/// soon as the model can no longer identify a unique next token, i.e. the
/// remainder of `interval` straddles two candidates.
///
/// This does not stop at a sentence's `END`: since `START` is forced with
/// probability 1 right after it (§4.5 step 1), any interval still has a
/// unique next token there regardless of how little of it remains, so
/// decode keeps going into the next (forced) `START` before finally
/// running out of precision. Callers that want exactly one sentence's
/// worth of tokens should truncate the result after the first `end_id`,
/// or use [`deep_decode`] with `end_id` set, which checks for termination
/// immediately after each emitted token instead of only on ambiguity.
///
/// Unlike [`deep_decode`], this never injects randomness: it terminates
/// only on genuine ambiguity, and can legitimately decode fewer tokens than
/// a subsequent deep decode of the same interval would.
pub fn decode(model: &BackoffModel, context: &[u32], interval: &Interval) -> Result<Vec<u32>> {
    let mut tokens = Vec::new();
    let mut history = context.to_vec();
    let mut remaining = interval.clone();

    while let Some((t, scaled)) = model.next_token(&remaining, &history)? {
        tokens.push(t);
        history.push(t);
        remaining = scaled;
    }
    Ok(tokens)
}

/// Deep decode: the stronger decoding mode used whenever the caller needs
/// `interval` to remain a subinterval of the *output* sequence's own
/// encoded interval, optionally only accepting outputs that end on
/// `end_id`.
///
/// Maintains two parallel refinements of `interval` (`ir`, `irs`, matching
/// the original's naming): each round narrows both by the same batch of
/// fresh random bits, then `irs` is walked token-by-token by the shallow
/// decoder. After each emitted token, the implied output interval `o` is
/// recovered from `ir` and the shrunk `irs`, and decoding stops the moment
/// `o` is a superinterval of the original `interval` (and, if requested,
/// the token just emitted is `end_id`).
///
/// Spec §7: silent truncation is forbidden. The original algorithm loops
/// unconditionally; this crate bounds it at `max_rounds` batches of
/// refinement and reports [`StegError::DecodeExhausted`] instead of
/// hanging forever when no refinement leads to a terminating sequence.
pub fn deep_decode<R: RngCore>(
    model: &BackoffModel,
    context: &[u32],
    interval: &Interval,
    end_id: Option<u32>,
    bits_per_round: usize,
    max_rounds: usize,
    rng: &mut R,
) -> Result<Vec<u32>> {
    let mut ir = interval.clone();
    let mut irs = interval.clone();
    let mut output = Vec::new();

    for _ in 0..max_rounds {
        let r = random_interval(bits_per_round, rng);
        ir = select_subinterval(&ir, &r);
        irs = select_subinterval(&irs, &r);

        loop {
            let mut history = context.to_vec();
            history.extend_from_slice(&output);
            let Some((symbol, scaled)) = model.next_token(&irs, &history)? else {
                break;
            };
            output.push(symbol);
            irs = scaled;

            let term = &irs.b * &ir.l / &irs.l;
            let o = Interval {
                b: &ir.b - &term,
                l: &ir.l / &irs.l,
            };

            if is_subinterval(interval, &o, false) && (end_id.is_none() || Some(symbol) == end_id)
            {
                return Ok(output);
            }
        }
    }
    Err(StegError::DecodeExhausted { rounds: max_rounds })
}
