//! The stegosystem façade (spec §4.8): `Plaintext`, `Key` and `Stegotext`
//! as three role-specific constructions over one shared [`Sentence`]
//! record, plus the `pk2s`/`sk2p` operations that bind them to the XOR
//! cipher.
//!
//! Grounded on `examples/original_source/pysteg/stegosystem.py`'s
//! `Sentence` base class (with its `input_type` of `"text"` or
//! `"interval"`) and `BinaryStegosystem.pk2s`/`sk2p`. The original uses
//! subclassing; here each role is a thin newtype around `Sentence` with
//! its own constructors, since Rust has no classical inheritance.

use rand::RngCore;

use crate::bitcodec::{interval2bits, Projection};
use crate::cipher;
use crate::engine::Engine;
use crate::error::Result;
use crate::interval::{random_interval, Interval};
use crate::tokenizer::text2token_ids;

/// The shared record behind every role: the decoded/encoded token
/// sequence, its rendered strings, the interval it names, and (when a
/// projection was requested) the bit string naming that interval.
#[derive(Clone, Debug)]
pub struct Sentence {
    pub token_ids: Vec<u32>,
    pub token_strings: Vec<String>,
    pub interval: Interval,
    pub bits: Option<Vec<u8>>,
}

impl Sentence {
    fn from_tokens(engine: &Engine, tokens: &[u32], projection: Option<Projection>) -> Result<Self> {
        let interval = engine.encode(&[], tokens)?;
        let bits = projection.map(|p| interval2bits(&interval, p));
        let token_strings = tokens
            .iter()
            .map(|&id| engine.vocab().i2s(id).map(|s| s.to_string()))
            .collect::<Result<_>>()?;
        Ok(Sentence {
            token_ids: tokens.to_vec(),
            token_strings,
            interval,
            bits,
        })
    }

    fn from_text(engine: &Engine, text: &str, projection: Option<Projection>) -> Result<Self> {
        let tokens = text2token_ids(text, engine.vocab())?;
        Self::from_tokens(engine, &tokens, projection)
    }

    /// Shallow-decode `interval`, then trim the result at (and including)
    /// the first `_END_` it contains.
    ///
    /// Shallow decode (spec §4.6) only stops on genuine ambiguity: because
    /// `_START_` is forced with probability 1 right after `_END_`, it
    /// always keeps going one token past the sentence actually encoded in
    /// `interval`. That trailing token is an artifact of decoding, not
    /// part of the message, so this is where it gets discarded rather
    /// than inside `decode` itself (which stays a literal match for the
    /// spec's "terminate on none" contract).
    fn from_interval_shallow(engine: &Engine, interval: &Interval) -> Result<Self> {
        let mut tokens = engine.decode(&[], interval)?;
        let end_id = engine.vocab().end_id();
        if let Some(end_pos) = tokens.iter().position(|&t| t == end_id) {
            tokens.truncate(end_pos + 1);
        }
        let token_strings = tokens
            .iter()
            .map(|&id| engine.vocab().i2s(id).map(|s| s.to_string()))
            .collect::<Result<_>>()?;
        Ok(Sentence {
            token_ids: tokens,
            token_strings,
            interval: interval.clone(),
            bits: None,
        })
    }

    fn from_interval_deep<R: RngCore>(
        engine: &Engine,
        interval: &Interval,
        end_id: u32,
        rng: &mut R,
        projection: Projection,
    ) -> Result<Self> {
        let tokens = engine.deep_decode(&[], interval, Some(end_id), rng)?;
        let token_strings = tokens
            .iter()
            .map(|&id| engine.vocab().i2s(id).map(|s| s.to_string()))
            .collect::<Result<_>>()?;
        // deep_decode's own output sequence, re-encoded, is what must stay
        // inside the caller's interval; project *that* interval, not the
        // (coarser) input one.
        let output_interval = engine.encode(&[], &tokens)?;
        let bits = interval2bits(&output_interval, projection);
        Ok(Sentence {
            token_ids: tokens,
            token_strings,
            interval: output_interval,
            bits: Some(bits),
        })
    }

    pub fn text(&self) -> String {
        crate::tokenizer::token_strings2text(&self.token_strings)
    }
}

/// The message being hidden. Carries the *largest dyadic subinterval*
/// ("sub" projection) of its encoded interval, so its bits uniquely
/// determine it back on shallow decode (spec §4.8).
#[derive(Clone, Debug)]
pub struct Plaintext(pub Sentence);

impl Plaintext {
    pub fn from_text(engine: &Engine, text: &str) -> Result<Self> {
        Ok(Plaintext(Sentence::from_text(
            engine,
            text,
            Some(Projection::Sub),
        )?))
    }

    /// Recover a plaintext from decrypted stegotext bits: `bits2interval`
    /// then shallow decode, no re-projection (spec §4.8).
    pub fn from_bits(engine: &Engine, bits: &[u8]) -> Result<Self> {
        let interval = crate::bitcodec::bits2interval(bits);
        Ok(Plaintext(Sentence::from_interval_shallow(engine, &interval)?))
    }

    pub fn text(&self) -> String {
        self.0.text()
    }
}

/// The shared secret. Carries the *smallest dyadic superinterval*
/// ("super" projection), so any refinement a later decode picks still
/// lies inside it (spec §4.8).
#[derive(Clone, Debug)]
pub struct Key(pub Sentence);

impl Key {
    pub fn from_text(engine: &Engine, text: &str) -> Result<Self> {
        Ok(Key(Sentence::from_text(engine, text, Some(Projection::Super))?))
    }

    /// Generate a random key: name a random sub-unit interval with `n`
    /// random bits, then deep-decode it to `_END_`, projecting "super".
    pub fn generate<R: RngCore>(engine: &Engine, n: usize, rng: &mut R) -> Result<Self> {
        let interval = random_interval(n, rng);
        let end_id = engine.vocab().end_id();
        Ok(Key(Sentence::from_interval_deep(
            engine,
            &interval,
            end_id,
            rng,
            Projection::Super,
        )?))
    }

    pub fn text(&self) -> String {
        self.0.text()
    }

    fn bits(&self) -> &[u8] {
        self.0
            .bits
            .as_deref()
            .expect("Key is always constructed with a projection")
    }
}

/// The carrier text. Carries the "super" projection, for the same reason
/// as `Key` (spec §4.8).
#[derive(Clone, Debug)]
pub struct Stegotext(pub Sentence);

impl Stegotext {
    pub fn from_text(engine: &Engine, text: &str) -> Result<Self> {
        Ok(Stegotext(Sentence::from_text(
            engine,
            text,
            Some(Projection::Super),
        )?))
    }

    /// Recover a stegotext from its bit string: `bits2interval` then deep
    /// decode to `_END_`, projecting "super" on the way back out.
    pub fn from_bits<R: RngCore>(engine: &Engine, bits: &[u8], rng: &mut R) -> Result<Self> {
        let interval = crate::bitcodec::bits2interval(bits);
        let end_id = engine.vocab().end_id();
        Ok(Stegotext(Sentence::from_interval_deep(
            engine,
            &interval,
            end_id,
            rng,
            Projection::Super,
        )?))
    }

    pub fn text(&self) -> String {
        self.0.text()
    }

    fn bits(&self) -> &[u8] {
        self.0
            .bits
            .as_deref()
            .expect("Stegotext is always constructed with a projection")
    }
}

/// Hide `p` inside a grammatical stegotext keyed by `k`.
///
/// Requires `|k.bits| >= |p.bits|` for [`sk2p`] to recover `p` exactly
/// (the excess high-order key bits pad past the plaintext's "sub"
/// interval without affecting it, spec §4.8).
pub fn pk2s<R: RngCore>(engine: &Engine, p: &Plaintext, k: &Key, rng: &mut R) -> Result<Stegotext> {
    let p_bits = p
        .0
        .bits
        .as_deref()
        .expect("Plaintext::from_text always projects");
    let cipher_bits = cipher::encrypt(p_bits, k.bits(), false)?;
    Stegotext::from_bits(engine, &cipher_bits, rng)
}

/// Recover the plaintext hidden in `s` under key `k`.
pub fn sk2p(engine: &Engine, s: &Stegotext, k: &Key) -> Result<Plaintext> {
    let cipher_bits = cipher::decrypt(s.bits(), k.bits())?;
    Plaintext::from_bits(engine, &cipher_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindb::{write_table, NGramRecord};
    use crate::config::Config;
    use crate::engine::Engine;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::io::Write;
    use tempfile::tempdir;

    // Same closed a/b grammar as coder.rs's tests, written to real files
    // so `Engine::open` can be exercised end to end.
    fn toy_engine() -> (tempfile::TempDir, Engine) {
        let dir = tempdir().unwrap();
        let order1 = vec![
            NGramRecord { ids: vec![1], count: 6 },
            NGramRecord { ids: vec![2], count: 1 },
            NGramRecord { ids: vec![3], count: 3 },
            NGramRecord { ids: vec![4], count: 3 },
        ];
        write_table(dir.path().join("1gram"), 1, &order1).unwrap();
        let order2 = vec![
            NGramRecord { ids: vec![1, 3], count: 3 },
            NGramRecord { ids: vec![1, 4], count: 3 },
            NGramRecord { ids: vec![3, 2], count: 1 },
            NGramRecord { ids: vec![3, 4], count: 2 },
            NGramRecord { ids: vec![4, 2], count: 1 },
            NGramRecord { ids: vec![4, 3], count: 2 },
        ];
        write_table(dir.path().join("2gram"), 2, &order2).unwrap();

        let vocab_path = dir.path().join("vocab.tsv");
        let mut f = std::fs::File::create(&vocab_path).unwrap();
        write!(f, "1\t_START_\t_\n2\t_END_\t_\n3\ta\tA_\n4\tb\tB_\n").unwrap();

        let config = Config {
            n_max: 2,
            alpha: 0.5,
            beta: 0.1,
            ..Config::default()
        };
        let engine = Engine::open(dir.path(), &vocab_path, config).unwrap();
        (dir, engine)
    }

    #[test]
    fn plaintext_roundtrips_through_sub_bits_and_shallow_decode() {
        let (_dir, engine) = toy_engine();
        let p = Plaintext::from_text(&engine, "a b a").unwrap();
        let recovered = Plaintext::from_bits(&engine, p.0.bits.as_ref().unwrap()).unwrap();
        assert_eq!(recovered.text(), "a b a");
    }

    #[test]
    fn key_generation_is_deterministic_given_seed() {
        let (_dir, engine) = toy_engine();
        let mut rng1 = ChaCha20Rng::seed_from_u64(11);
        let mut rng2 = ChaCha20Rng::seed_from_u64(11);
        let k1 = Key::generate(&engine, 16, &mut rng1).unwrap();
        let k2 = Key::generate(&engine, 16, &mut rng2).unwrap();
        assert_eq!(k1.bits(), k2.bits());
    }

    #[test]
    fn full_round_trip_recovers_plaintext() {
        let (_dir, engine) = toy_engine();
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let p = Plaintext::from_text(&engine, "a b a").unwrap();
        let k = Key::from_text(&engine, "b a b a").unwrap();
        assert!(k.bits().len() >= p.0.bits.as_ref().unwrap().len());

        let s = pk2s(&engine, &p, &k, &mut rng).unwrap();
        let recovered = sk2p(&engine, &s, &k).unwrap();
        assert_eq!(recovered.text(), p.text());
    }

    #[test]
    fn different_keys_produce_different_stegotexts() {
        let (_dir, engine) = toy_engine();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let p = Plaintext::from_text(&engine, "a b a").unwrap();
        let k1 = Key::from_text(&engine, "b a b a").unwrap();
        let k2 = Key::from_text(&engine, "a b a b").unwrap();

        let s1 = pk2s(&engine, &p, &k1, &mut rng).unwrap();
        let s2 = pk2s(&engine, &p, &k2, &mut rng).unwrap();
        assert_ne!(s1.0.bits, s2.0.bits);
    }
}
