//! Back-off n-gram language model (spec §4.5).
//!
//! Implements Katz-style back-off over [`BinDb`] tables with two tunable
//! weights `alpha`/`beta`. The recursive core (`_raw`/`_raw_next` in the
//! spec) is exposed here as [`BackoffModel::conditional_interval`] and
//! [`BackoffModel::next_token`], both driven by a single per-level
//! computation ([`LevelData`], the spec's `iter_matching`) so the two
//! operations agree exactly on how `[0, 1)` is partitioned — this agreement
//! is the testable property P6/P8 in spec §8.

use std::cell::RefCell;
use std::rc::Rc;

use lru::LruCache;
use num_bigint::BigInt;

use crate::bindb::{BinDb, SearchMode};
use crate::error::{Result, StegError};
use crate::interval::{scale, Interval, Rational};
use crate::vocab::Vocabulary;

/// The per-level computation shared by [`BackoffModel::conditional_interval`]
/// and [`BackoffModel::next_token`] (spec's `iter_matching_tokens`).
#[derive(Clone, Debug)]
struct LevelData {
    /// `(token, count)` pairs in ascending token order, counts already net
    /// of both exclusion rules.
    accepted: Vec<(u32, i64)>,
    /// Sum of accepted counts.
    a: i64,
    /// Back-off pseudo-count.
    b: i64,
    /// `a + b`, the level's denominator.
    d: i64,
}

type CacheKey = (Vec<u32>, Option<u32>);

/// A Katz-style back-off language model over BinDB tables.
pub struct BackoffModel {
    db: BinDb,
    vocab: Rc<Vocabulary>,
    n_max: usize,
    alpha: f64,
    beta: f64,
    cache: RefCell<LruCache<CacheKey, LevelData>>,
}

impl BackoffModel {
    pub fn new(db: BinDb, vocab: Rc<Vocabulary>, n_max: usize, alpha: f64, beta: f64) -> Self {
        let cache_size = std::num::NonZeroUsize::new(256).unwrap();
        BackoffModel {
            db,
            vocab,
            n_max,
            alpha,
            beta,
            cache: RefCell::new(LruCache::new(cache_size)),
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    fn truncate<'a>(&self, c: &'a [u32]) -> &'a [u32] {
        let max_ctx = self.n_max.saturating_sub(1);
        if c.len() > max_ctx {
            &c[c.len() - max_ctx..]
        } else {
            c
        }
    }

    /// `P(t | c)`, truncated to the last `n_max - 1` context tokens.
    pub fn conditional_interval(&self, t: u32, c: &[u32]) -> Result<Interval> {
        self.raw(t, self.truncate(c), None)
    }

    /// Find the unique token whose conditional interval contains
    /// `search_interval`, and rescale `search_interval` inside it.
    /// Returns `None` when the search interval straddles a boundary
    /// between two candidate tokens.
    pub fn next_token(&self, search: &Interval, c: &[u32]) -> Result<Option<(u32, Interval)>> {
        self.raw_next(search, self.truncate(c), None)
    }

    fn forced_start(&self, c: &[u32], backed_off: Option<u32>) -> bool {
        (c.is_empty() && backed_off.is_none()) || c.last() == Some(&self.vocab.end_id())
    }

    fn raw(&self, t: u32, c: &[u32], backed_off: Option<u32>) -> Result<Interval> {
        if t == self.vocab.start_id() {
            return if self.forced_start(c, backed_off) {
                Ok(Interval::unit())
            } else {
                Err(StegError::IllPlacedStart {
                    context: c.to_vec(),
                })
            };
        }

        let Some(level) = self.level_data(c, backed_off)? else {
            let Some((head, rest)) = c.split_first() else {
                return Err(StegError::ModelInconsistency(
                    "unigram table has no rows at all".to_string(),
                ));
            };
            let _ = head;
            return self.raw(t, rest, None);
        };

        let mut cum = 0i64;
        for &(token, count) in &level.accepted {
            if token == t {
                return Interval::from_parts(cum, count, level.d, true).ok_or_else(|| {
                    StegError::ModelInconsistency(format!(
                        "degenerate conditional interval for token {t}"
                    ))
                });
            }
            cum += count;
        }

        if level.b == 0 {
            return Err(StegError::ModelInconsistency(format!(
                "token {t} has no accepted row and no back-off mass available"
            )));
        }

        let reserve = Interval::from_parts(level.a, level.b, level.d, true).ok_or_else(|| {
            StegError::ModelInconsistency("degenerate back-off reservation".to_string())
        })?;
        let (head, rest) = c
            .split_first()
            .expect("n_max == 1 with b > 0 is impossible: back-off is always 0 at unigram level");
        let inner = self.raw(t, rest, Some(*head))?;
        Ok(crate::interval::select_subinterval(&reserve, &inner))
    }

    fn raw_next(
        &self,
        search: &Interval,
        c: &[u32],
        backed_off: Option<u32>,
    ) -> Result<Option<(u32, Interval)>> {
        if self.forced_start(c, backed_off) {
            return Ok(Some((self.vocab.start_id(), search.clone())));
        }

        let Some(level) = self.level_data(c, backed_off)? else {
            let Some((_, rest)) = c.split_first() else {
                return Err(StegError::ModelInconsistency(
                    "unigram table has no rows at all".to_string(),
                ));
            };
            return self.raw_next(search, rest, None);
        };

        // Cumulative count boundaries over accepted tokens plus, if
        // present, the trailing back-off pseudo-range.
        let mut bounds = Vec::with_capacity(level.accepted.len() + 2);
        bounds.push(0i64);
        for &(_, count) in &level.accepted {
            bounds.push(bounds.last().unwrap() + count);
        }
        let has_backoff = level.b > 0;
        if has_backoff {
            bounds.push(bounds.last().unwrap() + level.b);
        }

        let d = BigInt::from(level.d);
        let idx = bounds
            .iter()
            .skip(1)
            .position(|&bnd| Rational::new(BigInt::from(bnd), d.clone()) > search.b);
        let Some(idx) = idx else {
            return Ok(None);
        };
        let candidate_end = Rational::new(BigInt::from(bounds[idx + 1]), d.clone());
        if search.end() > candidate_end {
            // Search interval straddles this boundary.
            return Ok(None);
        }
        let candidate = Interval::from_parts(bounds[idx], bounds[idx + 1] - bounds[idx], level.d, true)
            .expect("non-empty range by construction");

        if has_backoff && idx == level.accepted.len() {
            let inner_search = scale(&candidate, search);
            let (head, rest) = c.split_first().expect("back-off implies n >= 2");
            return self.raw_next(&inner_search, rest, Some(*head));
        }

        let (token, _) = level.accepted[idx];
        Ok(Some((token, scale(&candidate, search))))
    }

    fn level_data(&self, c: &[u32], backed_off: Option<u32>) -> Result<Option<LevelData>> {
        let key = (c.to_vec(), backed_off);
        if let Some(cached) = self.cache.borrow_mut().get(&key) {
            return Ok(Some(cached.clone()));
        }

        let n = c.len() + 1;
        let Some((lo, hi)) = self.db.range_search(n, c)? else {
            return Ok(None);
        };
        let rows = self.db.iterate(n, lo, hi - lo + 1, n == 1)?;

        let mut accepted = Vec::with_capacity(rows.len());
        let mut a = 0i64;
        let mut excluded = 0i64;
        for row in rows {
            let x = *row.ids.last().expect("rows always have at least one id");
            let excluded_by_higher_order = match backed_off {
                Some(h) => {
                    let mut probe = Vec::with_capacity(row.ids.len() + 1);
                    probe.push(h);
                    probe.extend_from_slice(&row.ids);
                    self.db
                        .binary_search(n + 1, &probe, SearchMode::First, 0.5)?
                        .is_some()
                }
                None => false,
            };
            if excluded_by_higher_order || x == self.vocab.start_id() {
                excluded += row.count;
            } else {
                a += row.count;
                accepted.push((x, row.count));
            }
        }

        let b = if n == 1 {
            0
        } else {
            let t_count = self.context_count(c)?;
            let c_mass = t_count - excluded;
            if c_mass < 0 {
                return Err(StegError::ModelInconsistency(format!(
                    "negative remaining mass for context {c:?} (T={t_count}, R={excluded})"
                )));
            }
            if c_mass == 0 {
                1
            } else {
                let l = c_mass - a;
                if l < 0 {
                    return Err(StegError::ModelInconsistency(format!(
                        "negative leftover mass for context {c:?} (C={c_mass}, A={a})"
                    )));
                }
                (self.alpha * l as f64 + self.beta * c_mass as f64).ceil() as i64
            }
        };

        let d = a + b;
        if d <= 0 {
            return Err(StegError::ModelInconsistency(format!(
                "empty conditional distribution for context {c:?}"
            )));
        }

        let level = LevelData { accepted, a, b, d };
        self.cache.borrow_mut().put(key, level.clone());
        Ok(Some(level))
    }

    fn context_count(&self, c: &[u32]) -> Result<i64> {
        let order = c.len();
        let rank = self
            .db
            .binary_search(order, c, SearchMode::First, 0.5)?
            .ok_or_else(|| {
                StegError::ModelInconsistency(format!(
                    "context {c:?} has no row in its own order-{order} table"
                ))
            })?;
        Ok(self.db.read(order, rank)?.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindb::{write_table, NGramRecord};
    use std::rc::Rc;
    use tempfile::tempdir;

    // Toy model: vocabulary {_START_, _END_, A, B} with ids 1..4, uniform
    // P(A) = P(B) = 1/2 as in spec scenario S3.
    fn toy_model() -> (BackoffModel, u32, u32) {
        let dir = tempdir().unwrap();
        // order 1: A, B with equal counts (START/END excluded by rule b
        // even if present, but we omit them to keep it minimal).
        let order1 = vec![
            NGramRecord { ids: vec![3], count: 1 }, // A
            NGramRecord { ids: vec![4], count: 1 }, // B
        ];
        write_table(dir.path().join("1gram"), 1, &order1).unwrap();
        // Empty order-2 table: n_max = 2 so the context truncation in
        // `ill_placed_start_is_rejected` below has something to keep.
        write_table(dir.path().join("2gram"), 2, &[]).unwrap();

        let vocab_text = "1\t_START_\t_\n2\t_END_\t_\n3\ta\tA_\n4\tb\tB_\n";
        let vocab = Rc::new(Vocabulary::load(std::io::Cursor::new(vocab_text)).unwrap());
        let db = BinDb::open(dir.path(), 2).unwrap();
        let model = BackoffModel::new(db, vocab, 2, 0.5, 0.1);
        (model, 3, 4)
    }

    #[test]
    fn s3_uniform_conditional_intervals() {
        let (model, a, b) = toy_model();
        let pa = model.conditional_interval(a, &[]).unwrap();
        let pb = model.conditional_interval(b, &[]).unwrap();
        assert_eq!(pa.l, pb.l);
        assert_eq!(&pa.l + &pb.l, crate::interval::Rational::new(1.into(), 1.into()));
    }

    #[test]
    fn p6_intervals_are_disjoint_and_cover_unit() {
        let (model, a, b) = toy_model();
        let pa = model.conditional_interval(a, &[]).unwrap();
        let pb = model.conditional_interval(b, &[]).unwrap();
        // disjoint
        assert!(pa.end() <= pb.b || pb.end() <= pa.b);
        // cover [0,1)
        let (lo, hi) = if pa.b < pb.b { (&pa, &pb) } else { (&pb, &pa) };
        assert_eq!(lo.b, num_rational::BigRational::new(0.into(), 1.into()));
        assert_eq!(lo.end(), hi.b);
        assert_eq!(hi.end(), num_rational::BigRational::new(1.into(), 1.into()));
    }

    #[test]
    fn next_token_agrees_with_conditional_interval() {
        let (model, a, _b) = toy_model();
        let pa = model.conditional_interval(a, &[]).unwrap();
        // Search strictly inside pa's interval should resolve to `a`.
        let mid = Interval::from_parts(1, 1, 1000, true).unwrap();
        let search = crate::interval::select_subinterval(&pa, &mid);
        let (token, _) = model.next_token(&search, &[]).unwrap().unwrap();
        assert_eq!(token, a);
    }

    #[test]
    fn start_is_forced_at_sentence_boundary() {
        let (model, _a, _b) = toy_model();
        let search = Interval::unit();
        let (token, scaled) = model.next_token(&search, &[]).unwrap().unwrap();
        // Context [] with backed_off=None forces START.
        assert_eq!(token, 1);
        assert_eq!(scaled, search);
    }

    #[test]
    fn ill_placed_start_is_rejected() {
        let (model, a, _b) = toy_model();
        let err = model.conditional_interval(1, &[a]);
        assert!(err.is_err());
    }
}
