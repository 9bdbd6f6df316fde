//! BinDB: the fixed-width binary n-gram table store (spec §4.4, §6).
//!
//! Each order `n` table is a flat file of `(n × int32 ids, int64 count)`
//! records, little-endian, sorted and unique by `ids` (invariant I1). Access
//! is by 1-based rank, either a single seek+read or a binary search over a
//! prefix of the ids.
//!
//! Grounded on `examples/original_source/pysteg/googlebooks_ngrams/bindb.py`
//! (record layout, `read_line`/`unpack_line`) and
//! `examples/original_source/pysteg/googlebooks/bindb.py` (`BinDBLM.bs`, the
//! deferred-equality binary search with a tunable midpoint skew).

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::StegError;

/// One stored n-gram: its token ids and a positive occurrence count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NGramRecord {
    pub ids: Vec<u32>,
    pub count: i64,
}

impl NGramRecord {
    fn record_size(n: usize) -> usize {
        4 * n + 8
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::record_size(self.ids.len()));
        for id in &self.ids {
            buf.extend_from_slice(&id.to_le_bytes());
        }
        buf.extend_from_slice(&self.count.to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8], n: usize) -> Self {
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let off = i * 4;
            ids.push(u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()));
        }
        let count = i64::from_le_bytes(bytes[4 * n..4 * n + 8].try_into().unwrap());
        NGramRecord { ids, count }
    }
}

/// Write a freshly-sorted table of order `n` to `path`. Not used by the
/// engine itself (table construction is a bulk-loader concern, out of
/// scope per spec §1) but kept as the inverse of [`BinDbTable::read`] for
/// test fixtures.
pub fn write_table<P: AsRef<Path>>(path: P, n: usize, records: &[NGramRecord]) -> Result<()> {
    use std::io::Write;
    let mut f = std::fs::File::create(&path)
        .with_context(|| format!("cannot create BinDB table {}", path.as_ref().display()))?;
    for r in records {
        debug_assert_eq!(r.ids.len(), n);
        f.write_all(&r.encode())?;
    }
    Ok(())
}

/// Which end of a run of equal prefixes to locate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    First,
    Last,
}

/// A single order-`n` table file, opened read-only, with its record count
/// precomputed and an optional in-memory full-table cache (recommended for
/// `n = 1`, where full rescans are frequent — spec §4.4).
struct BinDbTable {
    n: usize,
    file: RefCell<File>,
    size: usize,
    cache: RefCell<Option<Vec<NGramRecord>>>,
}

impl BinDbTable {
    fn open(path: &Path, n: usize) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("cannot open BinDB table {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("cannot stat BinDB table {}", path.display()))?
            .len() as usize;
        let record_size = NGramRecord::record_size(n);
        if len % record_size != 0 {
            return Err(StegError::MalformedTable {
                order: n,
                reason: format!(
                    "file length {len} is not a multiple of the record size {record_size}"
                ),
            }
            .into());
        }
        Ok(BinDbTable {
            n,
            file: RefCell::new(file),
            size: len / record_size,
            cache: RefCell::new(None),
        })
    }

    fn record_size(&self) -> usize {
        NGramRecord::record_size(self.n)
    }

    /// Read the `i`-th (1-based) record via seek.
    fn read(&self, i: usize) -> Result<NGramRecord> {
        if i == 0 || i > self.size {
            return Err(StegError::MalformedTable {
                order: self.n,
                reason: format!("rank {i} out of range (table has {} records)", self.size),
            }
            .into());
        }
        let record_size = self.record_size();
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(((i - 1) * record_size) as u64))?;
        let mut buf = vec![0u8; record_size];
        file.read_exact(&mut buf)?;
        Ok(NGramRecord::decode(&buf, self.n))
    }

    /// Populate the whole-table cache if it has not been populated yet.
    fn ensure_cached(&self) -> Result<()> {
        if self.cache.borrow().is_some() {
            return Ok(());
        }
        let mut records = Vec::with_capacity(self.size);
        for i in 1..=self.size {
            records.push(self.read(i)?);
        }
        *self.cache.borrow_mut() = Some(records);
        Ok(())
    }

    /// Sequential scan of `count` records starting at rank `start`,
    /// optionally served from the cached full-table copy.
    fn iterate(&self, start: usize, count: usize, cached: bool) -> Result<Vec<NGramRecord>> {
        if cached {
            self.ensure_cached()?;
            let cache = self.cache.borrow();
            let records = cache.as_ref().unwrap();
            let lo = start.saturating_sub(1);
            let hi = (lo + count).min(records.len());
            return Ok(records[lo.min(records.len())..hi].to_vec());
        }
        let mut out = Vec::with_capacity(count);
        for i in start..(start + count).min(self.size + 1) {
            out.push(self.read(i)?);
        }
        Ok(out)
    }

    fn prefix_at(&self, i: usize, m: usize) -> Result<Vec<u32>> {
        Ok(self.read(i)?.ids[..m].to_vec())
    }

    /// Deferred-equality binary search for the first/last rank whose first
    /// `prefix.len()` ids equal `prefix`. `skew` in `(0, 1)` biases the
    /// midpoint: 0.5 is a normal bisection, a value near 0.1 converges
    /// faster once a nearby bound is already known (used by
    /// [`BinDb::range_search`] to locate the end of a run right after
    /// finding its start).
    fn binary_search(
        &self,
        prefix: &[u32],
        imin: usize,
        imax: usize,
        mode: SearchMode,
        skew: f64,
    ) -> Result<Option<usize>> {
        if self.size == 0 || imin > imax {
            return Ok(None);
        }
        let m = prefix.len();
        let (mut lo, mut hi) = (imin, imax);
        while lo < hi {
            match mode {
                SearchMode::First => {
                    let mid = lo + ((hi - lo) as f64 * skew).floor() as usize;
                    if self.prefix_at(mid, m)?.as_slice() < prefix {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                SearchMode::Last => {
                    let mid = lo + ((hi - lo) as f64 * skew).ceil() as usize;
                    if self.prefix_at(mid, m)?.as_slice() > prefix {
                        hi = mid - 1;
                    } else {
                        lo = mid;
                    }
                }
            }
        }
        if self.prefix_at(lo, m)?.as_slice() == prefix {
            Ok(Some(lo))
        } else {
            Ok(None)
        }
    }
}

/// The full set of order-`1..=n_max` table files for one engine instance.
///
/// Opened read-only at construction; all file handles are closed together
/// when the `BinDb` (and with it, the owning engine) is dropped.
pub struct BinDb {
    tables: Vec<BinDbTable>, // tables[n-1] is the order-n table
}

impl BinDb {
    /// Open `{dir}/{n}gram` for every `n` in `1..=n_max`.
    pub fn open<P: AsRef<Path>>(dir: P, n_max: usize) -> Result<Self> {
        let mut tables = Vec::with_capacity(n_max);
        for n in 1..=n_max {
            let path: PathBuf = dir.as_ref().join(format!("{n}gram"));
            tables.push(BinDbTable::open(&path, n)?);
        }
        Ok(BinDb { tables })
    }

    fn table(&self, n: usize) -> Result<&BinDbTable> {
        self.tables.get(n - 1).ok_or_else(|| {
            StegError::MalformedTable {
                order: n,
                reason: "no table opened for this order".to_string(),
            }
            .into()
        })
    }

    pub fn size(&self, n: usize) -> Result<usize> {
        Ok(self.table(n)?.size)
    }

    /// Read the `i`-th (1-based) record of the order-`n` table.
    pub fn read(&self, n: usize, i: usize) -> Result<NGramRecord> {
        self.table(n)?.read(i)
    }

    /// Sequential scan, optionally served from a cached in-memory copy of
    /// the whole table (recommended for `n = 1`).
    pub fn iterate(&self, n: usize, start: usize, count: usize, cached: bool) -> Result<Vec<NGramRecord>> {
        self.table(n)?.iterate(start, count, cached)
    }

    /// Lowest/highest rank whose prefix equals `prefix`, or `None`.
    pub fn binary_search(
        &self,
        n: usize,
        prefix: &[u32],
        mode: SearchMode,
        skew: f64,
    ) -> Result<Option<usize>> {
        let table = self.table(n)?;
        table.binary_search(prefix, 1, table.size, mode, skew)
    }

    /// `(lo, hi)` ranks bracketing every record sharing `prefix`; `(1,
    /// size[n])` for the empty prefix (guarded against an empty table).
    pub fn range_search(&self, n: usize, prefix: &[u32]) -> Result<Option<(usize, usize)>> {
        let table = self.table(n)?;
        if table.size == 0 {
            return Ok(None);
        }
        if prefix.is_empty() {
            return Ok(Some((1, table.size)));
        }
        let Some(lo) = table.binary_search(prefix, 1, table.size, SearchMode::First, 0.5)? else {
            return Ok(None);
        };
        // The run starting at `lo` is short relative to the table; skew the
        // midpoint towards `lo` to converge on its end quickly.
        let hi = table
            .binary_search(prefix, lo, table.size, SearchMode::Last, 0.1)?
            .unwrap_or(lo);
        Ok(Some((lo, hi)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_bigrams() -> Vec<NGramRecord> {
        vec![
            NGramRecord { ids: vec![1, 2], count: 5 },
            NGramRecord { ids: vec![1, 3], count: 2 },
            NGramRecord { ids: vec![1, 3], count: 0 }, // never happens in real data, kept distinct below
            NGramRecord { ids: vec![2, 1], count: 9 },
        ]
    }

    #[test]
    fn record_roundtrips_through_bytes() {
        let r = NGramRecord { ids: vec![7, 11, 13], count: -4 };
        let bytes = r.encode();
        assert_eq!(bytes.len(), 4 * 3 + 8);
        assert_eq!(NGramRecord::decode(&bytes, 3), r);
    }

    #[test]
    fn open_rejects_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1gram");
        std::fs::write(&path, [0u8; 7]).unwrap(); // record size for n=1 is 12
        let err = BinDbTable::open(&path, 1);
        assert!(err.is_err());
    }

    #[test]
    fn range_search_finds_bracketing_ranks() {
        let dir = tempdir().unwrap();
        let mut sorted = sample_bigrams();
        sorted.sort_by(|a, b| a.ids.cmp(&b.ids));
        sorted.dedup_by(|a, b| a.ids == b.ids);
        write_table(dir.path().join("2gram"), 2, &sorted).unwrap();
        let db = BinDb::open(dir.path(), 2).unwrap();

        let (lo, hi) = db.range_search(2, &[1]).unwrap().unwrap();
        assert_eq!(lo, 1);
        assert!(hi >= lo);
        for i in lo..=hi {
            assert_eq!(db.read(2, i).unwrap().ids[0], 1);
        }

        assert!(db.range_search(2, &[99]).unwrap().is_none());
        let (lo, hi) = db.range_search(2, &[]).unwrap().unwrap();
        assert_eq!((lo, hi), (1, sorted.len()));
    }
}
