//! Vocabulary index (spec §4.3): a bidirectional mapping between token
//! strings and 32-bit token ids, plus each token's bulk-loader partition
//! tag.
//!
//! Grounded on `examples/original_source/pysteg/googlebooks_ngrams/bindb.py`'s
//! `BinDBIndex` (`i2s`/`s2i`/`s2p` over a tab-separated index file), with the
//! loader upgraded to reject the malformed input that `BinDBIndex.__init__`
//! silently trusted.

use std::collections::HashMap;
use std::io::BufRead;

use crate::error::{Result, StegError};

pub const START_STR: &str = "_START_";
pub const END_STR: &str = "_END_";

/// A short bulk-loader shard tag (e.g. `"th"`, `"_"`, `"3"`). The core never
/// interprets its contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Partition(pub String);

/// Bidirectional `id <-> string` mapping, plus `string -> partition`.
///
/// Ids are 1-based and contiguous (id 0 is reserved and unused, matching
/// spec §3). `id2str[0]` backs id 1, and so on.
#[derive(Debug)]
pub struct Vocabulary {
    id2str: Vec<String>,
    id2partition: Vec<Partition>,
    str2id: HashMap<String, u32>,
    start_id: u32,
    end_id: u32,
}

impl Vocabulary {
    /// Load from the tab-separated `<id>\t<string>\t<partition>` format of
    /// spec §6. Lines must be sorted ascending by id starting at 1, with no
    /// gaps and no duplicate strings.
    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let mut id2str = Vec::new();
        let mut id2partition = Vec::new();
        let mut str2id = HashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split('\t');
            let (Some(id_field), Some(string_field), Some(partition_field)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(StegError::Vocabulary(format!(
                    "line {}: expected 3 tab-separated fields, got {:?}",
                    line_no + 1,
                    line
                )));
            };
            let id: u32 = id_field.parse().map_err(|_| {
                StegError::Vocabulary(format!("line {}: id {:?} is not an integer", line_no + 1, id_field))
            })?;
            let expected_id = (id2str.len() + 1) as u32;
            if id != expected_id {
                return Err(StegError::Vocabulary(format!(
                    "line {}: ids must be contiguous starting at 1, expected {} got {}",
                    line_no + 1,
                    expected_id,
                    id
                )));
            }
            if str2id.contains_key(string_field) {
                return Err(StegError::Vocabulary(format!(
                    "line {}: duplicate token string {:?}",
                    line_no + 1,
                    string_field
                )));
            }
            str2id.insert(string_field.to_string(), id);
            id2str.push(string_field.to_string());
            id2partition.push(Partition(partition_field.to_string()));
        }

        let start_id = *str2id
            .get(START_STR)
            .ok_or_else(|| StegError::Vocabulary(format!("missing sentinel {START_STR}")))?;
        let end_id = *str2id
            .get(END_STR)
            .ok_or_else(|| StegError::Vocabulary(format!("missing sentinel {END_STR}")))?;

        Ok(Vocabulary {
            id2str,
            id2partition,
            str2id,
            start_id,
            end_id,
        })
    }

    pub fn len(&self) -> usize {
        self.id2str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2str.is_empty()
    }

    pub fn start_id(&self) -> u32 {
        self.start_id
    }

    pub fn end_id(&self) -> u32 {
        self.end_id
    }

    /// The pseudo-id used internally to mark "we are at the top of the
    /// back-off tree". Never appears in stored tables.
    pub fn backoff_id(&self) -> u32 {
        self.len() as u32 + 1
    }

    pub fn i2s(&self, id: u32) -> Result<&str> {
        self.id2str
            .get(id as usize - 1)
            .map(|s| s.as_str())
            .ok_or_else(|| StegError::Vocabulary(format!("no such token id {id}")))
    }

    pub fn s2i(&self, s: &str) -> Result<u32> {
        self.str2id
            .get(s)
            .copied()
            .ok_or_else(|| StegError::Vocabulary(format!("unknown token {s:?}")))
    }

    pub fn s2p(&self, s: &str) -> Result<&Partition> {
        let id = self.s2i(s)?;
        Ok(&self.id2partition[id as usize - 1])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str, &Partition)> {
        self.id2str
            .iter()
            .zip(self.id2partition.iter())
            .enumerate()
            .map(|(i, (s, p))| ((i + 1) as u32, s.as_str(), p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> &'static str {
        "1\t_START_\t_\n2\t_END_\t_\n3\ta\tA_\n4\tb\tB_\n"
    }

    #[test]
    fn loads_and_resolves_both_ways() {
        let v = Vocabulary::load(Cursor::new(sample())).unwrap();
        assert_eq!(v.len(), 4);
        assert_eq!(v.s2i("a").unwrap(), 3);
        assert_eq!(v.i2s(3).unwrap(), "a");
        assert_eq!(v.s2p("a").unwrap().0, "A_");
        assert_eq!(v.start_id(), 1);
        assert_eq!(v.end_id(), 2);
        assert_eq!(v.backoff_id(), 5);
    }

    #[test]
    fn rejects_duplicate_strings() {
        let bad = "1\t_START_\t_\n2\t_END_\t_\n3\ta\tA_\n4\ta\tA_\n";
        assert!(Vocabulary::load(Cursor::new(bad)).is_err());
    }

    #[test]
    fn rejects_noncontiguous_ids() {
        let bad = "1\t_START_\t_\n2\t_END_\t_\n4\ta\tA_\n";
        assert!(Vocabulary::load(Cursor::new(bad)).is_err());
    }

    #[test]
    fn rejects_missing_sentinels() {
        let bad = "1\ta\tA_\n2\tb\tB_\n";
        assert!(Vocabulary::load(Cursor::new(bad)).is_err());
    }
}
