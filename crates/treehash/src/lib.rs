//! SHA-256 tree hashing for archive integrity.
//!
//! The vault service verifies uploads with a hierarchical digest: the input
//! is split into 1 MiB leaves, each leaf is hashed with SHA-256, and adjacent
//! digests are hashed pairwise level by level until a single root remains.
//! A level with an odd trailing digest promotes it unchanged.
//!
//! The same digest doubles as the whole-archive checksum and as the per-part
//! checksum in multipart uploads: when parts are cut at 1 MiB multiples,
//! [`combine`]-ing the per-part roots reproduces the whole-archive root.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Leaf chunk size: 1 MiB.
pub const LEAF_SIZE: u64 = 1024 * 1024;

/// Root digest of a tree hash.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TreeHash([u8; 32]);

impl TreeHash {
    /// Returns the raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the digest as lowercase hex, the form the wire protocol uses.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TreeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TreeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeHash({})", self.to_hex())
    }
}

/// Incremental tree hasher.
///
/// Feed bytes in any split with [`update`](Self::update); leaf boundaries are
/// tracked internally. Memory use is one 32-byte digest per completed leaf
/// plus the running hash of the current partial leaf.
pub struct TreeHasher {
    leaves: Vec<[u8; 32]>,
    pending: Sha256,
    pending_len: u64,
}

impl TreeHasher {
    pub fn new() -> Self {
        Self {
            leaves: Vec::new(),
            pending: Sha256::new(),
            pending_len: 0,
        }
    }

    /// Absorbs `data`, closing leaves at every 1 MiB boundary.
    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let room = (LEAF_SIZE - self.pending_len) as usize;
            let take = room.min(data.len());
            self.pending.update(&data[..take]);
            self.pending_len += take as u64;
            data = &data[take..];

            if self.pending_len == LEAF_SIZE {
                let digest = std::mem::replace(&mut self.pending, Sha256::new()).finalize();
                self.leaves.push(digest.into());
                self.pending_len = 0;
            }
        }
    }

    /// Closes the trailing partial leaf and folds the tree to its root.
    ///
    /// Zero-length input produces the SHA-256 of the empty byte string.
    pub fn finalize(mut self) -> TreeHash {
        if self.pending_len > 0 || self.leaves.is_empty() {
            self.leaves.push(self.pending.finalize().into());
        }
        TreeHash(fold(self.leaves))
    }
}

impl Default for TreeHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Tree hash of an in-memory byte slice.
pub fn hash_bytes(data: &[u8]) -> TreeHash {
    let mut hasher = TreeHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Tree hash of `len` bytes starting at `offset` in the file at `path`.
///
/// Streams the range in leaf-sized reads; the range is never held in memory
/// as a whole. Fails with `UnexpectedEof` if the file ends before `len`
/// bytes were read.
pub fn hash_file_range(path: &Path, offset: u64, len: u64) -> io::Result<TreeHash> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    hash_reader(&mut file, len)
}

/// Tree hash of exactly `len` bytes read from `reader`.
pub fn hash_reader<R: Read>(reader: &mut R, len: u64) -> io::Result<TreeHash> {
    let mut hasher = TreeHasher::new();
    let mut buf = vec![0u8; LEAF_SIZE as usize];
    let mut remaining = len;

    while remaining > 0 {
        let want = remaining.min(LEAF_SIZE) as usize;
        let mut filled = 0;
        while filled < want {
            let n = reader.read(&mut buf[filled..want])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("input ended with {remaining} of {len} bytes unread"),
                ));
            }
            filled += n;
        }
        hasher.update(&buf[..want]);
        remaining -= want as u64;
    }

    Ok(hasher.finalize())
}

/// Combines sub-tree roots into a single root using the pairwise rule.
///
/// Combining the per-part tree hashes of an archive split at 1 MiB multiples
/// yields the same root as hashing the archive in one pass. An empty slice
/// combines to the empty-input hash.
pub fn combine(digests: &[TreeHash]) -> TreeHash {
    if digests.is_empty() {
        return hash_bytes(&[]);
    }
    TreeHash(fold(digests.iter().map(|d| d.0).collect()))
}

fn fold(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            if let [left, right] = pair {
                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                next.push(hasher.finalize().into());
            } else {
                // Odd trailing digest is promoted unchanged.
                next.push(pair[0]);
            }
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LEAF: usize = LEAF_SIZE as usize;

    /// Deterministic filler so tests don't need a RNG.
    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn sha256(data: &[u8]) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(data);
        h.finalize().into()
    }

    #[test]
    fn deterministic() {
        let data = pattern(3 * LEAF + 17);
        assert_eq!(hash_bytes(&data), hash_bytes(&data));
    }

    #[test]
    fn hex_is_64_lowercase_chars() {
        let hex = hash_bytes(b"hello").to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn single_leaf_equals_plain_sha256() {
        // Anything up to one leaf has a single-node tree.
        for len in [0, 1, 100, LEAF] {
            let data = pattern(len);
            assert_eq!(*hash_bytes(&data).as_bytes(), sha256(&data));
        }
    }

    #[test]
    fn empty_input_is_empty_sha256() {
        assert_eq!(*hash_bytes(&[]).as_bytes(), sha256(&[]));
    }

    #[test]
    fn two_leaves_pair_up() {
        let data = pattern(2 * LEAF);
        let left = sha256(&data[..LEAF]);
        let right = sha256(&data[LEAF..]);
        let mut h = Sha256::new();
        h.update(left);
        h.update(right);
        let root: [u8; 32] = h.finalize().into();
        assert_eq!(*hash_bytes(&data).as_bytes(), root);
    }

    #[test]
    fn odd_leaf_promoted_unchanged() {
        // Three leaves: root = H(H(l0 || l1) || l2).
        let data = pattern(2 * LEAF + 100);
        let l0 = sha256(&data[..LEAF]);
        let l1 = sha256(&data[LEAF..2 * LEAF]);
        let l2 = sha256(&data[2 * LEAF..]);

        let mut h = Sha256::new();
        h.update(l0);
        h.update(l1);
        let pair: [u8; 32] = h.finalize().into();

        let mut h = Sha256::new();
        h.update(pair);
        h.update(l2);
        let root: [u8; 32] = h.finalize().into();

        assert_eq!(*hash_bytes(&data).as_bytes(), root);
    }

    #[test]
    fn update_split_invariant() {
        let data = pattern(2 * LEAF + 333);
        let whole = hash_bytes(&data);

        // Same bytes fed in awkward splits.
        let mut hasher = TreeHasher::new();
        hasher.update(&data[..7]);
        hasher.update(&data[7..LEAF + 1]);
        hasher.update(&data[LEAF + 1..]);
        assert_eq!(hasher.finalize(), whole);
    }

    #[test]
    fn parts_combine_to_whole() {
        // 5 MiB + change, split into 2 MiB parts (a 1 MiB multiple).
        let data = pattern(5 * LEAF + 4321);
        let part_size = 2 * LEAF;

        let part_hashes: Vec<TreeHash> = data
            .chunks(part_size)
            .map(|part| hash_bytes(part))
            .collect();

        assert_eq!(combine(&part_hashes), hash_bytes(&data));
    }

    #[test]
    fn combine_of_single_digest_is_identity() {
        let digest = hash_bytes(b"only one");
        assert_eq!(combine(&[digest]), digest);
    }

    #[test]
    fn combine_of_empty_is_empty_hash() {
        assert_eq!(combine(&[]), hash_bytes(&[]));
    }

    #[test]
    fn file_range_matches_in_memory_slice() {
        let data = pattern(3 * LEAF + 99);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let whole = hash_file_range(file.path(), 0, data.len() as u64).unwrap();
        assert_eq!(whole, hash_bytes(&data));

        let mid = hash_file_range(file.path(), LEAF as u64, LEAF as u64).unwrap();
        assert_eq!(mid, hash_bytes(&data[LEAF..2 * LEAF]));
    }

    #[test]
    fn file_range_past_eof_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"short").unwrap();

        let err = hash_file_range(file.path(), 0, 1000).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn reader_zero_length_is_empty_hash() {
        let mut empty: &[u8] = &[];
        assert_eq!(hash_reader(&mut empty, 0).unwrap(), hash_bytes(&[]));
    }
}
