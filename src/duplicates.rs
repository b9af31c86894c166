//! Content-hash duplicate detection.
//!
//! A candidate is a duplicate when a file with the same SHA-256 digest is
//! already organized somewhere under the root. The reference set excludes
//! the candidate, the pending top-level files and the quarantine folder, so
//! among identical files the first one processed keeps its category and the
//! later ones are quarantined.

use crate::file_category::DUPLICATES_LABEL;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Size of the blocks a file is streamed through the hasher in.
pub const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// SHA-256 digest of a file's full content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hashes everything `reader` yields.
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<ContentHash> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(ContentHash(hasher.finalize().into()))
}

/// Hashes the file at `path`, reading it in fixed-size blocks.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
    let mut file = File::open(path)?;
    hash_reader(&mut file)
}

/// Regular files under `root` that a candidate is compared against: depth
/// two and below, skipping the quarantine folder. Entries that vanish or
/// cannot be read while walking are left out.
pub fn reference_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() == 1
                && entry.file_type().is_dir()
                && entry.file_name() == DUPLICATES_LABEL)
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                trace!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.depth() >= 2 && entry.file_type().is_file())
        .map(|entry| entry.into_path())
}

/// Full-scan detector: every check re-hashes the whole reference set.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    root: PathBuf,
}

impl DuplicateDetector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns whether another file under the root has the same content as
    /// `candidate`.
    ///
    /// Errors only when the candidate itself cannot be hashed (it vanished or
    /// is unreadable). Reference files that fail to hash count as absent.
    pub fn is_duplicate(&self, candidate: &Path) -> io::Result<bool> {
        let digest = hash_file(candidate)?;
        Ok(self.find_match(candidate, &digest).is_some())
    }

    /// First reference file whose digest equals `digest`.
    pub fn find_match(&self, candidate: &Path, digest: &ContentHash) -> Option<PathBuf> {
        reference_files(&self.root)
            .filter(|path| path != candidate)
            .find(|path| match hash_file(path) {
                Ok(other) => other == *digest,
                Err(e) => {
                    debug!("treating {} as absent: {}", path.display(), e);
                    false
                }
            })
    }
}

/// Digest index over the reference set, built once per organize pass.
///
/// Hits are confirmed by re-hashing the indexed file, so an entry that was
/// modified or removed behind the index's back never causes a false match.
#[derive(Debug, Default)]
pub struct HashIndex {
    entries: HashMap<ContentHash, Vec<PathBuf>>,
}

impl HashIndex {
    /// Hashes every reference file under `root`.
    pub fn build(root: &Path) -> Self {
        let mut index = Self::default();
        for path in reference_files(root) {
            match hash_file(&path) {
                Ok(digest) => index.insert(digest, path),
                Err(e) => debug!("not indexing {}: {}", path.display(), e),
            }
        }
        debug!(
            "indexed {} files under {}",
            index.indexed_files(),
            root.display()
        );
        index
    }

    pub fn insert(&mut self, digest: ContentHash, path: PathBuf) {
        let paths = self.entries.entry(digest).or_default();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    pub fn indexed_files(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns a verified file other than `candidate` holding `digest`,
    /// pruning entries that no longer match on disk.
    pub fn find_match(&mut self, candidate: &Path, digest: &ContentHash) -> Option<PathBuf> {
        let paths = self.entries.get_mut(digest)?;
        let mut found = None;
        paths.retain(|path| {
            if found.is_some() || path == candidate {
                return true;
            }
            match hash_file(path) {
                Ok(current) if current == *digest => {
                    found = Some(path.clone());
                    true
                }
                _ => {
                    debug!("dropping stale index entry {}", path.display());
                    false
                }
            }
        });
        found
    }
}
