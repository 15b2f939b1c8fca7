//! core::naming
//!
//! Ephemeral branch naming.
//!
//! # Format
//!
//! Names are a fixed prefix followed by a short random suffix drawn
//! uniformly from `[a-z0-9]`, e.g. `automation-k3x`. The default suffix is
//! three characters, which keeps names readable in review tools.
//!
//! # Collisions
//!
//! A draw is rejected when it matches any name in the caller-supplied set
//! (local branches plus remote-tracking branches). After `max_attempts`
//! rejected draws at one suffix length the suffix grows by one character,
//! so generation always terminates even when the short namespace is full.
//! Only the current candidate is held in memory between draws.

use std::collections::BTreeSet;

use rand::Rng;

use crate::core::types::{BranchName, TypeError};

/// Alphabet for suffix characters.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Default prefix for ephemeral branches.
pub const DEFAULT_PREFIX: &str = "automation-";

/// Default suffix length.
pub const DEFAULT_SUFFIX_LEN: usize = 3;

/// Default number of draws before widening the suffix.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4096;

/// Produces collision-free ephemeral branch names.
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
/// use handoff::core::naming::BranchNameGenerator;
///
/// let generator = BranchNameGenerator::default();
/// let existing: BTreeSet<String> = ["automation-abc".to_string()].into();
///
/// let name = generator.generate(&existing).unwrap();
/// assert!(name.as_str().starts_with("automation-"));
/// assert_eq!(name.as_str().len(), "automation-".len() + 3);
/// assert!(!existing.contains(name.as_str()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNameGenerator {
    prefix: String,
    suffix_len: usize,
    max_attempts: u32,
}

impl Default for BranchNameGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            suffix_len: DEFAULT_SUFFIX_LEN,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BranchNameGenerator {
    /// Create a generator with an explicit prefix and namespace size.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the prefix cannot start a
    /// valid branch name, or if `suffix_len` or `max_attempts` is zero.
    pub fn new(
        prefix: impl Into<String>,
        suffix_len: usize,
        max_attempts: u32,
    ) -> Result<Self, TypeError> {
        let prefix = prefix.into();
        if suffix_len == 0 {
            return Err(TypeError::InvalidBranchName(
                "suffix length must be at least 1".into(),
            ));
        }
        if max_attempts == 0 {
            return Err(TypeError::InvalidBranchName(
                "max attempts must be at least 1".into(),
            ));
        }
        // A suffix of plain letters is always valid after a valid prefix,
        // so checking one sample validates every draw.
        BranchName::new(format!("{}{}", prefix, "a".repeat(suffix_len)))?;

        Ok(Self {
            prefix,
            suffix_len,
            max_attempts,
        })
    }

    /// The prefix every generated name starts with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Configured suffix length before any widening.
    pub fn suffix_len(&self) -> usize {
        self.suffix_len
    }

    /// Draws per suffix length before widening.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a branch name was produced by this naming scheme.
    pub fn is_ephemeral(&self, name: &str) -> bool {
        name.strip_prefix(&self.prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| ALPHABET.contains(&b)))
    }

    /// Generate a name absent from `existing` using the thread RNG.
    pub fn generate(&self, existing: &BTreeSet<String>) -> Result<BranchName, TypeError> {
        self.generate_with(existing, &mut rand::rng())
    }

    /// Generate a name absent from `existing` using the given RNG.
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        existing: &BTreeSet<String>,
        rng: &mut R,
    ) -> Result<BranchName, TypeError> {
        let mut suffix_len = self.suffix_len;
        let mut candidate = String::with_capacity(self.prefix.len() + suffix_len + 4);

        loop {
            for _ in 0..self.max_attempts {
                candidate.clear();
                candidate.push_str(&self.prefix);
                for _ in 0..suffix_len {
                    let idx = rng.random_range(0..ALPHABET.len());
                    candidate.push(ALPHABET[idx] as char);
                }
                if !existing.contains(&candidate) {
                    return BranchName::new(candidate);
                }
            }
            tracing::warn!(
                suffix_len,
                attempts = self.max_attempts,
                "branch namespace crowded, widening suffix"
            );
            suffix_len += 1;
        }
    }
}
