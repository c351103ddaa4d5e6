//! Naming Codec
//!
//! Pure functions encoding a node's tree position into its filename suffix
//! and decoding basenames back into positions. The canonical basename
//! grammar is `<core>(<delim><ancestor>)*` with ancestors in reverse
//! root-to-leaf order, e.g. leaf `Note` under `Library/recipes/soup`
//! serializes as `Note-soup-recipes`. This redundancy is what lets drift
//! detection distinguish a moved file from a renamed one.

use crate::config::LibraryConfig;
use crate::error::NamingError;
use unicode_normalization::UnicodeNormalization;

/// Encode an ancestor chain (root inclusive, target exclusive) into the
/// reversed suffix carried by a basename.
///
/// Chains of length 0 or 1 produce no suffix: a node directly under the
/// root has nothing to encode. For longer chains the root itself is
/// dropped and the remainder reversed. The length-1 / length-2+ asymmetry
/// is load-bearing; callers rely on it when comparing physical depth
/// against suffix depth.
pub fn encode_suffix(chain: &[String]) -> Vec<String> {
    if chain.len() <= 1 {
        return Vec::new();
    }
    chain[1..].iter().rev().cloned().collect()
}

/// Decode a basename suffix back into the ancestor chain below the root.
///
/// Re-reversing restores the original order, so `decode_suffix` is its own
/// inverse over the suffix representation.
pub fn decode_suffix(parts: &[String]) -> Vec<String> {
    parts.iter().rev().cloned().collect()
}

/// What a decoded basename turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedKind {
    /// A section index file (reserved-prefix core).
    Codex,
    /// A numbered page (all-digit core).
    Page(u64),
    /// Any other leaf document or auxiliary file.
    Leaf,
}

/// The result of decoding a basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    pub kind: DecodedKind,
    /// The core name as it appeared (for a codex, the reserved prefix).
    pub core: String,
    /// Ancestor names below the root in root-to-leaf order, restored from
    /// the reversed suffix. For a codex this is the section's own chain.
    pub ancestors: Vec<String>,
}

/// Stateful half of the codec: the configured delimiter and codex prefix.
#[derive(Debug, Clone)]
pub struct Naming {
    pub delimiter: char,
    pub codex_prefix: String,
}

impl Naming {
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            codex_prefix: config.codex_prefix.clone(),
        }
    }

    /// Join a core name and suffix parts into a basename stem.
    ///
    /// Fails with `InvalidName` if the core or any suffix part is empty or
    /// contains the delimiter itself.
    pub fn serialize_basename(&self, core: &str, suffix: &[String]) -> Result<String, NamingError> {
        self.check_segment(core)?;
        let mut out = core.nfc().collect::<String>();
        for part in suffix {
            self.check_segment(part)?;
            out.push(self.delimiter);
            out.extend(part.nfc());
        }
        Ok(out)
    }

    /// Canonical basename stem for a leaf addressed by its full chain
    /// (root inclusive, leaf name last).
    pub fn leaf_basename(&self, chain: &[String]) -> Result<String, NamingError> {
        let (core, ancestors) = chain
            .split_last()
            .ok_or_else(|| NamingError::InvalidName(String::new()))?;
        self.serialize_basename(core, &encode_suffix(ancestors))
    }

    /// Canonical basename stem for a section's codex file. The suffix
    /// encodes the section's own chain, so the root codex is the bare
    /// prefix.
    pub fn codex_basename(&self, section_chain: &[String]) -> Result<String, NamingError> {
        self.serialize_basename(&self.codex_prefix, &encode_suffix(section_chain))
    }

    /// Attempt to decode a basename stem.
    ///
    /// Patterns are tried in fixed priority order: codex, numbered page,
    /// generic leaf. Returns `None` only when nothing matches a non-empty
    /// string, which in practice means an empty core (e.g. a stem starting
    /// with the delimiter); nearly all strings decode by design.
    pub fn decode_basename(&self, stem: &str) -> Option<DecodedName> {
        let stem: String = stem.nfc().collect();
        if stem.is_empty() {
            return None;
        }

        let mut parts = stem.split(self.delimiter);
        let core = parts.next().unwrap_or_default().to_string();
        let suffix: Vec<String> = parts.map(|s| s.to_string()).collect();
        if core.is_empty() || suffix.iter().any(|s| s.is_empty()) {
            return None;
        }
        let ancestors = decode_suffix(&suffix);

        if core == self.codex_prefix {
            return Some(DecodedName {
                kind: DecodedKind::Codex,
                core,
                ancestors,
            });
        }

        if core.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(number) = core.parse::<u64>() {
                return Some(DecodedName {
                    kind: DecodedKind::Page(number),
                    core,
                    ancestors,
                });
            }
        }

        Some(DecodedName {
            kind: DecodedKind::Leaf,
            core,
            ancestors,
        })
    }

    fn check_segment(&self, segment: &str) -> Result<(), NamingError> {
        if segment.is_empty() {
            return Err(NamingError::InvalidName(segment.to_string()));
        }
        if segment.contains(self.delimiter) || segment.contains('/') {
            return Err(NamingError::InvalidName(segment.to_string()));
        }
        Ok(())
    }
}
