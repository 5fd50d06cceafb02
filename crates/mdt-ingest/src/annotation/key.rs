//! Annotation service variant keys

use crate::case::VariantIdentity;
use std::fmt;

/// A variant as the annotation service expects it: `{chrom}:{pos}:{ref}:{alt}`
/// with the anchor base of simple indels removed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    pub chromosome: String,
    pub position: i64,
    pub reference: String,
    pub alternate: String,
}

impl VariantKey {
    /// Trims the bases shared at the start of ref and alt, advancing the
    /// position once per trimmed base, but only when that leaves a pure
    /// insertion or deletion. Substitutions and complex changes keep their
    /// alleles as given.
    pub fn normalized(chromosome: &str, position: i64, reference: &str, alternate: &str) -> Self {
        let shared = reference
            .bytes()
            .zip(alternate.bytes())
            .take_while(|(r, a)| r == a)
            .count();

        let trimmed = reference.get(shared..).zip(alternate.get(shared..));

        match trimmed {
            Some((trimmed_ref, trimmed_alt))
                if shared > 0 && (trimmed_ref.is_empty() ^ trimmed_alt.is_empty()) =>
            {
                Self {
                    chromosome: chromosome.to_string(),
                    position: position + shared as i64,
                    reference: trimmed_ref.to_string(),
                    alternate: trimmed_alt.to_string(),
                }
            },
            _ => Self {
                chromosome: chromosome.to_string(),
                position,
                reference: reference.to_string(),
                alternate: alternate.to_string(),
            },
        }
    }

    pub fn from_identity(identity: &VariantIdentity) -> Self {
        Self::normalized(
            &identity.chromosome,
            identity.position,
            &identity.reference,
            &identity.alternate,
        )
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chromosome, self.position, self.reference, self.alternate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snv_is_unchanged() {
        let key = VariantKey::normalized("1", 100, "A", "G");
        assert_eq!(key.to_string(), "1:100:A:G");
    }

    #[test]
    fn test_deletion_drops_anchor_base() {
        let key = VariantKey::normalized("2", 500, "ACT", "A");
        assert_eq!(key.to_string(), "2:501:CT:");
    }

    #[test]
    fn test_insertion_drops_anchor_base() {
        let key = VariantKey::normalized("X", 10, "G", "GTT");
        assert_eq!(key.to_string(), "X:11::TT");
    }

    #[test]
    fn test_complex_change_is_unchanged() {
        let key = VariantKey::normalized("3", 42, "AGT", "ACC");
        assert_eq!(key.to_string(), "3:42:AGT:ACC");
    }

    #[test]
    fn test_shared_multi_base_prefix() {
        let key = VariantKey::normalized("7", 1000, "CAAT", "CA");
        assert_eq!(key.position, 1002);
        assert_eq!(key.reference, "AT");
        assert_eq!(key.alternate, "");
    }
}
