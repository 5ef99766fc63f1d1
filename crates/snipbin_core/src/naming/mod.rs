//! Random identifier generation for documents and webhooks.

use crate::constants::{ID_ALPHABET, ID_LENGTH};
use rand::Rng;

/// Source of candidate ids.
///
/// Stores ask for a fresh candidate on every insert attempt, so a source only
/// needs to be random, not unique.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Thread-local RNG backed id source.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> String {
        generate_id()
    }
}

/// Generate an [`ID_LENGTH`] character id from [`ID_ALPHABET`].
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Check that `id` has the shape of a generated id.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| ID_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_use_the_fixed_alphabet() {
        for _ in 0..200 {
            let id = generate_id();
            assert!(is_valid_id(&id), "unexpected id {id}");
        }
    }

    #[test]
    fn is_valid_id_rejects_wrong_length_and_symbols() {
        assert!(!is_valid_id("abc"));
        assert!(!is_valid_id("ABCDEFGH"));
        assert!(!is_valid_id("abcd-fgh"));
        assert!(is_valid_id("a1b2c3d4"));
    }
}
