//! Generate random object contents and names.
//!
//! The generator is deterministic for a given seed, so that a benchmark
//! run can be repeated exactly by passing the seed it logged.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Length of generated names.
pub const NAME_LEN: usize = 8;

const ASCII_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// Letters outside ASCII, used to exercise non-ASCII object names. None
// of them is a path separator or a control character.
const UNICODE_CHARS: &[char] = &[
    'á', 'é', 'í', 'ó', 'ú', 'ñ', 'ç', 'ø', 'å', 'ß', 'ž', 'ł', 'α', 'β', 'γ', 'δ', 'λ', 'π', 'ж',
    'ю', 'я', 'ש', 'あ', 'き',
];

/// Source of random payloads, names and indexes.
#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    rng: StdRng,
}

impl PayloadGenerator {
    /// Create a generator whose output is fixed by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Return `length` pseudo-random bytes.
    pub fn payload(&mut self, length: usize) -> Vec<u8> {
        let mut data = vec![0; length];
        self.rng.fill_bytes(&mut data);
        data
    }

    /// Return a short random name for an object or container.
    ///
    /// Container names must be ASCII only. Otherwise roughly half of
    /// the characters are picked from a set of non-ASCII letters.
    pub fn name(&mut self, ascii_only: bool) -> String {
        (0..NAME_LEN)
            .map(|_| {
                if !ascii_only && self.rng.gen_bool(0.5) {
                    UNICODE_CHARS[self.rng.gen_range(0..UNICODE_CHARS.len())]
                } else {
                    ASCII_CHARS[self.rng.gen_range(0..ASCII_CHARS.len())] as char
                }
            })
            .collect()
    }

    /// Pick an index uniformly from `0..len`, or `None` if `len` is zero.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.rng.gen_range(0..len))
        }
    }
}
