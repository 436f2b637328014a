//! Fixed-length bit array for tracking which votes and block parts a peer
//! already has.
//!
//! The masks travel on the wire inside round-state advertisements, so the
//! type is SBOR-encodable. Bits beyond `len` are kept zero at all times;
//! `flip` re-normalizes the tail so equality stays structural.

use rand::Rng;
use sbor::prelude::*;
use std::fmt;

const WORD_BITS: usize = 64;

/// A fixed-length bit vector packed into `u64` words.
///
/// Indexing is zero-based. `Clone` is the copy operation; `flip` and `and`
/// mutate in place, matching how selection masks are composed:
/// `known.clone() → flip → and(available) → pick_random`.
#[derive(Clone, PartialEq, Eq, BasicSbor)]
pub struct BitArray {
    len: u32,
    words: Vec<u64>,
}

impl BitArray {
    /// Create an all-zero bit array of the given length.
    pub fn new(len: usize) -> Self {
        Self {
            len: len as u32,
            words: vec![0; len.div_ceil(WORD_BITS)],
        }
    }

    /// Number of bits in the array.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the array has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set bit `i`. Out-of-range indices are ignored.
    pub fn set(&mut self, i: usize) {
        if i < self.len() {
            self.words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
        }
    }

    /// Clear bit `i`. Out-of-range indices are ignored.
    pub fn unset(&mut self, i: usize) {
        if i < self.len() {
            self.words[i / WORD_BITS] &= !(1 << (i % WORD_BITS));
        }
    }

    /// Read bit `i`. Out-of-range indices read as zero.
    pub fn get(&self, i: usize) -> bool {
        if i < self.len() {
            self.words[i / WORD_BITS] & (1 << (i % WORD_BITS)) != 0
        } else {
            false
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Whether any bit is set.
    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    /// Invert every bit in place.
    pub fn flip(&mut self) {
        for word in &mut self.words {
            *word = !*word;
        }
        self.mask_tail();
    }

    /// Intersect with `other` in place.
    ///
    /// # Panics
    ///
    /// Panics if the two arrays differ in length; masks over different
    /// index spaces must never meet.
    pub fn and(&mut self, other: &BitArray) {
        assert_eq!(
            self.len, other.len,
            "bit array length mismatch: {} vs {}",
            self.len, other.len
        );
        for (word, &other_word) in self.words.iter_mut().zip(&other.words) {
            *word &= other_word;
        }
    }

    /// Pick a uniformly random set bit, or `None` if no bit is set.
    ///
    /// Uniformity matters: peers serving the same recipient must not all
    /// converge on the lowest missing index.
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let ones = self.count_ones();
        if ones == 0 {
            return None;
        }
        let mut remaining = rng.gen_range(0..ones);
        for (word_idx, &word) in self.words.iter().enumerate() {
            let in_word = word.count_ones() as usize;
            if remaining >= in_word {
                remaining -= in_word;
                continue;
            }
            let mut word = word;
            loop {
                let bit = word.trailing_zeros() as usize;
                if remaining == 0 {
                    return Some(word_idx * WORD_BITS + bit);
                }
                word &= word - 1;
                remaining -= 1;
            }
        }
        unreachable!("count_ones out of sync with words")
    }

    /// Clear bits at positions >= len.
    fn mask_tail(&mut self) {
        let tail = self.len() % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1 << tail) - 1;
            }
        }
    }
}

impl fmt::Debug for BitArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitArray[")?;
        for i in 0..self.len() {
            write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
        }
        write!(f, "]")
    }
}
