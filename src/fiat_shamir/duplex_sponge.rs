//! Byte-oriented duplex sponge over a `WIDTH`-byte permutation.

use p3_symmetric::Permutation;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Duplex sponge whose outer part is the first `RATE` bytes of the state.
///
/// Absorbing overwrites the outer part and permutes lazily, once it is full and more input
/// arrives. Squeezing right after absorbing always permutes first.
#[derive(Debug, Clone)]
pub struct DuplexSponge<C, const WIDTH: usize, const RATE: usize> {
    permutation: C,
    state: [u8; WIDTH],
    absorb_pos: usize,
    /// `RATE` means the outer part must be refreshed before the next squeeze.
    squeeze_pos: usize,
}

impl<C, const WIDTH: usize, const RATE: usize> DuplexSponge<C, WIDTH, RATE>
where
    C: Permutation<[u8; WIDTH]>,
{
    /// Sponge with an all-zero outer part and `iv` at the start of the capacity.
    pub fn new(permutation: C, iv: [u8; 32]) -> Self {
        assert!(RATE + iv.len() <= WIDTH, "IV must fit in the capacity");
        let mut state = [0u8; WIDTH];
        state[RATE..RATE + iv.len()].copy_from_slice(&iv);
        Self {
            permutation,
            state,
            absorb_pos: 0,
            squeeze_pos: RATE,
        }
    }

    pub fn absorb(&mut self, input: &[u8]) {
        let mut read = 0;
        while read < input.len() {
            if self.absorb_pos == RATE {
                self.permutation.permute_mut(&mut self.state);
                self.absorb_pos = 0;
            }
            let take = (input.len() - read).min(RATE - self.absorb_pos);
            self.state[self.absorb_pos..self.absorb_pos + take]
                .copy_from_slice(&input[read..read + take]);
            self.absorb_pos += take;
            read += take;
        }
        self.squeeze_pos = RATE;
    }

    pub fn squeeze(&mut self, output: &mut [u8]) {
        let mut written = 0;
        while written < output.len() {
            if self.squeeze_pos == RATE {
                self.permutation.permute_mut(&mut self.state);
                self.squeeze_pos = 0;
                self.absorb_pos = 0;
            }
            let take = (output.len() - written).min(RATE - self.squeeze_pos);
            output[written..written + take]
                .copy_from_slice(&self.state[self.squeeze_pos..self.squeeze_pos + take]);
            self.squeeze_pos += take;
            written += take;
        }
    }
}

impl<C, const WIDTH: usize, const RATE: usize> Zeroize for DuplexSponge<C, WIDTH, RATE> {
    fn zeroize(&mut self) {
        self.state.zeroize();
        self.absorb_pos = 0;
        self.squeeze_pos = RATE;
    }
}

impl<C, const WIDTH: usize, const RATE: usize> ZeroizeOnDrop for DuplexSponge<C, WIDTH, RATE> {}
