//! A deterministic pseudo-random number generator.
//!
//! All randomness in the harness flows through [`Random`], so that two runs with the same seed
//! issue exactly the same keys and payloads.

/// The Mersenne prime `2^31 - 1`, the modulus of the generator.
const MODULUS: u32 = 2_147_483_647;

/// The multiplier of the "minimal standard" generator.
const MULTIPLIER: u64 = 16_807;

/// A Park-Miller multiplicative congruential generator.
///
/// Draws are cheap and reproducible but only roughly uniform. This is good enough to spread keys
/// across a keyspace and must not be used for anything else.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Random {
    seed: u32,
}

impl Random {
    /// Creates a generator from the low 31 bits of `seed`.
    ///
    /// The fixed points `0` and `2^31 - 1` are replaced with `1`.
    pub fn new(seed: u32) -> Self {
        let mut seed = seed & MODULUS;
        if seed == 0 || seed == MODULUS {
            seed = 1;
        }
        Self { seed }
    }

    /// Returns the next value in `[1, 2^31 - 2]`.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u32 {
        // seed * 16807 is at most 45 bits wide. Since 2^31 == 1 (mod MODULUS), the bits above
        // position 31 can be folded back onto the low bits instead of dividing.
        let product = u64::from(self.seed) * MULTIPLIER;
        let mut seed = ((product >> 31) + (product & u64::from(MODULUS))) as u32;
        if seed > MODULUS {
            seed -= MODULUS;
        }
        self.seed = seed;
        seed
    }

    /// Returns a value in `[0, n)`.
    ///
    /// Panics if `n` is zero.
    pub fn uniform(&mut self, n: u64) -> u64 {
        u64::from(self.next()) % n
    }
}
