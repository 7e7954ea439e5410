//! Session token generation for Crumb.
//!
//! A session token is the only thing a client holds to prove who it is,
//! so it has to be unguessable. [`TokenGenerator`] draws raw bytes from a
//! cryptographically secure RNG and encodes them with URL-safe base64
//! without padding.
//!
//! # Why URL-safe base64?
//!
//! Its alphabet (`A-Z a-z 0-9 - _`) contains no character that a cookie
//! value forbids, so the encoded token goes straight into a `Set-Cookie`
//! header. No character ever has to be swapped out afterwards, which means
//! every token carries the full entropy of the bytes it was drawn from.

mod error;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};

pub use error::TokenError;

/// Default number of random bytes per token (256 bits).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Fewest random bytes a generator will accept (192 bits).
pub const MIN_TOKEN_BYTES: usize = 24;

/// Most random bytes a generator will accept.
pub const MAX_TOKEN_BYTES: usize = 192;

/// Number of token characters kept when a token is written to a log.
const LOG_PREFIX_LEN: usize = 6;

/// Produces fixed-length, cookie-safe session tokens.
///
/// The generator owns its RNG. Anything implementing [`CryptoRng`] can be
/// injected with [`TokenGenerator::with_rng`]; the default is [`StdRng`]
/// seeded from the operating system.
///
/// `generate` takes `&self`, so one generator can be shared between
/// request handlers. The RNG sits behind a `Mutex` that is held only
/// while the bytes are filled in.
pub struct TokenGenerator {
    rng: Mutex<Box<dyn CryptoRng + Send>>,
    byte_len: usize,
}

impl TokenGenerator {
    /// Creates a generator drawing [`DEFAULT_TOKEN_BYTES`] per token from
    /// an OS-seeded [`StdRng`].
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(Box::new(StdRng::from_os_rng())),
            byte_len: DEFAULT_TOKEN_BYTES,
        }
    }

    /// Creates a generator with a caller-supplied secure RNG.
    ///
    /// Tests use this with a seeded [`StdRng`] to get reproducible tokens.
    pub fn with_rng<R>(rng: R) -> Self
    where
        R: CryptoRng + Send + 'static,
    {
        Self {
            rng: Mutex::new(Box::new(rng)),
            byte_len: DEFAULT_TOKEN_BYTES,
        }
    }

    /// Changes how many random bytes go into each token.
    ///
    /// # Errors
    /// Returns [`TokenError::TooShort`] below [`MIN_TOKEN_BYTES`] and
    /// [`TokenError::TooLong`] above [`MAX_TOKEN_BYTES`].
    pub fn with_byte_len(mut self, byte_len: usize) -> Result<Self, TokenError> {
        if byte_len < MIN_TOKEN_BYTES {
            return Err(TokenError::TooShort {
                requested: byte_len,
                minimum: MIN_TOKEN_BYTES,
            });
        }
        if byte_len > MAX_TOKEN_BYTES {
            return Err(TokenError::TooLong {
                requested: byte_len,
                maximum: MAX_TOKEN_BYTES,
            });
        }
        self.byte_len = byte_len;
        Ok(self)
    }

    /// Generates a new token.
    pub fn generate(&self) -> String {
        let mut bytes = vec![0u8; self.byte_len];
        {
            // A panic elsewhere can't leave the RNG half-written, so a
            // poisoned lock is still safe to use.
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.fill_bytes(&mut bytes);
        }
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Number of raw random bytes per token.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Length in characters of every token this generator produces.
    pub fn token_len(&self) -> usize {
        encoded_len(self.byte_len)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("byte_len", &self.byte_len)
            .finish_non_exhaustive()
    }
}

/// Returns `true` for bytes in the URL-safe base64 alphabet.
pub fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

/// Returns `true` if `token` could have come from any [`TokenGenerator`]:
/// only URL-safe base64 characters, and a length any allowed byte count
/// can produce.
///
/// The length is a range, not one generator's exact size, so tokens keep
/// working after `token_bytes` changes or when several managers share a
/// store. The session manager uses this to turn away garbage cookies
/// before they reach the store.
pub fn is_well_formed(token: &str) -> bool {
    (encoded_len(MIN_TOKEN_BYTES)..=encoded_len(MAX_TOKEN_BYTES)).contains(&token.len())
        && token.bytes().all(is_token_byte)
}

/// Returns the first few characters of a token, for log fields.
///
/// Full tokens are bearer credentials and never go into logs. The cut is
/// made on a character boundary, so malformed multibyte input is
/// truncated too.
pub fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(LOG_PREFIX_LEN) {
        Some((end, _)) => &token[..end],
        None => token,
    }
}

/// Unpadded base64 length of `n` bytes.
fn encoded_len(n: usize) -> usize {
    (n * 4).div_ceil(3)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn seeded(seed: u64) -> TokenGenerator {
        TokenGenerator::with_rng(StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_generate_default_has_fixed_length() {
        let tokens = TokenGenerator::new();

        for _ in 0..100 {
            assert_eq!(tokens.generate().len(), 43);
        }
        assert_eq!(tokens.token_len(), 43);
    }

    #[test]
    fn test_generate_ten_thousand_tokens_no_collisions() {
        let tokens = TokenGenerator::new();
        let mut seen = HashSet::with_capacity(10_000);

        for _ in 0..10_000 {
            let token = tokens.generate();
            assert!(
                token.bytes().all(is_token_byte),
                "token {token:?} has a character outside the URL-safe alphabet"
            );
            assert!(seen.insert(token), "duplicate token generated");
        }
    }

    #[test]
    fn test_generate_never_contains_padding_or_standard_base64_chars() {
        let tokens = TokenGenerator::new();

        for _ in 0..1_000 {
            let token = tokens.generate();
            assert!(!token.contains(['+', '/', '=']), "bad token {token:?}");
        }
    }

    #[test]
    fn test_with_rng_same_seed_same_tokens() {
        let a = seeded(7);
        let b = seeded(7);

        assert_eq!(a.generate(), b.generate());
        assert_eq!(a.generate(), b.generate());
    }

    #[test]
    fn test_with_rng_different_seed_different_tokens() {
        assert_ne!(seeded(1).generate(), seeded(2).generate());
    }

    #[test]
    fn test_with_byte_len_minimum_accepted() {
        let tokens = TokenGenerator::new()
            .with_byte_len(MIN_TOKEN_BYTES)
            .expect("minimum should be accepted");

        assert_eq!(tokens.generate().len(), 32);
    }

    #[test]
    fn test_with_byte_len_below_minimum_returns_error() {
        let result = TokenGenerator::new().with_byte_len(16);

        assert!(matches!(
            result,
            Err(TokenError::TooShort {
                requested: 16,
                minimum: MIN_TOKEN_BYTES
            })
        ));
    }

    #[test]
    fn test_with_byte_len_above_maximum_returns_error() {
        let result = TokenGenerator::new().with_byte_len(MAX_TOKEN_BYTES + 1);

        assert!(matches!(
            result,
            Err(TokenError::TooLong {
                maximum: MAX_TOKEN_BYTES,
                ..
            })
        ));
    }

    #[test]
    fn test_is_well_formed_accepts_every_allowed_length() {
        for byte_len in [MIN_TOKEN_BYTES, DEFAULT_TOKEN_BYTES, 48, MAX_TOKEN_BYTES] {
            let tokens = TokenGenerator::new().with_byte_len(byte_len).unwrap();

            assert!(is_well_formed(&tokens.generate()), "{byte_len} bytes");
        }
    }

    #[test]
    fn test_is_well_formed_rejects_out_of_range_length_and_bad_chars() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"a".repeat(encoded_len(MIN_TOKEN_BYTES) - 1)));
        assert!(!is_well_formed(&"a".repeat(encoded_len(MAX_TOKEN_BYTES) + 1)));
        let with_plus = format!("{}+", "a".repeat(42));
        assert!(!is_well_formed(&with_plus));
        let with_newline = format!("{}\n", "a".repeat(42));
        assert!(!is_well_formed(&with_newline));
    }

    #[test]
    fn test_token_prefix_truncates_long_and_keeps_short() {
        assert_eq!(token_prefix("abcdefghij"), "abcdef");
        assert_eq!(token_prefix("abc"), "abc");
    }

    #[test]
    fn test_token_prefix_multibyte_input_is_still_truncated() {
        let token = "a\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}secret-rest-of-cookie";

        assert_eq!(token_prefix(token), "a\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}");
        assert_eq!(token_prefix("\u{e9}\u{e9}"), "\u{e9}\u{e9}");
    }

    #[test]
    fn test_debug_does_not_leak_rng_state() {
        let rendered = format!("{:?}", TokenGenerator::new());

        assert!(rendered.contains("byte_len: 32"));
    }
}
