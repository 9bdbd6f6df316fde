//! XOR stream cipher over bit vectors (spec §4.7).
//!
//! This is deliberately not a cryptographic primitive: it is a one-time-pad
//! construction that degrades to a repeating-key XOR whenever the key is
//! shorter than the plaintext. `strict` mode is the only thing standing
//! between a caller and that degradation, so callers who care about
//! security must supply a key at least as long as the plaintext and pass
//! `strict = true`.

use crate::error::{Result, StegError};

/// XOR `bits` against `key`, cycling `key` if it is shorter.
///
/// `encrypt` and `decrypt` are the same operation (XOR is its own
/// inverse); `decrypt` is provided as a distinct name purely for call-site
/// clarity and always runs non-strict, since a receiver decrypting
/// ciphertext has no way to independently confirm the key was originally
/// long enough.
pub fn encrypt(bits: &[u8], key: &[u8], strict: bool) -> Result<Vec<u8>> {
    if strict && key.len() < bits.len() {
        return Err(StegError::KeyTooShort {
            key_bits: key.len(),
            plaintext_bits: bits.len(),
        });
    }
    if key.is_empty() {
        return if bits.is_empty() {
            Ok(Vec::new())
        } else {
            Err(StegError::KeyTooShort {
                key_bits: 0,
                plaintext_bits: bits.len(),
            })
        };
    }
    Ok(bits
        .iter()
        .zip(key.iter().cycle())
        .map(|(&b, &k)| b ^ k)
        .collect())
}

pub fn decrypt(bits: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    encrypt(bits, key, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_is_identity() {
        let bits = vec![1, 0, 1, 1, 0, 0, 1];
        let key = vec![1, 1, 0];
        let ct = encrypt(&bits, &key, false).unwrap();
        let pt = decrypt(&ct, &key).unwrap();
        assert_eq!(pt, bits);
    }

    #[test]
    fn strict_mode_rejects_short_key() {
        let bits = vec![1, 0, 1, 1];
        let key = vec![1, 0];
        assert!(matches!(
            encrypt(&bits, &key, true),
            Err(StegError::KeyTooShort {
                key_bits: 2,
                plaintext_bits: 4,
            })
        ));
    }

    #[test]
    fn non_strict_mode_cycles_a_short_key() {
        let bits = vec![1, 0, 1, 1];
        let key = vec![1, 0];
        let ct = encrypt(&bits, &key, false).unwrap();
        assert_eq!(ct, vec![0, 0, 0, 1]);
    }

    #[test]
    fn empty_key_against_nonempty_plaintext_always_fails() {
        assert!(encrypt(&[1, 0], &[], false).is_err());
        assert!(encrypt(&[1, 0], &[], true).is_err());
    }

    #[test]
    fn empty_plaintext_with_empty_key_is_fine() {
        assert_eq!(encrypt(&[], &[], true).unwrap(), Vec::<u8>::new());
    }
}
