//! Command-key derivation
//!
//! Outbound write commands must carry a key derived from the gateway's
//! shared secret and the session token it last broadcast: one AES-128-CBC
//! pass over the token with a fixed IV, hex-encoded. Deployed firmware only
//! checks the token's complete blocks, so the cipher's final padding block
//! is computed and thrown away. That truncation is a protocol requirement;
//! changing it breaks interoperability with real gateways.

use crate::error::{HubError, Result};
use aes::{
    cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit},
    Aes128,
};

/// Fixed initialization vector shared by every gateway deployment
pub const IV: [u8; 16] = [
    0x17, 0x99, 0x6d, 0x09, 0x3d, 0x28, 0xdd, 0xb3, 0xba, 0x69, 0x5a, 0x2e, 0x6f, 0x58, 0x56,
    0x2e,
];

const BLOCK: usize = 16;

/// Derive the hex command key for `token` under `secret`.
///
/// `secret` is the 16-character password printed in the gateway's companion
/// app; anything of a different length cannot key AES-128 and is rejected.
pub fn derive_key(secret: &str, token: &str) -> Result<String> {
    let secret = secret.as_bytes();
    if secret.len() != BLOCK {
        return Err(HubError::InvalidKey(format!(
            "expected 16 bytes, got {}",
            secret.len()
        )));
    }

    let cipher = cbc::Encryptor::<Aes128>::new_from_slices(secret, &IV)
        .map_err(|e| HubError::InvalidKey(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(token.as_bytes());

    // Keep only the token's complete blocks; the trailing padding block is
    // discarded (see module docs).
    let keep = token.len() / BLOCK * BLOCK;
    Ok(hex::encode(&ciphertext[..keep]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef";
    const TOKEN: &str = "gbBdzQINrtkmbLvP";

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_key(SECRET, TOKEN).unwrap();
        let b = derive_key(SECRET, TOKEN).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_one_block_token_yields_one_block_key() {
        // 16-byte token -> exactly one encrypted block -> 32 hex chars
        let key = derive_key(SECRET, TOKEN).unwrap();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_padding_block_is_discarded() {
        // A 17-byte token still yields a single complete block
        let key = derive_key(SECRET, "gbBdzQINrtkmbLvPX").unwrap();
        assert_eq!(key.len(), 32);

        // and its first block matches the 16-byte prefix alone
        let prefix_key = derive_key(SECRET, TOKEN).unwrap();
        assert_eq!(key, prefix_key);
    }

    #[test]
    fn test_different_inputs_differ() {
        let a = derive_key(SECRET, TOKEN).unwrap();
        let b = derive_key(SECRET, "PvLbmktrNIQzdBbg").unwrap();
        assert_ne!(a, b);

        let c = derive_key("fedcba9876543210", TOKEN).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_short_token_derives_empty_key() {
        // No complete block to keep; matches the original streaming-update
        // semantics rather than erroring.
        let key = derive_key(SECRET, "short").unwrap();
        assert!(key.is_empty());
    }

    #[test]
    fn test_rejects_bad_secret_length() {
        assert!(matches!(
            derive_key("too-short", TOKEN),
            Err(HubError::InvalidKey(_))
        ));
        assert!(matches!(
            derive_key("definitely-longer-than-a-block", TOKEN),
            Err(HubError::InvalidKey(_))
        ));
    }
}
