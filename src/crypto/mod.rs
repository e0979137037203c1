/*!

Cryptographic primitives for the `dh-ietf1024-sha256-aes128-cbc-pkcs7`
session algorithm.

The group is the 1024-bit MODP group from RFC 2409 (Second Oakley
Group) with generator 2. Public values travel as big-endian byte
strings. The shared secret is left-padded to the length of the prime
and fed to HKDF-SHA256 without salt or info, and the first 16 bytes
of output form the AES-128 key. This matches what gnome-keyring and
libsecret do; don't change it.

The arithmetic and ciphers come from one of two back ends, picked at
build time by the `crypto-rust` or `crypto-openssl` feature.

*/

#[cfg(not(any(feature = "crypto-rust", feature = "crypto-openssl")))]
compile_error!("You must enable one of the features crypto-rust or crypto-openssl");

#[cfg(feature = "crypto-rust")]
mod rust_crypto;
#[cfg(feature = "crypto-rust")]
use rust_crypto as backend;

#[cfg(all(feature = "crypto-openssl", not(feature = "crypto-rust")))]
mod openssl_crypto;
#[cfg(all(feature = "crypto-openssl", not(feature = "crypto-rust")))]
use openssl_crypto as backend;

use std::cmp::Ordering;
use std::fmt;

use zeroize::Zeroizing;

pub(crate) const AES_BLOCK_LEN: usize = 16;
pub(crate) const AES_KEY_LEN: usize = 16;

const DH_GENERATOR: [u8; 1] = [2];

#[rustfmt::skip]
const DH_PRIME: [u8; 128] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xC9, 0x0F, 0xDA, 0xA2, 0x21, 0x68, 0xC2, 0x34,
    0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1, 0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74,
    0x02, 0x0B, 0xBE, 0xA6, 0x3B, 0x13, 0x9B, 0x22, 0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B, 0x30, 0x2B, 0x0A, 0x6D, 0xF2, 0x5F, 0x14, 0x37,
    0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45, 0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6,
    0xF4, 0x4C, 0x42, 0xE9, 0xA6, 0x37, 0xED, 0x6B, 0x0B, 0xFF, 0x5C, 0xB6, 0xF4, 0x06, 0xB7, 0xED,
    0xEE, 0x38, 0x6B, 0xFB, 0x5A, 0x89, 0x9F, 0xA5, 0xAE, 0x9F, 0x24, 0x11, 0x7C, 0x4B, 0x1F, 0xE6,
    0x49, 0x28, 0x66, 0x51, 0xEC, 0xE6, 0x53, 0x81, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct CryptoError(pub(crate) String);

/// A session's AES-128 key. Wiped on drop, never printed.
#[derive(Clone)]
pub(crate) struct SessionKey(Zeroizing<[u8; AES_KEY_LEN]>);

impl SessionKey {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; AES_KEY_LEN]) -> Self {
        SessionKey(Zeroizing::new(bytes))
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// One side's ephemeral Diffie-Hellman key pair.
pub(crate) struct KeyPair {
    private: Zeroizing<Vec<u8>>,
    public: Vec<u8>,
}

impl KeyPair {
    pub(crate) fn generate() -> Result<Self, CryptoError> {
        let mut private = Zeroizing::new(vec![0u8; DH_PRIME.len()]);
        backend::random_bytes(private.as_mut_slice())?;
        let public = backend::mod_exp(&DH_GENERATOR, &private, &DH_PRIME)?;
        Ok(KeyPair { private, public })
    }

    /// Our public value, big-endian.
    pub(crate) fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// Agree on the session key given the peer's public value.
    pub(crate) fn derive_session_key(&self, peer_public: &[u8]) -> Result<SessionKey, CryptoError> {
        check_peer_public(peer_public)?;
        let shared = Zeroizing::new(backend::mod_exp(peer_public, &self.private, &DH_PRIME)?);
        let padded = pad_to_prime_len(&shared);
        let mut okm = Zeroizing::new([0u8; AES_KEY_LEN]);
        backend::hkdf_sha256(&padded, okm.as_mut_slice())?;
        Ok(SessionKey(okm))
    }
}

/// A peer public value is usable only if it lies in `[2, p-2]`.
fn check_peer_public(peer_public: &[u8]) -> Result<(), CryptoError> {
    let value = strip_leading_zeros(peer_public);
    let mut upper = DH_PRIME;
    upper[upper.len() - 1] -= 2;
    if value.is_empty() || value == [1] {
        return Err(CryptoError("peer public key is degenerate".to_string()));
    }
    if compare_be(value, &upper) == Ordering::Greater {
        return Err(CryptoError("peer public key is out of range".to_string()));
    }
    Ok(())
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Compare two big-endian unsigned integers without leading zeros.
fn compare_be(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn pad_to_prime_len(value: &[u8]) -> Zeroizing<Vec<u8>> {
    let value = strip_leading_zeros(value);
    let mut padded = Zeroizing::new(vec![0u8; DH_PRIME.len().saturating_sub(value.len())]);
    padded.extend_from_slice(value);
    padded
}

pub(crate) fn random_iv() -> Result<[u8; AES_BLOCK_LEN], CryptoError> {
    let mut iv = [0u8; AES_BLOCK_LEN];
    backend::random_bytes(&mut iv)?;
    Ok(iv)
}

/// AES-128-CBC with PKCS7 padding.
pub(crate) fn encrypt(
    key: &SessionKey,
    iv: &[u8; AES_BLOCK_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    backend::aes128_cbc_encrypt(key.as_bytes(), iv, plaintext)
}

/// Inverse of [encrypt]. Fails on a malformed IV, a ciphertext that
/// isn't a whole number of blocks, or bad padding.
pub(crate) fn decrypt(
    key: &SessionKey,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if iv.len() != AES_BLOCK_LEN {
        return Err(CryptoError(format!(
            "expected a {AES_BLOCK_LEN}-byte IV, got {} bytes",
            iv.len()
        )));
    }
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_LEN != 0 {
        return Err(CryptoError(format!(
            "ciphertext length {} is not a positive multiple of {AES_BLOCK_LEN}",
            ciphertext.len()
        )));
    }
    backend::aes128_cbc_decrypt(key.as_bytes(), iv, ciphertext).map(Zeroizing::new)
}
