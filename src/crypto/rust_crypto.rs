//! Pure-Rust back end: RustCrypto ciphers and `num` big integers.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use num::BigUint;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use super::CryptoError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub(super) fn random_bytes(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError(format!("no randomness available: {e}")))
}

pub(super) fn mod_exp(base: &[u8], exponent: &[u8], modulus: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let result = BigUint::from_bytes_be(base).modpow(
        &BigUint::from_bytes_be(exponent),
        &BigUint::from_bytes_be(modulus),
    );
    Ok(result.to_bytes_be())
}

pub(super) fn hkdf_sha256(ikm: &[u8], okm: &mut [u8]) -> Result<(), CryptoError> {
    Hkdf::<Sha256>::new(None, ikm)
        .expand(&[], okm)
        .map_err(|e| CryptoError(format!("key derivation failed: {e}")))
}

pub(super) fn aes128_cbc_encrypt(
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|e| CryptoError(format!("bad key or IV: {e}")))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

pub(super) fn aes128_cbc_decrypt(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|e| CryptoError(format!("bad key or IV: {e}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError("invalid padding (wrong key or corrupted data)".to_string()))
}
