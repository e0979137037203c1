//! OpenSSL back end.

use openssl::bn::{BigNum, BigNumContext};
use openssl::error::ErrorStack;
use openssl::md::Md;
use openssl::pkey::Id;
use openssl::pkey_ctx::PkeyCtx;
use openssl::symm::{Cipher, decrypt, encrypt};

use super::CryptoError;

fn failure(context: &str) -> impl FnOnce(ErrorStack) -> CryptoError + '_ {
    move |e| CryptoError(format!("{context}: {e}"))
}

pub(super) fn random_bytes(buf: &mut [u8]) -> Result<(), CryptoError> {
    openssl::rand::rand_bytes(buf).map_err(failure("no randomness available"))
}

pub(super) fn mod_exp(base: &[u8], exponent: &[u8], modulus: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let fail = "modular exponentiation failed";
    let base = BigNum::from_slice(base).map_err(failure(fail))?;
    let exponent = BigNum::from_slice(exponent).map_err(failure(fail))?;
    let modulus = BigNum::from_slice(modulus).map_err(failure(fail))?;
    let mut ctx = BigNumContext::new().map_err(failure(fail))?;
    let mut result = BigNum::new().map_err(failure(fail))?;
    result
        .mod_exp(&base, &exponent, &modulus, &mut ctx)
        .map_err(failure(fail))?;
    Ok(result.to_vec())
}

pub(super) fn hkdf_sha256(ikm: &[u8], okm: &mut [u8]) -> Result<(), CryptoError> {
    let fail = "key derivation failed";
    let mut ctx = PkeyCtx::new_id(Id::HKDF).map_err(failure(fail))?;
    ctx.derive_init().map_err(failure(fail))?;
    ctx.set_hkdf_md(Md::sha256()).map_err(failure(fail))?;
    ctx.set_hkdf_key(ikm).map_err(failure(fail))?;
    ctx.derive(Some(okm)).map_err(failure(fail))?;
    Ok(())
}

pub(super) fn aes128_cbc_encrypt(
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    encrypt(Cipher::aes_128_cbc(), key, Some(iv), plaintext).map_err(failure("encryption failed"))
}

pub(super) fn aes128_cbc_decrypt(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    decrypt(Cipher::aes_128_cbc(), key, Some(iv), ciphertext)
        .map_err(|_| CryptoError("invalid padding (wrong key or corrupted data)".to_string()))
}
