//! AES in CBC and ECB mode, as used by the standard security handler.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};
use log::warn;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Decrypt data whose first 16 bytes are the IV. The key length selects AES-128 or
/// AES-256.
pub(crate) fn decrypt_with_iv(key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let (iv, body) = data.split_at_checked(16)?;

    // Trailing bytes that don't form a full block are dropped.
    let body = &body[..body.len() - body.len() % 16];

    let padded = cbc_decrypt(key, iv, body, true);

    padded.or_else(|| {
        warn!("AES data has invalid padding");

        cbc_decrypt(key, iv, body, false)
    })
}

/// Encrypt data with PKCS#7 padding, prefixing the IV.
pub(crate) fn encrypt_with_iv(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Option<Vec<u8>> {
    let mut out = iv.to_vec();
    out.extend(cbc_encrypt(key, iv, data, true)?);

    Some(out)
}

pub(crate) fn cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8], padding: bool) -> Option<Vec<u8>> {
    match (key.len(), padding) {
        (16, true) => Aes128CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .ok(),
        (16, false) => Aes128CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .ok(),
        (32, true) => Aes256CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .ok(),
        (32, false) => Aes256CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .ok(),
        _ => None,
    }
}

pub(crate) fn cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8], padding: bool) -> Option<Vec<u8>> {
    Some(match (key.len(), padding) {
        (16, true) => Aes128CbcEnc::new_from_slices(key, iv)
            .ok()?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        (16, false) => Aes128CbcEnc::new_from_slices(key, iv)
            .ok()?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        (32, true) => Aes256CbcEnc::new_from_slices(key, iv)
            .ok()?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        (32, false) => Aes256CbcEnc::new_from_slices(key, iv)
            .ok()?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        _ => return None,
    })
}

/// Encrypt a single block with AES-256 in ECB mode.
pub(crate) fn ecb256_encrypt(key: &[u8], block: [u8; 16]) -> Option<[u8; 16]> {
    let cipher = Aes256::new_from_slice(key).ok()?;
    let mut block = GenericArray::from(block);
    cipher.encrypt_block(&mut block);

    Some(block.into())
}

/// Decrypt a single block with AES-256 in ECB mode.
pub(crate) fn ecb256_decrypt(key: &[u8], block: [u8; 16]) -> Option<[u8; 16]> {
    use aes::cipher::BlockDecrypt;

    let cipher = Aes256::new_from_slice(key).ok()?;
    let mut block = GenericArray::from(block);
    cipher.decrypt_block(&mut block);

    Some(block.into())
}
