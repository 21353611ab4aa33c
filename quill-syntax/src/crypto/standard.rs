//! Key derivation and password checks of the standard security handler.

use crate::crypto::aes::{cbc_decrypt, cbc_encrypt, ecb256_decrypt, ecb256_encrypt};
use crate::crypto::rc4::rc4;
use log::warn;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha384, Sha512};

const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const ZERO_IV: [u8; 16] = [0; 16];

fn md5(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

fn pad(password: &[u8]) -> [u8; 32] {
    let mut out = PADDING;
    let len = password.len().min(32);
    out[..len].copy_from_slice(&password[..len]);
    out[len..].copy_from_slice(&PADDING[..32 - len]);

    out
}

fn xor_key(key: &[u8], i: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ i).collect()
}

/// The values of an encryption dictionary of revision 2 to 4 that enter key
/// derivation.
pub(crate) struct LegacyParams<'a> {
    pub(crate) revision: u8,
    pub(crate) key_len: usize,
    pub(crate) o: &'a [u8],
    pub(crate) u: &'a [u8],
    pub(crate) p: i32,
    pub(crate) id0: &'a [u8],
    pub(crate) encrypt_metadata: bool,
}

/// Compute the file key from a user password (algorithm 2).
pub(crate) fn legacy_file_key(password: &[u8], params: &LegacyParams<'_>) -> Vec<u8> {
    let mut input = pad(password).to_vec();
    input.extend_from_slice(params.o);
    input.extend_from_slice(&params.p.to_le_bytes());
    input.extend_from_slice(params.id0);

    if params.revision >= 4 && !params.encrypt_metadata {
        input.extend_from_slice(&[0xFF; 4]);
    }

    let mut hash = md5(&input);
    let n = params.key_len.min(16);

    if params.revision >= 3 {
        for _ in 0..50 {
            hash = md5(&hash[..n]);
        }
    }

    hash[..n].to_vec()
}

fn owner_rc4_key(owner: &[u8], revision: u8, key_len: usize) -> Vec<u8> {
    let mut hash = md5(&pad(owner));

    if revision >= 3 {
        for _ in 0..50 {
            hash = md5(&hash);
        }
    }

    hash[..key_len.min(16)].to_vec()
}

/// Compute the `/O` entry (algorithm 3).
pub(crate) fn legacy_o(owner: &[u8], user: &[u8], revision: u8, key_len: usize) -> Vec<u8> {
    let key = owner_rc4_key(owner, revision, key_len);
    let mut out = rc4(&key, &pad(user));

    if revision >= 3 {
        for i in 1..=19 {
            out = rc4(&xor_key(&key, i), &out);
        }
    }

    out
}

/// Compute the `/U` entry from the file key (algorithms 4 and 5).
pub(crate) fn legacy_u(file_key: &[u8], revision: u8, id0: &[u8]) -> Vec<u8> {
    if revision == 2 {
        return rc4(file_key, &PADDING);
    }

    let mut input = PADDING.to_vec();
    input.extend_from_slice(id0);
    let mut out = rc4(file_key, &md5(&input));

    for i in 1..=19 {
        out = rc4(&xor_key(file_key, i), &out);
    }

    out.extend_from_slice(&PADDING[..16]);

    out
}

/// Authenticate a user password and return the file key (algorithm 6).
pub(crate) fn legacy_check_user(password: &[u8], params: &LegacyParams<'_>) -> Option<Vec<u8>> {
    let key = legacy_file_key(password, params);
    let u = legacy_u(&key, params.revision, params.id0);

    let matches = if params.revision == 2 {
        params.u.get(..32) == Some(&u[..32])
    } else {
        params.u.get(..16) == Some(&u[..16])
    };

    matches.then_some(key)
}

/// Authenticate an owner password and return the file key (algorithm 7).
pub(crate) fn legacy_check_owner(password: &[u8], params: &LegacyParams<'_>) -> Option<Vec<u8>> {
    let key = owner_rc4_key(password, params.revision, params.key_len);
    let o = params.o.get(..32)?;

    let user = if params.revision == 2 {
        rc4(&key, o)
    } else {
        (0..=19)
            .rev()
            .fold(o.to_vec(), |acc, i| rc4(&xor_key(&key, i), &acc))
    };

    legacy_check_user(&user, params)
}

/// Hash a password for revisions 5 and 6 (algorithm 2.B). Revision 5 uses plain
/// SHA-256.
pub(crate) fn modern_hash(
    password: &[u8],
    salt: &[u8],
    udata: Option<&[u8]>,
    revision: u8,
) -> Option<[u8; 32]> {
    let password = &password[..password.len().min(127)];
    let udata = udata.unwrap_or_default();

    let mut input = password.to_vec();
    input.extend_from_slice(salt);
    input.extend_from_slice(udata);
    let mut k = Sha256::digest(&input).to_vec();

    if revision == 6 {
        let mut round: usize = 0;

        loop {
            let mut single = password.to_vec();
            single.extend_from_slice(&k);
            single.extend_from_slice(udata);
            let k1 = single.repeat(64);

            let e = cbc_encrypt(&k[..16], &k[16..32], &k1, false)?;

            // The first 16 bytes as a big-endian number modulo 3 equal the sum of
            // the bytes modulo 3.
            let selector = e[..16].iter().map(|b| u32::from(*b)).sum::<u32>() % 3;

            k = match selector {
                0 => Sha256::digest(&e).to_vec(),
                1 => Sha384::digest(&e).to_vec(),
                _ => Sha512::digest(&e).to_vec(),
            };

            round += 1;

            if round >= 64 && usize::from(*e.last()?) <= round - 32 {
                break;
            }
        }
    }

    let mut out = [0; 32];
    out.copy_from_slice(&k[..32]);

    Some(out)
}

/// The values of an encryption dictionary of revision 5 or 6.
pub(crate) struct ModernParams<'a> {
    pub(crate) revision: u8,
    pub(crate) o: &'a [u8],
    pub(crate) u: &'a [u8],
    pub(crate) oe: &'a [u8],
    pub(crate) ue: &'a [u8],
    pub(crate) perms: Option<&'a [u8]>,
    pub(crate) p: i32,
}

/// Authenticate a password as user and then as owner password, returning the
/// file key (algorithm 2.A).
pub(crate) fn modern_file_key(password: &[u8], params: &ModernParams<'_>) -> Option<Vec<u8>> {
    let u = params.u.get(..48)?;
    let o = params.o.get(..48)?;

    let key = if modern_hash(password, &u[32..40], None, params.revision)? == u[..32] {
        let intermediate = modern_hash(password, &u[40..48], None, params.revision)?;
        cbc_decrypt(&intermediate, &ZERO_IV, params.ue.get(..32)?, false)?
    } else if modern_hash(password, &o[32..40], Some(u), params.revision)? == o[..32] {
        let intermediate = modern_hash(password, &o[40..48], Some(u), params.revision)?;
        cbc_decrypt(&intermediate, &ZERO_IV, params.oe.get(..32)?, false)?
    } else {
        return None;
    };

    if let Some(perms) = params.perms.and_then(|p| p.get(..16)) {
        let mut block = [0; 16];
        block.copy_from_slice(perms);

        match ecb256_decrypt(&key, block) {
            Some(d) if &d[9..12] == b"adb" => {
                if d[..4] != params.p.to_le_bytes() {
                    warn!("/Perms does not match /P");
                }
            }
            _ => warn!("/Perms entry could not be validated"),
        }
    }

    Some(key)
}

/// The entries of a newly created revision 5 or 6 encryption dictionary.
pub(crate) struct ModernEntries {
    pub(crate) o: Vec<u8>,
    pub(crate) u: Vec<u8>,
    pub(crate) oe: Vec<u8>,
    pub(crate) ue: Vec<u8>,
    pub(crate) perms: Vec<u8>,
}

/// Compute `/U`, `/UE`, `/O`, `/OE` and `/Perms` (algorithms 8, 9 and 10).
pub(crate) fn modern_entries(
    user: &[u8],
    owner: &[u8],
    file_key: &[u8],
    revision: u8,
    p: i32,
    encrypt_metadata: bool,
    rng: &mut dyn RngCore,
) -> Option<ModernEntries> {
    let mut salts = [0_u8; 16];
    rng.fill_bytes(&mut salts);
    let (validation, key_salt) = salts.split_at(8);

    let mut u = modern_hash(user, validation, None, revision)?.to_vec();
    u.extend_from_slice(&salts);
    let intermediate = modern_hash(user, key_salt, None, revision)?;
    let ue = cbc_encrypt(&intermediate, &ZERO_IV, file_key, false)?;

    rng.fill_bytes(&mut salts);
    let (validation, key_salt) = salts.split_at(8);

    let mut o = modern_hash(owner, validation, Some(&u), revision)?.to_vec();
    o.extend_from_slice(&salts);
    let intermediate = modern_hash(owner, key_salt, Some(&u), revision)?;
    let oe = cbc_encrypt(&intermediate, &ZERO_IV, file_key, false)?;

    let mut block = [0xFF_u8; 16];
    block[..4].copy_from_slice(&p.to_le_bytes());
    block[8] = if encrypt_metadata { b'T' } else { b'F' };
    block[9..12].copy_from_slice(b"adb");
    rng.fill_bytes(&mut block[12..]);
    let perms = ecb256_encrypt(file_key, block)?.to_vec();

    Some(ModernEntries {
        o,
        u,
        oe,
        ue,
        perms,
    })
}

/// The key for one object (algorithm 1).
pub(crate) fn object_key(file_key: &[u8], num: u32, generation: u16, aes: bool) -> Vec<u8> {
    let mut input = file_key.to_vec();
    input.extend_from_slice(&num.to_le_bytes()[..3]);
    input.extend_from_slice(&generation.to_le_bytes());

    if aes {
        input.extend_from_slice(b"sAlT");
    }

    md5(&input)[..(file_key.len() + 5).min(16)].to_vec()
}
