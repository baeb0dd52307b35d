use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
/// Vault header. Bumped whenever the layout or KDF parameters change.
const VAULT_MAGIC: &[u8; 4] = b"CCV1";
const HEADER_LEN: usize = VAULT_MAGIC.len() + SALT_LEN + NONCE_LEN;

// Argon2id cost: 64 MiB, 3 passes, single lane.
const KDF_MEMORY_KIB: u32 = 65536;
const KDF_PASSES: u32 = 3;
const KDF_LANES: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed, wrong passphrase or corrupted vault")]
    Decryption,
    #[error("vault is truncated or not a cyclecast vault")]
    InvalidFormat,
    #[error("unsupported vault version {0:?}")]
    UnsupportedVersion([u8; 4]),
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct VaultKey([u8; KEY_LEN]);

impl VaultKey {
    fn derive(passphrase: &str, salt: &[u8]) -> Result<Self, CryptoError> {
        let params = Params::new(KDF_MEMORY_KIB, KDF_PASSES, KDF_LANES, Some(KEY_LEN))
            .map_err(|_| CryptoError::KeyDerivation)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Self([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key.0)
            .map_err(|_| CryptoError::KeyDerivation)?;
        Ok(key)
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&self.0).map_err(|_| CryptoError::KeyDerivation)
    }
}

/// Borrowed view of a vault's header fields and ciphertext.
struct VaultParts<'a> {
    salt: &'a [u8],
    nonce: &'a [u8],
    ciphertext: &'a [u8],
}

impl<'a> VaultParts<'a> {
    fn split(bytes: &'a [u8]) -> Result<Self, CryptoError> {
        if bytes.len() < VAULT_MAGIC.len() {
            return Err(CryptoError::InvalidFormat);
        }
        let (magic, rest) = bytes.split_at(VAULT_MAGIC.len());
        if magic != VAULT_MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(if found.starts_with(b"CCV") {
                CryptoError::UnsupportedVersion(found)
            } else {
                CryptoError::InvalidFormat
            });
        }
        // Anything shorter than the header plus a GCM tag cannot be valid.
        if bytes.len() < HEADER_LEN + 16 {
            return Err(CryptoError::InvalidFormat);
        }
        let (salt, rest) = rest.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        Ok(Self {
            salt,
            nonce,
            ciphertext,
        })
    }
}

/// Seal plaintext under a passphrase.
///
/// Layout: `CCV1 || salt (32) || nonce (12) || ciphertext+tag`.
pub fn seal(passphrase: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let cipher = VaultKey::derive(passphrase, &salt)?.cipher()?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let mut vault = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    vault.extend_from_slice(VAULT_MAGIC);
    vault.extend_from_slice(&salt);
    vault.extend_from_slice(&nonce);
    vault.extend_from_slice(&ciphertext);
    Ok(vault)
}

/// Open a vault produced by [`seal`]. The caller owns zeroizing the result.
pub fn open(passphrase: &str, vault: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let parts = VaultParts::split(vault)?;
    let cipher = VaultKey::derive(passphrase, parts.salt)?.cipher()?;
    cipher
        .decrypt(Nonce::from_slice(parts.nonce), parts.ciphertext)
        .map_err(|_| CryptoError::Decryption)
}
