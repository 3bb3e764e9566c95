//! At-rest encoding of the credential file.
//!
//! Sealed files are `ENOM` + key-source tag + 12-byte nonce + AES-256-GCM
//! ciphertext. Anything without the magic prefix is read as a plaintext
//! cookie string, which is what gets written when no data key is available.

use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng, rand_core::RngCore},
};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use enom_common::EncryptionMode;
use enom_keyring_store::{DATA_KEY_ACCOUNT, KeyringStore};
use tracing::{debug, warn};
use zeroize::Zeroizing;

const MAGIC: &[u8; 4] = b"ENOM";
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const HEADER_SIZE: usize = MAGIC.len() + 1 + NONCE_SIZE;

/// Which key sealed a file. Stored in the file so a later mode change can
/// still open it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum KeyTag {
    Keyring = 1,
    Machine = 2,
}

impl KeyTag {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(KeyTag::Keyring),
            2 => Some(KeyTag::Machine),
            _ => None,
        }
    }
}

pub(crate) struct DataKey {
    tag: KeyTag,
    bytes: Zeroizing<[u8; KEY_SIZE]>,
}

/// Where the data key for the credential file comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Random key held in the OS keychain; machine key when the keychain is
    /// unavailable.
    Keyring(KeyringStore),
    /// Key derived from machine-identifying inputs.
    Machine,
    /// Never encrypt.
    Disabled,
}

impl KeySource {
    pub fn from_mode(mode: EncryptionMode) -> Self {
        match mode {
            EncryptionMode::Keyring => KeySource::Keyring(KeyringStore::new()),
            EncryptionMode::Machine => KeySource::Machine,
            EncryptionMode::None => KeySource::Disabled,
        }
    }

    /// Key to seal a new file with, or `None` to write plaintext.
    pub(crate) fn key_for_write(&self) -> Option<DataKey> {
        match self {
            KeySource::Disabled => None,
            KeySource::Machine => machine_key(),
            KeySource::Keyring(store) => match keyring_key(store, true) {
                Ok(Some(key)) => Some(key),
                Ok(None) => machine_key(),
                Err(e) => {
                    warn!(error = %e, "Keychain unavailable, using machine-derived key");
                    machine_key()
                }
            },
        }
    }

    /// Key matching the tag found in an existing file.
    fn key_for_read(&self, tag: KeyTag) -> Result<DataKey> {
        match tag {
            KeyTag::Machine => machine_key().context("No machine-identifying input available"),
            KeyTag::Keyring => {
                let store = match self {
                    KeySource::Keyring(store) => store.clone(),
                    _ => KeyringStore::new(),
                };
                keyring_key(&store, false)?.context("Data key missing from keychain")
            }
        }
    }
}

/// Load (and optionally create) the random data key kept in the keychain.
fn keyring_key(store: &KeyringStore, create: bool) -> Result<Option<DataKey>> {
    if let Some(encoded) = store.get(DATA_KEY_ACCOUNT)? {
        let decoded = Zeroizing::new(
            BASE64
                .decode(encoded.trim())
                .context("Keychain data key is not valid base64")?,
        );
        if decoded.len() != KEY_SIZE {
            anyhow::bail!("Keychain data key has wrong length {}", decoded.len());
        }
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        bytes.copy_from_slice(&decoded);
        return Ok(Some(DataKey {
            tag: KeyTag::Keyring,
            bytes,
        }));
    }

    if !create {
        return Ok(None);
    }

    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(&mut bytes[..]);
    let encoded = Zeroizing::new(BASE64.encode(&bytes[..]));
    store.set(DATA_KEY_ACCOUNT, &encoded)?;
    debug!("Created credential data key in keychain");
    Ok(Some(DataKey {
        tag: KeyTag::Keyring,
        bytes,
    }))
}

/// SHA-256 over machine id, hostname, user id and home path.
fn machine_key() -> Option<DataKey> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    let mut inputs = 0;

    #[cfg(target_os = "linux")]
    {
        if let Ok(id) = std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
        {
            hasher.update(id.trim().as_bytes());
            inputs += 1;
        }
    }

    if let Ok(hostname) = hostname::get() {
        hasher.update(hostname.as_encoded_bytes());
        inputs += 1;
    }

    #[cfg(unix)]
    {
        hasher.update(unsafe { libc::getuid() }.to_le_bytes());
    }
    #[cfg(windows)]
    {
        if let Ok(user) = std::env::var("USERNAME") {
            hasher.update(user.as_bytes());
            inputs += 1;
        }
    }

    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
        inputs += 1;
    }

    if inputs == 0 {
        return None;
    }

    hasher.update(b"enom-credential-encryption-v1-machine-key");
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    bytes.copy_from_slice(&hasher.finalize());
    Some(DataKey {
        tag: KeyTag::Machine,
        bytes,
    })
}

pub(crate) fn seal(plaintext: &str, key: &DataKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.bytes[..])
        .map_err(|e| anyhow::anyhow!("Cipher init failed: {e}"))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| anyhow::anyhow!("Encryption failed: {e}"))?;

    let mut output = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    output.extend_from_slice(MAGIC);
    output.push(key.tag as u8);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Key source recorded in a sealed file.
pub(crate) fn sealed_with(data: &[u8]) -> Option<KeyTag> {
    if !is_sealed(data) {
        return None;
    }
    data.get(MAGIC.len()).copied().and_then(KeyTag::from_byte)
}

pub(crate) fn is_sealed(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// Decode a credential file, sealed or plaintext.
pub(crate) fn open(data: &[u8], keys: &KeySource) -> Result<String> {
    if !is_sealed(data) {
        return String::from_utf8(data.to_vec()).context("Plaintext credential is not UTF-8");
    }
    if data.len() < HEADER_SIZE {
        anyhow::bail!("Credential file is truncated");
    }

    let tag = sealed_with(data).with_context(|| format!("Unknown key tag {}", data[MAGIC.len()]))?;
    let nonce = Nonce::from_slice(&data[MAGIC.len() + 1..HEADER_SIZE]);
    let ciphertext = &data[HEADER_SIZE..];

    let key = keys.key_for_read(tag)?;
    let cipher = Aes256Gcm::new_from_slice(&key.bytes[..])
        .map_err(|e| anyhow::anyhow!("Cipher init failed: {e}"))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("Decryption failed: {e}"))?,
    );

    String::from_utf8(plaintext.to_vec()).context("Invalid UTF-8 in decrypted credential")
}
