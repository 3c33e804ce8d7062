//! Value transforms applied by the local store before values hit disk.

use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use tracing::{debug, info};

use super::StorageError;

/// Fixed key for the obfuscation transform. Provides no confidentiality.
const OBFUSCATION_KEY: &[u8] = b"uxlaws-local-storage-key";

/// File holding the per-installation key for `SealedCodec`
const SEALED_KEY_FILE: &str = "local_storage.key";

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Reversible transform between plaintext values and their stored form.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, plaintext: &str) -> Result<String, StorageError>;

    /// Reverse `encode`, or `None` if `stored` was not produced by it.
    fn try_decode(&self, stored: &str) -> Option<String>;

    /// Decode, returning values written before encoding existed unchanged.
    fn decode(&self, stored: &str) -> String {
        match self.try_decode(stored) {
            Some(plaintext) => plaintext,
            None => {
                debug!("Stored value is not encoded, returning it raw");
                stored.to_string()
            }
        }
    }
}

fn xor_with_key(bytes: &mut [u8]) {
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte ^= OBFUSCATION_KEY[i % OBFUSCATION_KEY.len()];
    }
}

/// `base64(xor(utf8(value), OBFUSCATION_KEY))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObfuscationCodec;

impl ObfuscationCodec {
    pub fn obfuscate(plaintext: &str) -> String {
        let mut bytes = plaintext.as_bytes().to_vec();
        xor_with_key(&mut bytes);
        STANDARD.encode(bytes)
    }

    pub fn deobfuscate(stored: &str) -> Option<String> {
        let mut bytes = STANDARD.decode(stored).ok()?;
        xor_with_key(&mut bytes);
        String::from_utf8(bytes).ok()
    }
}

impl ValueCodec for ObfuscationCodec {
    fn encode(&self, plaintext: &str) -> Result<String, StorageError> {
        Ok(Self::obfuscate(plaintext))
    }

    fn try_decode(&self, stored: &str) -> Option<String> {
        Self::deobfuscate(stored)
    }
}

/// ChaCha20-Poly1305 with a random per-installation key.
///
/// Stored form is `base64(nonce || ciphertext)`.
#[derive(Clone)]
pub struct SealedCodec {
    cipher: ChaCha20Poly1305,
}

impl SealedCodec {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Load the key from `dir`, generating and persisting one on first use.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(SEALED_KEY_FILE);
        if path.exists() {
            let encoded = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read key file {}", path.display()))?;
            let bytes = STANDARD
                .decode(encoded.trim())
                .context("Key file is not valid base64")?;
            let key: [u8; KEY_LEN] = bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("Key file has the wrong length"))?;
            return Ok(Self::new(&key));
        }

        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);

        std::fs::create_dir_all(dir)?;
        write_key_file(&path, &STANDARD.encode(key))
            .with_context(|| format!("Failed to write key file {}", path.display()))?;
        info!(path = %path.display(), "Generated local storage key");

        Ok(Self::new(&key))
    }

    fn seal(&self, plaintext: &str) -> Result<String, StorageError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| StorageError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    /// Decrypt a value written by this codec.
    pub fn unseal(&self, stored: &str) -> Option<String> {
        let blob = STANDARD.decode(stored).ok()?;
        if blob.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

/// Create the key file, owner-only from the moment it exists.
fn write_key_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

impl ValueCodec for SealedCodec {
    fn encode(&self, plaintext: &str) -> Result<String, StorageError> {
        self.seal(plaintext)
    }

    /// Sealed values first, then values written by `ObfuscationCodec`.
    fn try_decode(&self, stored: &str) -> Option<String> {
        self.unseal(stored)
            .or_else(|| ObfuscationCodec::deobfuscate(stored))
    }
}
