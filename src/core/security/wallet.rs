#![forbid(unsafe_code)]
#![deny(missing_docs)]
// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wallet: directory-backed Ed25519 keys used to sign blocks and votes.
//!
//! Each key lives in `<data_dir>/wallet/<address-hex>.key` as PKCS#8.
//! If `EMBER_KEY_PASSPHRASE` is set, key files are encrypted at rest as
//! `MAGIC(8) || SALT(16) || NONCE(12) || CIPHERTEXT+TAG(..)` with
//! AES-256-GCM over the PKCS#8 bytes, key derived via PBKDF2-HMAC-SHA256.

use crate::core::types::{Address, Block, Signature};
use ring::{
    aead, pbkdf2,
    rand::{SecureRandom, SystemRandom},
    signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519},
};
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;
use zeroize::Zeroize;

const KEY_FILE_MAGIC: &[u8] = b"EMBRKEY1"; // 8 bytes
const KEY_SALT_LEN: usize = 16;
const KEY_NONCE_LEN: usize = 12;
const PBKDF2_ITERS: u32 = 100_000;

/// Wallet errors.
#[derive(Debug, Error)]
pub enum WalletError {
    /// An I/O operation failed.
    #[error("io")]
    Io,
    /// The key encoding was invalid.
    #[error("invalid key encoding")]
    InvalidKey,
    /// No passphrase was supplied.
    #[error("missing passphrase (set EMBER_KEY_PASSPHRASE)")]
    MissingPassphrase,
    /// A cryptographic operation failed.
    #[error("crypto")]
    Crypto,
    /// Signature verification failed.
    #[error("bad signature")]
    BadSignature,
}

fn passphrase() -> Option<String> {
    std::env::var("EMBER_KEY_PASSPHRASE")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn set_private_perms_best_effort(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
}

/// Atomic write (best-effort fsync, then rename).
fn atomic_write_private(path: &Path, bytes: &[u8]) -> Result<(), WalletError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| WalletError::Io)?;
    }
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|_| WalletError::Io)?;
        f.write_all(bytes).map_err(|_| WalletError::Io)?;
        let _ = f.sync_all();
    }
    set_private_perms_best_effort(&tmp);
    fs::rename(&tmp, path).map_err(|_| WalletError::Io)?;
    set_private_perms_best_effort(path);
    Ok(())
}

fn derive_key(pass: &[u8], salt: &[u8; KEY_SALT_LEN]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let iters = NonZeroU32::new(PBKDF2_ITERS).expect("nonzero");
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, iters, salt, pass, &mut out);
    out
}

fn encrypt_pkcs8(pass: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; KEY_SALT_LEN];
    rng.fill(&mut salt).map_err(|_| WalletError::Crypto)?;
    let mut nonce_bytes = [0u8; KEY_NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| WalletError::Crypto)?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut key = derive_key(pass, &salt);
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| WalletError::Crypto)?;
    let sealing = aead::LessSafeKey::new(unbound);

    let mut in_out = plaintext.to_vec();
    sealing
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::Crypto)?;
    key.zeroize();

    let mut out = Vec::with_capacity(KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN + in_out.len());
    out.extend_from_slice(KEY_FILE_MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

fn decrypt_pkcs8(pass: &[u8], bytes: &[u8]) -> Result<Vec<u8>, WalletError> {
    let header = KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN;
    if bytes.len() < header + 16 {
        return Err(WalletError::InvalidKey);
    }
    let mut salt = [0u8; KEY_SALT_LEN];
    salt.copy_from_slice(&bytes[KEY_FILE_MAGIC.len()..KEY_FILE_MAGIC.len() + KEY_SALT_LEN]);
    let mut nonce_bytes = [0u8; KEY_NONCE_LEN];
    nonce_bytes.copy_from_slice(&bytes[KEY_FILE_MAGIC.len() + KEY_SALT_LEN..header]);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut key = derive_key(pass, &salt);
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| WalletError::Crypto)?;
    let opening = aead::LessSafeKey::new(unbound);

    let mut in_out = bytes[header..].to_vec();
    let plain = opening
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::Crypto)?;
    key.zeroize();
    Ok(plain.to_vec())
}

fn keypair_from_file(bytes: Vec<u8>) -> Result<Ed25519KeyPair, WalletError> {
    let mut pkcs8 = if bytes.starts_with(KEY_FILE_MAGIC) {
        let Some(p) = passphrase() else {
            return Err(WalletError::MissingPassphrase);
        };
        decrypt_pkcs8(p.as_bytes(), &bytes)?
    } else {
        bytes
    };
    let kp = Ed25519KeyPair::from_pkcs8(&pkcs8).map_err(|_| WalletError::InvalidKey);
    pkcs8.zeroize();
    kp
}

fn address_of(kp: &Ed25519KeyPair) -> Address {
    let mut out = [0u8; 32];
    out.copy_from_slice(kp.public_key().as_ref());
    Address::from_bytes(out)
}

/// Directory-backed Ed25519 key store.
pub struct Wallet {
    dir: PathBuf,
    representative: Address,
    keys: Mutex<BTreeMap<Address, Arc<Ed25519KeyPair>>>,
}

impl Wallet {
    /// Open (or create) the wallet under `data_dir/wallet`, loading every
    /// `.key` file found there. `representative` is the identity this node
    /// votes as; voting requires its private key to be present.
    pub fn open(data_dir: &Path, representative: Address) -> Result<Self, WalletError> {
        let dir = data_dir.join("wallet");
        fs::create_dir_all(&dir).map_err(|_| WalletError::Io)?;

        let mut keys = BTreeMap::new();
        for entry in fs::read_dir(&dir).map_err(|_| WalletError::Io)? {
            let entry = entry.map_err(|_| WalletError::Io)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("key") {
                continue;
            }
            let bytes = fs::read(&path).map_err(|_| WalletError::Io)?;
            let kp = keypair_from_file(bytes)?;
            keys.insert(address_of(&kp), Arc::new(kp));
        }

        Ok(Self {
            dir,
            representative,
            keys: Mutex::new(keys),
        })
    }

    /// Generate a fresh key, persist it, and return its address.
    pub fn generate(&self) -> Result<Address, WalletError> {
        let rng = SystemRandom::new();
        let doc = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| WalletError::Crypto)?;
        self.insert_pkcs8(doc.as_ref())
    }

    /// Insert a key from PKCS#8 bytes, persist it, and return its address.
    pub fn insert_pkcs8(&self, pkcs8: &[u8]) -> Result<Address, WalletError> {
        let kp = Ed25519KeyPair::from_pkcs8(pkcs8).map_err(|_| WalletError::InvalidKey)?;
        let address = address_of(&kp);

        let mut on_disk = if let Some(p) = passphrase() {
            encrypt_pkcs8(p.as_bytes(), pkcs8)?
        } else {
            pkcs8.to_vec()
        };
        let path = self.dir.join(format!("{address}.key"));
        atomic_write_private(&path, &on_disk)?;
        on_disk.zeroize();

        let mut keys = self.keys.lock().map_err(|_| WalletError::Io)?;
        keys.insert(address, Arc::new(kp));
        Ok(address)
    }

    /// Signing handle for `address`, if its private key is held.
    pub fn fetch(&self, address: &Address) -> Option<Arc<Ed25519KeyPair>> {
        self.keys.lock().ok()?.get(address).cloned()
    }

    /// The identity this node votes as.
    pub fn representative(&self) -> Address {
        self.representative
    }

    /// Whether this node can produce votes.
    pub fn is_representative(&self) -> bool {
        self.fetch(&self.representative).is_some()
    }

    /// Sign arbitrary bytes with the key for `address`.
    pub fn sign_with(&self, address: &Address, msg: &[u8]) -> Option<Signature> {
        let kp = self.fetch(address)?;
        Some(sign_bytes(&kp, msg))
    }
}

/// Sign raw bytes.
pub fn sign_bytes(kp: &Ed25519KeyPair, msg: &[u8]) -> Signature {
    let sig = kp.sign(msg);
    let mut out = [0u8; 64];
    out.copy_from_slice(sig.as_ref());
    Signature(out)
}

/// Verify raw bytes against an address (Ed25519 public key).
pub fn verify_bytes(address: &Address, msg: &[u8], sig: &Signature) -> Result<(), WalletError> {
    let pk = UnparsedPublicKey::new(&ED25519, address.as_bytes());
    pk.verify(msg, &sig.0).map_err(|_| WalletError::BadSignature)
}

/// Sign a block in place; the signed message is the block hash.
pub fn sign_block(kp: &Ed25519KeyPair, block: &mut Block) {
    let hash = block.hash();
    block.set_signature(sign_bytes(kp, hash.as_bytes()));
}

/// Verify a block signature against the owning account.
pub fn verify_block(account: &Address, block: &Block) -> Result<(), WalletError> {
    verify_bytes(account, block.hash().as_bytes(), block.signature())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SendBlock, H256};

    #[test]
    fn sign_and_verify_block() {
        let rng = SystemRandom::new();
        let doc = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let kp = Ed25519KeyPair::from_pkcs8(doc.as_ref()).unwrap();
        let account = address_of(&kp);

        let mut block = Block::Send(SendBlock {
            previous: H256::from_bytes([1; 32]),
            destination: Address::from_bytes([2; 32]),
            balance: 10,
            signature: Signature::zero(),
        });
        sign_block(&kp, &mut block);
        assert!(verify_block(&account, &block).is_ok());
        assert!(verify_block(&Address::from_bytes([9; 32]), &block).is_err());
    }

    #[test]
    fn wallet_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Wallet::open(dir.path(), Address::BURN).unwrap();
        let address = wallet.generate().unwrap();
        assert!(wallet.fetch(&address).is_some());

        // A re-opened wallet sees the persisted key.
        let reopened = Wallet::open(dir.path(), address).unwrap();
        assert!(reopened.is_representative());
    }
}
