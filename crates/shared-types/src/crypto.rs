//! # Hashing and Signatures
//!
//! - Transaction ids, block hashes and merkle nodes are double SHA-256.
//! - Addresses are the last 20 bytes of Keccak-256 over the SEC1-encoded
//!   public key.
//! - Signatures are compact 64-byte secp256k1 ECDSA over a prehashed
//!   digest, low-S only, followed by a one-byte hash type in unlock scripts.

use crate::codec::Encodable;
use crate::entities::{Address, Hash, Transaction};
use crate::script::{Script, ScriptKind};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use thiserror::Error;

/// The only hash type accepted: commit to every input and output.
pub const SIGHASH_ALL: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("invalid secret key")]
    InvalidSecret,
    #[error("signing failed")]
    SigningFailed,
    #[error("input index {index} out of range ({inputs} inputs)")]
    InputOutOfRange { index: usize, inputs: usize },
    #[error("cannot sign for this output script")]
    UnsupportedScript,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("input index out of range")]
    InputOutOfRange,
    #[error("unlock script is malformed")]
    MalformedUnlock,
    #[error("unsupported hash type {0}")]
    UnsupportedHashType(u8),
    #[error("public key does not match the locked address")]
    KeyMismatch,
    #[error("output script is not spendable")]
    Unspendable,
    #[error("signature does not verify")]
    BadSignature,
}

pub fn sha256d(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Derive an address from SEC1 public key bytes.
pub fn address_from_pubkey(pubkey: &[u8]) -> Address {
    let hash = keccak256(pubkey);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Digest signed by input `index`: the transaction with every unlock
/// script cleared except this input's, which carries `script_code`.
pub fn signature_hash(tx: &Transaction, index: usize, script_code: &Script, hash_type: u8) -> Hash {
    let mut copy = tx.clone();
    for (i, input) in copy.inputs.iter_mut().enumerate() {
        input.script_sig = if i == index {
            script_code.clone()
        } else {
            Script::new()
        };
    }
    let mut bytes = copy.encode();
    bytes.extend_from_slice(&u32::from(hash_type).to_le_bytes());
    sha256d(&bytes)
}

/// Verify a compact signature over `hash`. High-S signatures are rejected.
pub fn verify_signature(pubkey: &[u8], hash: &Hash, signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(pubkey) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(signature) else {
        return false;
    };
    if sig.normalize_s().is_some() {
        return false;
    }
    key.verify_prehash(hash, &sig).is_ok()
}

/// Check that input `index` of `tx` unlocks `prev_script`.
pub fn verify_input(tx: &Transaction, index: usize, prev_script: &Script) -> Result<(), VerifyError> {
    let input = tx.inputs.get(index).ok_or(VerifyError::InputOutOfRange)?;
    let pushes = input
        .script_sig
        .pushes()
        .ok_or(VerifyError::MalformedUnlock)?;

    let (sig_with_type, pubkey): (&[u8], Vec<u8>) = match prev_script.classify() {
        ScriptKind::PubKey(pubkey) => match pushes.as_slice() {
            [sig] => (sig, pubkey),
            _ => return Err(VerifyError::MalformedUnlock),
        },
        ScriptKind::PubKeyHash(address) => match pushes.as_slice() {
            [sig, pubkey] => {
                if address_from_pubkey(pubkey) != address {
                    return Err(VerifyError::KeyMismatch);
                }
                (sig, pubkey.to_vec())
            }
            _ => return Err(VerifyError::MalformedUnlock),
        },
        ScriptKind::NullData(_) | ScriptKind::NonStandard => return Err(VerifyError::Unspendable),
    };

    let (hash_type, sig) = sig_with_type
        .split_last()
        .ok_or(VerifyError::MalformedUnlock)?;
    if *hash_type != SIGHASH_ALL {
        return Err(VerifyError::UnsupportedHashType(*hash_type));
    }

    let digest = signature_hash(tx, index, prev_script, SIGHASH_ALL);
    if verify_signature(&pubkey, &digest, sig) {
        Ok(())
    } else {
        Err(VerifyError::BadSignature)
    }
}

/// A secp256k1 key pair used for spending and block signing.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    pub fn generate(rng: &mut impl CryptoRngCore) -> Self {
        Self {
            signing: SigningKey::random(rng),
        }
    }

    pub fn from_secret(secret: &[u8; 32]) -> Result<Self, SignError> {
        let signing = SigningKey::from_slice(secret).map_err(|_| SignError::InvalidSecret)?;
        Ok(Self { signing })
    }

    /// Compressed SEC1 public key (33 bytes).
    pub fn public_key(&self) -> Vec<u8> {
        self.signing
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    pub fn address(&self) -> Address {
        address_from_pubkey(&self.public_key())
    }

    pub fn sign_hash(&self, hash: &Hash) -> Result<Vec<u8>, SignError> {
        let sig: Signature = self
            .signing
            .sign_prehash(hash)
            .map_err(|_| SignError::SigningFailed)?;
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(sig.to_bytes().to_vec())
    }

    /// Fill the unlock script of input `index`, which spends `prev_script`.
    pub fn sign_input(
        &self,
        tx: &mut Transaction,
        index: usize,
        prev_script: &Script,
    ) -> Result<(), SignError> {
        if index >= tx.inputs.len() {
            return Err(SignError::InputOutOfRange {
                index,
                inputs: tx.inputs.len(),
            });
        }
        let digest = signature_hash(tx, index, prev_script, SIGHASH_ALL);
        let mut sig = self.sign_hash(&digest)?;
        sig.push(SIGHASH_ALL);

        tx.inputs[index].script_sig = match prev_script.classify() {
            ScriptKind::PubKey(_) => Script::new().push_data(&sig),
            ScriptKind::PubKeyHash(_) => Script::p2pkh_sig(&sig, &self.public_key()),
            _ => return Err(SignError::UnsupportedScript),
        };
        Ok(())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair({})", hex::encode(self.address()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{OutPoint, TxIn, TxOut};

    fn spend(prev_script: &Script) -> Transaction {
        Transaction {
            version: 1,
            time: 1_000,
            inputs: vec![TxIn::new(OutPoint::new([9u8; 32], 0))],
            outputs: vec![TxOut::new(50, prev_script.clone())],
            lock_time: 0,
        }
    }

    #[test]
    fn test_sha256d_empty() {
        assert_eq!(
            hex::encode(sha256d(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_p2pkh_sign_and_verify() {
        let key = KeyPair::generate(&mut rand::thread_rng());
        let prev = Script::p2pkh(&key.address());
        let mut tx = spend(&prev);
        key.sign_input(&mut tx, 0, &prev).unwrap();
        assert_eq!(verify_input(&tx, 0, &prev), Ok(()));
    }

    #[test]
    fn test_p2pk_sign_and_verify() {
        let key = KeyPair::from_secret(&[3u8; 32]).unwrap();
        let prev = Script::p2pk(&key.public_key());
        let mut tx = spend(&prev);
        key.sign_input(&mut tx, 0, &prev).unwrap();
        assert_eq!(verify_input(&tx, 0, &prev), Ok(()));
    }

    #[test]
    fn test_tampered_output_breaks_signature() {
        let key = KeyPair::from_secret(&[4u8; 32]).unwrap();
        let prev = Script::p2pkh(&key.address());
        let mut tx = spend(&prev);
        key.sign_input(&mut tx, 0, &prev).unwrap();
        tx.outputs[0].value += 1;
        assert_eq!(verify_input(&tx, 0, &prev), Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let owner = KeyPair::from_secret(&[5u8; 32]).unwrap();
        let thief = KeyPair::from_secret(&[6u8; 32]).unwrap();
        let prev = Script::p2pkh(&owner.address());
        let mut tx = spend(&prev);
        // The thief signs as if the output were theirs.
        thief
            .sign_input(&mut tx, 0, &Script::p2pkh(&thief.address()))
            .unwrap();
        assert_eq!(verify_input(&tx, 0, &prev), Err(VerifyError::KeyMismatch));
    }

    #[test]
    fn test_null_data_unspendable() {
        let prev = Script::null_data(b"burn");
        let tx = spend(&prev);
        assert_eq!(verify_input(&tx, 0, &prev), Err(VerifyError::Unspendable));
    }
}
