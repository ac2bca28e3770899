//! # Scripts
//!
//! Only the parts of the script language the chain-state engine needs:
//! instruction parsing, template recognition, push-only and canonical-push
//! checks, and legacy signature-operation counting.
//!
//! ## Recognized Templates
//!
//! | Kind | Layout |
//! |------|--------|
//! | `PubKey` | `<33 or 65 byte pubkey> OP_CHECKSIG` |
//! | `PubKeyHash` | `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG` |
//! | `NullData` | `OP_RETURN <pushes...>` |
//!
//! `OP_HASH160` here is the 20-byte Keccak address hash, see
//! [`crate::crypto::address_from_pubkey`].

use crate::codec::{write_var_bytes, CodecError, Decodable, Encodable, Reader};
use crate::crypto::address_from_pubkey;
use crate::entities::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1NEGATE: u8 = 0x4f;
    pub const OP_1: u8 = 0x51;
    pub const OP_16: u8 = 0x60;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKSIGVERIFY: u8 = 0xad;
    pub const OP_CHECKMULTISIG: u8 = 0xae;
    pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
}

use opcodes::*;

/// Largest null-data payload accepted as standard.
pub const MAX_NULL_DATA_SIZE: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("push at offset {0} runs past the end of the script")]
    TruncatedPush(usize),
}

/// A lock or unlock script.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script(pub Vec<u8>);

/// One parsed script element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// A data push, with the opcode that produced it.
    Push { opcode: u8, data: &'a [u8] },
    /// Any other opcode.
    Op(u8),
}

/// Output template classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    PubKey(Vec<u8>),
    PubKeyHash(Address),
    NullData(Vec<u8>),
    NonStandard,
}

pub struct Instructions<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        let opcode = self.bytes[self.pos];
        self.pos += 1;

        let len = match opcode {
            0x01..=0x4b => opcode as usize,
            OP_PUSHDATA1 => match self.take_len(1) {
                Some(n) => n,
                None => return self.truncated(start),
            },
            OP_PUSHDATA2 => match self.take_len(2) {
                Some(n) => n,
                None => return self.truncated(start),
            },
            OP_PUSHDATA4 => match self.take_len(4) {
                Some(n) => n,
                None => return self.truncated(start),
            },
            OP_0 => return Some(Ok(Instruction::Push { opcode, data: &[] })),
            other => return Some(Ok(Instruction::Op(other))),
        };

        if self.bytes.len() - self.pos < len {
            return self.truncated(start);
        }
        let data = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Some(Ok(Instruction::Push { opcode, data }))
    }
}

impl<'a> Instructions<'a> {
    fn take_len(&mut self, width: usize) -> Option<usize> {
        if self.bytes.len() - self.pos < width {
            return None;
        }
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(&self.bytes[self.pos..self.pos + width]);
        self.pos += width;
        Some(u32::from_le_bytes(buf) as usize)
    }

    fn truncated(&mut self, start: usize) -> Option<Result<Instruction<'a>, ScriptError>> {
        self.pos = self.bytes.len();
        Some(Err(ScriptError::TruncatedPush(start)))
    }
}

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            bytes: &self.0,
            pos: 0,
        }
    }

    /// Append a minimal push of `data`.
    pub fn push_data(mut self, data: &[u8]) -> Self {
        match data.len() {
            n if n < OP_PUSHDATA1 as usize => self.0.push(n as u8),
            n if n <= 0xff => {
                self.0.push(OP_PUSHDATA1);
                self.0.push(n as u8);
            }
            n if n <= 0xffff => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(n as u16).to_le_bytes());
            }
            n => {
                self.0.push(OP_PUSHDATA4);
                self.0.extend_from_slice(&(n as u32).to_le_bytes());
            }
        }
        self.0.extend_from_slice(data);
        self
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.0.push(opcode);
        self
    }

    pub fn p2pkh(address: &Address) -> Self {
        Script::new()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_data(address)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
    }

    pub fn p2pk(pubkey: &[u8]) -> Self {
        Script::new().push_data(pubkey).push_opcode(OP_CHECKSIG)
    }

    pub fn null_data(data: &[u8]) -> Self {
        Script::new().push_opcode(OP_RETURN).push_data(data)
    }

    /// Unlock script for pay-to-pubkey-hash: `<sig+hashtype> <pubkey>`.
    pub fn p2pkh_sig(signature: &[u8], pubkey: &[u8]) -> Self {
        Script::new().push_data(signature).push_data(pubkey)
    }

    /// True when every element is a data push (`OP_16` and below).
    pub fn is_push_only(&self) -> bool {
        self.instructions().all(|ins| match ins {
            Ok(Instruction::Push { .. }) => true,
            Ok(Instruction::Op(op)) => op <= OP_16,
            Err(_) => false,
        })
    }

    /// True when every push uses the smallest possible encoding.
    pub fn has_canonical_pushes(&self) -> bool {
        for ins in self.instructions() {
            let (opcode, data) = match ins {
                Ok(Instruction::Push { opcode, data }) => (opcode, data),
                Ok(Instruction::Op(_)) => continue,
                Err(_) => return false,
            };
            if opcode < OP_PUSHDATA1 && opcode > OP_0 && data.len() == 1 && data[0] <= 16 {
                return false;
            }
            if opcode == OP_PUSHDATA1 && data.len() < OP_PUSHDATA1 as usize {
                return false;
            }
            if opcode == OP_PUSHDATA2 && data.len() <= 0xff {
                return false;
            }
            if opcode == OP_PUSHDATA4 && data.len() <= 0xffff {
                return false;
            }
        }
        true
    }

    /// Pushed data elements, or `None` if the script is not push-only.
    pub fn pushes(&self) -> Option<Vec<&[u8]>> {
        let mut out = Vec::new();
        for ins in self.instructions() {
            match ins.ok()? {
                Instruction::Push { data, .. } => out.push(data),
                Instruction::Op(op) if (OP_1NEGATE..=OP_16).contains(&op) => out.push(&[]),
                Instruction::Op(_) => return None,
            }
        }
        Some(out)
    }

    pub fn classify(&self) -> ScriptKind {
        let b = &self.0;

        if b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == 20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
        {
            let mut address = [0u8; 20];
            address.copy_from_slice(&b[3..23]);
            return ScriptKind::PubKeyHash(address);
        }

        if (b.len() == 35 && b[0] == 33) || (b.len() == 67 && b[0] == 65) {
            if b[b.len() - 1] == OP_CHECKSIG {
                return ScriptKind::PubKey(b[1..b.len() - 1].to_vec());
            }
        }

        if b.first() == Some(&OP_RETURN) {
            let rest = Script(b[1..].to_vec());
            if let Some(pushes) = rest.pushes() {
                return ScriptKind::NullData(pushes.concat());
            }
        }

        ScriptKind::NonStandard
    }

    pub fn is_null_data(&self) -> bool {
        matches!(self.classify(), ScriptKind::NullData(_))
    }

    /// Owning address for pay-to-pubkey and pay-to-pubkey-hash outputs.
    pub fn address(&self) -> Option<Address> {
        match self.classify() {
            ScriptKind::PubKeyHash(address) => Some(address),
            ScriptKind::PubKey(pubkey) => Some(address_from_pubkey(&pubkey)),
            _ => None,
        }
    }

    /// Legacy (inaccurate) signature-operation count.
    pub fn sigop_count(&self) -> u32 {
        let mut count = 0;
        for ins in self.instructions() {
            match ins {
                Ok(Instruction::Op(OP_CHECKSIG | OP_CHECKSIGVERIFY)) => count += 1,
                Ok(Instruction::Op(OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY)) => count += 20,
                Ok(_) => {}
                Err(_) => break,
            }
        }
        count
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

impl Encodable for Script {
    fn encode_to(&self, out: &mut Vec<u8>) {
        write_var_bytes(out, &self.0);
    }
}

impl Decodable for Script {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Script(reader.read_var_bytes()?))
    }
}
