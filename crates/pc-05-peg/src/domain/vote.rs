//! Supply-index votes carried by coinstakes.

use pc_01_chain_index::PegVote;
use shared_types::{ScriptKind, Transaction};

pub const VOTE_INFLATE: &[u8] = b"pegv:inflate";
pub const VOTE_DEFLATE: &[u8] = b"pegv:deflate";

/// The vote of a coinstake. Contradicting or absent votes count as no change.
pub fn parse_vote(coinstake: &Transaction) -> PegVote {
    let mut inflate = false;
    let mut deflate = false;
    for out in &coinstake.outputs {
        if let ScriptKind::NullData(data) = out.script_pubkey.classify() {
            inflate |= data == VOTE_INFLATE;
            deflate |= data == VOTE_DEFLATE;
        }
    }
    match (inflate, deflate) {
        (true, false) => PegVote::Inflate,
        (false, true) => PegVote::Deflate,
        _ => PegVote::NoChange,
    }
}
