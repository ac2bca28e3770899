//! Context-free transaction checks and relay policy.

use crate::errors::{NonStandard, TxCheckError};
use shared_types::script::MAX_NULL_DATA_SIZE;
use shared_types::{
    money_range, ChainParams, Encodable, ScriptKind, Transaction, CURRENT_TX_VERSION,
};
use std::collections::HashSet;

/// Largest standard unlock script: a 3-of-3 multisig with compressed keys
/// fits comfortably.
const MAX_STANDARD_SCRIPT_SIG: usize = 1650;

/// Checks that need nothing but the transaction itself.
pub fn check_transaction(tx: &Transaction, params: &ChainParams) -> Result<(), TxCheckError> {
    if tx.inputs.is_empty() {
        return Err(TxCheckError::NoInputs);
    }
    if tx.outputs.is_empty() {
        return Err(TxCheckError::NoOutputs);
    }
    let size = tx.encoded_len();
    if size > params.max_block_size {
        return Err(TxCheckError::Oversize {
            size,
            max: params.max_block_size,
        });
    }

    let minting = tx.is_coinbase() || tx.is_coinstake();
    let mut total: i64 = 0;
    for (index, out) in tx.outputs.iter().enumerate() {
        if out.is_empty() && !minting {
            return Err(TxCheckError::EmptyUserOutput { index });
        }
        if out.value < 0 {
            return Err(TxCheckError::NegativeOutput { index });
        }
        if out.value > params.max_money {
            return Err(TxCheckError::OutputTooLarge { index });
        }
        total = total
            .checked_add(out.value)
            .filter(|sum| money_range(*sum, params.max_money))
            .ok_or(TxCheckError::OutputTotalOutOfRange)?;
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(input.prevout) {
            return Err(TxCheckError::DuplicateInput(input.prevout));
        }
    }

    if tx.is_coinbase() {
        let len = tx.inputs[0].script_sig.len();
        if !(2..=100).contains(&len) {
            return Err(TxCheckError::CoinbaseScriptSize(len));
        }
    } else if let Some(index) = tx.inputs.iter().position(|i| i.prevout.is_null()) {
        return Err(TxCheckError::NullPrevout { index });
    }
    Ok(())
}

/// Relay policy for loose transactions.
///
/// `next_height` is the height the transaction would confirm at;
/// `adjusted_time` is network-adjusted wall-clock time.
pub fn is_standard_tx(
    tx: &Transaction,
    next_height: u32,
    adjusted_time: u32,
    params: &ChainParams,
) -> Result<(), NonStandard> {
    if tx.version < 1 || tx.version > CURRENT_TX_VERSION {
        return Err(NonStandard("version"));
    }
    if !tx.is_final(next_height, adjusted_time) {
        return Err(NonStandard("non-final"));
    }
    if u64::from(tx.time) > u64::from(adjusted_time) + u64::from(params.max_future_drift) {
        return Err(NonStandard("time-too-new"));
    }
    if tx.encoded_len() >= params.max_standard_tx_size {
        return Err(NonStandard("tx-size"));
    }

    for input in &tx.inputs {
        if input.script_sig.len() > MAX_STANDARD_SCRIPT_SIG {
            return Err(NonStandard("scriptsig-size"));
        }
        if !input.script_sig.is_push_only() {
            return Err(NonStandard("scriptsig-not-pushonly"));
        }
        if !input.script_sig.has_canonical_pushes() {
            return Err(NonStandard("scriptsig-non-canonical-push"));
        }
    }

    let minting = tx.is_coinbase() || tx.is_coinstake();
    for out in &tx.outputs {
        match out.script_pubkey.classify() {
            ScriptKind::NonStandard => return Err(NonStandard("scriptpubkey")),
            ScriptKind::NullData(data) if data.len() > MAX_NULL_DATA_SIZE => {
                return Err(NonStandard("scriptpubkey"))
            }
            // Data carriers may be zero-valued; payments may not.
            ScriptKind::NullData(_) => {}
            _ if out.value == 0 && !minting => return Err(NonStandard("zero-value-output")),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{OutPoint, Script, TxIn, TxOut, COIN};

    fn spend(outputs: Vec<TxOut>) -> Transaction {
        Transaction {
            version: 1,
            time: 1_000,
            inputs: vec![TxIn::new(OutPoint::new([7u8; 32], 0))],
            outputs,
            lock_time: 0,
        }
    }

    fn pay(value: i64) -> TxOut {
        TxOut::new(value, Script::p2pkh(&[3u8; 20]))
    }

    #[test]
    fn test_accepts_simple_spend() {
        let params = ChainParams::regtest();
        assert_eq!(check_transaction(&spend(vec![pay(COIN)]), &params), Ok(()));
    }

    #[test]
    fn test_rejects_empty_sides() {
        let params = ChainParams::regtest();
        let mut tx = spend(vec![pay(COIN)]);
        tx.outputs.clear();
        assert_eq!(check_transaction(&tx, &params), Err(TxCheckError::NoOutputs));
        tx.inputs.clear();
        assert_eq!(check_transaction(&tx, &params), Err(TxCheckError::NoInputs));
    }

    #[test]
    fn test_rejects_bad_values() {
        let params = ChainParams::regtest();
        let tx = spend(vec![pay(-1)]);
        assert_eq!(
            check_transaction(&tx, &params),
            Err(TxCheckError::NegativeOutput { index: 0 })
        );

        let tx = spend(vec![pay(params.max_money + 1)]);
        assert_eq!(
            check_transaction(&tx, &params),
            Err(TxCheckError::OutputTooLarge { index: 0 })
        );

        let tx = spend(vec![pay(params.max_money), pay(1)]);
        assert_eq!(
            check_transaction(&tx, &params),
            Err(TxCheckError::OutputTotalOutOfRange)
        );
    }

    #[test]
    fn test_rejects_duplicate_inputs() {
        let params = ChainParams::regtest();
        let mut tx = spend(vec![pay(COIN)]);
        tx.inputs.push(tx.inputs[0].clone());
        let err = check_transaction(&tx, &params).unwrap_err();
        assert!(matches!(err, TxCheckError::DuplicateInput(_)));
        assert_eq!(shared_types::DosScore::dos_score(&err), 100);
    }

    #[test]
    fn test_coinbase_script_bounds() {
        let params = ChainParams::regtest();
        let mut tx = spend(vec![pay(COIN)]);
        tx.inputs[0] = TxIn::new(OutPoint::null());
        tx.inputs[0].script_sig = Script(vec![0x51]);
        assert_eq!(
            check_transaction(&tx, &params),
            Err(TxCheckError::CoinbaseScriptSize(1))
        );
        tx.inputs[0].script_sig = Script(vec![0x51, 0x52]);
        assert_eq!(check_transaction(&tx, &params), Ok(()));
    }

    #[test]
    fn test_null_prevout_outside_coinbase() {
        let params = ChainParams::regtest();
        let mut tx = spend(vec![pay(COIN)]);
        tx.inputs.push(TxIn::new(OutPoint::null()));
        assert_eq!(
            check_transaction(&tx, &params),
            Err(TxCheckError::NullPrevout { index: 1 })
        );
    }

    #[test]
    fn test_empty_output_only_for_minting() {
        let params = ChainParams::regtest();
        let tx = spend(vec![TxOut::empty(), pay(COIN)]);
        // Empty first output plus a real input is a coinstake.
        assert!(tx.is_coinstake());
        assert_eq!(check_transaction(&tx, &params), Ok(()));

        let tx = spend(vec![pay(COIN), TxOut::empty()]);
        assert_eq!(
            check_transaction(&tx, &params),
            Err(TxCheckError::EmptyUserOutput { index: 1 })
        );
    }

    #[test]
    fn test_standard_reasons() {
        let params = ChainParams::regtest();
        let now = 1_000;

        let tx = spend(vec![pay(COIN)]);
        assert_eq!(is_standard_tx(&tx, 10, now, &params), Ok(()));

        let mut bad = tx.clone();
        bad.version = 2;
        assert_eq!(is_standard_tx(&bad, 10, now, &params), Err(NonStandard("version")));

        let mut bad = tx.clone();
        bad.time = now + params.max_future_drift + 1;
        assert_eq!(
            is_standard_tx(&bad, 10, now, &params).map_err(|e| e.reason()),
            Err("time-too-new")
        );

        let mut bad = tx.clone();
        bad.lock_time = 50;
        bad.inputs[0].sequence = 0;
        assert_eq!(is_standard_tx(&bad, 10, now, &params), Err(NonStandard("non-final")));

        let mut bad = tx.clone();
        bad.outputs[0].script_pubkey = Script(vec![0x51]);
        assert_eq!(is_standard_tx(&bad, 10, now, &params), Err(NonStandard("scriptpubkey")));

        let bad = spend(vec![pay(0)]);
        assert_eq!(
            is_standard_tx(&bad, 10, now, &params),
            Err(NonStandard("zero-value-output"))
        );

        let mut bad = tx.clone();
        bad.inputs[0].script_sig = Script(vec![0x76]);
        assert_eq!(
            is_standard_tx(&bad, 10, now, &params),
            Err(NonStandard("scriptsig-not-pushonly"))
        );
    }

    #[test]
    fn test_zero_value_data_carrier_is_standard() {
        let params = ChainParams::regtest();
        let tx = spend(vec![pay(COIN), TxOut::new(0, Script::null_data(b"**F**"))]);
        assert_eq!(is_standard_tx(&tx, 10, 1_000, &params), Ok(()));

        let tx = spend(vec![pay(COIN), TxOut::new(0, Script::null_data(&[0u8; 81]))]);
        assert_eq!(is_standard_tx(&tx, 10, 1_000, &params), Err(NonStandard("scriptpubkey")));
    }
}
