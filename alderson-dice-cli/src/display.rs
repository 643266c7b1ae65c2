//! Human-readable rendering of decoded ABI values and logs.

use alderson_dice::DynSolValue;
use alloy::primitives::hex;
use alloy::rpc::types::Log;

/// Render a decoded value: integers in decimal, addresses checksummed,
/// byte strings in hex, arrays and tuples bracketed.
#[must_use]
pub fn value(v: &DynSolValue) -> String {
    match v {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::Function(f) => hex::encode_prefixed(f.as_slice()),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        DynSolValue::Bytes(bytes) => hex::encode_prefixed(bytes),
        DynSolValue::String(s) => format!("{s:?}"),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            format!("[{}]", join(items))
        }
        DynSolValue::Tuple(items) => format!("({})", join(items)),
        #[allow(unreachable_patterns, reason = "variants behind optional alloy features")]
        other => format!("{other:?}"),
    }
}

/// Render a function's outputs: a single value bare, several as a tuple.
#[must_use]
pub fn outputs(values: &[DynSolValue]) -> String {
    match values {
        [] => "()".to_owned(),
        [single] => value(single),
        many => format!("({})", join(many)),
    }
}

/// One line per log: block, transaction and raw topics/data.
#[must_use]
pub fn log_line(log: &Log) -> String {
    let block = log
        .block_number
        .map_or_else(|| "pending".to_owned(), |b| b.to_string());
    let tx = log
        .transaction_hash
        .map_or_else(|| "-".to_owned(), |h| h.to_string());
    let topics: Vec<String> = log.topics().iter().map(ToString::to_string).collect();
    format!(
        "{block} {tx} topics=[{}] data={}",
        topics.join(","),
        hex::encode_prefixed(&log.data().data)
    )
}

fn join(items: &[DynSolValue]) -> String {
    items.iter().map(value).collect::<Vec<_>>().join(", ")
}
