//! Paged event queries.
//!
//! Public RPC endpoints cap the block range of `eth_getLogs`, so a query over
//! a long range is split into windows whose width adapts to what the endpoint
//! accepts.

use std::time::Duration;

use alderson_dice::ContractHandle;
use alloy::rpc::types::Log;
use anyhow::{Result, bail};

/// Per-request timeout for RPC calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between windows, to stay under public endpoint rate limits.
const INTER_WINDOW_DELAY: Duration = Duration::from_millis(100);

/// Maximum consecutive RPC errors before giving up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Width of the next `eth_getLogs` window.
///
/// Endpoints reject ranges above a cap they rarely advertise, and some cap
/// by response size instead, so the width is learned: each accepted window
/// doubles it, each rejected one halves it and caps later windows below the
/// refused width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockSpan {
    width: u64,
    cap: u64,
}

impl BlockSpan {
    const START: u64 = 2_000;
    const MAX: u64 = 10_000;
    const MIN: u64 = 10;

    const fn new() -> Self {
        Self {
            width: Self::START,
            cap: Self::MAX,
        }
    }

    /// The inclusive window beginning at `from`, clipped to `to`.
    fn window(self, from: u64, to: u64) -> (u64, u64) {
        (from, from.saturating_add(self.width - 1).min(to))
    }

    fn widen(&mut self) {
        self.width = self.width.saturating_mul(2).min(self.cap);
    }

    /// Returns `false` when the width is already [`BlockSpan::MIN`].
    fn narrow(&mut self) -> bool {
        if self.width <= Self::MIN {
            return false;
        }
        self.cap = self.width - 1;
        self.width = (self.width / 2).max(Self::MIN);
        true
    }
}

/// First block after a window ending at `end`, if any remain up to `to`.
fn after(end: u64, to: u64) -> Option<u64> {
    end.checked_add(1).filter(|next| *next <= to)
}

/// Fetch every `event` log the contract emitted in `[from, to]`.
///
/// # Errors
///
/// Fails on an unknown event, or when the endpoint keeps erroring even at
/// the minimum window.
pub async fn fetch(handle: &ContractHandle, event: &str, from: u64, to: u64) -> Result<Vec<Log>> {
    let chain_id = handle.clients().chain().chain_id();
    let mut logs = Vec::new();
    let mut next = (from <= to).then_some(from);
    let mut span = BlockSpan::new();
    let mut errors = 0u32;

    while let Some(block) = next {
        let (start, end) = span.window(block, to);
        let result =
            tokio::time::timeout(REQUEST_TIMEOUT, handle.get_events(event, start, Some(end))).await;

        match result {
            Ok(Ok(new)) => {
                errors = 0;
                tracing::debug!(chain_id, event, from = start, to = end, found = new.len(), "window");
                logs.extend(new);
                span.widen();
                next = after(end, to);
                if next.is_some() {
                    tokio::time::sleep(INTER_WINDOW_DELAY).await;
                }
            }
            // Bad input does not get better with a smaller range.
            Ok(Err(e @ alderson_dice::Error::InvalidArgument(_))) => return Err(e.into()),
            failed => {
                let e = match failed {
                    Ok(Err(e)) => e.to_string(),
                    _ => "request timed out".to_owned(),
                };
                errors += 1;
                if errors >= MAX_CONSECUTIVE_ERRORS {
                    bail!("chain {chain_id}: {errors} consecutive errors at block {block}: {e}");
                }
                if !span.narrow() {
                    bail!("chain {chain_id}: failed at {} blocks (block {block}): {e}", span.width);
                }
                tracing::warn!(chain_id, block, width = span.width, error = %e, "narrowing window");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }

    tracing::info!(chain_id, event, from, to, events = logs.len(), "events fetched");
    Ok(logs)
}
