use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LedgerResult;

/// Default gas limit for registry transactions.
pub const DEFAULT_GAS_LIMIT: u64 = 3_000_000;

/// Default gas price: 1 gwei.
pub const DEFAULT_GAS_PRICE: u64 = 1_000_000_000;

/// Gas limit and price attached to one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fees {
    pub gas_limit: u64,
    pub gas_price: u64,
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
        }
    }
}

/// How fees are chosen for each submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeePolicy {
    /// Used as-is, or as the fallback when estimation fails.
    pub fixed: Fees,
    /// Ask the ledger for a gas estimate and price.
    pub estimate: bool,
}

impl FeePolicy {
    pub fn fixed(fees: Fees) -> Self {
        Self {
            fixed: fees,
            estimate: false,
        }
    }

    pub fn estimating(fallback: Fees) -> Self {
        Self {
            fixed: fallback,
            estimate: true,
        }
    }

    /// Pick fees for one transaction.
    ///
    /// The futures are only awaited when estimation is enabled. A failed
    /// estimate falls back to the fixed value for that field.
    pub async fn resolve<G, P>(&self, estimate_gas: G, gas_price: P) -> Fees
    where
        G: Future<Output = LedgerResult<u64>>,
        P: Future<Output = LedgerResult<u64>>,
    {
        if !self.estimate {
            return self.fixed;
        }

        let gas_limit = match estimate_gas.await {
            Ok(gas) => gas,
            Err(e) => {
                warn!(error = %e, fallback = self.fixed.gas_limit, "gas estimation failed");
                self.fixed.gas_limit
            }
        };
        let gas_price = match gas_price.await {
            Ok(price) => price,
            Err(e) => {
                warn!(error = %e, fallback = self.fixed.gas_price, "gas price query failed");
                self.fixed.gas_price
            }
        };
        debug!(gas_limit, gas_price, "estimated fees");
        Fees {
            gas_limit,
            gas_price,
        }
    }
}
