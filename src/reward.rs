// Gold reward computation for settled matches.
//
// The per-match reward unit comes from the configuration store; the winner
// receives the full unit, the loser half rounded down. Crediting balances
// and appending ledger entries happens in the settlement transaction.

use crate::rating::Outcome;

/// Gold granted to one participant for the given outcome. A zero result
/// means no balance mutation and no ledger entry.
pub fn gold_for(outcome: Outcome, reward_unit: i64) -> i64 {
    match outcome {
        Outcome::Win => reward_unit,
        Outcome::Loss => reward_unit / 2,
    }
}

/// Parse the stored reward-unit config value. Unset, unparseable, or
/// negative values all fall back to 0 (no rewards).
pub fn reward_unit_from_config(value: Option<&str>) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(0)
}
