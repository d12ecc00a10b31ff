use rust_decimal::{
    Decimal,
    RoundingStrategy,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::VecDeque,
    fmt,
};

pub const HISTORY_LIMIT: usize = 20;
pub const CURRENCY_SYMBOL: &str = "₹";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Heads,
    Tails,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Heads => "Heads",
            Side::Tails => "Tails",
        }
    }

    pub fn letter(self) -> char {
        match self {
            Side::Heads => 'H',
            Side::Tails => 'T',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

/// Body of `POST /api/bet`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct WagerRequest {
    pub user_id: String,
    pub bet_amount: u64,
    pub choice: Side,
}

/// Authoritative settlement of one wager.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WagerResult {
    pub result: Outcome,
    pub winning_side: Side,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

/// Outcome tags, most recent first, never longer than [`HISTORY_LIMIT`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct History {
    entries: VecDeque<Side>,
}

impl History {
    pub fn push(&mut self, side: Side) {
        self.entries.push_front(side);
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Side> {
        self.entries.iter().copied().collect()
    }
}

pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// `₹145.50`
pub fn format_money(amount: Decimal) -> String {
    format!("{CURRENCY_SYMBOL}{}", round_money(amount))
}
