use rust_decimal::{
    Decimal,
    prelude::ToPrimitive,
};

pub const MIN_BET: u64 = 1;
pub const HARD_CAP: u64 = 100_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StakeAction {
    Decrement,
    Increment,
    SetMin,
    SetMax,
}

/// Which stake adjustment controls are unusable for the current stake.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ControlState {
    pub minus_disabled: bool,
    pub min_disabled: bool,
    pub plus_disabled: bool,
    pub max_disabled: bool,
}

/// Holds the stake amount and the text of the stake field. The balance is
/// always passed in by the owner of the session, never stored here.
///
/// The field is either empty or shows the clamped amount.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakeController {
    amount: u64,
    field: String,
}

impl Default for StakeController {
    fn default() -> Self {
        Self {
            amount: MIN_BET,
            field: MIN_BET.to_string(),
        }
    }
}

impl StakeController {
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Amount the player has entered, `None` while the field is empty.
    pub fn entered(&self) -> Option<u64> {
        (!self.field.is_empty()).then_some(self.amount)
    }

    /// Clamps a raw field value against `balance`.
    pub fn clamp(&self, raw: &str, balance: Decimal) -> u64 {
        clamp_value(parse_leading_int(raw), balance)
    }

    pub fn clamp_amount(&self, amount: i64, balance: Decimal) -> u64 {
        clamp_value(Some(amount), balance)
    }

    /// Re-clamps an edit of the field. An emptied field stays empty so the
    /// next digit starts a fresh value.
    pub fn set_raw(&mut self, raw: &str, balance: Decimal) -> u64 {
        self.amount = self.clamp(raw, balance);
        self.field = if raw.trim().is_empty() {
            String::new()
        } else {
            self.amount.to_string()
        };
        self.amount
    }

    pub fn set_amount(&mut self, amount: i64, balance: Decimal) -> u64 {
        self.amount = self.clamp_amount(amount, balance);
        self.field = self.amount.to_string();
        self.amount
    }

    pub fn apply(&mut self, action: StakeAction, balance: Decimal) -> u64 {
        let current = i64::try_from(self.amount).unwrap_or(i64::MAX);
        match action {
            StakeAction::Decrement => self.set_amount(current.saturating_sub(1), balance),
            StakeAction::Increment => self.set_amount(current.saturating_add(1), balance),
            StakeAction::SetMin => self.set_amount(MIN_BET as i64, balance),
            StakeAction::SetMax => {
                let whole = balance.floor().to_i64().unwrap_or(i64::MAX);
                self.set_amount(whole, balance)
            }
        }
    }

    pub fn increment(&mut self, balance: Decimal) -> u64 {
        self.apply(StakeAction::Increment, balance)
    }

    pub fn decrement(&mut self, balance: Decimal) -> u64 {
        self.apply(StakeAction::Decrement, balance)
    }

    pub fn set_to_min(&mut self, balance: Decimal) -> u64 {
        self.apply(StakeAction::SetMin, balance)
    }

    pub fn set_to_max(&mut self, balance: Decimal) -> u64 {
        self.apply(StakeAction::SetMax, balance)
    }

    pub fn derived_control_state(&self, balance: Decimal) -> ControlState {
        let ceiling = max_stake(balance);
        let current = self.amount;
        ControlState {
            minus_disabled: current <= MIN_BET,
            min_disabled: current == MIN_BET,
            plus_disabled: current >= ceiling || ceiling < MIN_BET,
            max_disabled: current == ceiling || balance < Decimal::from(MIN_BET),
        }
    }
}

/// `floor(min(balance, HARD_CAP))`, zero for non-positive balances.
pub fn max_stake(balance: Decimal) -> u64 {
    if balance <= Decimal::ZERO {
        return 0;
    }
    balance
        .min(Decimal::from(HARD_CAP))
        .floor()
        .to_u64()
        .unwrap_or(0)
}

fn clamp_value(value: Option<i64>, balance: Decimal) -> u64 {
    let ceiling = max_stake(balance);
    // An empty range (no balance, or less than one unit) pins to the minimum.
    if ceiling < MIN_BET {
        return MIN_BET;
    }
    let value = value.unwrap_or(0);
    let value = u64::try_from(value).unwrap_or(0);
    value.clamp(MIN_BET, ceiling)
}

/// Integer prefix of a field value: optional sign then digits, surrounding
/// whitespace ignored. `"12.7"` reads as 12, `"abc"` as nothing.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
