//! Commands the wager orchestrator issues to whatever renders the game.
//! A presenter only reflects what it is told; it never mutates the session.

use crate::{
    stake::ControlState,
    types::Side,
};
use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeKind {
    Win,
    Loss,
}

/// Transient message; a newer notice replaces the one on screen.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn win(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Win,
        }
    }

    pub fn loss(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Loss,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Controls {
    Disabled,
    Enabled(ControlState),
}

impl Controls {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Controls::Enabled(_))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WalletDisplay {
    Loading,
    Balance(Decimal),
    Error,
}

/// Cosmetic parameters of one flip. The landing face is forced separately.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SpinPlan {
    pub half_turns: u32,
}

pub trait Presenter {
    fn set_identity(&mut self, user_id: &str);
    fn set_wallet(&mut self, wallet: WalletDisplay);
    fn set_controls(&mut self, controls: Controls);
    /// Stake field text: the clamped amount, or empty while cleared.
    fn set_stake(&mut self, field: &str);
    fn show_notice(&mut self, notice: Notice);
    fn render_history(&mut self, history: &[Side]);
    fn set_result_text(&mut self, text: Option<String>);
    fn countdown_tick(&mut self, value: u8);
    fn clear_countdown(&mut self);
    fn start_flip(&mut self, spin: SpinPlan);
    fn land_coin(&mut self, side: Side);
}
