//! The wager state machine.
//!
//! `Idle -> AwaitingSettlement -> CountingDown -> Revealing -> Cooldown -> Idle`
//!
//! The settlement request is resolved before the countdown starts, so the
//! reveal only replays an outcome that is already fixed. Session state is
//! mutated in exactly two places: a successful balance fetch during
//! initialization and the `Revealing -> Cooldown` reconciliation.

use crate::{
    error::{
        InitializationError,
        SettlementError,
        ValidationError,
        WagerError,
    },
    identity::IdentityResolver,
    presenter::{
        Controls,
        Notice,
        Presenter,
        SpinPlan,
        WalletDisplay,
    },
    reveal::{
        CAPTION_HOLD,
        RevealScheduler,
        RevealSignal,
    },
    settlement::SettlementClient,
    stake::{
        MIN_BET,
        StakeAction,
        StakeController,
    },
    types::{
        History,
        Outcome,
        Side,
        WagerRequest,
        WagerResult,
        format_money,
        round_money,
    },
};
use rand::Rng;
use rust_decimal::Decimal;
use std::{
    fmt,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{
        self,
        Instant,
    },
};
use tracing::{
    debug,
    error,
    info,
    warn,
};


/// Profit paid on a winning stake.
pub const WIN_PAYOUT_RATIO: Decimal = Decimal::from_parts(91, 0, 0, false, 2);

const GET_READY_CAPTION: &str = "Get Ready...";
const FLIPPING_CAPTION: &str = "Flipping...";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct WagerId(u64);

impl fmt::Display for WagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WagerState {
    Idle,
    AwaitingSettlement,
    CountingDown,
    Revealing,
    Cooldown,
}

/// Everything that advances the machine after `initiate_bet` returns.
#[derive(Debug)]
pub enum WagerEvent {
    Settled {
        wager: WagerId,
        outcome: Result<WagerResult, SettlementError>,
    },
    Reveal {
        wager: WagerId,
        signal: RevealSignal,
    },
    CaptionExpired {
        wager: WagerId,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Submission {
    Submitted(WagerId),
    /// Not ready, or a wager is already in flight.
    Ignored,
}

#[derive(Clone, Debug, Default)]
pub struct Session {
    user_id: Option<String>,
    balance: Decimal,
    is_flipping: bool,
    game_ready: bool,
    history: History,
}

impl Session {
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn is_flipping(&self) -> bool {
        self.is_flipping
    }

    pub fn game_ready(&self) -> bool {
        self.game_ready
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct PlacedBet {
    amount: u64,
    choice: Side,
}

#[derive(Debug)]
enum Phase {
    Idle,
    AwaitingSettlement {
        wager: WagerId,
        bet: PlacedBet,
        submitted_at: Instant,
    },
    CountingDown {
        wager: WagerId,
        bet: PlacedBet,
        result: WagerResult,
    },
    Revealing {
        wager: WagerId,
        bet: PlacedBet,
        result: WagerResult,
    },
    Cooldown {
        wager: WagerId,
    },
}

impl Phase {
    fn state(&self) -> WagerState {
        match self {
            Phase::Idle => WagerState::Idle,
            Phase::AwaitingSettlement { .. } => WagerState::AwaitingSettlement,
            Phase::CountingDown { .. } => WagerState::CountingDown,
            Phase::Revealing { .. } => WagerState::Revealing,
            Phase::Cooldown { .. } => WagerState::Cooldown,
        }
    }

    fn wager(&self) -> Option<WagerId> {
        match self {
            Phase::Idle => None,
            Phase::AwaitingSettlement { wager, .. }
            | Phase::CountingDown { wager, .. }
            | Phase::Revealing { wager, .. }
            | Phase::Cooldown { wager } => Some(*wager),
        }
    }
}

pub struct WagerOrchestrator<S, P> {
    session: Session,
    phase: Phase,
    stake: StakeController,
    settlement: S,
    scheduler: RevealScheduler,
    presenter: P,
    events: mpsc::UnboundedSender<WagerEvent>,
    caption_hold: Duration,
    next_wager: u64,
}

impl<S, P> WagerOrchestrator<S, P>
where
    S: SettlementClient + Clone + Send + Sync + 'static,
    P: Presenter,
{
    /// Returns the orchestrator and the receiver its timers and network
    /// tasks report to. Every received event must be fed back through
    /// [`Self::handle_event`].
    pub fn new(
        settlement: S,
        scheduler: RevealScheduler,
        mut presenter: P,
    ) -> (Self, mpsc::UnboundedReceiver<WagerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let stake = StakeController::default();
        presenter.set_wallet(WalletDisplay::Loading);
        presenter.set_controls(Controls::Disabled);
        presenter.set_stake(stake.field());
        presenter.render_history(&[]);
        presenter.set_result_text(None);
        let orchestrator = Self {
            session: Session::default(),
            phase: Phase::Idle,
            stake,
            settlement,
            scheduler,
            presenter,
            events,
            caption_hold: CAPTION_HOLD,
            next_wager: 0,
        };
        (orchestrator, receiver)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> WagerState {
        self.phase.state()
    }

    pub fn stake(&self) -> u64 {
        self.stake.amount()
    }

    /// Text of the stake field, empty after the player clears it.
    pub fn stake_field(&self) -> &str {
        self.stake.field()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Resolves the player and loads the starting balance. Failure leaves
    /// wagering disabled for the rest of the session; there is no retry.
    pub async fn initialize(
        &mut self,
        identity: &impl IdentityResolver,
    ) -> Result<Decimal, InitializationError> {
        if self.session.game_ready {
            return Ok(self.session.balance);
        }
        let user_id = identity.resolve();
        if user_id.trim().is_empty() {
            let err = InitializationError::MissingIdentity;
            error!("no user id resolved");
            self.notify_failure(err.clone().into());
            self.presenter.set_controls(Controls::Disabled);
            return Err(err);
        }
        self.presenter.set_identity(&user_id);
        self.session.user_id = Some(user_id.clone());

        match self.settlement.fetch_balance(&user_id).await {
            Ok(balance) => {
                info!(%user_id, %balance, "game initialized");
                self.session.balance = balance;
                self.session.game_ready = true;
                self.presenter.set_wallet(WalletDisplay::Balance(balance));
                self.presenter.render_history(&self.session.history.to_vec());
                self.refresh_controls();
                Ok(balance)
            }
            Err(err) => {
                error!(%user_id, error = ?err, "failed to initialize game");
                let err = InitializationError::Balance(err);
                self.presenter.set_wallet(WalletDisplay::Error);
                self.notify_failure(err.clone().into());
                self.presenter.set_controls(Controls::Disabled);
                Err(err)
            }
        }
    }

    /// Starts a wager on `choice` with the current stake.
    ///
    /// A stake outside `[MIN_BET, balance]` is corrected and reported without
    /// leaving the current state. While a wager is in flight this is a no-op.
    pub fn initiate_bet(&mut self, choice: Side) -> Result<Submission, ValidationError> {
        if !self.accepts_bets() {
            debug!(state = ?self.state(), "bet ignored");
            return Ok(Submission::Ignored);
        }
        let Some(user_id) = self.session.user_id.clone() else {
            return Ok(Submission::Ignored);
        };
        let balance = self.session.balance;
        let Some(amount) = self.stake.entered().filter(|amount| *amount >= MIN_BET) else {
            let err = ValidationError::BelowMinimum {
                stake: self.stake.entered().unwrap_or(0),
            };
            self.stake.set_to_min(balance);
            self.after_stake_change();
            self.notify_failure(err.clone().into());
            return Err(err);
        };
        if Decimal::from(amount) > balance {
            let err = ValidationError::InsufficientBalance {
                stake: amount,
                balance,
            };
            self.stake.set_to_max(balance);
            self.after_stake_change();
            self.notify_failure(err.clone().into());
            return Err(err);
        }

        self.next_wager += 1;
        let wager = WagerId(self.next_wager);
        let bet = PlacedBet { amount, choice };
        self.session.is_flipping = true;
        self.presenter.set_controls(Controls::Disabled);
        self.presenter
            .set_result_text(Some(GET_READY_CAPTION.to_string()));
        self.phase = Phase::AwaitingSettlement {
            wager,
            bet,
            submitted_at: Instant::now(),
        };
        info!(%wager, amount, %choice, "submitting wager");

        let request = WagerRequest {
            user_id,
            bet_amount: amount,
            choice,
        };
        let client = self.settlement.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = client.submit_wager(&request).await;
            let _ = events.send(WagerEvent::Settled { wager, outcome });
        });
        Ok(Submission::Submitted(wager))
    }

    /// Applies a stake button. Returns the new stake, or `None` while the
    /// controls are disabled.
    pub fn adjust_stake(&mut self, action: StakeAction) -> Option<u64> {
        if !self.controls_live() {
            return None;
        }
        let amount = self.stake.apply(action, self.session.balance);
        self.after_stake_change();
        Some(amount)
    }

    /// Re-clamps a raw edit of the stake field. Clearing the field is kept
    /// until the next edit; betting from an empty field is rejected.
    pub fn edit_stake(&mut self, raw: &str) -> Option<u64> {
        if !self.controls_live() {
            return None;
        }
        let amount = self.stake.set_raw(raw, self.session.balance);
        self.after_stake_change();
        Some(amount)
    }

    pub fn handle_event(&mut self, event: WagerEvent) {
        match event {
            WagerEvent::Settled { wager, outcome } => self.on_settled(wager, outcome),
            WagerEvent::Reveal { wager, signal } => self.on_reveal(wager, signal),
            WagerEvent::CaptionExpired { wager } => self.on_caption_expired(wager),
        }
    }

    fn on_settled(
        &mut self,
        wager: WagerId,
        outcome: Result<WagerResult, SettlementError>,
    ) {
        let Phase::AwaitingSettlement {
            wager: current,
            bet,
            submitted_at,
        } = &self.phase
        else {
            warn!(%wager, state = ?self.state(), "settlement arrived outside AwaitingSettlement");
            return;
        };
        if *current != wager {
            warn!(%wager, current = %current, "stale settlement ignored");
            return;
        }
        let bet = *bet;
        let latency_ms = submitted_at.elapsed().as_millis();

        let outcome = outcome.and_then(|result| {
            verify_settlement(&bet, &result)?;
            Ok(result)
        });
        match outcome {
            Ok(result) => {
                info!(%wager, latency_ms, result = ?result.result, winning_side = %result.winning_side, "wager settled");
                self.phase = Phase::CountingDown { wager, bet, result };
                let events = self.events.clone();
                self.scheduler.run(move |signal| {
                    events.send(WagerEvent::Reveal { wager, signal }).is_ok()
                });
            }
            Err(err) => self.abort(wager, err),
        }
    }

    fn on_reveal(&mut self, wager: WagerId, signal: RevealSignal) {
        if self.phase.wager() != Some(wager) {
            warn!(%wager, ?signal, "reveal signal for inactive wager ignored");
            return;
        }
        match signal {
            RevealSignal::Countdown(value) => {
                if matches!(self.phase, Phase::CountingDown { .. }) {
                    self.presenter.countdown_tick(value);
                }
            }
            RevealSignal::CountdownElapsed => {
                let phase = std::mem::replace(&mut self.phase, Phase::Idle);
                let Phase::CountingDown { wager, bet, result } = phase else {
                    self.phase = phase;
                    return;
                };
                self.presenter.clear_countdown();
                self.presenter
                    .set_result_text(Some(FLIPPING_CAPTION.to_string()));
                let half_turns = rand::rng().random_range(6..=11);
                self.presenter.start_flip(SpinPlan { half_turns });
                debug!(%wager, half_turns, "revealing");
                self.phase = Phase::Revealing { wager, bet, result };
            }
            RevealSignal::AnimationElapsed => {
                let phase = std::mem::replace(&mut self.phase, Phase::Idle);
                let Phase::Revealing { wager, bet, result } = phase else {
                    self.phase = phase;
                    return;
                };
                self.reconcile(wager, bet, result);
            }
        }
    }

    /// The only place a settlement touches the session.
    fn reconcile(&mut self, wager: WagerId, bet: PlacedBet, result: WagerResult) {
        let side = result.winning_side;
        self.presenter.land_coin(side);

        self.session.balance = result.new_balance;
        let notice = match result.result {
            Outcome::Win => {
                let profit = round_money(Decimal::from(bet.amount) * WIN_PAYOUT_RATIO);
                Notice::win(format!("You Won {}!", format_money(profit)))
            }
            Outcome::Loss => {
                Notice::loss(format!("You Lost {}", format_money(Decimal::from(bet.amount))))
            }
        };
        self.presenter.show_notice(notice);

        self.session.history.push(side);
        self.presenter.render_history(&self.session.history.to_vec());
        self.presenter
            .set_wallet(WalletDisplay::Balance(self.session.balance));

        self.session.is_flipping = false;
        self.phase = Phase::Cooldown { wager };
        self.refresh_controls();
        self.presenter
            .set_result_text(Some(format!("Result was {}", side.label())));
        info!(%wager, balance = %self.session.balance, "wager reconciled");

        let events = self.events.clone();
        let hold = self.caption_hold;
        tokio::spawn(async move {
            time::sleep(hold).await;
            let _ = events.send(WagerEvent::CaptionExpired { wager });
        });
    }

    fn on_caption_expired(&mut self, wager: WagerId) {
        match self.phase {
            Phase::Cooldown { wager: current } if current == wager => {
                self.presenter.set_result_text(None);
                self.phase = Phase::Idle;
            }
            _ => debug!(%wager, "caption kept, a newer wager owns it"),
        }
    }

    fn abort(&mut self, wager: WagerId, err: SettlementError) {
        if err.is_malformed() {
            error!(%wager, error = ?err, "wager aborted");
        } else {
            warn!(%wager, error = %err, "wager failed");
        }
        self.phase = Phase::Idle;
        self.session.is_flipping = false;
        self.presenter.set_result_text(None);
        self.notify_failure(err.into());
        self.refresh_controls();
    }

    fn accepts_bets(&self) -> bool {
        self.controls_live() && matches!(self.phase, Phase::Idle | Phase::Cooldown { .. })
    }

    fn controls_live(&self) -> bool {
        self.session.game_ready && !self.session.is_flipping
    }

    fn after_stake_change(&mut self) {
        self.presenter.set_stake(self.stake.field());
        self.refresh_controls();
    }

    fn refresh_controls(&mut self) {
        let controls = if self.controls_live() {
            Controls::Enabled(self.stake.derived_control_state(self.session.balance))
        } else {
            Controls::Disabled
        };
        self.presenter.set_controls(controls);
    }

    fn notify_failure(&mut self, err: WagerError) {
        self.presenter.show_notice(Notice::loss(err.to_string()));
    }
}

/// Rejects payloads that parse but cannot describe this wager.
fn verify_settlement(bet: &PlacedBet, result: &WagerResult) -> Result<(), SettlementError> {
    if result.new_balance < Decimal::ZERO {
        return Err(SettlementError::Malformed(format!(
            "negative balance {}",
            result.new_balance
        )));
    }
    let won = result.winning_side == bet.choice;
    if won != (result.result == Outcome::Win) {
        return Err(SettlementError::Malformed(format!(
            "{:?} reported for choice {} with winning side {}",
            result.result, bet.choice, result.winning_side
        )));
    }
    Ok(())
}
