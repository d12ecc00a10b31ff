use crate::{
    error::SettlementError,
    presenter::{
        Controls,
        Notice,
        Presenter,
        SpinPlan,
        WalletDisplay,
    },
    settlement::SettlementClient,
    types::{
        Side,
        WagerRequest,
        WagerResult,
    },
};
use rust_decimal::Decimal;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::time::Instant;

#[derive(Default)]
struct FakeSettlementState {
    balance: Option<Result<Decimal, SettlementError>>,
    wagers: VecDeque<Result<WagerResult, SettlementError>>,
    delay: Duration,
    submissions: Vec<WagerRequest>,
}

/// Scripted settlement authority. Clones share the same script.
#[derive(Clone, Default)]
pub struct FakeSettlement {
    state: Arc<Mutex<FakeSettlementState>>,
}

impl FakeSettlement {
    pub fn with_balance(balance: Decimal) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().balance = Some(Ok(balance));
        fake
    }

    pub fn failing_balance(err: SettlementError) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().balance = Some(Err(err));
        fake
    }

    pub fn push_wager(&self, outcome: Result<WagerResult, SettlementError>) {
        self.state.lock().unwrap().wagers.push_back(outcome);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn submissions(&self) -> Vec<WagerRequest> {
        self.state.lock().unwrap().submissions.clone()
    }
}

impl SettlementClient for FakeSettlement {
    async fn fetch_balance(&self, _user_id: &str) -> Result<Decimal, SettlementError> {
        let balance = self.state.lock().unwrap().balance.clone();
        balance.unwrap_or(Ok(Decimal::ZERO))
    }

    async fn submit_wager(
        &self,
        request: &WagerRequest,
    ) -> Result<WagerResult, SettlementError> {
        let (delay, outcome) = {
            let mut state = self.state.lock().unwrap();
            state.submissions.push(request.clone());
            (state.delay, state.wagers.pop_front())
        };
        tokio::time::sleep(delay).await;
        outcome.unwrap_or_else(|| {
            Err(SettlementError::Transport("no scripted response".to_string()))
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PresenterCommand {
    Identity(String),
    Wallet(WalletDisplay),
    Controls(Controls),
    Stake(String),
    Notice(Notice),
    History(Vec<Side>),
    ResultText(Option<String>),
    CountdownTick(u8),
    ClearCountdown,
    StartFlip(SpinPlan),
    LandCoin(Side),
}

/// Keeps the latest value of every channel plus a log of commands stamped
/// with virtual time since creation.
#[derive(Debug)]
pub struct RecordingPresenter {
    started: Instant,
    pub log: Vec<(Duration, PresenterCommand)>,
    pub wallet: Option<WalletDisplay>,
    pub controls: Option<Controls>,
    pub stake: Option<String>,
    pub notices: Vec<Notice>,
    pub history: Vec<Side>,
    pub result_text: Option<String>,
    pub coin: Option<Side>,
}

impl Default for RecordingPresenter {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            log: Vec::new(),
            wallet: None,
            controls: None,
            stake: None,
            notices: Vec::new(),
            history: Vec::new(),
            result_text: None,
            coin: None,
        }
    }
}

impl RecordingPresenter {
    fn record(&mut self, command: PresenterCommand) {
        self.log.push((self.started.elapsed(), command));
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }

    /// Virtual time of every matching command.
    pub fn times_of(&self, matches: impl Fn(&PresenterCommand) -> bool) -> Vec<Duration> {
        self.log
            .iter()
            .filter(|(_, cmd)| matches(cmd))
            .map(|(at, _)| *at)
            .collect()
    }
}

impl Presenter for RecordingPresenter {
    fn set_identity(&mut self, user_id: &str) {
        self.record(PresenterCommand::Identity(user_id.to_string()));
    }

    fn set_wallet(&mut self, wallet: WalletDisplay) {
        self.wallet = Some(wallet.clone());
        self.record(PresenterCommand::Wallet(wallet));
    }

    fn set_controls(&mut self, controls: Controls) {
        self.controls = Some(controls);
        self.record(PresenterCommand::Controls(controls));
    }

    fn set_stake(&mut self, field: &str) {
        self.stake = Some(field.to_string());
        self.record(PresenterCommand::Stake(field.to_string()));
    }

    fn show_notice(&mut self, notice: Notice) {
        self.notices.push(notice.clone());
        self.record(PresenterCommand::Notice(notice));
    }

    fn render_history(&mut self, history: &[Side]) {
        self.history = history.to_vec();
        self.record(PresenterCommand::History(history.to_vec()));
    }

    fn set_result_text(&mut self, text: Option<String>) {
        self.result_text = text.clone();
        self.record(PresenterCommand::ResultText(text));
    }

    fn countdown_tick(&mut self, value: u8) {
        self.record(PresenterCommand::CountdownTick(value));
    }

    fn clear_countdown(&mut self) {
        self.record(PresenterCommand::ClearCountdown);
    }

    fn start_flip(&mut self, spin: SpinPlan) {
        self.coin = None;
        self.record(PresenterCommand::StartFlip(spin));
    }

    fn land_coin(&mut self, side: Side) {
        self.coin = Some(side);
        self.record(PresenterCommand::LandCoin(side));
    }
}
