use crate::ui;
use coinflip_client::{
    config::AppConfig,
    identity::{
        HostIdentityResolver,
        IdentityResolver,
    },
    orchestrator::{
        Submission,
        WagerEvent,
        WagerOrchestrator,
    },
    reveal::RevealScheduler,
    settlement::HttpSettlementClient,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::Path,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);
const LOG_FILE_PREFIX: &str = "coinflip.log";

type Orchestrator = WagerOrchestrator<HttpSettlementClient, ui::Screen>;

/// Routes logs to a daily rolling file; the terminal belongs to the UI.
/// Logging stops when the returned guard is dropped.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("creating log directory {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("failed to install tracing subscriber: {err}"))?;
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let identity = HostIdentityResolver::from_file(config.host_context.as_deref());
    let settlement = HttpSettlementClient::new(config.api_url.clone(), config.request_timeout)?;
    info!(api_url = settlement.base_url(), timeout = ?config.request_timeout, "starting UI");
    let (orchestrator, wager_events) =
        WagerOrchestrator::new(settlement, RevealScheduler::default(), ui::Screen::default());
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        orchestrator,
        wager_events,
        &identity,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;
    res
}

enum Startup {
    Ready,
    Quit,
}

/// Waits for the balance fetch. The screen stays on `Loading...` meanwhile,
/// only an immediate quit is honored.
async fn initialize(
    orchestrator: &mut Orchestrator,
    identity: &impl IdentityResolver,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<Startup> {
    let init = orchestrator.initialize(identity);
    tokio::pin!(init);
    loop {
        tokio::select! {
            res = &mut init => {
                if let Err(err) = res {
                    warn!(%err, "wagering disabled for this session");
                }
                return Ok(Startup::Ready);
            }
            _ = tokio::signal::ctrl_c() => return Ok(Startup::Quit),
            raw_ev = ui::next_raw_event(input_events) => {
                if let Some(ui::UserEvent::Quit) = ui::interpret_event(ui_state, raw_ev?) {
                    return Ok(Startup::Quit);
                }
            }
        }
    }
}

async fn run_loop(
    mut orchestrator: Orchestrator,
    mut wager_events: mpsc::UnboundedReceiver<WagerEvent>,
    identity: &impl IdentityResolver,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    ui::draw(ui_state, orchestrator.presenter()).wrap_err("initial draw failed")?;
    match initialize(&mut orchestrator, identity, ui_state, input_events).await? {
        Startup::Ready => {}
        Startup::Quit => return Ok(()),
    }
    ui::draw(ui_state, orchestrator.presenter())
        .wrap_err("draw after initialization failed")?;

    let mut ticker = time::interval(REDRAW_INTERVAL);
    loop {
        tokio::select! {
            maybe_event = wager_events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("wager event channel closed");
                    break;
                };
                orchestrator.handle_event(event);
                ui::draw(ui_state, orchestrator.presenter())
                    .wrap_err("draw after wager event failed")?;
            }
            _ = ticker.tick() => {
                ui::draw(ui_state, orchestrator.presenter()).wrap_err("redraw failed")?;
            }
            _ = tokio::signal::ctrl_c() => break,
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Bet(side) => match orchestrator.initiate_bet(side) {
                        Ok(Submission::Submitted(wager)) => debug!(%wager, "bet accepted"),
                        Ok(Submission::Ignored) => {}
                        Err(err) => info!(%err, "bet rejected before submission"),
                    },
                    ui::UserEvent::Stake(action) => {
                        orchestrator.adjust_stake(action);
                    }
                    ui::UserEvent::StakeDigit(_) | ui::UserEvent::StakeBackspace => {
                        if let Some(text) = ui::edited_stake_text(orchestrator.stake_field(), &ev) {
                            orchestrator.edit_stake(&text);
                        }
                    }
                    ui::UserEvent::Redraw => {}
                }
                ui::draw(ui_state, orchestrator.presenter())
                    .wrap_err("draw after input failed")?;
            }
        }
    }
    info!("shutting down");
    Ok(())
}
