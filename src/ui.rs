use coinflip_client::{
    orchestrator::WIN_PAYOUT_RATIO,
    presenter::{
        Controls,
        Notice,
        NoticeKind,
        Presenter,
        SpinPlan,
        WalletDisplay,
    },
    reveal::ANIMATION_DURATION,
    stake::{
        ControlState,
        StakeAction,
    },
    types::{
        Side,
        format_money,
    },
};
use chrono::{
    DateTime,
    Local,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::{
    collections::VecDeque,
    io::stdout,
    time::{
        Duration,
        Instant,
    },
};
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthChar;

pub const NOTICE_HOLD: Duration = Duration::from_millis(2_800);
const ACTIVITY_LIMIT: usize = 50;

pub enum UserEvent {
    Quit,
    Bet(Side),
    Stake(StakeAction),
    StakeDigit(char),
    StakeBackspace,
    Redraw,
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

/// Reads terminal events on a dedicated thread so the run loop can
/// `select!` over them.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let ev = event::read();
            let failed = ev.is_err();
            if tx.send(ev).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.recv().await {
        Some(ev) => Ok(ev?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// Text the stake field holds after a keystroke. The orchestrator re-clamps
/// it.
pub fn edited_stake_text(field: &str, edit: &UserEvent) -> Option<String> {
    let mut text = field.to_string();
    match edit {
        UserEvent::StakeDigit(digit) => text.push(*digit),
        UserEvent::StakeBackspace => {
            text.pop();
        }
        _ => return None,
    }
    Some(text)
}

#[derive(Debug)]
enum CoinView {
    Resting(Side),
    Spinning { plan: SpinPlan, started: Instant },
}

/// Everything the terminal shows, kept up to date through [`Presenter`].
#[derive(Debug)]
pub struct Screen {
    identity: Option<String>,
    wallet: WalletDisplay,
    controls: Controls,
    stake: String,
    notice: Option<(Notice, Instant)>,
    history: Vec<Side>,
    result_text: Option<String>,
    countdown: Option<u8>,
    coin: CoinView,
    activity: VecDeque<(DateTime<Local>, String)>,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            identity: None,
            wallet: WalletDisplay::Loading,
            controls: Controls::Disabled,
            stake: String::new(),
            notice: None,
            history: Vec::new(),
            result_text: None,
            countdown: None,
            coin: CoinView::Resting(Side::Heads),
            activity: VecDeque::new(),
        }
    }
}

impl Screen {
    pub fn visible_notice(&self, now: Instant) -> Option<&Notice> {
        self.notice
            .as_ref()
            .filter(|(_, shown_at)| now.saturating_duration_since(*shown_at) < NOTICE_HOLD)
            .map(|(notice, _)| notice)
    }

    /// Face currently shown. While spinning the face alternates once per
    /// half turn across the animation window.
    pub fn coin_face(&self, now: Instant) -> Side {
        match self.coin {
            CoinView::Resting(side) => side,
            CoinView::Spinning { plan, started } => {
                let half_turns = plan.half_turns.max(1);
                let per_turn = ANIMATION_DURATION / half_turns;
                let elapsed = now.saturating_duration_since(started);
                let turns = (elapsed.as_millis() / per_turn.as_millis().max(1)) as u32;
                if turns.min(half_turns) % 2 == 0 {
                    Side::Heads
                } else {
                    Side::Tails
                }
            }
        }
    }

    pub fn is_spinning(&self) -> bool {
        matches!(self.coin, CoinView::Spinning { .. })
    }

    pub fn activity(&self) -> impl Iterator<Item = &str> {
        self.activity.iter().map(|(_, line)| line.as_str())
    }

    fn log(&mut self, line: impl Into<String>) {
        self.activity.push_front((Local::now(), line.into()));
        self.activity.truncate(ACTIVITY_LIMIT);
    }
}

impl Presenter for Screen {
    fn set_identity(&mut self, user_id: &str) {
        self.identity = Some(user_id.to_string());
        self.log(format!("Playing as {user_id}"));
    }

    fn set_wallet(&mut self, wallet: WalletDisplay) {
        if let WalletDisplay::Balance(balance) = &wallet {
            self.log(format!("Balance {}", format_money(*balance)));
        }
        self.wallet = wallet;
    }

    fn set_controls(&mut self, controls: Controls) {
        self.controls = controls;
    }

    fn set_stake(&mut self, field: &str) {
        self.stake = field.to_string();
    }

    fn show_notice(&mut self, notice: Notice) {
        self.log(notice.text.clone());
        self.notice = Some((notice, Instant::now()));
    }

    fn render_history(&mut self, history: &[Side]) {
        self.history = history.to_vec();
    }

    fn set_result_text(&mut self, text: Option<String>) {
        self.result_text = text;
    }

    fn countdown_tick(&mut self, value: u8) {
        self.countdown = Some(value);
    }

    fn clear_countdown(&mut self) {
        self.countdown = None;
    }

    fn start_flip(&mut self, spin: SpinPlan) {
        self.coin = CoinView::Spinning {
            plan: spin,
            started: Instant::now(),
        };
    }

    fn land_coin(&mut self, side: Side) {
        self.coin = CoinView::Resting(side);
        self.log(format!("Coin landed on {side}"));
    }
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, screen: &Screen) -> Result<()> {
    let mode = state.mode;
    if let Some(term) = state.terminal.as_mut() {
        term.draw(|f| ui(f, mode, screen))?;
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) => k,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    if state.mode == Mode::QuitModal {
        return match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }
    Some(match k.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Char('h') | KeyCode::Char('H') => UserEvent::Bet(Side::Heads),
        KeyCode::Char('t') | KeyCode::Char('T') => UserEvent::Bet(Side::Tails),
        KeyCode::Char('-') => UserEvent::Stake(StakeAction::Decrement),
        KeyCode::Char('+') | KeyCode::Char('=') => UserEvent::Stake(StakeAction::Increment),
        KeyCode::Char('[') => UserEvent::Stake(StakeAction::SetMin),
        KeyCode::Char(']') => UserEvent::Stake(StakeAction::SetMax),
        KeyCode::Char(c) if c.is_ascii_digit() => UserEvent::StakeDigit(c),
        KeyCode::Backspace => UserEvent::StakeBackspace,
        _ => return None,
    })
}

fn ui(f: &mut Frame, mode: Mode, screen: &Screen) {
    let now = Instant::now();
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // wallet
            Constraint::Length(7), // coin
            Constraint::Length(3), // stake
            Constraint::Length(3), // history
            Constraint::Length(3), // notice
            Constraint::Min(4),    // activity
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_wallet_panel(f, chunks[0], screen);
    draw_coin_panel(f, chunks[1], screen, now);
    draw_stake_row(f, chunks[2], screen);
    draw_history(f, chunks[3], screen);
    draw_notice(f, chunks[4], screen, now);
    draw_activity(f, chunks[5], screen);
    draw_help(f, chunks[6]);
    if mode == Mode::QuitModal {
        draw_quit_modal(f);
    }
}

fn draw_wallet_panel(f: &mut Frame, area: Rect, screen: &Screen) {
    let balance = match &screen.wallet {
        WalletDisplay::Loading => Span::styled("Loading...", Style::default().fg(Color::Yellow)),
        WalletDisplay::Error => Span::styled("Error: could not load balance", Style::default().fg(Color::Red)),
        WalletDisplay::Balance(balance) => Span::styled(
            format_money(*balance),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
    };
    let player = screen.identity.as_deref().unwrap_or("-");
    let line = Line::from(vec![
        Span::raw(format!("Player: {player} | Balance: ")),
        balance,
    ]);
    let widget =
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_coin_panel(f: &mut Frame, area: Rect, screen: &Screen, now: Instant) {
    let face = screen.coin_face(now);
    let face_style = if screen.is_spinning() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    };
    let mut lines = vec![
        Line::from(Span::styled(format!("( {} )", face.letter()), face_style)),
        Line::from(face.label()),
    ];
    match screen.countdown {
        Some(value) => lines.push(Line::from(Span::styled(
            value.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))),
        None => lines.push(Line::from("")),
    }
    if let Some(text) = &screen.result_text {
        lines.push(Line::from(text.clone()));
    }
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Coin"));
    f.render_widget(widget, area);
}

fn control_span(label: &'static str, disabled: bool) -> Span<'static> {
    if disabled {
        Span::styled(label, Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(label, Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
    }
}

fn draw_stake_row(f: &mut Frame, area: Rect, screen: &Screen) {
    let (state, bets_disabled) = match screen.controls {
        Controls::Enabled(state) => (state, false),
        Controls::Disabled => (
            ControlState {
                minus_disabled: true,
                min_disabled: true,
                plus_disabled: true,
                max_disabled: true,
            },
            true,
        ),
    };
    let (stake_text, potential) = match screen.stake.parse::<u64>() {
        Ok(amount) => {
            let amount = rust_decimal::Decimal::from(amount);
            (format_money(amount), format_money(amount * WIN_PAYOUT_RATIO))
        }
        Err(_) => ("₹_".to_string(), "-".to_string()),
    };
    let line = Line::from(vec![
        control_span("[min]", state.min_disabled),
        Span::raw(" "),
        control_span("[-]", state.minus_disabled),
        Span::raw(format!(" Stake: {stake_text} ")),
        control_span("[+]", state.plus_disabled),
        Span::raw(" "),
        control_span("[max]", state.max_disabled),
        Span::raw(format!("   win +{potential}   ")),
        control_span("[h] Heads", bets_disabled),
        Span::raw(" "),
        control_span("[t] Tails", bets_disabled),
    ]);
    let widget =
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Stake"));
    f.render_widget(widget, area);
}

fn draw_history(f: &mut Frame, area: Rect, screen: &Screen) {
    let text = if screen.history.is_empty() {
        "No flips yet".to_string()
    } else {
        screen.history.iter().map(|side| side.letter()).join(" ")
    };
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("History (latest first)"));
    f.render_widget(widget, area);
}

fn draw_notice(f: &mut Frame, area: Rect, screen: &Screen, now: Instant) {
    let line = match screen.visible_notice(now) {
        Some(notice) => {
            let color = match notice.kind {
                NoticeKind::Win => Color::Green,
                NoticeKind::Loss => Color::Red,
            };
            Line::from(Span::styled(
                notice.text.clone(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        }
        None => Line::from(""),
    };
    let widget = Paragraph::new(line)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(widget, area);
}

fn draw_activity(f: &mut Frame, area: Rect, screen: &Screen) {
    let width = area.width.saturating_sub(2) as usize;
    let rows = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = screen
        .activity
        .iter()
        .take(rows)
        .map(|(at, text)| {
            let entry = format!("{} {}", at.format("%H:%M:%S"), text);
            Line::from(truncate_to_width(&entry, width))
        })
        .collect();
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Activity"));
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "h heads | t tails | -/+ stake | [ min | ] max | 0-9/Backspace edit stake | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_quit_modal(f: &mut Frame) {
    let area = centered_rect(40, 20, f.area());
    let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
    let p = Paragraph::new("Quit the game? (Y/N)");
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(p, block.inner(area));
}

/// Cuts `text` to at most `width` terminal columns.
fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    text.chars()
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= width
        })
        .collect()
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn screen__notice_hides_after_hold() {
        // given
        let mut screen = Screen::default();
        screen.show_notice(Notice::win("You Won ₹0.91!"));
        let shown_at = screen.notice.as_ref().unwrap().1;

        // then
        assert!(screen.visible_notice(shown_at).is_some());
        assert!(
            screen
                .visible_notice(shown_at + NOTICE_HOLD - Duration::from_millis(1))
                .is_some()
        );
        assert!(screen.visible_notice(shown_at + NOTICE_HOLD).is_none());
    }

    #[test]
    fn screen__coin_lands_on_forced_side_after_spin() {
        // given
        let mut screen = Screen::default();
        screen.start_flip(SpinPlan { half_turns: 7 });
        let CoinView::Spinning { started, .. } = screen.coin else {
            panic!("coin should be spinning");
        };
        assert_eq!(screen.coin_face(started + ANIMATION_DURATION), Side::Tails);

        // when
        screen.land_coin(Side::Heads);

        // then
        assert!(!screen.is_spinning());
        assert_eq!(screen.coin_face(Instant::now()), Side::Heads);
        assert_eq!(screen.activity().next(), Some("Coin landed on Heads"));
    }

    #[test]
    fn interpret_event__quit_needs_confirmation() {
        // given
        let mut state = UiState::default();

        // when
        let first = interpret_event(&mut state, key(KeyCode::Char('q')));
        let declined = interpret_event(&mut state, key(KeyCode::Char('n')));
        interpret_event(&mut state, key(KeyCode::Esc));
        let confirmed = interpret_event(&mut state, key(KeyCode::Char('y')));

        // then
        assert!(matches!(first, Some(UserEvent::Redraw)));
        assert!(matches!(declined, Some(UserEvent::Redraw)));
        assert!(matches!(confirmed, Some(UserEvent::Quit)));
    }

    #[test]
    fn interpret_event__maps_game_keys() {
        let mut state = UiState::default();
        assert!(matches!(
            interpret_event(&mut state, key(KeyCode::Char('h'))),
            Some(UserEvent::Bet(Side::Heads))
        ));
        assert!(matches!(
            interpret_event(&mut state, key(KeyCode::Char(']'))),
            Some(UserEvent::Stake(StakeAction::SetMax))
        ));
        assert!(matches!(
            interpret_event(&mut state, key(KeyCode::Char('7'))),
            Some(UserEvent::StakeDigit('7'))
        ));
        assert!(interpret_event(&mut state, key(KeyCode::Char('x'))).is_none());
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(matches!(
            interpret_event(&mut state, ctrl_c),
            Some(UserEvent::Quit)
        ));
    }

    #[test]
    fn edited_stake_text__appends_and_removes_digits() {
        assert_eq!(
            edited_stake_text("5", &UserEvent::StakeDigit('0')).as_deref(),
            Some("50")
        );
        assert_eq!(
            edited_stake_text("50", &UserEvent::StakeBackspace).as_deref(),
            Some("5")
        );
        assert_eq!(edited_stake_text("5", &UserEvent::StakeBackspace).as_deref(), Some(""));
        assert_eq!(edited_stake_text("", &UserEvent::StakeBackspace).as_deref(), Some(""));
        assert_eq!(edited_stake_text("5", &UserEvent::Redraw), None);
    }

    #[test]
    fn edited_stake_text__cleared_field_starts_over() {
        // given
        let cleared = edited_stake_text("1", &UserEvent::StakeBackspace).unwrap();

        // when
        let typed = edited_stake_text(&cleared, &UserEvent::StakeDigit('5'));

        // then
        assert_eq!(cleared, "");
        assert_eq!(typed.as_deref(), Some("5"));
    }

    #[test]
    fn truncate_to_width__counts_wide_chars() {
        assert_eq!(truncate_to_width("₹10.00 won", 6), "₹10.00");
        assert_eq!(truncate_to_width("abc", 10), "abc");
    }
}
