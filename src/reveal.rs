use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time,
};

pub const COUNTDOWN_FROM: u8 = 3;
pub const COUNTDOWN_TICK: Duration = Duration::from_millis(1_000);
pub const ANIMATION_DURATION: Duration = Duration::from_millis(3_000);
pub const CAPTION_HOLD: Duration = Duration::from_millis(2_500);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevealSignal {
    /// Countdown value to pulse, starting at [`RevealTiming::countdown_from`].
    Countdown(u8),
    CountdownElapsed,
    AnimationElapsed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RevealTiming {
    pub countdown_from: u8,
    pub tick: Duration,
    pub animation: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            countdown_from: COUNTDOWN_FROM,
            tick: COUNTDOWN_TICK,
            animation: ANIMATION_DURATION,
        }
    }
}

impl RevealTiming {
    /// Time from `run` to `CountdownElapsed`: one tick per value plus the
    /// tick that clears the display.
    pub fn countdown_duration(&self) -> Duration {
        self.tick * (u32::from(self.countdown_from) + 1)
    }

    pub fn total(&self) -> Duration {
        self.countdown_duration() + self.animation
    }
}

/// Drives the cosmetic countdown and animation window. Each `run` owns an
/// independent timer chain that always runs to completion.
#[derive(Clone, Debug, Default)]
pub struct RevealScheduler {
    timing: RevealTiming,
}

impl RevealScheduler {
    pub fn new(timing: RevealTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> RevealTiming {
        self.timing
    }

    /// Emits `Countdown(n)` for n = from..=1 at tick cadence, then
    /// `CountdownElapsed` one tick later, then `AnimationElapsed` exactly once
    /// after the animation window. Emission stops early only if `emit`
    /// reports that nobody is listening.
    pub fn run<F>(&self, mut emit: F) -> JoinHandle<()>
    where
        F: FnMut(RevealSignal) -> bool + Send + 'static,
    {
        let timing = self.timing;
        tokio::spawn(async move {
            for value in (1..=timing.countdown_from).rev() {
                time::sleep(timing.tick).await;
                if !emit(RevealSignal::Countdown(value)) {
                    return;
                }
            }
            time::sleep(timing.tick).await;
            if !emit(RevealSignal::CountdownElapsed) {
                return;
            }
            time::sleep(timing.animation).await;
            emit(RevealSignal::AnimationElapsed);
        })
    }
}
