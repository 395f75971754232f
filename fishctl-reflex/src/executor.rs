use crate::clock::Clock;
use crate::config::Config;
use crate::decision::Action;
use crate::error::Result;
use fishctl::{InputCtl, Key, MouseButton};
use std::time::Duration;
use tracing::debug;

/// Where button and key presses go
pub trait InputSink {
    fn press_release_button(&mut self, button: MouseButton) -> fishctl::Result<()>;
    fn press_release_key(&mut self, key: Key) -> fishctl::Result<()>;
}

impl InputSink for InputCtl {
    fn press_release_button(&mut self, button: MouseButton) -> fishctl::Result<()> {
        self.click(button)
    }

    fn press_release_key(&mut self, key: Key) -> fishctl::Result<()> {
        self.key_click(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub cast_button: MouseButton,
    pub dismiss_key: Key,
    pub settle_delay: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            cast_button: config.input.cast_button()?,
            dismiss_key: config.input.dismiss_key()?,
            settle_delay: config.timing.settle_delay(),
        })
    }
}

/// Performs [`Action`]s one after another on the calling thread
pub struct ActionExecutor<I, C> {
    input: I,
    clock: C,
    settings: ExecutorSettings,
}

impl<I: InputSink, C: Clock> ActionExecutor<I, C> {
    pub fn new(input: I, clock: C, settings: ExecutorSettings) -> Self {
        Self {
            input,
            clock,
            settings,
        }
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn execute(&mut self, action: &Action) -> Result<()> {
        debug!(?action, "executing");
        match *action {
            Action::Cast | Action::Reel => self.click_cast_button(),
            Action::SettleAndCast => {
                self.clock.sleep(self.settings.settle_delay);
                self.input.press_release_key(self.settings.dismiss_key)?;
                self.click_cast_button()
            }
            Action::Wait(duration) => {
                self.clock.sleep(duration);
                Ok(())
            }
        }
    }

    pub fn execute_all(&mut self, actions: &[Action]) -> Result<()> {
        for action in actions {
            self.execute(action)?;
        }
        Ok(())
    }

    fn click_cast_button(&mut self) -> Result<()> {
        self.input
            .press_release_button(self.settings.cast_button)?;
        Ok(())
    }
}
