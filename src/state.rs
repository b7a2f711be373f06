use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::telegram::bot::Bot;

/// Process-wide flags shared by handlers and scheduled jobs.
#[derive(Debug, Default)]
pub struct BotFlags {
    presa: AtomicBool,
}

impl BotFlags {
    pub fn presa(&self) -> bool {
        self.presa.load(Ordering::SeqCst)
    }

    pub fn set_presa(&self, value: bool) {
        self.presa.store(value, Ordering::SeqCst);
    }

    /// Sets the flag; returns true only for the call that flipped it.
    pub fn mark_presa(&self) -> bool {
        self.presa
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub bot: Bot,
    pub config: Arc<Config>,
    pub flags: Arc<BotFlags>,
}

impl AppState {
    pub fn new(bot: Bot, config: Config) -> Self {
        AppState {
            bot,
            config: Arc::new(config),
            flags: Arc::new(BotFlags::default()),
        }
    }
}
