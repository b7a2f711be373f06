pub mod bot;
pub mod format;
pub mod keyboard;
pub mod scheduler;
pub mod types;
