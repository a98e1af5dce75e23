pub mod commands;
pub mod format;
pub mod notifier;

pub use commands::start_bot;
pub use format::render_report;
pub use notifier::TelegramNotifier;
