use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const REGISTRATION_CLOSED: &str = "Multi-user registration not allowed at the moment.";

/// Telegram bot commands exposed to users.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "SignalBot commands:")]
pub enum Command {
    #[command(description = "Register this chat for signal reports")]
    Register,
    #[command(description = "Show this help")]
    Help,
}

/// Answer commands in long-polling mode until ctrl-c.
pub async fn start_bot(bot: Bot) {
    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Register].endpoint(handle_register))
        .branch(case![Command::Help].endpoint(handle_help));

    Update::filter_message()
        .branch(command_handler)
        .branch(dptree::endpoint(handle_unknown))
}

async fn handle_register(bot: Bot, msg: Message) -> HandlerResult {
    info!(chat_id = msg.chat.id.0, "Registration requested");
    bot.send_message(msg.chat.id, REGISTRATION_CLOSED).await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn handle_unknown(bot: Bot, msg: Message) -> HandlerResult {
    // Plain chatter is ignored; only unrecognised commands get a reply.
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.starts_with('/') {
        return Ok(());
    }

    warn!(chat_id = msg.chat.id.0, command = %text, "Unknown command");
    bot.send_message(msg.chat.id, "Invalid command. Try /help.").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/register", "signalbot").unwrap(), Command::Register);
        assert_eq!(Command::parse("/help", "signalbot").unwrap(), Command::Help);
        assert!(Command::parse("/start", "signalbot").is_err());
    }

    #[test]
    fn help_lists_register() {
        assert!(Command::descriptions().to_string().contains("/register"));
    }
}
