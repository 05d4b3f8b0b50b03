//! Telegram transport using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode, ReplyMarkup,
};
use teloxide::{ApiError, RequestError};
use tracing::warn;

use crate::assistant::message::{Button, Inbound, Keyboard, Payload};
use crate::assistant::transport::{Transport, TransportError};

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Drop any webhook and the updates queued while the bot was down.
    pub async fn reset_webhook(&self) -> Result<(), TransportError> {
        self.bot
            .delete_webhook()
            .drop_pending_updates(true)
            .await
            .map_err(|e| map_error(0, e))?;
        Ok(())
    }
}

fn map_error(chat_id: i64, e: RequestError) -> TransportError {
    let err = match e {
        RequestError::Api(api @ (ApiError::BotBlocked | ApiError::ChatNotFound | ApiError::UserDeactivated)) => {
            TransportError::Unreachable {
                chat_id,
                reason: api.to_string(),
            }
        }
        other => TransportError::Request(other.to_string()),
    };
    warn!("Telegram send to {} failed: {}", chat_id, err);
    err
}

fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
        Keyboard::Rows(rows) => {
            let rows: Vec<Vec<KeyboardButton>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| match button {
                            Button::Text(label) => KeyboardButton::new(label.clone()),
                            Button::Contact(label) => KeyboardButton::new(label.clone()).request(ButtonRequest::Contact),
                        })
                        .collect()
                })
                .collect();
            ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard())
        }
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(ChatId(chat_id), text).parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }
        request.await.map_err(|e| map_error(chat_id, e))?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        let input_file = InputFile::memory(data).file_name(file_name.to_string());
        self.bot
            .send_document(ChatId(chat_id), input_file)
            .caption(caption)
            .await
            .map_err(|e| map_error(chat_id, e))?;
        Ok(())
    }
}

/// Convert a Telegram message into an [`Inbound`]. Returns `None` for
/// messages without a human sender.
pub fn to_inbound(msg: &Message) -> Option<Inbound> {
    let user = msg.from.as_ref()?;
    if user.is_bot {
        return None;
    }

    let payload = if let Some(contact) = msg.contact() {
        Payload::Contact {
            phone: contact.phone_number.clone(),
        }
    } else if let Some(text) = msg.text() {
        Payload::Text(text.to_string())
    } else {
        Payload::Other
    };

    Some(Inbound {
        user_id: user.id.0 as i64,
        chat_id: msg.chat.id.0,
        username: user.username.clone(),
        full_name: user.full_name(),
        locale: user.language_code.clone(),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_button_requests_contact() {
        let keyboard = Keyboard::rows(vec![
            vec![Button::Contact("📲".to_string())],
            vec![Button::Text("❌".to_string())],
        ]);
        let ReplyMarkup::Keyboard(markup) = reply_markup(&keyboard) else {
            panic!("expected a reply keyboard");
        };
        assert_eq!(markup.keyboard.len(), 2);
        assert_eq!(markup.keyboard[0][0].request, Some(ButtonRequest::Contact));
        assert_eq!(markup.keyboard[1][0].text, "❌");
        assert!(markup.resize_keyboard);
    }

    #[test]
    fn test_remove_keyboard() {
        assert!(matches!(reply_markup(&Keyboard::Remove), ReplyMarkup::KeyboardRemove(_)));
    }
}
