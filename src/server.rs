//! Callback endpoint: `GET` answers the URL ownership challenge, `POST`
//! receives messages.
//!
//! Every failure is logged and answered with an empty body. The sender
//! retries on its own schedule, so nothing here retries.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use tracing::{debug, info, warn};

use crate::bot::Bot;
use crate::crypt::MsgCrypt;
use crate::dispatch;
use crate::error::{Error, Result};
use crate::inbound;

#[derive(Clone)]
struct CallbackState {
    bot: Arc<Bot>,
    crypt: Arc<dyn MsgCrypt>,
}

/// Callback query parameters. A repeated parameter keeps its first value.
#[derive(Debug, Default)]
struct CallbackQuery {
    msg_signature: Option<String>,
    timestamp: Option<String>,
    nonce: Option<String>,
    echostr: Option<String>,
}

type QueryPairs = Query<Vec<(String, String)>>;

impl CallbackQuery {
    fn extract(bot: &Bot, query: Result<QueryPairs, QueryRejection>) -> Self {
        let Query(pairs) = match query {
            Ok(query) => query,
            Err(e) => {
                warn!("Bot '{}' callback has an unreadable query: {}", bot.name(), e);
                return Self::default();
            }
        };

        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "msg_signature" => &mut query.msg_signature,
                "timestamp" => &mut query.timestamp,
                "nonce" => &mut query.nonce,
                "echostr" => &mut query.echostr,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }
}

impl Bot {
    /// Router serving this bot's callbacks at `path`.
    ///
    /// Fails if no crypto gateway was installed with [`Bot::serve`].
    pub fn router(self: &Arc<Self>, path: &str) -> Result<Router> {
        let crypt = self.crypt().ok_or_else(|| {
            Error::usage(format!(
                "call serve(...) on bot '{}' before building its router",
                self.name()
            ))
        })?;

        let state = CallbackState {
            bot: Arc::clone(self),
            crypt,
        };

        info!("Bot '{}' accepting callbacks at {}", self.name(), path);
        Ok(Router::new()
            .route(path, get(verify_url).post(receive))
            .with_state(state))
    }
}

async fn verify_url(
    State(state): State<CallbackState>,
    query: Result<QueryPairs, QueryRejection>,
) -> Vec<u8> {
    let query = CallbackQuery::extract(&state.bot, query);
    let (Some(signature), Some(timestamp), Some(nonce), Some(echostr)) = (
        query.msg_signature,
        query.timestamp,
        query.nonce,
        query.echostr,
    ) else {
        warn!(
            "Bot '{}' URL verification missing query parameters",
            state.bot.name()
        );
        return Vec::new();
    };

    match state
        .crypt
        .verify_url(&signature, &timestamp, &nonce, &echostr)
    {
        Ok(echo) => {
            info!("Bot '{}' URL verified", state.bot.name());
            echo
        }
        Err(e) => {
            warn!("Bot '{}' URL verification failed: {}", state.bot.name(), e);
            Vec::new()
        }
    }
}

async fn receive(
    State(state): State<CallbackState>,
    query: Result<QueryPairs, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) {
    let bot = state.bot;
    let query = CallbackQuery::extract(&bot, query);

    let (Some(signature), Some(timestamp), Some(nonce)) =
        (query.msg_signature, query.timestamp, query.nonce)
    else {
        warn!("Bot '{}' callback missing query parameters", bot.name());
        return;
    };

    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!("Bot '{}' failed to read callback body: {}", bot.name(), e);
            return;
        }
    };

    let plaintext = match state.crypt.decrypt_msg(&signature, &timestamp, &nonce, &body) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            warn!("Bot '{}' failed to decrypt callback: {}", bot.name(), e);
            return;
        }
    };
    debug!(
        "Bot '{}' callback payload: {}",
        bot.name(),
        String::from_utf8_lossy(&plaintext)
    );

    let message = match inbound::decode(&plaintext) {
        Ok(message) => message,
        Err(e) => {
            warn!("Bot '{}' dropped callback: {}", bot.name(), e);
            return;
        }
    };

    let envelope = message.envelope();
    if !bot.first_seen(&envelope.msg_id) {
        info!(
            "Bot '{}' ignoring redelivered message {}",
            bot.name(),
            envelope.msg_id
        );
        return;
    }

    info!(
        "Bot '{}' received {} message {} from {} in {}",
        bot.name(),
        envelope.msg_type,
        envelope.msg_id,
        envelope.sender.user_id,
        envelope.chat_id
    );
    dispatch::spawn(bot, message);
}
