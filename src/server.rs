//! Command server - request/response surface over line-delimited JSON
//!
//! Requests arrive one per line on the input stream:
//! `{"id": 1, "method": "startBackgroundService"}`. Each gets exactly one
//! response line, either `{"id": 1, "result": true}` or
//! `{"id": 1, "error": {"code": "SERVICE_START_ERROR", "message": "..."}}`.
//! While a consumer is listening, events are written to the same stream as
//! `{"event": {...}}` lines.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

use crate::notification::{LineWriter, StreamChannel};
use crate::platform::NotificationPlatform;
use crate::relay::RelayService;
use crate::sms::SmsInbox;

// Error codes reported in `CommandError::code`
pub const SMS_READ_ERROR: &str = "SMS_READ_ERROR";
pub const NOTIFICATION_ACCESS_ERROR: &str = "NOTIFICATION_ACCESS_ERROR";
pub const SERVICE_START_ERROR: &str = "SERVICE_START_ERROR";
pub const SERVICE_STOP_ERROR: &str = "SERVICE_STOP_ERROR";
pub const CLEAR_ERROR: &str = "CLEAR_ERROR";
pub const GENERAL_ERROR: &str = "GENERAL_ERROR";
pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";

/// Inbound command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Command response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

/// Named failure returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

impl CommandError {
    /// Error with one of the codes above
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    fn from_error(code: &str, context: &str, err: &anyhow::Error) -> Self {
        Self::new(code, format!("{}: {:#}", context, err))
    }
}

impl CommandResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    fn failure(id: Option<Value>, error: CommandError) -> Self {
        Self { id, result: None, error: Some(error) }
    }
}

type CommandResult = std::result::Result<Value, CommandError>;

/// Maps commands onto the relay
pub struct CommandHandler {
    relay: RelayService,
    platform: Arc<dyn NotificationPlatform>,
    sms: Arc<dyn SmsInbox>,
    stream: Arc<StreamChannel>,
}

impl CommandHandler {
    pub fn new(
        relay: RelayService,
        platform: Arc<dyn NotificationPlatform>,
        sms: Arc<dyn SmsInbox>,
        writer: Arc<LineWriter>,
    ) -> Self {
        Self {
            relay,
            platform,
            sms,
            stream: Arc::new(StreamChannel::new(writer)),
        }
    }

    /// Dispatch one request
    ///
    /// Every request gets exactly one response. Unknown methods answer
    /// `NOT_IMPLEMENTED`.
    pub fn handle(&self, request: CommandRequest) -> CommandResponse {
        debug!(method = %request.method, "Command received");

        let result = match request.method.as_str() {
            "getSmsMessages" => self.handle_get_sms(request.params.as_ref()),
            "checkNotificationAccess" => self.handle_check_access(),
            "startBackgroundService" => self.handle_start(),
            "stopBackgroundService" => self.handle_stop(),
            "clearSystemNotifications" => self.handle_clear(),
            "listen" => self.handle_listen(),
            "cancel" => self.handle_cancel(),
            other => {
                warn!(method = %other, "Command not implemented");
                Err(CommandError::new(
                    NOT_IMPLEMENTED,
                    format!("Method not implemented: {}", other),
                ))
            }
        };

        match result {
            Ok(value) => CommandResponse::success(request.id, value),
            Err(e) => {
                error!(code = %e.code, message = %e.message, "Command failed");
                CommandResponse::failure(request.id, e)
            }
        }
    }

    fn handle_get_sms(&self, params: Option<&Value>) -> CommandResult {
        let max = self.relay.config().sms_limit;
        let limit = params
            .and_then(|p| p["limit"].as_u64())
            .map(|n| (n as usize).min(max))
            .unwrap_or(max);

        let messages = self
            .sms
            .recent_messages(limit)
            .map_err(|e| CommandError::from_error(SMS_READ_ERROR, "Failed to read SMS", &e))?;
        info!(count = messages.len(), "SMS messages read");
        serde_json::to_value(messages)
            .map_err(|e| CommandError::new(SMS_READ_ERROR, e.to_string()))
    }

    fn handle_check_access(&self) -> CommandResult {
        let granted = self.platform.has_listener_access().map_err(|e| {
            CommandError::from_error(
                NOTIFICATION_ACCESS_ERROR,
                "Failed to check notification access",
                &e,
            )
        })?;
        Ok(json!(granted))
    }

    fn handle_start(&self) -> CommandResult {
        self.relay.supervisor().start().map_err(|e| {
            CommandError::from_error(SERVICE_START_ERROR, "Failed to start service", &e)
        })?;
        Ok(json!(true))
    }

    fn handle_stop(&self) -> CommandResult {
        self.relay.supervisor().stop().map_err(|e| {
            CommandError::from_error(SERVICE_STOP_ERROR, "Failed to stop service", &e)
        })?;
        Ok(json!(true))
    }

    fn handle_clear(&self) -> CommandResult {
        let cleared = self.relay.supervisor().clear_all().map_err(|e| {
            CommandError::from_error(CLEAR_ERROR, "Failed to clear notifications", &e)
        })?;
        Ok(json!(cleared))
    }

    /// Attach the output stream as the event consumer
    fn handle_listen(&self) -> CommandResult {
        self.relay.sink().attach(self.stream.clone());
        Ok(json!(true))
    }

    fn handle_cancel(&self) -> CommandResult {
        self.relay.sink().detach();
        Ok(json!(true))
    }
}

/// Line loop around a `CommandHandler`
pub struct RelayServer {
    handler: CommandHandler,
    writer: Arc<LineWriter>,
}

impl RelayServer {
    /// Server answering on `writer`, the same writer the event stream uses
    pub fn new(handler: CommandHandler, writer: Arc<LineWriter>) -> Self {
        Self { handler, writer }
    }

    /// Serve commands until the reader hits EOF
    ///
    /// A line that is not valid UTF-8 or not a valid request gets a
    /// `GENERAL_ERROR` response; the loop keeps serving. Only I/O failures
    /// on the streams themselves end it.
    pub async fn run<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut segments = reader.split(b'\n');
        info!("Command server started");

        while let Some(bytes) = segments.next_segment().await? {
            let response = match std::str::from_utf8(&bytes) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.handle_line(line)
                }
                Err(e) => {
                    warn!(error = %e, "Command line is not valid UTF-8");
                    CommandResponse::failure(
                        None,
                        CommandError::new(GENERAL_ERROR, format!("Invalid request encoding: {}", e)),
                    )
                }
            };

            let response_json = serde_json::to_string(&response)?;
            self.writer.write_line(&response_json)?;
        }

        info!("Command input closed");
        Ok(())
    }

    fn handle_line(&self, line: &str) -> CommandResponse {
        match serde_json::from_str::<CommandRequest>(line) {
            Ok(request) => self.handler.handle(request),
            Err(e) => {
                warn!(error = %e, "Failed to parse command");
                CommandResponse::failure(
                    None,
                    CommandError::new(GENERAL_ERROR, format!("Invalid request: {}", e)),
                )
            }
        }
    }
}
