use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use aifree_core::{SessionLogEntry, SessionStatus};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// JSON newline-delimited request, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    StartSession,
    StopSession,
    GetStatus,
    UpdateBlocklist { blocklist: Vec<String> },
    ExportLogs,
    ClearLogs,
    GetBlocklist,
    /// Ask the daemon to exit.
    Shutdown,
    /// Any action this daemon does not know.
    #[serde(other)]
    Unknown,
}

/// JSON newline-delimited response. The shape depends on the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Error { error: String },
    Status(SessionStatus),
    Logs { logs: Vec<SessionLogEntry> },
    Blocklist { blocklist: Vec<String> },
    Success { success: bool },
}

impl Response {
    pub fn ok() -> Self {
        Response::Success { success: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    pub fn unknown_action() -> Self {
        Self::error("Unknown action")
    }
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(home: &Path, request: &Request) -> Result<Response, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: Response = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// Send `request` and turn an `{error}` payload into [`DaemonError::Protocol`].
pub fn request(home: &Path, request: &Request) -> Result<Response, DaemonError> {
    into_result(send_request(home, request)?)
}

/// `GET_STATUS`, retried briefly while a just-started daemon binds its socket.
pub fn request_status(home: &Path) -> Result<SessionStatus, DaemonError> {
    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match request(home, &Request::GetStatus) {
            Ok(Response::Status(status)) => return Ok(status),
            Ok(other) => return Err(unexpected("GET_STATUS", &other)),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_logs(home: &Path) -> Result<Vec<SessionLogEntry>, DaemonError> {
    match request(home, &Request::ExportLogs)? {
        Response::Logs { logs } => Ok(logs),
        other => Err(unexpected("EXPORT_LOGS", &other)),
    }
}

pub fn request_blocklist(home: &Path) -> Result<Vec<String>, DaemonError> {
    match request(home, &Request::GetBlocklist)? {
        Response::Blocklist { blocklist } => Ok(blocklist),
        other => Err(unexpected("GET_BLOCKLIST", &other)),
    }
}

pub fn request_shutdown(home: &Path) -> Result<(), DaemonError> {
    request(home, &Request::Shutdown).map(|_| ())
}

fn into_result(response: Response) -> Result<Response, DaemonError> {
    match response {
        Response::Error { error } => Err(DaemonError::Protocol(error)),
        other => Ok(other),
    }
}

fn unexpected(action: &str, response: &Response) -> DaemonError {
    DaemonError::Protocol(format!("unexpected response to {action}: {response:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_use_screaming_action_tags() {
        assert_eq!(
            serde_json::to_value(Request::StartSession).unwrap(),
            json!({"action": "START_SESSION"})
        );
        let update: Request =
            serde_json::from_value(json!({"action": "UPDATE_BLOCKLIST", "blocklist": ["poe.com"]}))
                .unwrap();
        assert_eq!(
            update,
            Request::UpdateBlocklist {
                blocklist: vec!["poe.com".to_string()]
            }
        );
    }

    #[test]
    fn unrecognized_action_parses_as_unknown() {
        let request: Request = serde_json::from_str(r#"{"action":"SELF_DESTRUCT"}"#).unwrap();
        assert_eq!(request, Request::Unknown);
    }

    #[test]
    fn update_without_list_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"action":"UPDATE_BLOCKLIST"}"#).is_err());
    }

    #[test]
    fn responses_roundtrip_by_shape() {
        let cases = [
            (json!({"success": true}), Response::ok()),
            (
                json!({"error": "Unknown action"}),
                Response::unknown_action(),
            ),
            (
                json!({"isBlocking": true, "elapsed": 5, "totalSessions": 2}),
                Response::Status(SessionStatus {
                    is_blocking: true,
                    elapsed: 5,
                    total_sessions: 2,
                }),
            ),
            (json!({"logs": []}), Response::Logs { logs: vec![] }),
            (
                json!({"blocklist": ["claude.ai"]}),
                Response::Blocklist {
                    blocklist: vec!["claude.ai".to_string()],
                },
            ),
        ];
        for (wire, expected) in cases {
            assert_eq!(serde_json::to_value(&expected).unwrap(), wire);
            assert_eq!(serde_json::from_value::<Response>(wire).unwrap(), expected);
        }
    }

    #[test]
    fn missing_socket_reports_not_running() {
        let home = tempfile::TempDir::new().unwrap();
        let err = send_request(home.path(), &Request::GetStatus).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}
