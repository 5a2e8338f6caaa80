use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};

use aifree_core::{FileStore, KeyValueStore};
use aifree_sync::{BlockingEngine, FileEngine};

use crate::clock::SystemClock;
use crate::error::{io_err, DaemonError};
use crate::paths::{aifree_root, socket_path};
use crate::protocol::{Request, Response};
use crate::session::{SessionError, SessionStore};

/// One client command waiting for the processor.
struct Job {
    request: Request,
    respond_to: oneshot::Sender<Response>,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let (tick_tx, tick_rx) = mpsc::channel::<()>(1);
    let mut store = SessionStore::new(
        FileStore::at_home(&home),
        FileEngine::at_home(&home),
        Arc::new(SystemClock),
    )
    .with_ticks(tick_tx);
    let recovery = store.initialize()?;
    tracing::info!(recovery = ?recovery, home = %home.display(), "session store ready");

    let (job_tx, job_rx) = mpsc::channel::<Job>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result =
                processor_task(store, job_rx, tick_rx, shutdown.clone(), shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = socket_server_task(home, job_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (processor_result, socket_result, signal_result) =
        tokio::join!(processor_handle, socket_handle, signal_handle);

    handle_join("processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Owns the session store and applies commands strictly one at a time.
/// Elapsed ticks are handled here too, so storage has a single writer.
async fn processor_task<S, E>(
    mut store: SessionStore<S, E>,
    mut job_rx: mpsc::Receiver<Job>,
    mut tick_rx: mpsc::Receiver<()>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError>
where
    S: KeyValueStore,
    E: BlockingEngine,
{
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let stopping = job.request == Request::Shutdown;
                let response = dispatch(&mut store, job.request);
                let _ = job.respond_to.send(response);
                if stopping {
                    tracing::info!("shutdown requested over socket");
                    let _ = shutdown_tx.send(());
                    break;
                }
            }
            Some(()) = tick_rx.recv() => store.publish_elapsed(),
        }
    }

    Ok(())
}

/// Apply one command. `AlreadyActive` and `NoActiveSession` are silent no-ops.
pub(crate) fn dispatch<S, E>(store: &mut SessionStore<S, E>, request: Request) -> Response
where
    S: KeyValueStore,
    E: BlockingEngine,
{
    let result = match request {
        Request::StartSession => match store.start_session() {
            Ok(_) => Ok(Response::ok()),
            Err(SessionError::AlreadyActive) => {
                tracing::debug!("start ignored: session already active");
                Ok(Response::ok())
            }
            Err(err) => Err(err),
        },
        Request::StopSession => match store.stop_session() {
            Ok(_) => Ok(Response::ok()),
            Err(SessionError::NoActiveSession) => {
                tracing::debug!("stop ignored: no active session");
                Ok(Response::ok())
            }
            Err(err) => Err(err),
        },
        Request::GetStatus => store.status().map(Response::Status),
        Request::UpdateBlocklist { blocklist } => {
            store.update_blocklist(blocklist).map(|_| Response::ok())
        }
        Request::ExportLogs => store.export_logs().map(|logs| Response::Logs { logs }),
        Request::ClearLogs => store.clear_logs().map(|()| Response::ok()),
        Request::GetBlocklist => store.blocklist().map(|list| Response::Blocklist {
            blocklist: list.to_strings(),
        }),
        Request::Shutdown => Ok(Response::ok()),
        Request::Unknown => Ok(Response::unknown_action()),
    };

    result.unwrap_or_else(|err| {
        tracing::error!(error = %err, "command failed");
        Response::error(err.to_string())
    })
}

async fn socket_server_task(
    home: PathBuf,
    job_tx: mpsc::Sender<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let job_tx = job_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, job_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    job_tx: mpsc::Sender<Job>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match parse_request(&line) {
            Ok(request) => request,
            Err(response) => {
                write_response(&mut writer, &response).await?;
                continue;
            }
        };

        let stopping = request == Request::Shutdown;
        let response = submit(&job_tx, request).await?;
        write_response(&mut writer, &response).await?;
        if stopping {
            break;
        }
    }

    Ok(())
}

/// Decode one request line, or the error payload to send back instead.
fn parse_request(line: &str) -> Result<Request, Response> {
    serde_json::from_str(line).map_err(|err| Response::error(format!("invalid request JSON: {err}")))
}

async fn submit(job_tx: &mpsc::Sender<Job>, request: Request) -> Result<Response, DaemonError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(Job {
            request,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("command queue"))?;

    rx.await
        .map_err(|_| DaemonError::ChannelClosed("command response"))
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = aifree_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &Response,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use aifree_core::{MemoryStore, PersistedState};
    use aifree_sync::{EngineCall, MemoryEngine};
    use chrono::{DateTime, TimeDelta};
    use serde_json::json;

    use crate::clock::ManualClock;
    use crate::paths::TICK_INTERVAL;

    fn memory_store(clock: &ManualClock) -> SessionStore<MemoryStore, MemoryEngine> {
        let mut store = SessionStore::new(
            MemoryStore::new(),
            MemoryEngine::new(),
            Arc::new(clock.clone()),
        );
        store.initialize().expect("initialize");
        store
    }

    fn clock() -> ManualClock {
        ManualClock::new(DateTime::parse_from_rfc3339("2025-03-14T10:00:00+00:00").expect("start"))
    }

    #[test]
    fn dispatch_covers_the_command_surface() {
        let clock = clock();
        let mut store = memory_store(&clock);

        assert_eq!(dispatch(&mut store, Request::StartSession), Response::ok());
        assert_eq!(dispatch(&mut store, Request::StartSession), Response::ok());
        clock.advance(TimeDelta::seconds(90));

        assert_eq!(
            serde_json::to_value(dispatch(&mut store, Request::GetStatus)).expect("status"),
            json!({"isBlocking": true, "elapsed": 90, "totalSessions": 0})
        );

        assert_eq!(dispatch(&mut store, Request::StopSession), Response::ok());
        assert_eq!(dispatch(&mut store, Request::StopSession), Response::ok());

        assert_eq!(
            serde_json::to_value(dispatch(&mut store, Request::ExportLogs)).expect("logs"),
            json!({"logs": [
                {"date": "2025-03-14", "start": "10:00", "end": "10:01", "duration_min": 2}
            ]})
        );

        assert_eq!(
            dispatch(
                &mut store,
                Request::UpdateBlocklist {
                    blocklist: vec!["claude.ai".into(), "claude.ai".into(), "poe.com".into()]
                }
            ),
            Response::ok()
        );
        assert_eq!(
            dispatch(&mut store, Request::GetBlocklist),
            Response::Blocklist {
                blocklist: vec!["claude.ai".to_string(), "poe.com".to_string()]
            }
        );

        assert_eq!(dispatch(&mut store, Request::ClearLogs), Response::ok());
        assert_eq!(
            dispatch(&mut store, Request::ExportLogs),
            Response::Logs { logs: vec![] }
        );
        assert_eq!(
            dispatch(&mut store, Request::Unknown),
            Response::error("Unknown action")
        );
    }

    #[test]
    fn dispatch_survives_engine_failures() {
        let clock = clock();
        let mut store = memory_store(&clock);
        store
            .synchronizer_mut()
            .engine_mut()
            .fail_on(EngineCall::Remove);

        assert_eq!(dispatch(&mut store, Request::StartSession), Response::ok());
        assert_eq!(dispatch(&mut store, Request::StopSession), Response::ok());
        assert_eq!(
            dispatch(&mut store, Request::GetStatus),
            Response::Status(aifree_core::SessionStatus {
                is_blocking: false,
                elapsed: 0,
                total_sessions: 1,
            })
        );
    }

    #[test]
    fn dispatch_surfaces_storage_failures() {
        let home = tempfile::TempDir::new().expect("home");
        let storage_path = crate::paths::storage_path(home.path());
        fs::create_dir_all(storage_path.parent().expect("parent")).expect("mkdir");
        fs::write(&storage_path, "{ broken").expect("write");

        let mut store = SessionStore::new(
            FileStore::new(&storage_path),
            MemoryEngine::new(),
            Arc::new(clock()),
        );
        match dispatch(&mut store, Request::StartSession) {
            Response::Error { error } => assert!(error.contains("storage.json"), "got {error}"),
            other => panic!("expected error payload, got {other:?}"),
        }
        assert!(store.synchronizer().engine().calls().is_empty());
    }

    #[test]
    fn malformed_lines_become_error_payloads() {
        match parse_request("{not json") {
            Err(Response::Error { error }) => assert!(error.starts_with("invalid request JSON")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(parse_request(r#"{"blocklist": []}"#).is_err());
        assert_eq!(
            parse_request(r#"{"action":"EXPORT_LOGS"}"#),
            Ok(Request::ExportLogs)
        );
        assert_eq!(
            parse_request(r#"{"action":"OPEN_POD_BAY_DOORS"}"#),
            Ok(Request::Unknown)
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn processor_applies_jobs_in_order_and_publishes_ticks() {
        let clock = clock();
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let mut store = SessionStore::new(
            MemoryStore::new(),
            MemoryEngine::new(),
            Arc::new(clock.clone()),
        )
        .with_ticks(tick_tx);
        store.initialize().expect("initialize");

        let (job_tx, job_rx) = mpsc::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);
        let processor = tokio::spawn(processor_task(
            store,
            job_rx,
            tick_rx,
            shutdown_tx.clone(),
            shutdown_tx.subscribe(),
        ));

        assert_eq!(
            submit(&job_tx, Request::StartSession).await.expect("start"),
            Response::ok()
        );

        clock.advance(TimeDelta::seconds(3));
        tokio::time::sleep(TICK_INTERVAL * 3).await;

        let status = submit(&job_tx, Request::GetStatus).await.expect("status");
        assert_eq!(
            status,
            Response::Status(aifree_core::SessionStatus {
                is_blocking: true,
                elapsed: 3,
                total_sessions: 0,
            })
        );

        assert_eq!(
            submit(&job_tx, Request::Shutdown).await.expect("shutdown"),
            Response::ok()
        );
        processor
            .await
            .expect("join")
            .expect("processor exits cleanly");
    }

    #[test]
    fn published_elapsed_is_visible_in_storage() {
        let clock = clock();
        let mut store = memory_store(&clock);
        dispatch(&mut store, Request::StartSession);
        clock.advance(TimeDelta::seconds(42));
        store.publish_elapsed();
        let state = PersistedState::load(store.storage()).expect("load");
        assert_eq!(state.current_session_elapsed, 42);
    }
}
