//! Newline-delimited JSON over TCP: one request line, one response line.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};

/// One request, tagged by `cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum Request {
    /// Install from an archive readable by the daemon. `name` defaults to the
    /// archive's file name.
    Install {
        archive: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Replace one file inside a service with the contents of `file`, stored
    /// as `name` (default: `file`'s own name).
    Update {
        id: String,
        file: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Remove {
        id: String,
    },
    Rollback {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<String>,
    },
    Start {
        id: String,
    },
    Stop {
        id: String,
    },
    Enable {
        id: String,
    },
    Disable {
        id: String,
    },
    Status {
        id: String,
    },
    IsRunning {
        id: String,
    },
    IsEnabled {
        id: String,
    },
    Files {
        id: String,
    },
    Backups {
        id: String,
    },
    DeleteFile {
        id: String,
        token: String,
    },
    Reload,
    Resync,
    List,
    Shutdown,
}

impl Request {
    /// The `cmd` tag, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Install { .. } => "install",
            Request::Update { .. } => "update",
            Request::Remove { .. } => "remove",
            Request::Rollback { .. } => "rollback",
            Request::Start { .. } => "start",
            Request::Stop { .. } => "stop",
            Request::Enable { .. } => "enable",
            Request::Disable { .. } => "disable",
            Request::Status { .. } => "status",
            Request::IsRunning { .. } => "is-running",
            Request::IsEnabled { .. } => "is-enabled",
            Request::Files { .. } => "files",
            Request::Backups { .. } => "backups",
            Request::DeleteFile { .. } => "delete-file",
            Request::Reload => "reload",
            Request::Resync => "resync",
            Request::List => "list",
            Request::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable error code, e.g. `not_managed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
            kind: None,
        }
    }

    pub fn failure(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.to_string()),
            ..Self::error(message)
        }
    }

    pub fn into_data(self) -> Result<Value, DaemonError> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(DaemonError::Remote {
                kind: self.kind,
                message: self
                    .error
                    .unwrap_or_else(|| "unknown daemon error".to_string()),
            })
        }
    }
}

/// Send one request to the daemon at `addr` and wait for its response.
pub fn send_request(addr: SocketAddr, request: &Request) -> Result<Response, DaemonError> {
    let label = PathBuf::from(addr.to_string());
    let mut stream = TcpStream::connect(addr).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning { addr }
        } else {
            io_err(&label, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&label, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&label, e))?;
    stream.flush().map_err(|e| io_err(&label, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&label, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    Ok(serde_json::from_str(line.trim_end())?)
}

/// [`send_request`], unwrapping the response into its data payload.
pub fn request(addr: SocketAddr, request: &Request) -> Result<Value, DaemonError> {
    send_request(addr, request)?.into_data()
}
