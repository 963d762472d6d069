//! Maps one [`Request`] onto the service manager. Blocking; the runtime
//! calls it from `spawn_blocking`.

use std::fs;

use serde_json::{json, Value};

use deployd_core::ServiceId;
use deployd_pipeline::{DeployError, ServiceManager};

use crate::protocol::{Request, Response};

/// Execute `request`. `Shutdown` is answered here but acted on by the
/// runtime.
pub fn dispatch(manager: &ServiceManager, request: Request) -> Response {
    let cmd = request.name();
    match execute(manager, request) {
        Ok(data) => Response::ok(data),
        Err(err) => {
            tracing::warn!(cmd, kind = err.kind(), error = %err, "request failed");
            Response::failure(err.kind(), err.to_string())
        }
    }
}

fn execute(manager: &ServiceManager, request: Request) -> Result<Value, DeployError> {
    match request {
        Request::Install { archive, name } => {
            let service = manager.install_path(&archive, name.as_deref())?;
            manager.reload()?;
            Ok(json!(service))
        }
        Request::Update { id, file, name } => {
            let id = parse_id(&id)?;
            let content = fs::read(&file).map_err(|source| DeployError::Io {
                path: file.clone(),
                source,
            })?;
            let stored_as = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            Ok(json!(manager.update(&id, &stored_as, &content)?))
        }
        Request::Remove { id } => {
            let removed = manager.remove(&parse_id(&id)?)?;
            manager.reload()?;
            Ok(json!(removed))
        }
        Request::Rollback { id, snapshot } => {
            let service = manager.rollback(&parse_id(&id)?, snapshot.as_deref())?;
            manager.reload()?;
            Ok(json!(service))
        }
        Request::Start { id } => {
            manager.start(&parse_id(&id)?)?;
            Ok(json!({ "id": id, "running": true }))
        }
        Request::Stop { id } => {
            manager.stop(&parse_id(&id)?)?;
            Ok(json!({ "id": id, "running": false }))
        }
        Request::Enable { id } => {
            manager.enable(&parse_id(&id)?)?;
            Ok(json!({ "id": id, "enabled": true }))
        }
        Request::Disable { id } => {
            manager.disable(&parse_id(&id)?)?;
            Ok(json!({ "id": id, "enabled": false }))
        }
        Request::Status { id } => Ok(json!(manager.status(&parse_id(&id)?)?)),
        Request::IsRunning { id } => Ok(json!(manager.is_running(&parse_id(&id)?)?)),
        Request::IsEnabled { id } => Ok(json!(manager.is_enabled(&parse_id(&id)?)?)),
        Request::Files { id } => Ok(json!(manager.list_files(&parse_id(&id)?)?)),
        Request::Backups { id } => Ok(json!(manager.backups(&parse_id(&id)?)?)),
        Request::DeleteFile { id, token } => {
            let deleted = manager.delete_file(&parse_id(&id)?, &token)?;
            Ok(json!({ "deleted": deleted }))
        }
        Request::Reload => {
            manager.reload()?;
            Ok(json!({ "reloaded": true }))
        }
        Request::Resync => Ok(json!({ "services": manager.resync()? })),
        Request::List => Ok(json!(manager.list())),
        Request::Shutdown => Ok(json!({ "stopping": true })),
    }
}

/// A string that is not a valid ID cannot name a managed service.
fn parse_id(raw: &str) -> Result<ServiceId, DeployError> {
    ServiceId::parse(raw).map_err(|_| DeployError::NotManaged(raw.to_string()))
}
