//! ONNX Runtime session helpers shared by the adapters.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ort::session::Session;

use crate::error::InferenceError;
use crate::types::Capability;

/// Fail with `ModelUnavailable` unless the file exists.
pub(crate) fn require_file(path: &Path, capability: Capability) -> Result<(), InferenceError> {
    if path.exists() {
        Ok(())
    } else {
        Err(InferenceError::ModelUnavailable {
            capability,
            reason: format!(
                "{} not found. Run `lens models download` or install it by hand.",
                path.display()
            ),
        })
    }
}

/// Build a session from an ONNX file.
pub(crate) fn load_session(path: &Path, capability: Capability) -> Result<Session, InferenceError> {
    require_file(path, capability)?;
    let session = Session::builder()
        .map_err(|e| InferenceError::ModelUnavailable {
            capability,
            reason: format!("failed to create ONNX session builder: {e}"),
        })?
        .commit_from_file(path)
        .map_err(|e| InferenceError::ModelUnavailable {
            capability,
            reason: format!("failed to load {}: {e}", path.display()),
        })?;

    tracing::debug!(
        %capability,
        "Loaded {:?} (inputs: {:?}, outputs: {:?})",
        path,
        session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
        session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>()
    );
    Ok(session)
}

/// Name of the first input tensor, or `fallback` if the model doesn't say.
pub(crate) fn first_input_name(session: &Session, fallback: &str) -> String {
    session
        .inputs()
        .first()
        .map(|i| i.name().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// Lock a session for one `run` call.
pub(crate) fn lock(
    session: &Mutex<Session>,
    capability: Capability,
) -> Result<MutexGuard<'_, Session>, InferenceError> {
    session
        .lock()
        .map_err(|e| InferenceError::failed(capability, format!("session lock poisoned: {e}")))
}

/// Wrap an ONNX Runtime error as a capability failure.
pub(crate) fn ort_err<E: std::fmt::Display>(
    capability: Capability,
    what: &str,
) -> impl Fn(E) -> InferenceError + '_ {
    move |e| InferenceError::failed(capability, format!("{what}: {e}"))
}
