//! Off-thread OBJ/MTL parsing with a single request and a single response.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(not(target_arch = "wasm32"))]
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::obj::{parse_mtl, parse_obj, LoadedMesh};

/// Raw model text plus the URLs its texture file names resolve to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshRequest {
    pub obj_source: String,
    pub mtl_source: Option<String>,
    pub textures: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshLoadError {
    #[error("failed to parse mesh: {0}")]
    Parse(String),
    #[error("mesh load cancelled")]
    Cancelled,
    #[error("failed to upload mesh: {0}")]
    Upload(String),
}

pub type MeshResponse = Result<LoadedMesh, MeshLoadError>;

/// Parses `request` on the calling thread.
pub fn load_mesh(request: &MeshRequest) -> MeshResponse {
    let materials = match &request.mtl_source {
        Some(source) => parse_mtl(source, &request.textures)
            .map_err(|err| MeshLoadError::Parse(format!("{err:#}")))?,
        None => Vec::new(),
    };
    parse_obj(&request.obj_source, materials).map_err(|err| MeshLoadError::Parse(format!("{err:#}")))
}

/// Shared flag tying a load to the lifetime of whoever requested it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type ResponseSlot = Arc<Mutex<Option<MeshResponse>>>;

/// Requester side of an in-flight load. Dropping it cancels the load.
#[derive(Debug)]
pub struct LoadHandle {
    token: CancellationToken,
    slot: ResponseSlot,
    delivered: bool,
    #[cfg(not(target_arch = "wasm32"))]
    worker: Option<JoinHandle<()>>,
}

impl LoadHandle {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the response once it is available. Yields exactly one
    /// response per load; a cancelled load never hands out its mesh.
    pub fn try_take(&mut self) -> Option<MeshResponse> {
        if self.delivered {
            return None;
        }
        let response = if self.token.is_cancelled() {
            self.slot.lock().take();
            Some(Err(MeshLoadError::Cancelled))
        } else {
            self.slot.lock().take()
        };
        self.delivered = response.is_some();
        response
    }

    /// Blocks until the worker has responded.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn wait(&mut self) -> MeshResponse {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("mesh loader thread panicked");
                return Err(MeshLoadError::Parse("mesh loader thread panicked".to_string()));
            }
        }
        self.try_take().unwrap_or(Err(MeshLoadError::Cancelled))
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct MeshLoader;

impl MeshLoader {
    /// Starts parsing `request`. Native targets use a background thread;
    /// wasm32 has no threads and parses before returning.
    pub fn spawn(request: MeshRequest) -> LoadHandle {
        let token = CancellationToken::new();
        let slot: ResponseSlot = Arc::new(Mutex::new(None));

        #[cfg(not(target_arch = "wasm32"))]
        let worker = {
            let worker_token = token.clone();
            let worker_slot = Arc::clone(&slot);
            thread::spawn(move || respond(&request, &worker_token, &worker_slot))
        };
        #[cfg(target_arch = "wasm32")]
        respond(&request, &token, &slot);

        LoadHandle {
            token,
            slot,
            delivered: false,
            #[cfg(not(target_arch = "wasm32"))]
            worker: Some(worker),
        }
    }
}

fn respond(request: &MeshRequest, token: &CancellationToken, slot: &ResponseSlot) {
    if token.is_cancelled() {
        *slot.lock() = Some(Err(MeshLoadError::Cancelled));
        return;
    }
    let response = load_mesh(request);
    if token.is_cancelled() {
        debug!("discarding mesh parsed after cancellation");
        *slot.lock() = Some(Err(MeshLoadError::Cancelled));
        return;
    }
    if let Err(err) = &response {
        warn!("{err}");
    }
    *slot.lock() = Some(response);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_request() -> MeshRequest {
        MeshRequest {
            obj_source: "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".to_string(),
            ..MeshRequest::default()
        }
    }

    #[test]
    fn load_mesh_parses_inline() {
        let mesh = load_mesh(&triangle_request()).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn load_mesh_reports_parse_errors() {
        let request = MeshRequest {
            obj_source: "f 1 2 3".to_string(),
            ..MeshRequest::default()
        };
        assert!(matches!(load_mesh(&request), Err(MeshLoadError::Parse(_))));
    }

    #[test]
    fn spawned_load_delivers_once() {
        let mut handle = MeshLoader::spawn(triangle_request());
        let response = loop {
            if let Some(response) = handle.try_take() {
                break response;
            }
            std::thread::yield_now();
        };
        assert_eq!(response.unwrap().vertex_count(), 3);
        assert!(handle.try_take().is_none());
    }

    #[test]
    fn wait_blocks_for_the_response() {
        let mut handle = MeshLoader::spawn(triangle_request());
        assert!(handle.wait().is_ok());
        assert_eq!(handle.wait(), Err(MeshLoadError::Cancelled));
    }

    #[test]
    fn cancelled_load_never_delivers_a_mesh() {
        let mut handle = MeshLoader::spawn(triangle_request());
        handle.cancel();
        assert_eq!(handle.try_take(), Some(Err(MeshLoadError::Cancelled)));
        assert!(handle.try_take().is_none());
    }

    #[test]
    fn dropping_the_handle_cancels() {
        let handle = MeshLoader::spawn(triangle_request());
        let token = handle.token();
        drop(handle);
        assert!(token.is_cancelled());
    }
}
