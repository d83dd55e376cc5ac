use std::io;
use std::path::PathBuf;
use std::sync::mpsc;

use tracing::{debug, error};

use fractalgen_core::{FrameSink, FrameView, Resolution, ResourceError, SaveRequest};
use fractalgen_render::{save_frame_file, FrameFormat};

/// Request sent from the UI thread to the I/O worker.
pub(crate) enum IoRequest {
    /// Encode one captured frame and write it under `root/<session>/`.
    WriteFrame {
        root: PathBuf,
        format: FrameFormat,
        request: SaveRequest,
        resolution: Resolution,
        pixels: Vec<f32>,
    },
}

/// Response sent from the I/O worker back to the UI thread.
#[derive(Debug)]
pub(crate) enum IoResponse {
    FrameWritten { frame_index: u32, path: PathBuf },
    FrameFailed { frame_index: u32, error: ResourceError },
}

/// Spawn a dedicated I/O worker thread.
///
/// Returns the send-side for requests and the receive-side for responses.
/// The thread runs until the request sender is dropped.
pub(crate) fn spawn_io_worker(
) -> io::Result<(mpsc::Sender<IoRequest>, mpsc::Receiver<IoResponse>)> {
    let (req_tx, req_rx) = mpsc::channel::<IoRequest>();
    let (resp_tx, resp_rx) = mpsc::channel::<IoResponse>();

    std::thread::Builder::new()
        .name("io-worker".into())
        .spawn(move || {
            debug!("IO worker thread started");
            while let Ok(request) = req_rx.recv() {
                let response = handle_request(request);
                if resp_tx.send(response).is_err() {
                    break;
                }
            }
            debug!("IO worker thread exiting");
        })?;

    Ok((req_tx, resp_rx))
}

fn handle_request(request: IoRequest) -> IoResponse {
    match request {
        IoRequest::WriteFrame {
            root,
            format,
            request,
            resolution,
            pixels,
        } => {
            let frame_index = request.frame_index;
            let Some(frame) = FrameView::new(resolution, &pixels) else {
                return IoResponse::FrameFailed {
                    frame_index,
                    error: ResourceError::SinkUnavailable {
                        reason: format!("frame buffer does not match {}x{}", resolution.width, resolution.height),
                    },
                };
            };
            match save_frame_file(&root, format, &request, frame) {
                Ok(path) => IoResponse::FrameWritten { frame_index, path },
                Err(error) => {
                    error!("IO worker: failed to save frame {frame_index}: {error}");
                    IoResponse::FrameFailed { frame_index, error }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Frame sink
// ---------------------------------------------------------------------------

/// Copies each captured frame and hands it to the I/O worker, so encoding
/// never stalls the render loop. Write failures come back as
/// [`IoResponse::FrameFailed`].
pub(crate) struct BackgroundFrameSink {
    tx: mpsc::Sender<IoRequest>,
    pub root: PathBuf,
    pub format: FrameFormat,
}

impl BackgroundFrameSink {
    pub fn new(tx: mpsc::Sender<IoRequest>, root: PathBuf, format: FrameFormat) -> Self {
        Self { tx, root, format }
    }
}

impl FrameSink for BackgroundFrameSink {
    fn save_frame(&mut self, request: &SaveRequest, frame: FrameView<'_>) -> Result<(), ResourceError> {
        self.tx
            .send(IoRequest::WriteFrame {
                root: self.root.clone(),
                format: self.format,
                request: request.clone(),
                resolution: frame.resolution,
                pixels: frame.rgba.to_vec(),
            })
            .map_err(|_| ResourceError::SinkUnavailable {
                reason: "I/O worker has stopped".into(),
            })
    }
}
