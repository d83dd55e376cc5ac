//! Frame files: binary PPM (the capture default) and PNG with embedded
//! capture metadata, plus the on-disk [`FrameSink`].

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use fractalgen_core::{FrameSink, FrameView, ResourceError, SaveRequest};

use crate::image::{to_rgb8, to_rgba8};
use crate::RenderError;

/// On-disk format of captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    #[default]
    Ppm,
    Png,
}

impl FrameFormat {
    pub const ALL: [Self; 2] = [Self::Ppm, Self::Png];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Ppm => "ppm",
            Self::Png => "png",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ppm => "PPM (P6)",
            Self::Png => "PNG",
        }
    }
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

/// Write `frame` as binary PPM: `P6\n<w> <h>\n255\n` then packed RGB8 rows,
/// top row first.
pub fn encode_ppm<W: Write>(frame: FrameView<'_>, out: &mut W) -> std::io::Result<()> {
    write!(
        out,
        "P6\n{} {}\n255\n",
        frame.resolution.width, frame.resolution.height
    )?;
    out.write_all(&to_rgb8(frame))
}

/// Capture metadata stored in PNG tEXt chunks.
pub struct FrameMetadata<'a> {
    pub session_id: &'a str,
    pub frame_index: u32,
    pub magnitude: f64,
}

/// Write `frame` as an 8-bit RGBA PNG with capture metadata.
pub fn encode_png<W: Write>(
    frame: FrameView<'_>,
    out: W,
    metadata: &FrameMetadata<'_>,
) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(out, frame.resolution.width, frame.resolution.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);

    encoder.add_text_chunk("Software".to_string(), "FractalGenerator".to_string())?;
    for (key, value) in metadata_pairs(metadata) {
        encoder.add_text_chunk(key, value)?;
    }

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&to_rgba8(frame))?;
    writer.finish()
}

fn metadata_pairs(meta: &FrameMetadata<'_>) -> Vec<(String, String)> {
    vec![
        ("FractalGenerator.Session".into(), meta.session_id.to_string()),
        ("FractalGenerator.Frame".into(), meta.frame_index.to_string()),
        ("FractalGenerator.Magnitude".into(), format!("{:e}", meta.magnitude)),
    ]
}

/// Encode `frame` to `path` in `format`.
pub fn write_frame(
    frame: FrameView<'_>,
    path: &Path,
    format: FrameFormat,
    metadata: &FrameMetadata<'_>,
) -> crate::Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    match format {
        FrameFormat::Ppm => encode_ppm(frame, &mut writer)?,
        FrameFormat::Png => {
            encode_png(frame, &mut writer, metadata).map_err(|e| RenderError::Encode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        }
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Writes captured frames to `<root>/<session_id>/frame<N>.<ext>`.
#[derive(Debug, Clone)]
pub struct FileFrameSink {
    root: PathBuf,
    format: FrameFormat,
}

impl FileFrameSink {
    pub fn new(root: impl Into<PathBuf>, format: FrameFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    pub fn frame_path(&self, request: &SaveRequest) -> PathBuf {
        frame_path(&self.root, request, self.format)
    }
}

/// `<root>/<session_id>/frame<N>.<ext>`
pub fn frame_path(root: &Path, request: &SaveRequest, format: FrameFormat) -> PathBuf {
    root.join(&request.session_id)
        .join(format!("{}.{}", request.file_stem(), format.extension()))
}

/// Create the session directory (if needed) and write one frame.
pub fn save_frame_file(
    root: &Path,
    format: FrameFormat,
    request: &SaveRequest,
    frame: FrameView<'_>,
) -> Result<PathBuf, ResourceError> {
    let dir = root.join(&request.session_id);
    fs::create_dir_all(&dir).map_err(|source| ResourceError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let path = frame_path(root, request, format);
    let metadata = FrameMetadata {
        session_id: &request.session_id,
        frame_index: request.frame_index,
        magnitude: request.magnitude,
    };
    write_frame(frame, &path, format, &metadata).map_err(|e| match e {
        RenderError::Io(source) => ResourceError::FileWrite {
            path: path.clone(),
            source,
        },
        other => ResourceError::SinkUnavailable {
            reason: other.to_string(),
        },
    })?;
    debug!(path = %path.display(), magnitude = request.magnitude, "Wrote frame");
    Ok(path)
}

impl FrameSink for FileFrameSink {
    fn save_frame(&mut self, request: &SaveRequest, frame: FrameView<'_>) -> Result<(), ResourceError> {
        save_frame_file(&self.root, self.format, request, frame).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractalgen_core::Resolution;

    fn gradient(w: u32, h: u32) -> Vec<f32> {
        let mut data = Vec::new();
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[x as f32 / (w - 1) as f32, y as f32 / (h - 1) as f32, 0.0, 1.0]);
            }
        }
        data
    }

    #[test]
    fn ppm_header_and_body() {
        let data = gradient(3, 2);
        let frame = FrameView::new(Resolution::new(3, 2).unwrap(), &data).unwrap();
        let mut out = Vec::new();
        encode_ppm(frame, &mut out).unwrap();

        let header = b"P6\n3 2\n255\n";
        assert_eq!(&out[..header.len()], header);
        let body = &out[header.len()..];
        assert_eq!(body.len(), 3 * 2 * 3);
        // Top-left black, top-right red, bottom-left green.
        assert_eq!(&body[0..3], &[0, 0, 0]);
        assert_eq!(&body[6..9], &[255, 0, 0]);
        assert_eq!(&body[9..12], &[0, 255, 0]);
    }

    #[test]
    fn png_carries_capture_metadata() {
        let data = gradient(4, 4);
        let frame = FrameView::new(Resolution::new(4, 4).unwrap(), &data).unwrap();
        let mut out = Vec::new();
        let meta = FrameMetadata {
            session_id: "28000000",
            frame_index: 12,
            magnitude: 4096.0,
        };
        encode_png(frame, &mut out, &meta).expect("encode should succeed");

        let decoder = png::Decoder::new(std::io::Cursor::new(out));
        let reader = decoder.read_info().expect("should read info");
        let info = reader.info();
        assert_eq!((info.width, info.height), (4, 4));
        let texts = &info.uncompressed_latin1_text;
        assert!(texts
            .iter()
            .any(|t| t.keyword == "Software" && t.text == "FractalGenerator"));
        assert!(texts
            .iter()
            .any(|t| t.keyword == "FractalGenerator.Frame" && t.text == "12"));
    }

    #[test]
    fn sink_creates_session_directory() {
        let root = std::env::temp_dir().join("fractalgen_test_sink");
        let _ = fs::remove_dir_all(&root);
        let mut sink = FileFrameSink::new(&root, FrameFormat::Ppm);

        let data = gradient(2, 2);
        let frame = FrameView::new(Resolution::new(2, 2).unwrap(), &data).unwrap();
        for i in 0..2 {
            let req = SaveRequest {
                session_id: "123".into(),
                frame_index: i,
                magnitude: 1.0,
            };
            sink.save_frame(&req, frame).expect("save should succeed");
        }
        assert!(root.join("123").join("frame0.ppm").is_file());
        assert!(root.join("123").join("frame1.ppm").is_file());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn unwritable_root_is_reported() {
        let root = std::env::temp_dir().join("fractalgen_test_sink_blocked");
        let _ = fs::remove_dir_all(&root);
        let _ = fs::remove_file(&root);
        fs::write(&root, b"not a directory").unwrap();

        let data = gradient(2, 2);
        let frame = FrameView::new(Resolution::new(2, 2).unwrap(), &data).unwrap();
        let req = SaveRequest {
            session_id: "1".into(),
            frame_index: 0,
            magnitude: 1.0,
        };
        let err = FileFrameSink::new(&root, FrameFormat::Ppm)
            .save_frame(&req, frame)
            .unwrap_err();
        assert!(matches!(err, ResourceError::CreateDir { .. }));

        let _ = fs::remove_file(&root);
    }
}
