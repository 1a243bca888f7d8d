//! Ordered collection of ingested frames with their timing and selection state.

use std::{fs, path::Path, sync::Arc};

use apngfit_raster::Rasterizer;
use apngfit_types::{
    frame::{Frame, PixelBuffer},
    policy::{
        clamp_frame_count, MAX_DURATION_SEC, MAX_FILES, MAX_FILE_SIZE, MIN_DURATION_SEC,
        MIN_FRAMES, SUPPORTED_EXTENSIONS,
    },
    quality::AspectMode,
    ApngFitError, Result,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::sequence::{default_frame_count, effective_target_count, even_delay_ms, FrameSequence};

/// Raw bytes of one image file awaiting rasterization.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file, refusing unsupported extensions and oversize files before loading them.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        check_supported(&name)?;
        let meta = fs::metadata(path)
            .map_err(|err| ingest_error(format!("cannot stat {}: {err}", path.display())))?;
        check_size(&name, meta.len())?;
        let bytes = fs::read(path)
            .map_err(|err| ingest_error(format!("cannot read {}: {err}", path.display())))?;
        Ok(Self::new(name, bytes))
    }
}

pub fn is_supported(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn check_supported(name: &str) -> Result<()> {
    if is_supported(name) {
        Ok(())
    } else {
        Err(ingest_error(format!("unsupported file type: {name}")))
    }
}

fn check_size(name: &str, len: u64) -> Result<()> {
    if len > MAX_FILE_SIZE {
        Err(ingest_error(format!(
            "file too large: {name} ({:.1} KB)",
            len as f64 / 1024.0
        )))
    } else {
        Ok(())
    }
}

/// Which files made it into the library and why the others did not.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub added: Vec<Uuid>,
    pub rejected: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Earlier,
    Later,
}

#[derive(Debug, Clone)]
struct Entry {
    frame: Frame,
    source: Option<Arc<[u8]>>,
}

#[derive(Debug, Clone)]
pub struct FrameLibrary {
    entries: Vec<Entry>,
    frame_count: usize,
    duration_sec: f32,
    custom_timing: bool,
}

impl Default for FrameLibrary {
    fn default() -> Self {
        Self::new(MIN_FRAMES, 2.0)
    }
}

impl FrameLibrary {
    pub fn new(frame_count: usize, duration_sec: f32) -> Self {
        Self {
            entries: Vec::new(),
            frame_count: clamp_frame_count(frame_count),
            duration_sec: duration_sec.clamp(MIN_DURATION_SEC, MAX_DURATION_SEC),
            custom_timing: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.entries.iter().map(|e| &e.frame)
    }

    pub fn frame(&self, id: Uuid) -> Option<&Frame> {
        self.frames().find(|f| f.id == id)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn duration_sec(&self) -> f32 {
        self.duration_sec
    }

    pub fn has_custom_timing(&self) -> bool {
        self.custom_timing
    }

    /// The first `min(len, frame_count)` frames: the base of the encoded sequence.
    pub fn active_frames(&self) -> Vec<Frame> {
        self.frames().take(self.frame_count).cloned().collect()
    }

    pub fn effective_target(&self) -> usize {
        let base = self.entries.len().min(self.frame_count).max(1);
        effective_target_count(base, self.frame_count)
    }

    pub fn sequence(&self) -> FrameSequence {
        FrameSequence::build(&self.active_frames(), self.frame_count)
    }

    /// Delay given to a frame appended while the library holds its current frames.
    pub fn initial_delay_ms(&self) -> u32 {
        let count = clamp_frame_count(self.entries.len().max(1));
        even_delay_ms(self.duration_sec, count)
    }

    pub fn push(&mut self, frame: Frame, source: Option<Arc<[u8]>>) {
        self.entries.push(Entry { frame, source });
    }

    /// Select the default count for the current library size and respread delays.
    pub fn settle_after_ingest(&mut self) {
        self.frame_count = default_frame_count(self.entries.len());
        self.custom_timing = false;
        self.apply_even_delays();
    }

    /// Request a frame count; it snaps to the effective whole-cycle target.
    pub fn set_frame_count(&mut self, requested: usize) {
        self.frame_count = clamp_frame_count(requested);
        let effective = self.effective_target();
        if effective != self.frame_count {
            self.frame_count = effective;
        }
        self.custom_timing = false;
        self.apply_even_delays();
    }

    pub fn set_duration_sec(&mut self, duration_sec: f32) {
        self.duration_sec = duration_sec.clamp(MIN_DURATION_SEC, MAX_DURATION_SEC);
        self.custom_timing = false;
        self.apply_even_delays();
    }

    /// Set one frame's delay (clamped); the library switches to custom timing.
    pub fn set_frame_delay(&mut self, id: Uuid, delay_ms: u32) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.frame.id == id) else {
            return false;
        };
        entry.frame.set_delay_ms(delay_ms);
        self.custom_timing = true;
        true
    }

    pub fn reset_timing(&mut self) {
        self.custom_timing = false;
        self.apply_even_delays();
    }

    fn apply_even_delays(&mut self) {
        if self.custom_timing {
            return;
        }
        let delay = even_delay_ms(self.duration_sec, self.effective_target());
        for entry in self.entries.iter_mut().take(self.frame_count) {
            entry.frame.set_delay_ms(delay);
        }
    }

    pub fn shift(&mut self, id: Uuid, direction: Shift) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        match direction {
            Shift::Earlier if idx > 0 => self.entries.swap(idx, idx - 1),
            Shift::Later if idx + 1 < self.entries.len() => self.entries.swap(idx, idx + 1),
            _ => return false,
        }
        true
    }

    /// Drag-and-drop reorder: take `moved` out and insert it where `target` sits.
    pub fn move_to(&mut self, moved: Uuid, target: Uuid) -> bool {
        if moved == target {
            return false;
        }
        let (Some(from), Some(to)) = (self.position(moved), self.position(target)) else {
            return false;
        };
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        true
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Frame> {
        let idx = self.position(id)?;
        Some(self.entries.remove(idx).frame)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.entries.iter().position(|e| e.frame.id == id)
    }

    /// Validate, rasterize and append `sources`. Rejected files do not stop the rest.
    pub async fn ingest<R>(
        &mut self,
        rasterizer: &R,
        sources: Vec<SourceFile>,
        aspect: AspectMode,
        canvas: (u32, u32),
    ) -> IngestReport
    where
        R: Rasterizer + ?Sized,
    {
        let mut report = IngestReport::default();
        let mut accepted = Vec::new();
        for source in sources {
            let checked =
                check_supported(&source.name).and_then(|_| check_size(&source.name, source.bytes.len() as u64));
            match checked {
                Ok(()) => accepted.push(source),
                Err(err) => report.rejected.push((source.name, err.to_string())),
            }
        }

        let available = MAX_FILES.saturating_sub(self.entries.len());
        if accepted.len() > available {
            for source in accepted.drain(available..) {
                report.rejected.push((
                    source.name,
                    format!("library is full: only {available} more files fit"),
                ));
            }
        }

        for source in accepted {
            match rasterizer
                .rasterize(&source.bytes, canvas.0, canvas.1, aspect)
                .await
            {
                Ok(pixels) => {
                    let frame = Frame::new(source.name, pixels, self.initial_delay_ms());
                    report.added.push(frame.id);
                    self.push(frame, Some(source.bytes));
                }
                Err(err) => {
                    warn!("Failed to load {}: {}", source.name, err);
                    report.rejected.push((source.name, err.to_string()));
                }
            }
        }

        if !report.added.is_empty() {
            self.settle_after_ingest();
        }
        info!(
            "Ingested {} files ({} rejected); library holds {} frames",
            report.added.len(),
            report.rejected.len(),
            self.entries.len()
        );
        report
    }

    /// Rebuild every frame's pixels from its source with a new aspect mode.
    pub async fn rerasterize<R>(
        &mut self,
        rasterizer: &R,
        aspect: AspectMode,
        canvas: (u32, u32),
    ) -> Result<usize>
    where
        R: Rasterizer + ?Sized,
    {
        let mut rebuilt = 0;
        for entry in self.entries.iter_mut() {
            let Some(source) = &entry.source else {
                continue;
            };
            let pixels: PixelBuffer = rasterizer
                .rasterize(source, canvas.0, canvas.1, aspect)
                .await?;
            entry.frame = entry.frame.with_pixels(pixels);
            rebuilt += 1;
        }
        Ok(rebuilt)
    }
}

pub fn ingest_error(message: impl Into<String>) -> ApngFitError {
    ApngFitError::Ingest(message.into())
}
