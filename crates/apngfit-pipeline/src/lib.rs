//! High-level pipeline: frame library, cyclic sequencing and the budgeted encode.

pub mod budget;
pub mod generation;
pub mod library;
pub mod posterize;
pub mod sequence;
pub mod settings;

#[cfg(test)]
mod testing;

use apngfit_bus::EventBus;
use apngfit_encoder::ContainerEncoder;
use apngfit_ops::AttemptLog;
use apngfit_raster::Rasterizer;
use apngfit_types::{frame::Frame, quality::AspectMode, ApngFitError, Result};
use tracing::info;

pub use budget::{ArtifactOutcome, BudgetSearch, PlannedAttempt, SearchPlan};
pub use generation::{GenerationCounter, GenerationToken};
pub use library::{FrameLibrary, IngestReport, Shift, SourceFile};
pub use sequence::FrameSequence;
pub use settings::EncodeSettings;

pub struct ArtifactPipeline<E, R, B>
where
    E: ContainerEncoder,
    R: Rasterizer,
    B: EventBus,
{
    encoder: E,
    rasterizer: R,
    bus: B,
    attempts: AttemptLog,
    generations: GenerationCounter,
}

impl<E, R, B> ArtifactPipeline<E, R, B>
where
    E: ContainerEncoder,
    R: Rasterizer,
    B: EventBus,
{
    pub fn new(encoder: E, rasterizer: R, bus: B, attempts: AttemptLog) -> Self {
        Self {
            encoder,
            rasterizer,
            bus,
            attempts,
            generations: GenerationCounter::new(),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn attempts(&self) -> &AttemptLog {
        &self.attempts
    }

    pub fn generations(&self) -> &GenerationCounter {
        &self.generations
    }

    /// Start a new generation; any request still running for an older one is superseded.
    pub async fn produce_artifact(
        &self,
        base_frames: &[Frame],
        settings: &EncodeSettings,
    ) -> Result<ArtifactOutcome> {
        let token = self.generations.advance();
        self.produce_with_token(&token, base_frames, settings).await
    }

    pub async fn produce_with_token(
        &self,
        token: &GenerationToken,
        base_frames: &[Frame],
        settings: &EncodeSettings,
    ) -> Result<ArtifactOutcome> {
        if base_frames.is_empty() {
            return Err(ApngFitError::EmptyInput);
        }
        self.attempts.begin(token.id()).await;
        let sequence = FrameSequence::build(base_frames, settings.frame_count);
        info!(
            "Generation {}: {} base frames -> {} sequence entries",
            token.id(),
            base_frames.len(),
            sequence.len()
        );
        BudgetSearch::new(&self.encoder, &self.bus, &self.attempts, token)
            .run(&sequence, settings)
            .await
    }

    /// Encode the library's active frames with its own snapped frame count.
    pub async fn produce_from_library(
        &self,
        library: &FrameLibrary,
        settings: &EncodeSettings,
    ) -> Result<ArtifactOutcome> {
        let settings = EncodeSettings {
            frame_count: library.frame_count(),
            ..settings.clone()
        };
        self.produce_artifact(&library.active_frames(), &settings)
            .await
    }

    pub async fn ingest(
        &self,
        library: &mut FrameLibrary,
        sources: Vec<SourceFile>,
        aspect: AspectMode,
        settings: &EncodeSettings,
    ) -> IngestReport {
        library
            .ingest(
                &self.rasterizer,
                sources,
                aspect,
                (settings.canvas_width, settings.canvas_height),
            )
            .await
    }

    pub async fn rerasterize(
        &self,
        library: &mut FrameLibrary,
        aspect: AspectMode,
        settings: &EncodeSettings,
    ) -> Result<usize> {
        library
            .rerasterize(
                &self.rasterizer,
                aspect,
                (settings.canvas_width, settings.canvas_height),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::StubEncoder;
    use apngfit_bus::{LocalBus, NullBus};
    use apngfit_container::read_animation_control;
    use apngfit_types::frame::PixelBuffer;
    use async_trait::async_trait;

    struct SolidRasterizer;

    #[async_trait]
    impl Rasterizer for SolidRasterizer {
        async fn rasterize(
            &self,
            source: &[u8],
            width: u32,
            height: u32,
            _aspect: AspectMode,
        ) -> Result<PixelBuffer> {
            let shade = source.first().copied().unwrap_or(0);
            PixelBuffer::from_rgba(
                width,
                height,
                [shade, 0, 0, 255].repeat((width * height) as usize),
            )
        }
    }

    fn settings() -> EncodeSettings {
        EncodeSettings {
            frame_count: 6,
            loops: 3,
            size_limit: 1_000_000,
            canvas_width: 4,
            canvas_height: 4,
            ..EncodeSettings::default()
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new(format!("{i}.png"), PixelBuffer::transparent(4, 4), 100))
            .collect()
    }

    #[tokio::test]
    async fn three_frames_cycle_to_six() {
        let pipeline = ArtifactPipeline::new(
            StubEncoder::linear(1),
            SolidRasterizer,
            NullBus,
            AttemptLog::new(),
        );
        let outcome = pipeline
            .produce_artifact(&frames(3), &settings())
            .await
            .unwrap();

        assert!(outcome.met_budget);
        assert_eq!(outcome.palette_size, 256);
        assert_eq!(read_animation_control(&outcome.bytes), Some((6, 3)));
        let telemetry = pipeline.attempts().snapshot().await;
        assert_eq!(telemetry.generation, outcome.generation);
        assert_eq!(telemetry.attempts.len(), 1);
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let pipeline = ArtifactPipeline::new(
            StubEncoder::linear(1),
            SolidRasterizer,
            NullBus,
            AttemptLog::new(),
        );
        let err = pipeline.produce_artifact(&[], &settings()).await.unwrap_err();
        assert!(matches!(err, ApngFitError::EmptyInput));
    }

    #[tokio::test]
    async fn newer_request_supersedes_older() {
        let pipeline = ArtifactPipeline::new(
            StubEncoder::linear(1).slow(Duration::from_millis(20)),
            SolidRasterizer,
            LocalBus::default(),
            AttemptLog::new(),
        );
        let base = frames(5);
        let settings = settings();
        let (first, second) = futures::join!(
            pipeline.produce_artifact(&base, &settings),
            pipeline.produce_artifact(&base, &settings),
        );

        assert!(matches!(
            first,
            Err(ApngFitError::Superseded { generation: 1 })
        ));
        let second = second.unwrap();
        assert_eq!(second.generation, 2);
        assert_eq!(pipeline.generations().current(), 2);
    }

    #[tokio::test]
    async fn library_flow_uses_snapped_count() {
        let pipeline = ArtifactPipeline::new(
            StubEncoder::linear(1),
            SolidRasterizer,
            NullBus,
            AttemptLog::new(),
        );
        let mut library = FrameLibrary::default();
        let sources = (1..=4u8)
            .map(|i| SourceFile::new(format!("shot{i}.jpg"), vec![i * 40]))
            .collect();
        let report = pipeline
            .ingest(&mut library, sources, AspectMode::Crop, &settings())
            .await;
        assert_eq!(report.added.len(), 4);
        // Four frames default to two whole cycles.
        assert_eq!(library.frame_count(), 8);

        let outcome = pipeline
            .produce_from_library(&library, &settings())
            .await
            .unwrap();
        assert_eq!(read_animation_control(&outcome.bytes), Some((8, 3)));
    }
}
