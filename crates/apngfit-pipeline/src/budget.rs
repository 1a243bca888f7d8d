//! Size-budgeted search over palette sizes and posterization depths.
//!
//! Attempts run strictly in order and the first artifact at or under the
//! budget wins:
//!
//! 1. the quality tier's palette ladder (floored at `min_palette`),
//! 2. every other allowed palette size, most colours first,
//! 3. for each allowed posterization depth, mildest first, the full allowed
//!    palette set against the posterized buffers.
//!
//! When nothing fits, one more encode runs with the most aggressive allowed
//! settings and the smallest artifact seen is returned as a budget miss.

use std::time::Instant;

use apngfit_bus::EventBus;
use apngfit_container::{set_loop_count, PatchOutcome};
use apngfit_encoder::{ContainerEncoder, EncodeRequest};
use apngfit_ops::AttemptLog;
use apngfit_types::{
    events::{EventPayload, PipelineEvent},
    frame::PixelBuffer,
    quality::{allowed_depths, allowed_palettes, QualityTier},
    telemetry::{AttemptRecord, SearchStage},
    ApngFitError, Result,
};
use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    generation::GenerationToken, posterize::posterize_all, sequence::FrameSequence,
    settings::EncodeSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedAttempt {
    pub stage: SearchStage,
    pub palette_size: u16,
    pub posterize_bits: Option<u8>,
}

/// Every attempt the search may make, in order, plus the fallback settings.
#[derive(Debug, Clone)]
pub struct SearchPlan {
    attempts: Vec<PlannedAttempt>,
    fallback: PlannedAttempt,
}

impl SearchPlan {
    pub fn new(quality: QualityTier, min_palette: u16, posterize_limit: Option<u8>) -> Result<Self> {
        let allowed = allowed_palettes(min_palette);
        let Some(&lowest_palette) = allowed.last() else {
            return Err(ApngFitError::Configuration(format!(
                "minimum palette {min_palette} excludes every palette size"
            )));
        };

        let tier: Vec<u16> = quality
            .palette_ladder()
            .iter()
            .copied()
            .filter(|&size| size >= min_palette)
            .collect();

        let mut attempts: Vec<PlannedAttempt> = tier
            .iter()
            .map(|&palette_size| PlannedAttempt {
                stage: SearchStage::TierLadder,
                palette_size,
                posterize_bits: None,
            })
            .collect();

        attempts.extend(
            allowed
                .iter()
                .filter(|size| !tier.contains(size))
                .map(|&palette_size| PlannedAttempt {
                    stage: SearchStage::RemainingPalettes,
                    palette_size,
                    posterize_bits: None,
                }),
        );

        let depths = allowed_depths(posterize_limit);
        for &bits in &depths {
            attempts.extend(allowed.iter().map(|&palette_size| PlannedAttempt {
                stage: SearchStage::Posterized,
                palette_size,
                posterize_bits: Some(bits),
            }));
        }

        Ok(Self {
            attempts,
            fallback: PlannedAttempt {
                stage: SearchStage::Fallback,
                palette_size: lowest_palette,
                posterize_bits: depths.last().copied(),
            },
        })
    }

    pub fn attempts(&self) -> &[PlannedAttempt] {
        &self.attempts
    }

    pub fn fallback(&self) -> PlannedAttempt {
        self.fallback
    }
}

/// The produced artifact. `met_budget == false` is a normal outcome carrying
/// the smallest artifact found.
#[derive(Debug, Clone)]
pub struct ArtifactOutcome {
    pub generation: u64,
    pub met_budget: bool,
    pub bytes: Vec<u8>,
    pub size_bytes: usize,
    pub size_limit: usize,
    pub stage: SearchStage,
    pub palette_size: u16,
    pub posterize_bits: Option<u8>,
    pub loop_patch: PatchOutcome,
    pub attempts: usize,
}

impl ArtifactOutcome {
    pub fn shortfall_bytes(&self) -> usize {
        self.size_bytes.saturating_sub(self.size_limit)
    }
}

struct Candidate {
    planned: PlannedAttempt,
    bytes: Vec<u8>,
    loop_patch: PatchOutcome,
}

/// One budgeted search bound to a generation token.
pub struct BudgetSearch<'a, E: ?Sized, B: ?Sized> {
    encoder: &'a E,
    bus: &'a B,
    log: &'a AttemptLog,
    token: &'a GenerationToken,
}

impl<'a, E, B> BudgetSearch<'a, E, B>
where
    E: ContainerEncoder + ?Sized,
    B: EventBus + ?Sized,
{
    pub fn new(encoder: &'a E, bus: &'a B, log: &'a AttemptLog, token: &'a GenerationToken) -> Self {
        Self {
            encoder,
            bus,
            log,
            token,
        }
    }

    pub async fn run(
        &self,
        sequence: &FrameSequence,
        settings: &EncodeSettings,
    ) -> Result<ArtifactOutcome> {
        if sequence.is_empty() {
            return Err(ApngFitError::EmptyInput);
        }
        let plan = SearchPlan::new(
            settings.quality,
            settings.min_palette,
            settings.posterize_limit,
        )?;
        let originals = sequence.buffers();
        let delays = sequence.delays_ms();
        let total = plan.attempts().len() + 1;

        info!(
            "Budgeted encode gen={} frames={} quality={} limit={}B ({} planned attempts)",
            self.token.id(),
            sequence.len(),
            settings.quality,
            settings.size_limit,
            plan.attempts().len()
        );
        self.progress(5, None).await?;

        let mut posterized: Option<(u8, Vec<PixelBuffer>)> = None;
        let mut best: Option<Candidate> = None;
        let mut stage = None;

        for (idx, planned) in plan.attempts().iter().enumerate() {
            if stage != Some(planned.stage) {
                info!("Search stage {:?}", planned.stage);
                stage = Some(planned.stage);
            }
            let buffers = buffers_for(planned.posterize_bits, &originals, &mut posterized);
            let candidate = self.attempt(planned, buffers, &delays, settings).await?;
            self.progress(progress_after(idx + 1, total), Some(planned.stage))
                .await?;

            if candidate.bytes.len() <= settings.size_limit {
                return self.finish(candidate, true, idx + 1, settings).await;
            }
            if best
                .as_ref()
                .map_or(true, |b| candidate.bytes.len() < b.bytes.len())
            {
                best = Some(candidate);
            }
            if !settings.pacing.is_zero() {
                sleep(settings.pacing).await;
            }
        }

        let fallback = plan.fallback();
        warn!(
            "No setting met {}B; falling back to palette {} posterize {:?}",
            settings.size_limit, fallback.palette_size, fallback.posterize_bits
        );
        self.log
            .note(self.token.id(), "budget not met; fallback encode used")
            .await;
        let buffers = buffers_for(fallback.posterize_bits, &originals, &mut posterized);
        let last = self.attempt(&fallback, buffers, &delays, settings).await?;
        let chosen = match best {
            Some(b) if b.bytes.len() < last.bytes.len() => b,
            _ => last,
        };
        let met_budget = chosen.bytes.len() <= settings.size_limit;
        self.finish(chosen, met_budget, total, settings).await
    }

    async fn attempt(
        &self,
        planned: &PlannedAttempt,
        buffers: Vec<PixelBuffer>,
        delays: &[u32],
        settings: &EncodeSettings,
    ) -> Result<Candidate> {
        self.token.ensure_current()?;
        let request = EncodeRequest::new(
            buffers,
            delays.to_vec(),
            settings.canvas_width,
            settings.canvas_height,
            planned.palette_size,
        )?;

        let started = Instant::now();
        let raw = self.encoder.encode(&request).await?;
        let (bytes, loop_patch) = set_loop_count(raw, settings.loops);
        let size_bytes = bytes.len();

        debug!(
            "Attempt {:?} palette={} posterize={:?} -> {} bytes",
            planned.stage, planned.palette_size, planned.posterize_bits, size_bytes
        );
        let record = AttemptRecord {
            stage: planned.stage,
            palette_size: planned.palette_size,
            posterize_bits: planned.posterize_bits,
            size_bytes,
            within_budget: size_bytes <= settings.size_limit,
            elapsed_ms: started.elapsed().as_millis() as u64,
            recorded_at: Utc::now(),
        };
        self.log.record(self.token.id(), record.clone()).await;
        self.bus
            .publish(PipelineEvent::new(
                self.token.id(),
                EventPayload::Attempt(record),
            ))
            .await?;

        Ok(Candidate {
            planned: *planned,
            bytes,
            loop_patch,
        })
    }

    async fn finish(
        &self,
        candidate: Candidate,
        met_budget: bool,
        attempts: usize,
        settings: &EncodeSettings,
    ) -> Result<ArtifactOutcome> {
        // A newer request owns the output now; drop this result.
        self.token.ensure_current()?;

        if !candidate.loop_patch.is_patched() {
            warn!(
                "Loop count {} not applied: {:?}",
                settings.loops, candidate.loop_patch
            );
        }
        let size_bytes = candidate.bytes.len();
        info!(
            "Budgeted encode finished: {} bytes (limit {}), met_budget={}, palette={} posterize={:?}",
            size_bytes,
            settings.size_limit,
            met_budget,
            candidate.planned.palette_size,
            candidate.planned.posterize_bits
        );
        self.progress(100, Some(candidate.planned.stage)).await?;
        self.bus
            .publish(PipelineEvent::new(
                self.token.id(),
                EventPayload::Finished {
                    met_budget,
                    size_bytes,
                },
            ))
            .await?;

        Ok(ArtifactOutcome {
            generation: self.token.id(),
            met_budget,
            bytes: candidate.bytes,
            size_bytes,
            size_limit: settings.size_limit,
            stage: candidate.planned.stage,
            palette_size: candidate.planned.palette_size,
            posterize_bits: candidate.planned.posterize_bits,
            loop_patch: candidate.loop_patch,
            attempts,
        })
    }

    async fn progress(&self, percent: u8, stage: Option<SearchStage>) -> Result<()> {
        self.bus
            .publish(PipelineEvent::progress(self.token.id(), percent, stage))
            .await
    }
}

/// Original buffers, or the posterized set for `bits` (computed once per depth).
fn buffers_for(
    bits: Option<u8>,
    originals: &[PixelBuffer],
    cache: &mut Option<(u8, Vec<PixelBuffer>)>,
) -> Vec<PixelBuffer> {
    let Some(bits) = bits else {
        return originals.to_vec();
    };
    match cache {
        Some((cached_bits, buffers)) if *cached_bits == bits => buffers.clone(),
        _ => {
            let buffers = posterize_all(originals, bits);
            *cache = Some((bits, buffers.clone()));
            buffers
        }
    }
}

fn progress_after(done: usize, total: usize) -> u8 {
    let pct = 10 + done * 85 / total.max(1);
    pct.min(95) as u8
}
