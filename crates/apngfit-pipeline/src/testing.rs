//! Deterministic encoder double for search and pipeline tests.

use std::{sync::Mutex, time::Duration};

use apngfit_container::{push_chunk, ANIMATION_CONTROL, PNG_SIGNATURE};
use apngfit_encoder::{encoder_error, ContainerEncoder, EncodeRequest};
use apngfit_types::Result;
use async_trait::async_trait;

use crate::generation::GenerationCounter;

/// Emits PNG-structured streams of exactly `palette * frames * k` bytes.
pub(crate) struct StubEncoder {
    k: usize,
    shrink_red: Option<u8>,
    fail: bool,
    with_actl: bool,
    advance: Option<GenerationCounter>,
    delay: Option<Duration>,
    calls: Mutex<Vec<u16>>,
}

impl StubEncoder {
    pub fn linear(k: usize) -> Self {
        Self {
            k,
            shrink_red: None,
            fail: false,
            with_actl: true,
            advance: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Output is 100x smaller when the first red byte equals `red`.
    pub fn shrink_when_red(k: usize, red: u8) -> Self {
        Self {
            shrink_red: Some(red),
            ..Self::linear(k)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::linear(1)
        }
    }

    pub fn without_actl(mut self) -> Self {
        self.with_actl = false;
        self
    }

    /// Start a newer generation on every call, superseding the caller.
    pub fn advancing(mut self, counter: GenerationCounter) -> Self {
        self.advance = Some(counter);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn palettes(&self) -> Vec<u16> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ContainerEncoder for StubEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(request.palette_size());
        if let Some(counter) = &self.advance {
            counter.advance();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(encoder_error("stub encoder failure"));
        }

        let frames = request.frame_count();
        let mut size = usize::from(request.palette_size()) * frames * self.k;
        let first_red = request.frames()[0].as_bytes()[0];
        if self.shrink_red == Some(first_red) {
            size /= 100;
        }
        Ok(synthetic_stream(frames as u32, size, self.with_actl))
    }
}

fn synthetic_stream(frames: u32, size: usize, with_actl: bool) -> Vec<u8> {
    let mut out = PNG_SIGNATURE.to_vec();
    push_chunk(&mut out, *b"IHDR", &[0u8; 13]);
    if with_actl {
        let mut actl = frames.to_be_bytes().to_vec();
        actl.extend_from_slice(&0u32.to_be_bytes());
        push_chunk(&mut out, ANIMATION_CONTROL, &actl);
    }
    let framing = out.len() + 12 + 12;
    push_chunk(&mut out, *b"IDAT", &vec![0u8; size.saturating_sub(framing)]);
    push_chunk(&mut out, *b"IEND", &[]);
    out
}
