//! Shared fixtures for the integration suites

#![allow(dead_code)]

pub mod validators;

use checkfood_recognition::{InferenceError, ModelOutput, ModelRunner};
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::ArrayView4;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Backend returning a fixed output and counting its calls
pub struct FakeRunner {
    output: ModelOutput,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeRunner {
    pub fn new(output: ModelOutput) -> Self {
        Self {
            output,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn classification(scores: Vec<f32>) -> Self {
        Self::new(ModelOutput::Classification { scores })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelRunner for FakeRunner {
    fn run(&self, input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
        assert_eq!(input.shape()[0], 1);
        assert_eq!(input.shape()[1], 3);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.output.clone())
    }
}

/// Backend that fails every call
pub struct BrokenRunner;

impl ModelRunner for BrokenRunner {
    fn run(&self, _input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
        Err(InferenceError::Runtime("CUDA out of memory".to_string()))
    }
}

/// Backend whose first call panics while it holds the session lock
pub struct PanicOnceRunner {
    session: Mutex<()>,
    panicked: AtomicBool,
    inner: FakeRunner,
}

impl PanicOnceRunner {
    pub fn new(inner: FakeRunner) -> Self {
        Self {
            session: Mutex::new(()),
            panicked: AtomicBool::new(false),
            inner,
        }
    }
}

impl ModelRunner for PanicOnceRunner {
    fn run(&self, input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
        let _session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("segfault guard tripped in native runtime");
        }
        self.inner.run(input)
    }
}

/// A small encoded PNG photo
pub fn sample_photo() -> Vec<u8> {
    let img = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .expect("PNG encoding of an in-memory image");
    buf.into_inner()
}
