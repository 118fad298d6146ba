//! Background filter worker and the preview handoff context.
//!
//! A detached thread runs the selected backend and publishes partial
//! output through a shared [`PreviewContext`]: a frame buffer guarded by a
//! mutex, a dirty flag the consumer polls, and a one-shot upload signal
//! that gates the GPU backend between faces. CPU backends never block on
//! the consumer; the GPU backend must not overwrite the destination while
//! the consumer is still reading it, so it waits for the signal after
//! every face.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::error::FilterError;
use crate::filter::{self, ProgressUpdate};

/// Which filter backend the worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Direct angular convolution.
    Direct,
    /// Spherical-harmonic projection and reconstruction.
    Sh,
    /// Per-face offload to the wgpu executor.
    #[cfg(feature = "gpu")]
    Gpu,
}

/// Read-only view of the latest published frame.
#[derive(Debug)]
pub struct FrameView<'a> {
    /// Frame bytes in the input's packing layout.
    pub data: &'a [u8],
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Color channels per pixel.
    pub channels: u8,
}

/// Shared state between the filter worker and the preview consumer.
///
/// The dirty flag starts `true` so the consumer performs an initial
/// upload (of the zeroed frame) before any filter output exists.
#[derive(Debug)]
pub struct PreviewContext {
    width: u32,
    height: u32,
    channels: u8,
    frame: Mutex<Vec<u8>>,
    dirty: AtomicBool,
    finished: AtomicBool,
    failed: AtomicBool,
    should_terminate: AtomicBool,
    completed: AtomicUsize,
    total: AtomicUsize,
    uploaded_tx: SyncSender<()>,
    uploaded_rx: Mutex<Receiver<()>>,
}

impl PreviewContext {
    /// Create the shared context for an image of the given shape.
    #[must_use]
    pub fn new(width: u32, height: u32, channels: u8) -> Arc<Self> {
        // Capacity 1 rather than a pure rendezvous: an upload that
        // completes in the gap between the worker publishing and blocking
        // must not be lost, or the worker would wait forever.
        let (uploaded_tx, uploaded_rx) = mpsc::sync_channel(1);
        let len = width as usize * height as usize * channels as usize;
        Arc::new(Self {
            width,
            height,
            channels,
            frame: Mutex::new(vec![0; len]),
            dirty: AtomicBool::new(true),
            finished: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            should_terminate: AtomicBool::new(false),
            completed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            uploaded_tx,
            uploaded_rx: Mutex::new(uploaded_rx),
        })
    }

    /// Whether a fresh frame is waiting for the consumer.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Hand the current frame to `upload` if the dirty flag was set,
    /// clearing it. Returns the closure result, or `None` when there was
    /// nothing new.
    pub fn take_frame<R>(
        &self,
        upload: impl FnOnce(FrameView<'_>) -> R,
    ) -> Option<R> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return None;
        }
        let frame = self
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Some(upload(FrameView {
            data: &frame,
            width: self.width,
            height: self.height,
            channels: self.channels,
        }))
    }

    /// Raise the one-shot upload signal for the GPU backend.
    ///
    /// Like a condition-variable signal, this is lost when the worker is
    /// not (and will not be) waiting; the channel's single slot absorbs
    /// the benign case where the upload wins the race to the wait.
    pub fn notify_uploaded(&self) {
        let _ = self.uploaded_tx.try_send(());
    }

    /// Whether the worker has completed its pass.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Whether the pass ended in an error (details go to the log).
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Fraction of the pass completed, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.completed.load(Ordering::Relaxed) as f32 / total as f32
    }

    /// Ask the pass to stop.
    ///
    /// Advisory only: the detached worker is free to complete on its own
    /// and the drivers do not poll this; process teardown is the hard
    /// stop.
    pub fn request_termination(&self) {
        self.should_terminate.store(true, Ordering::Release);
    }

    /// Whether termination has been requested.
    #[must_use]
    pub fn termination_requested(&self) -> bool {
        self.should_terminate.load(Ordering::Acquire)
    }

    /// Publish `bytes` as the latest frame and mark it dirty.
    pub(crate) fn publish(&self, bytes: &[u8]) {
        {
            let mut frame = self
                .frame
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            frame.copy_from_slice(bytes);
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Publish only when the consumer has taken the previous frame.
    ///
    /// Keeps the per-texel CPU ticks cheap: between consumer polls this is
    /// a single atomic load.
    pub(crate) fn publish_if_consumed(&self, bytes: &[u8]) {
        if !self.dirty.load(Ordering::Acquire) {
            self.publish(bytes);
        }
    }

    /// Block until the consumer raises the upload signal.
    pub(crate) fn wait_uploaded(&self) {
        let rx = self
            .uploaded_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = rx.recv();
    }

    fn record_progress(&self, completed: usize, total: usize) {
        self.completed.store(completed, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// Spawn a detached worker running `backend` over `input`.
///
/// The worker owns the input and output buffers; the returned context is
/// the only channel back to it. On completion the final frame is published
/// and the finished flag set. Errors inside the pass are logged, not
/// returned — there is nobody left on this side to return them to.
///
/// # Errors
///
/// `InvalidDimensions`/`UnsupportedLayout` when the arguments fail the
/// driver contract (checked here, synchronously, so the caller learns
/// about bad input before a thread exists), `ThreadSpawn` when the OS
/// refuses the thread.
pub fn spawn_filter_worker(
    input: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    backend: Backend,
) -> Result<Arc<PreviewContext>, FilterError> {
    // Reuse the driver validation so failures surface synchronously,
    // before a thread exists.
    filter::validate_pass(&input, &input, width, height, channels)?;

    let context = PreviewContext::new(width, height, channels);
    let worker_context = Arc::clone(&context);
    let handle = std::thread::Builder::new()
        .name("irr-filter".into())
        .spawn(move || {
            run_pass(
                &input,
                width,
                height,
                channels,
                backend,
                &worker_context,
            );
        })
        .map_err(FilterError::ThreadSpawn)?;
    // Detached: the worker completes on its own, process exit tears it
    // down.
    drop(handle);
    Ok(context)
}

/// Worker body: run the backend with the publishing progress hook.
fn run_pass(
    input: &[u8],
    width: u32,
    height: u32,
    channels: u8,
    backend: Backend,
    context: &Arc<PreviewContext>,
) {
    let mut output = vec![0u8; input.len()];
    let started = Instant::now();

    let result = match backend {
        Backend::Direct => {
            let mut on_tick = |p: ProgressUpdate<'_>| {
                context.record_progress(p.completed, p.total);
                context.publish_if_consumed(p.output);
            };
            filter::filter_direct(
                input,
                &mut output,
                width,
                height,
                channels,
                Some(&mut on_tick),
            )
        }
        Backend::Sh => {
            let mut on_tick = |p: ProgressUpdate<'_>| {
                context.record_progress(p.completed, p.total);
                context.publish_if_consumed(p.output);
            };
            filter::filter_sh(
                input,
                &mut output,
                width,
                height,
                channels,
                Some(&mut on_tick),
            )
        }
        #[cfg(feature = "gpu")]
        Backend::Gpu => {
            let mut on_tick = |p: ProgressUpdate<'_>| {
                context.record_progress(p.completed, p.total);
                // Publish unconditionally, then hold this face until the
                // consumer has uploaded it: the next face reuses the
                // destination buffer.
                context.publish(p.output);
                context.wait_uploaded();
            };
            filter::filter_gpu(
                input,
                &mut output,
                width,
                height,
                channels,
                Some(&mut on_tick),
            )
        }
    };

    match result {
        Ok(()) => {
            log::info!(
                "{backend:?} filter pass completed in {:.2?}",
                started.elapsed()
            );
            context.publish(&output);
        }
        Err(e) => {
            log::error!("{backend:?} filter pass failed: {e}");
            context.failed.store(true, Ordering::Release);
        }
    }
    context.finish();
}
