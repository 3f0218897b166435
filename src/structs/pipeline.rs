/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use default_boxed::DefaultBoxed;
use log::{debug, trace, warn};

use crate::decoder_config::{DecoderConfig, WorkerPriority};
use crate::decoder_error::{err_exit_code, DecodeError, ExitCode, Result};
use crate::helpers::catch_unwind_result;
use crate::metrics::{CpuTimeMeasure, DecodeMetrics};
use crate::structs::block_decoder::McuBuffer;
use crate::structs::jpeg_decoder::{DecodeOutcome, McuHandoff, ScanState};
use crate::structs::tile_compositor::TileBuffer;
use crate::structs::tile_sink::{ImageInfo, RowSink, TileSink};
use crate::ByteSource;

/// Tile sink handed to [`crate::JpegDecoder::decomp_multitask`]. The pipeline worker
/// outlives any single decode, so it holds a reference counted handle rather than a borrow.
pub type SharedTileSink = Arc<Mutex<dyn TileSink + Send>>;

/// Row sink handed to [`crate::JpegDecoder::decomp_multitask`]
pub type SharedRowSink = Arc<Mutex<dyn RowSink + Send>>;

/// Work for the output thread
enum Job {
    /// a new image starts, these are its sinks
    Begin {
        info: ImageInfo,
        tile_sink: SharedTileSink,
        row_sink: Option<SharedRowSink>,
    },
    /// composite the MCU and write it to the tile sink
    Mcu {
        buffer: Box<McuBuffer>,
        x: u32,
        y: u32,
    },
    /// every MCU sent before this has been written, tell the row sink
    Rows { first_row: u32, row_count: u32 },
    /// the image is done, report the metrics and let go of the sinks
    End,
    /// no more work, exit the thread
    Stop,
}

/// State shared between the decoding thread and the output thread
#[derive(Default)]
struct Shared {
    /// MCUs sent to the worker that it hasn't finished with yet
    in_flight: AtomicUsize,
    /// set once a sink returned false or panicked, no sink is called after this
    stopped: AtomicBool,
    /// set when the worker thread has exited for any reason
    worker_exited: AtomicBool,
    /// first failure seen on the worker
    failure: Mutex<Option<DecodeError>>,
    /// held for every sink call on either thread
    sink_lock: Mutex<()>,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// clears what the previous image left behind, the worker must be idle
    fn begin(&self) {
        self.stopped.store(false, Ordering::Release);
        if let Ok(mut f) = self.failure.lock() {
            *f = None;
        }
    }

    fn record_failure(&self, e: DecodeError) {
        self.stop();
        if let Ok(mut f) = self.failure.lock() {
            if f.is_none() {
                *f = Some(e);
            }
        }
    }

    fn take_failure(&self) -> Option<DecodeError> {
        match self.failure.lock() {
            Ok(mut f) => f.take(),
            Err(_) => Some(DecodeError::new(
                ExitCode::AssertionFailure,
                "pipeline failure state was poisoned",
            )),
        }
    }

    /// The lock guards no data, so a sink that panicked while it was held leaves
    /// nothing inconsistent behind.
    fn lock_sinks(&self) -> MutexGuard<'_, ()> {
        self.sink_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Output thread for [`crate::JpegDecoder::decomp_multitask`], together with its
/// preallocated buffers.
///
/// Holds `capacity + 1` MCU buffers, so the decoder always has one to decode into
/// while `capacity` of them wait for the worker. The worker thread is started by
/// `new` and serves every decode until the pipeline is dropped, so one pipeline
/// can be reused for frame after frame.
pub struct Pipeline {
    capacity: usize,
    shared: Arc<Shared>,
    job_tx: SyncSender<Job>,
    free_rx: Receiver<Box<McuBuffer>>,
    done_rx: Receiver<DecodeMetrics>,
    /// buffer the producer is decoding into, kept between decodes
    current: Option<Box<McuBuffer>>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Allocates the buffers and starts the worker thread at the configured priority.
    pub fn new(config: &DecoderConfig) -> Result<Self> {
        config.validate()?;

        let capacity = config.queue_capacity;
        let priority = config.worker_priority;

        // room for every MCU that can be in flight plus the row and end messages
        let (job_tx, job_rx) = sync_channel::<Job>(capacity + 2);
        let (free_tx, free_rx) = channel::<Box<McuBuffer>>();
        let (done_tx, done_rx) = channel::<DecodeMetrics>();

        for _ in 0..capacity + 1 {
            free_tx.send(McuBuffer::default_boxed())?;
        }

        let shared = Arc::new(Shared::default());

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("jpeg-pipeline".to_owned())
                .spawn(move || {
                    set_worker_priority(priority);

                    let mut tile = TileBuffer::default_boxed();
                    let r = catch_unwind_result(|| {
                        run_worker(&job_rx, &free_tx, &done_tx, &shared, &mut tile);
                        Ok(())
                    });
                    if let Err(e) = r {
                        shared.record_failure(e);
                    }
                    shared.worker_exited.store(true, Ordering::Release);
                })?
        };

        Ok(Pipeline {
            capacity,
            shared,
            job_tx,
            free_rx,
            done_rx,
            current: None,
            worker: Some(worker),
        })
    }

    /// number of MCUs that can be waiting for the worker at once
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn run<R: ByteSource>(
        &mut self,
        mut scan: ScanState<R>,
        inline_tile: &mut TileBuffer,
        tile_sink: SharedTileSink,
        row_sink: Option<SharedRowSink>,
        lineskip: u32,
    ) -> Result<DecodeOutcome> {
        if self.shared.worker_exited.load(Ordering::Acquire) {
            return err_exit_code(
                ExitCode::ChannelFailure,
                "pipeline worker is no longer running",
            );
        }

        self.shared.begin();

        let info = scan.info;
        let has_row_sink = row_sink.is_some();
        self.job_tx.send(Job::Begin {
            info,
            tile_sink: Arc::clone(&tile_sink),
            row_sink,
        })?;

        let mut handoff = PipelinedHandoff {
            current: &mut self.current,
            free_rx: &self.free_rx,
            job_tx: &self.job_tx,
            shared: &self.shared,
            capacity: self.capacity,
            tile: inline_tile,
            tile_sink: &tile_sink,
            info,
            has_row_sink,
            metrics: DecodeMetrics::default(),
        };

        let scan_result = catch_unwind_result(|| scan.decode(&mut handoff, lineskip));
        scan.metrics.merge_from(handoff.metrics);

        let finished = self.finish_frame();

        // a worker failure explains a broken channel better than the channel error does
        if let Some(e) = self.shared.take_failure() {
            return Err(e);
        }
        scan.metrics.merge_from(finished?);

        debug!(
            "pipeline done: queued={0} inline={1} worker_cpu={2}ms",
            scan.metrics.tiles_queued(),
            scan.metrics.tiles_composited_inline(),
            scan.metrics.get_cpu_time_worker_time().as_millis()
        );

        match scan_result? {
            DecodeOutcome::Completed if self.shared.is_stopped() => Ok(DecodeOutcome::Interrupted),
            outcome => Ok(outcome),
        }
    }

    /// The worker writes out everything queued before it answers, and lets go of
    /// the sinks before it does.
    fn finish_frame(&self) -> Result<DecodeMetrics> {
        self.job_tx.send(Job::End)?;
        Ok(self.done_rx.recv()?)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // if the worker is already gone the send fails, which is fine
        let _ = self.job_tx.send(Job::Stop);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("pipeline worker panicked");
            }
        }
    }
}

/// the image the worker is currently writing out
struct Frame {
    info: ImageInfo,
    tile_sink: SharedTileSink,
    row_sink: Option<SharedRowSink>,
    metrics: DecodeMetrics,
    cpu_time: CpuTimeMeasure,
}

impl Frame {
    fn finish(mut self) -> DecodeMetrics {
        self.metrics.record_cpu_worker_time(self.cpu_time.elapsed());
        self.metrics
    }
}

fn run_worker(
    job_rx: &Receiver<Job>,
    free_tx: &Sender<Box<McuBuffer>>,
    done_tx: &Sender<DecodeMetrics>,
    shared: &Shared,
    tile: &mut TileBuffer,
) {
    let mut frame: Option<Frame> = None;

    for job in job_rx.iter() {
        match job {
            Job::Begin {
                info,
                tile_sink,
                row_sink,
            } => {
                frame = Some(Frame {
                    info,
                    tile_sink,
                    row_sink,
                    metrics: DecodeMetrics::default(),
                    cpu_time: CpuTimeMeasure::new(),
                });
            }
            Job::Mcu { buffer, x, y } => {
                if let Some(f) = frame.as_mut() {
                    if !shared.is_stopped() {
                        let r = catch_unwind_result(|| {
                            write_mcu(
                                tile,
                                &buffer,
                                x,
                                y,
                                &f.info,
                                shared,
                                &f.tile_sink,
                                &mut f.metrics,
                            )
                        });
                        if let Err(e) = r {
                            shared.record_failure(e);
                        }
                    }
                }

                // the buffer has to be back in the free list before the slot is released
                if free_tx.send(buffer).is_err() {
                    return;
                }
                shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            Job::Rows {
                first_row,
                row_count,
            } => {
                if let Some(f) = frame.as_mut() {
                    if let Some(row_sink) = &f.row_sink {
                        let r = catch_unwind_result(|| {
                            write_rows(
                                &f.info,
                                first_row,
                                row_count,
                                shared,
                                row_sink,
                                &mut f.metrics,
                            )
                        });
                        if let Err(e) = r {
                            shared.record_failure(e);
                        }
                    }
                }
            }
            Job::End => {
                let metrics = frame.take().map(Frame::finish).unwrap_or_default();
                if done_tx.send(metrics).is_err() {
                    return;
                }
            }
            Job::Stop => return,
        }
    }
}

/// Composites one MCU and hands it to the sink. Returns false if the decode has
/// stopped, either now or earlier on the other thread.
#[allow(clippy::too_many_arguments)]
fn write_mcu(
    tile: &mut TileBuffer,
    mcu: &McuBuffer,
    x: u32,
    y: u32,
    info: &ImageInfo,
    shared: &Shared,
    tile_sink: &SharedTileSink,
    metrics: &mut DecodeMetrics,
) -> Result<bool> {
    let Some((rect, pixels)) = tile.composite(info, mcu, x, y) else {
        return Ok(true);
    };

    let _calls = shared.lock_sinks();

    // the other thread may have been told to stop while we waited for the lock
    if shared.is_stopped() {
        return Ok(false);
    }

    let Ok(mut sink) = tile_sink.lock() else {
        return err_exit_code(ExitCode::AssertionFailure, "tile sink lock poisoned");
    };

    metrics.record_tile_emitted();
    if !sink.write_tile(info, pixels, &rect) {
        // set before the lock is released so the other thread can't get a call in
        shared.stop();
        return Ok(false);
    }
    Ok(true)
}

fn write_rows(
    info: &ImageInfo,
    first_row: u32,
    row_count: u32,
    shared: &Shared,
    row_sink: &SharedRowSink,
    metrics: &mut DecodeMetrics,
) -> Result<bool> {
    let _calls = shared.lock_sinks();

    if shared.is_stopped() {
        return Ok(false);
    }

    let Ok(mut sink) = row_sink.lock() else {
        return err_exit_code(ExitCode::AssertionFailure, "row sink lock poisoned");
    };

    metrics.record_row_event();
    if !sink.rows_complete(info, first_row, row_count) {
        shared.stop();
        return Ok(false);
    }
    Ok(true)
}

fn set_worker_priority(priority: WorkerPriority) {
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    {
        let r = match priority {
            WorkerPriority::Low => {
                thread_priority::set_current_thread_priority(thread_priority::ThreadPriority::Min)
            }
            WorkerPriority::Normal => Ok(()),
            WorkerPriority::High => {
                thread_priority::set_current_thread_priority(thread_priority::ThreadPriority::Max)
            }
        };

        if let Err(e) = r {
            warn!("unable to set worker priority {0:?}: {1:?}", priority, e);
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    if priority != WorkerPriority::Normal {
        warn!("worker priority {0:?} is not supported on this platform", priority);
    }
}

/// Producer side of the pipeline
struct PipelinedHandoff<'a> {
    /// buffer being decoded into
    current: &'a mut Option<Box<McuBuffer>>,
    free_rx: &'a Receiver<Box<McuBuffer>>,
    job_tx: &'a SyncSender<Job>,
    shared: &'a Shared,
    capacity: usize,
    /// used when the queue is full
    tile: &'a mut TileBuffer,
    tile_sink: &'a SharedTileSink,
    info: ImageInfo,
    has_row_sink: bool,
    metrics: DecodeMetrics,
}

impl PipelinedHandoff<'_> {
    fn check_worker(&self) -> Result<()> {
        if self.shared.worker_exited.load(Ordering::Acquire) {
            return err_exit_code(ExitCode::ChannelFailure, "pipeline worker exited early");
        }
        Ok(())
    }
}

impl McuHandoff for PipelinedHandoff<'_> {
    fn stop_requested(&self) -> bool {
        self.shared.is_stopped()
    }

    fn mcu_buffer(&mut self) -> Result<&mut McuBuffer> {
        let buffer = match self.current.take() {
            Some(b) => b,
            // there is always one free since at most `capacity` are in flight
            None => self.free_rx.recv()?,
        };
        Ok(&mut **self.current.insert(buffer))
    }

    fn mcu_ready(&mut self, x: u32, y: u32) -> Result<bool> {
        if self.shared.is_stopped() {
            return Ok(false);
        }

        if self.shared.in_flight.load(Ordering::Acquire) < self.capacity {
            let Some(buffer) = self.current.take() else {
                return err_exit_code(ExitCode::AssertionFailure, "no MCU buffer to queue");
            };

            self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
            self.job_tx.send(Job::Mcu { buffer, x, y })?;
            self.metrics.record_tile_queued();
        } else {
            // the worker is behind, do this one ourselves rather than wait
            trace!("queue full, compositing MCU at {0},{1} inline", x, y);
            self.metrics.record_tile_composited_inline();

            let Some(buffer) = self.current.as_deref() else {
                return err_exit_code(ExitCode::AssertionFailure, "no MCU buffer to composite");
            };

            if !write_mcu(
                self.tile,
                buffer,
                x,
                y,
                &self.info,
                self.shared,
                self.tile_sink,
                &mut self.metrics,
            )? {
                return Ok(false);
            }
        }

        Ok(!self.shared.is_stopped())
    }

    fn rows_ready(&mut self, first_row: u32, row_count: u32) -> Result<bool> {
        if !self.has_row_sink {
            return Ok(!self.shared.is_stopped());
        }

        // the rows are only complete once the worker has written everything queued
        while self.shared.in_flight.load(Ordering::Acquire) != 0 {
            if self.shared.is_stopped() {
                return Ok(false);
            }
            self.check_worker()?;
            thread::yield_now();
        }

        if self.shared.is_stopped() {
            return Ok(false);
        }

        self.job_tx.send(Job::Rows {
            first_row,
            row_count,
        })?;
        Ok(true)
    }
}
