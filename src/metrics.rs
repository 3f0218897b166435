/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::time::Duration;

#[cfg(any(target_os = "windows", target_os = "linux"))]
use cpu_time::ThreadTime;

/// platform independent threadtime measurement
pub struct CpuTimeMeasure {
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    start: ThreadTime,
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    start: std::time::Instant,
}

impl CpuTimeMeasure {
    /// starts measuring the CPU time of the calling thread
    pub fn new() -> Self {
        Self {
            #[cfg(any(target_os = "windows", target_os = "linux"))]
            start: ThreadTime::now(),
            #[cfg(not(any(target_os = "windows", target_os = "linux")))]
            start: std::time::Instant::now(),
        }
    }

    /// CPU time used by this thread since `new`
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Counters collected while decoding a scan. In pipelined mode the worker keeps its
/// own copy which is merged into the decoder's once the worker has exited.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DecodeMetrics {
    mcus_decoded: u64,
    tiles_emitted: u64,
    tiles_queued: u64,
    tiles_composited_inline: u64,
    row_events: u64,
    cpu_time_worker_time: Duration,
}

impl DecodeMetrics {
    pub(crate) fn record_mcu_decoded(&mut self) {
        self.mcus_decoded += 1;
    }

    pub(crate) fn record_tile_emitted(&mut self) {
        self.tiles_emitted += 1;
    }

    pub(crate) fn record_tile_queued(&mut self) {
        self.tiles_queued += 1;
    }

    pub(crate) fn record_tile_composited_inline(&mut self) {
        self.tiles_composited_inline += 1;
    }

    pub(crate) fn record_row_event(&mut self) {
        self.row_events += 1;
    }

    pub(crate) fn record_cpu_worker_time(&mut self, duration: Duration) {
        self.cpu_time_worker_time += duration;
    }

    /// number of MCUs taken out of the entropy coded data
    pub fn mcus_decoded(&self) -> u64 {
        self.mcus_decoded
    }

    /// number of tiles handed to the tile sink
    pub fn tiles_emitted(&self) -> u64 {
        self.tiles_emitted
    }

    /// MCUs sent to the pipeline worker
    pub fn tiles_queued(&self) -> u64 {
        self.tiles_queued
    }

    /// MCUs the producer composited itself because the queue was full
    pub fn tiles_composited_inline(&self) -> u64 {
        self.tiles_composited_inline
    }

    /// number of row completion events delivered
    pub fn row_events(&self) -> u64 {
        self.row_events
    }

    /// CPU time spent on the pipeline worker thread
    pub fn get_cpu_time_worker_time(&self) -> Duration {
        self.cpu_time_worker_time
    }

    pub(crate) fn merge_from(&mut self, source_metrics: DecodeMetrics) {
        self.mcus_decoded += source_metrics.mcus_decoded;
        self.tiles_emitted += source_metrics.tiles_emitted;
        self.tiles_queued += source_metrics.tiles_queued;
        self.tiles_composited_inline += source_metrics.tiles_composited_inline;
        self.row_events += source_metrics.row_events;
        self.cpu_time_worker_time += source_metrics.cpu_time_worker_time;
    }
}

#[test]
fn test_merge_from() {
    let mut a = DecodeMetrics::default();
    a.record_mcu_decoded();
    a.record_tile_queued();

    let mut b = DecodeMetrics::default();
    b.record_tile_emitted();
    b.record_row_event();
    b.record_cpu_worker_time(Duration::from_millis(3));

    a.merge_from(b);
    assert_eq!(a.mcus_decoded(), 1);
    assert_eq!(a.tiles_emitted(), 1);
    assert_eq!(a.tiles_queued(), 1);
    assert_eq!(a.row_events(), 1);
    assert_eq!(a.get_cpu_time_worker_time(), Duration::from_millis(3));
}
