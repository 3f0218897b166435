/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use default_boxed::DefaultBoxed;
use log::debug;

use crate::decoder_config::DecoderConfig;
use crate::decoder_error::{err_exit_code, AddContext, ExitCode, Result};
use crate::helpers::catch_unwind_result;
use crate::jpeg::bit_reader::BitReader;
use crate::jpeg::input_window::InputWindow;
use crate::jpeg::jpeg_header::JpegHeader;
use crate::metrics::DecodeMetrics;
use crate::structs::block_decoder::{BlockDecoder, McuBuffer};
use crate::structs::pipeline::{Pipeline, SharedRowSink, SharedTileSink};
use crate::structs::table_arena::TableArena;
use crate::structs::tile_compositor::TileBuffer;
use crate::structs::tile_sink::{ImageInfo, RowSink, TileSink};
use crate::ByteSource;

/// How a decode that didn't fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// every MCU of the scan was delivered
    Completed,
    /// a sink asked to stop, the tiles delivered so far are valid
    Interrupted,
}

/// The part of decoding that differs between the single threaded and pipelined
/// modes: what happens to an MCU once its samples are reconstructed.
pub(crate) trait McuHandoff {
    /// buffer that the next MCU is decoded into
    fn mcu_buffer(&mut self) -> Result<&mut McuBuffer>;

    /// The buffer returned by the last `mcu_buffer` call now holds the MCU whose top
    /// left corner is at (x, y). Returns false if decoding should stop.
    fn mcu_ready(&mut self, x: u32, y: u32) -> Result<bool>;

    /// Output rows `first_row..first_row + row_count` are complete once every MCU
    /// handed over so far has been written. Returns false if decoding should stop.
    fn rows_ready(&mut self, first_row: u32, row_count: u32) -> Result<bool>;

    /// true once a sink on another thread has asked to stop
    fn stop_requested(&self) -> bool {
        false
    }
}

/// Everything the MCU loop needs, borrowed from the decoder for the length of one scan
pub(crate) struct ScanState<'a, R> {
    pub reader: &'a mut BitReader<R>,
    pub arena: &'a TableArena,
    pub block_decoder: &'a mut BlockDecoder,
    pub info: ImageInfo,
    pub restart_interval: u16,
    pub metrics: &'a mut DecodeMetrics,
}

impl<R: ByteSource> ScanState<'_, R> {
    /// Walks the MCUs in raster order, handing each one over once decoded. Row
    /// events are raised every `lineskip + 1` MCU rows and after the last one.
    pub fn decode<H: McuHandoff>(
        &mut self,
        handoff: &mut H,
        lineskip: u32,
    ) -> Result<DecodeOutcome> {
        let info = self.info;
        let mx = info.mcu_width;
        let my = info.mcu_height;
        let last_row = ((info.height - 1) / my) * my;
        let scale = u32::from(info.scale);

        let restart_interval = u32::from(self.restart_interval);
        let mut mcus_since_restart = 0u32;
        let mut restart_index = 0u16;
        let mut rows_pending = 0u32;

        let mut y = 0;
        while y < info.height {
            let mut x = 0;
            while x < info.width {
                if restart_interval != 0 && mcus_since_restart == restart_interval {
                    self.reader.restart(restart_index).context()?;
                    restart_index = restart_index.wrapping_add(1);
                    mcus_since_restart = 0;
                    self.block_decoder.reset_dc_predictors();
                }
                mcus_since_restart += 1;

                // nothing more is read from the source once a sink has refused a tile
                if handoff.stop_requested() {
                    return Ok(DecodeOutcome::Interrupted);
                }

                let mcu = handoff.mcu_buffer()?;
                self.block_decoder
                    .decode_mcu(self.reader, self.arena, mcu)
                    .context()?;
                self.metrics.record_mcu_decoded();

                #[cfg(feature = "detailed_tracing")]
                log::trace!("mcu at {0},{1} restart count {2}", x, y, mcus_since_restart);

                if !handoff.mcu_ready(x, y)? {
                    return Ok(DecodeOutcome::Interrupted);
                }

                x += mx;
            }

            if rows_pending == lineskip || y == last_row {
                let first_row = y - rows_pending * my;
                let end_row = y + my.min(info.height - y);

                // rows that vanish at reduced scale aren't reported
                let first_out = first_row >> scale;
                let end_out = end_row >> scale;
                if end_out > first_out && !handoff.rows_ready(first_out, end_out - first_out)? {
                    return Ok(DecodeOutcome::Interrupted);
                }

                rows_pending = 0;
            } else {
                rows_pending += 1;
            }

            y += my;
        }

        Ok(DecodeOutcome::Completed)
    }
}

/// Composites on the calling thread straight into the sinks
struct SyncHandoff<'a, 't, 'r> {
    mcu: &'a mut McuBuffer,
    tile: &'a mut TileBuffer,
    info: ImageInfo,
    tile_sink: &'a mut (dyn TileSink + 't),
    row_sink: Option<&'a mut (dyn RowSink + 'r)>,
    metrics: DecodeMetrics,
}

impl McuHandoff for SyncHandoff<'_, '_, '_> {
    fn mcu_buffer(&mut self) -> Result<&mut McuBuffer> {
        Ok(&mut *self.mcu)
    }

    fn mcu_ready(&mut self, x: u32, y: u32) -> Result<bool> {
        if let Some((rect, pixels)) = self.tile.composite(&self.info, self.mcu, x, y) {
            self.metrics.record_tile_emitted();
            return Ok(self.tile_sink.write_tile(&self.info, pixels, &rect));
        }
        Ok(true)
    }

    fn rows_ready(&mut self, first_row: u32, row_count: u32) -> Result<bool> {
        if let Some(row_sink) = self.row_sink.as_mut() {
            self.metrics.record_row_event();
            return Ok(row_sink.rows_complete(&self.info, first_row, row_count));
        }
        Ok(true)
    }
}

/// Decoder for one baseline JPEG stream at a time.
///
/// All buffers are allocated when the decoder is created. `prepare` parses the
/// headers, then one of the `decomp` calls runs the scan. Every decode, whether it
/// completes, is interrupted or fails, consumes the prepared state, so `prepare` has
/// to be called again before the next one. Since `prepare` skips anything before the
/// next start of image marker, a source holding several concatenated JPEGs can be
/// played back by alternating the two.
pub struct JpegDecoder<R> {
    reader: BitReader<R>,
    arena: TableArena,
    header: JpegHeader,
    config: DecoderConfig,
    info: ImageInfo,
    block_decoder: Option<BlockDecoder>,
    mcu: Box<McuBuffer>,
    tile: Box<TileBuffer>,
    metrics: DecodeMetrics,
}

impl<R: ByteSource> JpegDecoder<R> {
    /// Creates a decoder reading from `source`. Fails with `InvalidParameter` if the
    /// configuration is out of range.
    pub fn new(source: R, config: &DecoderConfig) -> Result<Self> {
        config.validate()?;

        Ok(JpegDecoder {
            reader: BitReader::new(InputWindow::new(source, config.input_buffer_size)),
            arena: TableArena::new(config.pool_size),
            header: JpegHeader::default(),
            config: config.clone(),
            info: ImageInfo::default(),
            block_decoder: None,
            mcu: McuBuffer::default_boxed(),
            tile: TileBuffer::default_boxed(),
            metrics: DecodeMetrics::default(),
        })
    }

    /// Reads the headers of the next image up to the start of its scan.
    pub fn prepare(&mut self) -> Result<()> {
        self.block_decoder = None;
        self.info = ImageInfo::default();
        self.arena.reset();
        self.reader.reset();

        self.header
            .parse(self.reader.window_mut(), &mut self.arena, &self.config)
            .context()?;

        let h = &self.header;
        let scale = self.config.scale;
        let width = u32::from(h.img_width);
        let height = u32::from(h.img_height);

        self.info = ImageInfo {
            width,
            height,
            output_width: width >> scale,
            output_height: height >> scale,
            scale,
            components: h.cmpc,
            mcu_width: h.mcu_width(),
            mcu_height: h.mcu_height(),
            pixel_format: self.config.pixel_format,
        };

        // at 1/8 scale each block becomes a single pixel, so only the DC term matters
        self.block_decoder = Some(BlockDecoder::new(h, self.config.simd_idct, scale == 3)?);

        // the tables are complete, nothing may be allocated while the scan is decoded
        self.arena.freeze();

        debug!(
            "prepared {0}x{1} output {2}x{3} {4:?}",
            self.info.width,
            self.info.height,
            self.info.output_width,
            self.info.output_height,
            self.info.pixel_format
        );

        Ok(())
    }

    fn take_block_decoder(&mut self) -> Result<BlockDecoder> {
        match self.block_decoder.take() {
            Some(b) => Ok(b),
            None => err_exit_code(
                ExitCode::InvalidParameter,
                "prepare must succeed before each decode",
            ),
        }
    }

    /// Decodes the scan on the calling thread. Each MCU is composited and handed to
    /// `tile_sink` as soon as it is decoded. `row_sink` is told about finished rows
    /// every `lineskip + 1` MCU rows.
    pub fn decomp(
        &mut self,
        tile_sink: &mut dyn TileSink,
        row_sink: Option<&mut dyn RowSink>,
        lineskip: u32,
    ) -> Result<DecodeOutcome> {
        let mut block_decoder = self.take_block_decoder()?;

        let mut handoff = SyncHandoff {
            mcu: &mut self.mcu,
            tile: &mut self.tile,
            info: self.info,
            tile_sink,
            row_sink,
            metrics: DecodeMetrics::default(),
        };

        let mut scan = ScanState {
            reader: &mut self.reader,
            arena: &self.arena,
            block_decoder: &mut block_decoder,
            info: self.info,
            restart_interval: self.header.rsti,
            metrics: &mut self.metrics,
        };

        let result = catch_unwind_result(|| scan.decode(&mut handoff, lineskip));
        self.metrics.merge_from(handoff.metrics);
        result
    }

    /// Decodes the scan with compositing and output moved to a worker thread, so
    /// the sinks run concurrently with the entropy decoding of later MCUs. Produces
    /// exactly the same tiles as [`JpegDecoder::decomp`], though tiles may reach the
    /// sink in a different order. Row events still only follow the tiles they cover.
    ///
    /// The sinks are shared with the pipeline's worker thread. It drops its handles
    /// before this returns, so the caller holds the only references again afterwards.
    /// Calls to the sinks never overlap, and none follow a call that returned false.
    pub fn decomp_multitask(
        &mut self,
        pipeline: &mut Pipeline,
        tile_sink: SharedTileSink,
        row_sink: Option<SharedRowSink>,
        lineskip: u32,
    ) -> Result<DecodeOutcome> {
        let mut block_decoder = self.take_block_decoder()?;

        let scan = ScanState {
            reader: &mut self.reader,
            arena: &self.arena,
            block_decoder: &mut block_decoder,
            info: self.info,
            restart_interval: self.header.rsti,
            metrics: &mut self.metrics,
        };

        pipeline.run(scan, &mut self.tile, tile_sink, row_sink, lineskip)
    }

    /// geometry of the prepared image
    pub fn image_info(&self) -> &ImageInfo {
        &self.info
    }

    /// width of the prepared image before scaling
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// height of the prepared image before scaling
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// 1 for grayscale, 3 for color
    pub fn component_count(&self) -> usize {
        self.info.components
    }

    /// MCUs between restart markers, 0 if the image has none
    pub fn restart_interval(&self) -> u16 {
        self.header.rsti
    }

    /// counters accumulated over every decode so far
    pub fn metrics(&self) -> &DecodeMetrics {
        &self.metrics
    }

    /// The byte source. Bytes already buffered by the decoder are not visible through it.
    pub fn source_mut(&mut self) -> &mut R {
        self.reader.window_mut().source_mut()
    }

    /// gives back the byte source, dropping anything still buffered
    pub fn into_source(self) -> R {
        self.reader.into_window().into_source()
    }
}
