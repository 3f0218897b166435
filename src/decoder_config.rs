/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::decoder_error::{err_exit_code, ExitCode, Result};

/// Layout of the pixels handed to the tile sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 3 bytes per pixel, R then G then B
    #[default]
    Rgb888,
    /// 2 bytes per pixel, 5-6-5 packed, most significant byte first
    Rgb565,
    /// 1 byte per pixel, the luma channel only
    Grayscale,
}

impl PixelFormat {
    /// number of bytes each pixel occupies in a tile
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Grayscale => 1,
        }
    }
}

/// Scheduling priority of the pipeline worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerPriority {
    /// Low priority thread
    Low,
    /// Normal priority thread, we don't touch the priority of these threads.
    #[default]
    Normal,
    /// High priority thread
    High,
}

/// Options that control memory use, output and speed of the decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// size in bytes of the arena that holds the quantization and Huffman tables
    pub pool_size: usize,

    /// size of the scratch buffer that is filled from the byte source
    pub input_buffer_size: usize,

    /// use a 256 entry direct lookup table for Huffman codes of 8 bits or less
    pub fast_huffman: bool,

    /// use the 8 lane SIMD inverse DCT instead of the scalar one. Output is identical.
    pub simd_idct: bool,

    /// output is reduced by 2^scale in each direction (0 = full size, 3 = 1/8)
    pub scale: u8,

    /// format of the pixels passed to the tile sink
    pub pixel_format: PixelFormat,

    /// maximum jpeg width
    pub max_width: u32,

    /// maximum jpeg height
    pub max_height: u32,

    /// maximum number of MCUs queued to the pipeline worker before the producer
    /// starts compositing on its own thread
    pub queue_capacity: usize,

    /// priority of the pipeline worker thread
    pub worker_priority: WorkerPriority,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            pool_size: 8192,
            input_buffer_size: 512,
            fast_huffman: true,
            simd_idct: true,
            scale: 0,
            pixel_format: PixelFormat::Rgb888,
            max_width: u16::MAX as u32,
            max_height: u16::MAX as u32,
            queue_capacity: 24,
            worker_priority: WorkerPriority::Normal,
        }
    }
}

impl DecoderConfig {
    /// smallest footprint: no Huffman lookup tables, a small arena and a short queue
    pub fn compact() -> Self {
        Self {
            pool_size: 3100,
            input_buffer_size: 512,
            fast_huffman: false,
            simd_idct: false,
            queue_capacity: 8,
            ..Self::default()
        }
    }

    /// checks that the values are in range before they are used to size buffers
    pub fn validate(&self) -> Result<()> {
        if self.scale > 3 {
            return err_exit_code(
                ExitCode::InvalidParameter,
                format!("scale {0} must be between 0 and 3", self.scale),
            );
        }

        if self.input_buffer_size < 2 {
            return err_exit_code(
                ExitCode::InvalidParameter,
                "input buffer must hold at least 2 bytes",
            );
        }

        if self.queue_capacity == 0 {
            return err_exit_code(
                ExitCode::InvalidParameter,
                "pipeline queue needs at least one entry",
            );
        }

        Ok(())
    }
}

#[test]
fn test_validate() {
    assert!(DecoderConfig::default().validate().is_ok());
    assert!(DecoderConfig::compact().validate().is_ok());

    let c = DecoderConfig {
        scale: 4,
        ..DecoderConfig::default()
    };
    assert_eq!(
        c.validate().unwrap_err().exit_code(),
        ExitCode::InvalidParameter
    );

    let c = DecoderConfig {
        queue_capacity: 0,
        ..DecoderConfig::default()
    };
    assert!(c.validate().is_err());
}
