/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::structs::tile_sink::{ImageInfo, Rect, TileSink};

/// Tile sink that assembles the whole output image in memory, row after row
/// without padding, in the pixel format of the decode.
pub struct FrameBuffer {
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// allocates a zeroed image sized for the output of a prepared decoder
    pub fn new(info: &ImageInfo) -> Self {
        FrameBuffer {
            width: info.output_width as usize,
            height: info.output_height as usize,
            bytes_per_pixel: info.pixel_format.bytes_per_pixel(),
            data: vec![0; info.output_size()],
        }
    }

    /// width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// size of one pixel in the configured format
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// the pixels, row after row
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// takes the pixels out of the frame
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl TileSink for FrameBuffer {
    fn write_tile(&mut self, _info: &ImageInfo, pixels: &[u8], rect: &Rect) -> bool {
        let left = usize::from(rect.left);
        let top = usize::from(rect.top);

        // a tile from a different image would write out of bounds, stop instead
        if left + rect.width() > self.width || top + rect.height() > self.height {
            return false;
        }

        let row_bytes = rect.width() * self.bytes_per_pixel;
        let stride = self.width * self.bytes_per_pixel;

        for (y, src) in pixels.chunks_exact(row_bytes).take(rect.height()).enumerate() {
            let start = (top + y) * stride + left * self.bytes_per_pixel;
            self.data[start..start + row_bytes].copy_from_slice(src);
        }

        true
    }
}
