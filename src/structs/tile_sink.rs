/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::decoder_config::PixelFormat;

/// Rectangle in output pixel coordinates. All four edges are inclusive, so a
/// single pixel at the origin is `Rect { left: 0, right: 0, top: 0, bottom: 0 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// first column
    pub left: u16,
    /// last column
    pub right: u16,
    /// first row
    pub top: u16,
    /// last row
    pub bottom: u16,
}

impl Rect {
    /// number of pixels in each row of the rectangle
    pub fn width(&self) -> usize {
        usize::from(self.right - self.left) + 1
    }

    /// number of rows in the rectangle
    pub fn height(&self) -> usize {
        usize::from(self.bottom - self.top) + 1
    }

    /// number of pixels covered
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }
}

/// Geometry of the image being decoded, available to sinks with every callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageInfo {
    /// width of the encoded image
    pub width: u32,
    /// height of the encoded image
    pub height: u32,
    /// width of the image after scaling, all tile coordinates are in this space
    pub output_width: u32,
    /// height of the image after scaling
    pub output_height: u32,
    /// output is reduced by 2^scale in each direction
    pub scale: u8,
    /// 1 for grayscale, 3 for YCbCr
    pub components: usize,
    /// width in pixels of one MCU before scaling (8 or 16)
    pub mcu_width: u32,
    /// height in pixels of one MCU before scaling (8 or 16)
    pub mcu_height: u32,
    /// layout of the pixels passed to [`TileSink::write_tile`]
    pub pixel_format: PixelFormat,
}

impl ImageInfo {
    /// bytes needed to hold the whole output image in the configured format
    pub fn output_size(&self) -> usize {
        self.output_width as usize
            * self.output_height as usize
            * self.pixel_format.bytes_per_pixel()
    }
}

/// Receives the decoded pixels of each MCU.
///
/// `pixels` holds `rect.width() * rect.height()` pixels, packed row after row
/// without padding. Returning `false` stops the decode, which then ends with
/// [`crate::DecodeOutcome::Interrupted`].
pub trait TileSink {
    /// Called once per MCU with its pixels in output coordinates. Returns false to stop.
    fn write_tile(&mut self, info: &ImageInfo, pixels: &[u8], rect: &Rect) -> bool;
}

impl<F: FnMut(&ImageInfo, &[u8], &Rect) -> bool> TileSink for F {
    fn write_tile(&mut self, info: &ImageInfo, pixels: &[u8], rect: &Rect) -> bool {
        self(info, pixels, rect)
    }
}

/// Notified once a band of output rows has been fully written to the tile sink.
/// Returning `false` stops the decode the same way as the tile sink does.
pub trait RowSink {
    /// Output rows `first_row..first_row + row_count` are final. Returns false to stop.
    fn rows_complete(&mut self, info: &ImageInfo, first_row: u32, row_count: u32) -> bool;
}

impl<F: FnMut(&ImageInfo, u32, u32) -> bool> RowSink for F {
    fn rows_complete(&mut self, info: &ImageInfo, first_row: u32, row_count: u32) -> bool {
        self(info, first_row, row_count)
    }
}

#[test]
fn test_rect_dimensions() {
    let r = Rect {
        left: 16,
        right: 31,
        top: 8,
        bottom: 15,
    };
    assert_eq!((r.width(), r.height(), r.area()), (16, 8, 128));
    assert_eq!(Rect::default().area(), 1);
}
