/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use default_boxed::DefaultBoxed;

use crate::consts::*;
use crate::decoder_config::PixelFormat;
use crate::helpers::clip_u8;
use crate::structs::block_decoder::McuBuffer;
use crate::structs::tile_sink::{ImageInfo, Rect};

/// Scratch space for turning one MCU into a tile. One of these exists per thread
/// that composites, so they are allocated up front with the decoder or pipeline.
#[derive(DefaultBoxed)]
pub struct TileBuffer {
    rgb: [[u8; 3]; MAX_MCU_PIXELS],
    pixels: [u8; MAX_MCU_PIXELS * 3],
}

impl TileBuffer {
    /// Converts the MCU at pixel position (x, y) of the source image into a tile in
    /// the output format. Returns None if scaling reduced the tile to nothing.
    pub fn composite(
        &mut self,
        info: &ImageInfo,
        mcu: &McuBuffer,
        x: u32,
        y: u32,
    ) -> Option<(Rect, &[u8])> {
        // the MCU may overhang the right and bottom edges
        let rx = info.mcu_width.min(info.width - x) as usize;
        let ry = info.mcu_height.min(info.height - y) as usize;

        let gray_only = info.components == 1 || info.pixel_format == PixelFormat::Grayscale;
        if gray_only {
            self.luma_to_rgb(info, mcu, rx, ry);
        } else {
            self.ycbcr_to_rgb(info, mcu, rx, ry);
        }

        let scale = u32::from(info.scale);
        let out_w = rx >> scale;
        let out_h = ry >> scale;
        if out_w == 0 || out_h == 0 {
            return None;
        }

        let bpp = info.pixel_format.bytes_per_pixel();
        for oy in 0..out_h {
            for ox in 0..out_w {
                let rgb = self.sample(rx, ox, oy, scale);
                let o = (oy * out_w + ox) * bpp;
                match info.pixel_format {
                    PixelFormat::Rgb888 => self.pixels[o..o + 3].copy_from_slice(&rgb),
                    PixelFormat::Rgb565 => {
                        let v = (u16::from(rgb[0] >> 3) << 11)
                            | (u16::from(rgb[1] >> 2) << 5)
                            | u16::from(rgb[2] >> 3);
                        self.pixels[o..o + 2].copy_from_slice(&v.to_be_bytes());
                    }
                    PixelFormat::Grayscale => self.pixels[o] = rgb[0],
                }
            }
        }

        // coordinates fit in 16 bits since the frame header stores them that way
        let left = (x >> scale) as u16;
        let top = (y >> scale) as u16;
        let rect = Rect {
            left,
            right: left + (out_w - 1) as u16,
            top,
            bottom: top + (out_h - 1) as u16,
        };

        Some((rect, &self.pixels[..out_w * out_h * bpp]))
    }

    /// box average of the 2^scale square that maps to output pixel (ox, oy)
    #[inline(always)]
    fn sample(&self, stride: usize, ox: usize, oy: usize, scale: u32) -> [u8; 3] {
        if scale == 0 {
            return self.rgb[oy * stride + ox];
        }

        let s = 1usize << scale;
        let mut sum = [0u32; 3];
        for sy in 0..s {
            let row = ((oy << scale) + sy) * stride + (ox << scale);
            for p in &self.rgb[row..row + s] {
                sum[0] += u32::from(p[0]);
                sum[1] += u32::from(p[1]);
                sum[2] += u32::from(p[2]);
            }
        }

        let shift = 2 * scale;
        [
            (sum[0] >> shift) as u8,
            (sum[1] >> shift) as u8,
            (sum[2] >> shift) as u8,
        ]
    }

    fn luma_to_rgb(&mut self, info: &ImageInfo, mcu: &McuBuffer, rx: usize, ry: usize) {
        let msx = (info.mcu_width / 8) as usize;

        for iy in 0..ry {
            for ix in 0..rx {
                let block = &mcu.blocks[(iy / 8) * msx + ix / 8];
                let v = clip_u8(i32::from(block[(iy % 8) * 8 + ix % 8]));
                self.rgb[iy * rx + ix] = [v, v, v];
            }
        }
    }

    fn ycbcr_to_rgb(&mut self, info: &ImageInfo, mcu: &McuBuffer, rx: usize, ry: usize) {
        let msx = (info.mcu_width / 8) as usize;
        let msy = (info.mcu_height / 8) as usize;
        let luma_blocks = msx * msy;

        let cb_block = &mcu.blocks[luma_blocks];
        let cr_block = &mcu.blocks[luma_blocks + 1];

        for iy in 0..ry {
            // chroma is shared by 2 luma rows/columns when subsampled
            let cy = iy / msy;
            for ix in 0..rx {
                let cx = ix / msx;

                let luma = i32::from(mcu.blocks[(iy / 8) * msx + ix / 8][(iy % 8) * 8 + ix % 8]);
                let cb = i32::from(cb_block[cy * 8 + cx]) - 128;
                let cr = i32::from(cr_block[cy * 8 + cx]) - 128;

                self.rgb[iy * rx + ix] = [
                    clip_u8(luma + CR_TO_RED * cr / COLOR_ACCUMULATOR),
                    clip_u8(luma - (CB_TO_GREEN * cb + CR_TO_GREEN * cr) / COLOR_ACCUMULATOR),
                    clip_u8(luma + CB_TO_BLUE * cb / COLOR_ACCUMULATOR),
                ];
            }
        }
    }
}
