/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

pub const COLOR_CHANNEL_NUM_BLOCK_TYPES: usize = 3;

/// maximum number of 8x8 blocks in one MCU (4 luma + 2 chroma for 4:2:0)
pub const MAX_BLOCKS_PER_MCU: usize = 6;

/// largest MCU is 16x16 pixels
pub const MAX_MCU_PIXELS: usize = 16 * 16;

pub const ZIGZAG_TO_RASTER: [u8; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Arai-Agui-Nakajima prescale factors in raster order, scaled by 8192.
///
/// Each entry is s(u)*s(v) where s(0) = 1 and s(k) = sqrt(2)*cos(k*pi/16). These are
/// folded into the quantization tables when they are loaded.
pub const ARAI_SCALE_FACTORS: [u16; 64] = [
    8192, 11362, 10703, 9632, 8192, 6436, 4433, 2260, //
    11362, 15760, 14846, 13361, 11362, 8927, 6149, 3134, //
    10703, 14846, 13984, 12585, 10703, 8409, 5792, 2953, //
    9632, 13361, 12585, 11326, 9632, 7568, 5213, 2657, //
    8192, 11362, 10703, 9632, 8192, 6436, 4433, 2260, //
    6436, 8927, 8409, 7568, 6436, 5057, 3483, 1775, //
    4433, 6149, 5792, 5213, 4433, 3483, 2399, 1223, //
    2260, 3134, 2953, 2657, 2260, 1775, 1223, 623,
];

/// fixed point accumulator used for YCbCr to RGB conversion
pub const COLOR_ACCUMULATOR: i32 = 1024;

pub const CR_TO_RED: i32 = 1435; // 1.402 * 1024
pub const CB_TO_GREEN: i32 = 352; // 0.344 * 1024
pub const CR_TO_GREEN: i32 = 731; // 0.714 * 1024
pub const CB_TO_BLUE: i32 = 1814; // 1.772 * 1024
