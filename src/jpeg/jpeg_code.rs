/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// Start of Frame (size information), coding process: baseline DCT
pub const SOF0: u8 = 0xC0;

/// Start of Frame (size information), coding process: extended sequential DCT
pub const SOF1: u8 = 0xC1;

/// Start of Frame (size information), coding process: progressive DCT
#[cfg(test)]
pub const SOF2: u8 = 0xC2;

/// Huffman Table
pub const DHT: u8 = 0xC4;

/// Reserved for JPEG extensions, not a frame header
pub const JPG: u8 = 0xC8;

/// Start of Frame, lossless arithmetic coded (differential)
pub const SOF15: u8 = 0xCF;

/// Define arithmetic coding conditioning, occupies the gap in the SOF range
pub const DAC: u8 = 0xCC;

/// Restart 0 segment
pub const RST0: u8 = 0xD0;

/// Restart 7 segment
pub const RST7: u8 = 0xD7;

/// Start of Image
pub const SOI: u8 = 0xD8;

/// End of Image, or End of File
pub const EOI: u8 = 0xD9;

/// Start of Scan
pub const SOS: u8 = 0xDA;

/// Define Quantization Table
pub const DQT: u8 = 0xDB;

/// Define restart interval
pub const DRI: u8 = 0xDD;

/// Temporary private use marker, stands alone without a length
pub const TEM: u8 = 0x01;

/// true for any start of frame marker other than baseline
pub const fn is_unsupported_sof(marker: u8) -> bool {
    marker >= SOF1 && marker <= SOF15 && marker != DHT && marker != JPG && marker != DAC
}
