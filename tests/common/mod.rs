/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Minimal baseline JPEG encoder used to generate test images with known content.
//! Uses the example tables from Annex K of the JPEG standard and a floating point
//! forward DCT, so it is slow but easy to check.

#![allow(dead_code)]

use std::f64::consts::PI;

pub const ZIGZAG_TO_RASTER: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

const DC_LUMA_BITS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const DC_CHROMA_BITS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
const DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const AC_LUMA_BITS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
const AC_LUMA_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

const AC_CHROMA_BITS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
const AC_CHROMA_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33, 0x52, 0xf0,
    0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18, 0x19, 0x1a, 0x26,
    0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5,
    0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda,
    0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Annex K luminance quantization table in raster order
pub const QUANT_LUMA: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, 12, 12, 14, 19, 26, 58, 60, 55, 14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62, 18, 22, 37, 56, 68, 109, 103, 77, 24, 35, 55, 64, 81, 104, 113,
    92, 49, 64, 78, 87, 103, 121, 120, 101, 72, 92, 95, 98, 112, 100, 103, 99,
];

/// chroma layout of the generated image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Gray,
    S444,
    S422,
    S420,
}

impl Sampling {
    /// horizontal and vertical luma sampling factors
    fn factors(self) -> (usize, usize) {
        match self {
            Sampling::Gray | Sampling::S444 => (1, 1),
            Sampling::S422 => (2, 1),
            Sampling::S420 => (2, 2),
        }
    }
}

/// canonical code (value, length) for each symbol
fn build_codes(bits: &[u8; 16], values: &[u8]) -> [(u16, u8); 256] {
    let mut codes = [(0u16, 0u8); 256];
    let mut code = 0u16;
    let mut i = 0;
    for (len, &count) in bits.iter().enumerate() {
        for _ in 0..count {
            codes[usize::from(values[i])] = (code, len as u8 + 1);
            code += 1;
            i += 1;
        }
        code <<= 1;
    }
    codes
}

/// MSB first bit writer with 0xFF byte stuffing
#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    bits: u32,
}

impl BitWriter {
    fn put(&mut self, value: u16, len: u8) {
        for k in (0..len).rev() {
            self.acc = (self.acc << 1) | u32::from((value >> k) & 1);
            self.bits += 1;
            if self.bits == 8 {
                let b = self.acc as u8;
                self.out.push(b);
                if b == 0xff {
                    self.out.push(0);
                }
                self.acc = 0;
                self.bits = 0;
            }
        }
    }

    /// pads with 1 bits to the next byte boundary
    fn flush(&mut self) {
        while self.bits != 0 {
            self.put(1, 1);
        }
    }
}

fn fdct(samples: &[f64; 64]) -> [f64; 64] {
    let mut out = [0f64; 64];
    for u in 0..8 {
        for v in 0..8 {
            let cu = if u == 0 { 1.0 / 2f64.sqrt() } else { 1.0 };
            let cv = if v == 0 { 1.0 / 2f64.sqrt() } else { 1.0 };
            let mut sum = 0.0;
            for y in 0..8 {
                for x in 0..8 {
                    sum += samples[y * 8 + x]
                        * (((2 * x + 1) * v) as f64 * PI / 16.0).cos()
                        * (((2 * y + 1) * u) as f64 * PI / 16.0).cos();
                }
            }
            out[u * 8 + v] = 0.25 * cu * cv * sum;
        }
    }
    out
}

fn category(v: i32) -> u8 {
    (32 - v.unsigned_abs().leading_zeros()) as u8
}

fn segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.extend_from_slice(&[0xff, marker]);
    out.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(payload);
}

fn dht(out: &mut Vec<u8>, class: u8, id: u8, bits: &[u8; 16], values: &[u8]) {
    let mut payload = vec![(class << 4) | id];
    payload.extend_from_slice(bits);
    payload.extend_from_slice(values);
    segment(out, 0xc4, &payload);
}

fn to_ycbcr(p: [u8; 3]) -> [f64; 3] {
    let (r, g, b) = (f64::from(p[0]), f64::from(p[1]), f64::from(p[2]));
    [
        0.299 * r + 0.587 * g + 0.114 * b,
        -0.168736 * r - 0.331264 * g + 0.5 * b + 128.0,
        0.5 * r - 0.418688 * g - 0.081312 * b + 128.0,
    ]
}

struct Tables {
    dc: [(u16, u8); 256],
    ac: [(u16, u8); 256],
}

struct Encoder {
    writer: BitWriter,
    predictors: [i32; 3],
    quant: [u16; 64],
    tables: [Tables; 2],
}

impl Encoder {
    fn block(&mut self, samples: &[f64; 64], component: usize) {
        let mut shifted = [0f64; 64];
        for i in 0..64 {
            shifted[i] = samples[i] - 128.0;
        }
        let coefficients = fdct(&shifted);

        let mut q = [0i32; 64];
        for i in 0..64 {
            q[i] = (coefficients[i] / f64::from(self.quant[i])).round() as i32;
        }

        let t = &self.tables[component.min(1)];
        let diff = q[0] - self.predictors[component];
        self.predictors[component] = q[0];

        let n = category(diff);
        let (code, len) = t.dc[usize::from(n)];
        self.writer.put(code, len);
        if n != 0 {
            self.writer.put(magnitude_bits(diff, n), n);
        }

        let mut run = 0;
        for k in 1..64 {
            let v = q[ZIGZAG_TO_RASTER[k]];
            if v == 0 {
                run += 1;
                continue;
            }
            while run > 15 {
                let (code, len) = t.ac[0xf0];
                self.writer.put(code, len);
                run -= 16;
            }
            let n = category(v);
            let (code, len) = t.ac[(run << 4) | usize::from(n)];
            self.writer.put(code, len);
            self.writer.put(magnitude_bits(v, n), n);
            run = 0;
        }
        if run != 0 {
            let (code, len) = t.ac[0];
            self.writer.put(code, len);
        }
    }
}

fn magnitude_bits(v: i32, n: u8) -> u16 {
    if v > 0 {
        v as u16
    } else {
        (v + (1 << n) - 1) as u16
    }
}

/// Encodes `rgb` (row major, `width * height` pixels) as a baseline JPEG.
/// A non zero `restart_interval` adds a DRI segment and RST markers.
pub fn encode_with_quant(
    width: usize,
    height: usize,
    rgb: &[[u8; 3]],
    sampling: Sampling,
    restart_interval: u16,
    quant: &[u16; 64],
) -> Vec<u8> {
    assert_eq!(rgb.len(), width * height);

    let gray = sampling == Sampling::Gray;
    let (hs, vs) = sampling.factors();
    let (mx, my) = (8 * hs, 8 * vs);
    let ncomp = if gray { 1u8 } else { 3 };

    let mut out = vec![0xff, 0xd8];

    let mut dqt = vec![0u8];
    dqt.extend(ZIGZAG_TO_RASTER.iter().map(|&i| quant[i] as u8));
    segment(&mut out, 0xdb, &dqt);

    let mut sof = vec![8];
    sof.extend_from_slice(&(height as u16).to_be_bytes());
    sof.extend_from_slice(&(width as u16).to_be_bytes());
    sof.push(ncomp);
    sof.extend_from_slice(&[1, ((hs as u8) << 4) | vs as u8, 0]);
    if !gray {
        sof.extend_from_slice(&[2, 0x11, 0, 3, 0x11, 0]);
    }
    segment(&mut out, 0xc0, &sof);

    dht(&mut out, 0, 0, &DC_LUMA_BITS, &DC_VALUES);
    dht(&mut out, 1, 0, &AC_LUMA_BITS, &AC_LUMA_VALUES);
    if !gray {
        dht(&mut out, 0, 1, &DC_CHROMA_BITS, &DC_VALUES);
        dht(&mut out, 1, 1, &AC_CHROMA_BITS, &AC_CHROMA_VALUES);
    }

    if restart_interval != 0 {
        segment(&mut out, 0xdd, &restart_interval.to_be_bytes());
    }

    let mut sos = vec![ncomp, 1, 0x00];
    if !gray {
        sos.extend_from_slice(&[2, 0x11, 3, 0x11]);
    }
    sos.extend_from_slice(&[0, 63, 0]);
    segment(&mut out, 0xda, &sos);

    let mut encoder = Encoder {
        writer: BitWriter::default(),
        predictors: [0; 3],
        quant: *quant,
        tables: [
            Tables {
                dc: build_codes(&DC_LUMA_BITS, &DC_VALUES),
                ac: build_codes(&AC_LUMA_BITS, &AC_LUMA_VALUES),
            },
            Tables {
                dc: build_codes(&DC_CHROMA_BITS, &DC_VALUES),
                ac: build_codes(&AC_CHROMA_BITS, &AC_CHROMA_VALUES),
            },
        ],
    };

    // edge pixels are repeated to fill partial MCUs
    let pixel = |x: usize, y: usize| to_ycbcr(rgb[y.min(height - 1) * width + x.min(width - 1)]);

    let mut count = 0u32;
    let mut restart_index = 0u8;
    for y0 in (0..height).step_by(my) {
        for x0 in (0..width).step_by(mx) {
            if restart_interval != 0 && count != 0 && count % u32::from(restart_interval) == 0 {
                encoder.writer.flush();
                encoder
                    .writer
                    .out
                    .extend_from_slice(&[0xff, 0xd0 + (restart_index & 7)]);
                restart_index = restart_index.wrapping_add(1);
                encoder.predictors = [0; 3];
            }
            count += 1;

            let mut ycc = vec![[0f64; 3]; mx * my];
            for y in 0..my {
                for x in 0..mx {
                    ycc[y * mx + x] = pixel(x0 + x, y0 + y);
                }
            }

            for by in 0..vs {
                for bx in 0..hs {
                    let mut samples = [0f64; 64];
                    for j in 0..8 {
                        for i in 0..8 {
                            samples[j * 8 + i] = ycc[(by * 8 + j) * mx + bx * 8 + i][0];
                        }
                    }
                    encoder.block(&samples, 0);
                }
            }

            if !gray {
                for c in 1..3 {
                    let mut samples = [0f64; 64];
                    for j in 0..8 {
                        for i in 0..8 {
                            let mut sum = 0.0;
                            for dy in 0..vs {
                                for dx in 0..hs {
                                    sum += ycc[(j * vs + dy) * mx + i * hs + dx][c];
                                }
                            }
                            samples[j * 8 + i] = sum / (hs * vs) as f64;
                        }
                    }
                    encoder.block(&samples, c);
                }
            }
        }
    }

    encoder.writer.flush();
    out.extend_from_slice(&encoder.writer.out);
    out.extend_from_slice(&[0xff, 0xd9]);
    out
}

pub fn encode(
    width: usize,
    height: usize,
    rgb: &[[u8; 3]],
    sampling: Sampling,
    restart_interval: u16,
) -> Vec<u8> {
    encode_with_quant(width, height, rgb, sampling, restart_interval, &QUANT_LUMA)
}

/// smooth color gradients that survive quantization reasonably well
pub fn test_pattern(width: usize, height: usize) -> Vec<[u8; 3]> {
    let mut rgb = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            rgb.push([
                (128.0 + 100.0 * (x as f64 / 5.0).sin()) as u8,
                ((x * 7 + y * 3) % 256) as u8,
                (128.0 + 60.0 * (y as f64 / 4.0).cos()) as u8,
            ]);
        }
    }
    rgb
}

/// Rewrites the counts of the first DHT segment to claim three codes each of length 1
/// and 2, which can't fit in the code space.
pub fn corrupt_first_dht(data: &mut [u8]) {
    let pos = data
        .windows(2)
        .position(|w| w == [0xff, 0xc4])
        .expect("no DHT segment");
    // marker, length, class/id, then the 16 counts
    data[pos + 5] = 3;
    data[pos + 6] = 3;
}
