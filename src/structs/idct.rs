/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

// Arai-Agui-Nakajima inverse DCT in fixed point.
//
// The input coefficients have already been multiplied by the prescaled quantization
// table and shifted down by 8, which leaves 12 fractional bits. The column pass keeps
// full precision, the row pass drops 12 bits before each multiply and the final
// shift by 20 removes the rest. The +128 level shift is folded into the DC term of
// every row. All arithmetic wraps so corrupt coefficients can't panic.

use bytemuck::cast;
use unroll::unroll_for_loops;
use wide::{i16x8, i32x8};

const M13: i32 = 5792; // 1.41421 * 4096
const M2: i32 = 4433; // 1.08239 * 4096
const M4: i32 = 10703; // 2.61313 * 4096
const M5: i32 = 7568; // 1.84776 * 4096

const LEVEL_SHIFT: i32 = 128 << 20;

/// runs the butterfly on one column or row, `shift` is applied before each multiply
#[inline(always)]
fn butterfly(s: [i32; 8], shift: u32) -> [i32; 8] {
    // odd part
    let mut a8 = s[5].wrapping_add(s[3]);
    let mut a9 = (s[5] << 1).wrapping_sub(a8);
    let mut a10 = s[1].wrapping_add(s[7]);
    let mut a11 = (s[1] << 1).wrapping_sub(a10);

    a8 = a10.wrapping_add(a8);
    a10 = (a10 << 1).wrapping_sub(a8);
    a10 = (a10 >> shift).wrapping_mul(M13);

    let mut a13 = (a11.wrapping_add(a9) >> shift).wrapping_mul(M5);
    a9 = (a9 >> shift).wrapping_mul(M4);
    a11 = (a11 >> shift).wrapping_mul(M2);
    if shift == 0 {
        a8 <<= 12;
    }

    a9 = a13.wrapping_sub(a9);
    a11 = a13.wrapping_sub(a11);
    a9 = a9.wrapping_sub(a8);
    a10 = a10.wrapping_sub(a9);
    a11 = a11.wrapping_sub(a10);

    // even part
    a13 = s[0];
    let mut a12 = s[4];
    let mut a15 = s[6];
    let mut a14 = s[2];
    if shift != 0 {
        a13 = a13.wrapping_add(LEVEL_SHIFT);
    }

    a12 = a13.wrapping_add(a12);
    a13 = (a13 << 1).wrapping_sub(a12);
    a15 = a14.wrapping_add(a15);
    a14 = (a14 << 1).wrapping_sub(a15);
    a14 = (a14 >> shift).wrapping_mul(M13);
    if shift == 0 {
        a12 <<= 12;
        a13 <<= 12;
        a15 <<= 12;
    }

    a14 = a14.wrapping_sub(a15);
    a15 = a12.wrapping_add(a15);
    a12 = (a12 << 1).wrapping_sub(a15);
    a14 = a13.wrapping_add(a14);
    a13 = (a13 << 1).wrapping_sub(a14);

    a8 = a15.wrapping_add(a8);
    a9 = a14.wrapping_add(a9);
    a10 = a13.wrapping_add(a10);
    a11 = a12.wrapping_add(a11);
    a15 = (a15 << 1).wrapping_sub(a8);
    a14 = (a14 << 1).wrapping_sub(a9);
    a13 = (a13 << 1).wrapping_sub(a10);
    a12 = (a12 << 1).wrapping_sub(a11);

    [a8, a9, a10, a11, a12, a13, a14, a15]
}

/// Sample value of a block whose only nonzero coefficient is the DC term. This is
/// exactly what both transforms produce for such a block, rounding toward negative
/// infinity and wrapping the same way.
#[inline(always)]
pub fn flat_sample(dc: i32) -> i16 {
    ((dc << 12).wrapping_add(LEVEL_SHIFT) >> 20) as i16
}

/// scalar version, one column or row at a time
#[unroll_for_loops]
pub fn idct_scalar(coefficients: &[i32; 64], out: &mut [i16; 64]) {
    let mut t = *coefficients;

    for i in 0..8 {
        let col = butterfly(
            [
                t[i],
                t[8 + i],
                t[16 + i],
                t[24 + i],
                t[32 + i],
                t[40 + i],
                t[48 + i],
                t[56 + i],
            ],
            0,
        );
        for k in 0..8 {
            t[8 * k + i] = col[k];
        }
    }

    for r in 0..8 {
        let mut row = [0i32; 8];
        row.copy_from_slice(&t[8 * r..8 * r + 8]);
        let row = butterfly(row, 12);
        for k in 0..8 {
            out[8 * r + k] = (row[k] >> 20) as i16;
        }
    }
}

/// Same operations as [`butterfly`] on 8 lanes at once. The wide integer types
/// wrap on overflow just like the scalar code.
#[inline(always)]
fn butterfly_x8(s: [i32x8; 8], shift: i32) -> [i32x8; 8] {
    let m13 = i32x8::splat(M13);

    let mut a8 = s[5] + s[3];
    let mut a9 = (s[5] << 1) - a8;
    let mut a10 = s[1] + s[7];
    let mut a11 = (s[1] << 1) - a10;

    a8 = a10 + a8;
    a10 = (a10 << 1) - a8;
    a10 = (a10 >> shift) * m13;

    let mut a13 = ((a11 + a9) >> shift) * i32x8::splat(M5);
    a9 = (a9 >> shift) * i32x8::splat(M4);
    a11 = (a11 >> shift) * i32x8::splat(M2);
    if shift == 0 {
        a8 = a8 << 12;
    }

    a9 = a13 - a9;
    a11 = a13 - a11;
    a9 = a9 - a8;
    a10 = a10 - a9;
    a11 = a11 - a10;

    a13 = s[0];
    let mut a12 = s[4];
    let mut a15 = s[6];
    let mut a14 = s[2];
    if shift != 0 {
        a13 = a13 + i32x8::splat(LEVEL_SHIFT);
    }

    a12 = a13 + a12;
    a13 = (a13 << 1) - a12;
    a15 = a14 + a15;
    a14 = (a14 << 1) - a15;
    a14 = (a14 >> shift) * m13;
    if shift == 0 {
        a12 = a12 << 12;
        a13 = a13 << 12;
        a15 = a15 << 12;
    }

    a14 = a14 - a15;
    a15 = a12 + a15;
    a12 = (a12 << 1) - a15;
    a14 = a13 + a14;
    a13 = (a13 << 1) - a14;

    a8 = a15 + a8;
    a9 = a14 + a9;
    a10 = a13 + a10;
    a11 = a12 + a11;
    a15 = (a15 << 1) - a8;
    a14 = (a14 << 1) - a9;
    a13 = (a13 << 1) - a10;
    a12 = (a12 << 1) - a11;

    [a8, a9, a10, a11, a12, a13, a14, a15]
}

/// 8 lane version. Loading the block as rows makes the column pass operate on all
/// columns at once, a transpose then lines up the rows for the second pass.
#[inline(always)]
pub fn idct_wide(coefficients: &[i32; 64], out: &mut [i16; 64]) {
    let rows: [i32x8; 8] = cast(*coefficients);

    let columns = butterfly_x8(rows, 0);
    let transposed = i32x8::transpose(columns);
    let result = i32x8::transpose(butterfly_x8(transposed, 12));

    let packed: [i16x8; 8] = [
        i16x8::from_i32x8_truncate(result[0] >> 20),
        i16x8::from_i32x8_truncate(result[1] >> 20),
        i16x8::from_i32x8_truncate(result[2] >> 20),
        i16x8::from_i32x8_truncate(result[3] >> 20),
        i16x8::from_i32x8_truncate(result[4] >> 20),
        i16x8::from_i32x8_truncate(result[5] >> 20),
        i16x8::from_i32x8_truncate(result[6] >> 20),
        i16x8::from_i32x8_truncate(result[7] >> 20),
    ];
    *out = cast(packed);
}
