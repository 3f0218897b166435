/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::consts::{ARAI_SCALE_FACTORS, ZIGZAG_TO_RASTER};
use crate::decoder_error::Result;
use crate::structs::table_arena::{Span, TableArena};

/// Dequantization table in raster order with the IDCT prescale folded in, so that
/// `coefficient * table[i] >> 8` is ready for the Arai IDCT with 12 bits of fraction.
#[derive(Debug, Clone, Copy)]
pub struct QuantizationTable {
    factors: Span<i32>,
}

impl QuantizationTable {
    /// builds the table from the 64 zigzag ordered values of a DQT entry
    pub fn build(arena: &mut TableArena, zigzag_values: &[u16; 64]) -> Result<Self> {
        let factors = arena.alloc::<i32>(64)?;
        let table = arena.get_mut(factors);

        for (zz, &q) in zigzag_values.iter().enumerate() {
            let raster = usize::from(ZIGZAG_TO_RASTER[zz]);
            table[raster] = i32::from(q) * i32::from(ARAI_SCALE_FACTORS[raster]);
        }

        Ok(QuantizationTable { factors })
    }

    #[inline(always)]
    pub fn factors<'a>(&self, arena: &'a TableArena) -> &'a [i32] {
        arena.get(self.factors)
    }
}

#[test]
fn test_prescaled_raster_order() {
    let mut arena = TableArena::new(1024);

    let mut zigzag = [1u16; 64];
    zigzag[0] = 16;
    zigzag[1] = 11; // raster 1
    zigzag[2] = 12; // raster 8
    zigzag[63] = 99;

    let q = QuantizationTable::build(&mut arena, &zigzag).unwrap();
    let f = q.factors(&arena);

    assert_eq!(f[0], 16 * 8192);
    assert_eq!(f[1], 11 * 11362);
    assert_eq!(f[8], 12 * 11362);
    assert_eq!(f[63], 99 * 623);
    assert_eq!(f[9], 15760);
}
