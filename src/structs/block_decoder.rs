/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use default_boxed::DefaultBoxed;

use crate::consts::{COLOR_CHANNEL_NUM_BLOCK_TYPES, MAX_BLOCKS_PER_MCU, ZIGZAG_TO_RASTER};
use crate::decoder_error::{err_exit_code, ExitCode, Result};
use crate::jpeg::bit_reader::BitReader;
use crate::jpeg::huffman_table::{HuffmanClass, HuffmanTable};
use crate::jpeg::jpeg_header::JpegHeader;
use crate::jpeg::quantization_table::QuantizationTable;
use crate::structs::idct::{flat_sample, idct_scalar, idct_wide};
use crate::structs::table_arena::TableArena;
use crate::ByteSource;

/// Samples of one MCU. The luma blocks come first in raster order (1, 2 or 4 of them)
/// followed by Cb and Cr. For grayscale images only the first block is used.
#[derive(DefaultBoxed)]
pub struct McuBuffer {
    pub blocks: [[i16; 64]; MAX_BLOCKS_PER_MCU],
}

/// Tables resolved for one component of the scan
#[derive(Clone, Copy)]
struct ComponentTables {
    dc: HuffmanTable,
    ac: HuffmanTable,
    quant: QuantizationTable,
}

/// Turns the entropy coded data of each MCU into spatial samples.
pub struct BlockDecoder {
    components: [Option<ComponentTables>; COLOR_CHANNEL_NUM_BLOCK_TYPES],
    component_count: usize,
    luma_blocks: usize,
    dc_predictors: [i32; COLOR_CHANNEL_NUM_BLOCK_TYPES],
    dc_only: bool,
    idct: fn(&[i32; 64], &mut [i16; 64]),
}

impl BlockDecoder {
    /// Looks up the tables each component uses. `dc_only` skips the IDCT entirely,
    /// which is enough when the output is reduced to one pixel per block.
    pub fn new(header: &JpegHeader, simd_idct: bool, dc_only: bool) -> Result<Self> {
        let mut components = [None; COLOR_CHANNEL_NUM_BLOCK_TYPES];

        for (cmp, slot) in components.iter_mut().enumerate().take(header.cmpc) {
            let info = &header.cmp_info[cmp];

            let dc = header.h_tables[usize::from(info.huff_dc)][HuffmanClass::Dc as usize];
            let ac = header.h_tables[usize::from(info.huff_ac)][HuffmanClass::Ac as usize];
            let quant = header.q_tables[usize::from(info.q_table_index)];

            match (dc, ac, quant) {
                (Some(dc), Some(ac), Some(quant)) => {
                    *slot = Some(ComponentTables { dc, ac, quant });
                }
                _ => {
                    return err_exit_code(
                        ExitCode::MalformedStream,
                        format!("tables missing for component {0}", cmp),
                    );
                }
            }
        }

        Ok(BlockDecoder {
            components,
            component_count: header.cmpc,
            luma_blocks: header.luma_blocks(),
            dc_predictors: [0; COLOR_CHANNEL_NUM_BLOCK_TYPES],
            dc_only,
            idct: if simd_idct { idct_wide } else { idct_scalar },
        })
    }

    pub fn reset_dc_predictors(&mut self) {
        self.dc_predictors = [0; COLOR_CHANNEL_NUM_BLOCK_TYPES];
    }

    /// Decodes every block of the next MCU into `mcu`
    pub fn decode_mcu<R: ByteSource>(
        &mut self,
        reader: &mut BitReader<R>,
        arena: &TableArena,
        mcu: &mut McuBuffer,
    ) -> Result<()> {
        let mut block_index = 0;

        for cmp in 0..self.component_count {
            let blocks = if cmp == 0 { self.luma_blocks } else { 1 };

            let Some(tables) = self.components[cmp] else {
                return err_exit_code(ExitCode::AssertionFailure, "component has no tables");
            };

            for _ in 0..blocks {
                self.decode_block(
                    reader,
                    arena,
                    &tables,
                    cmp,
                    &mut mcu.blocks[block_index],
                )?;
                block_index += 1;
            }
        }

        Ok(())
    }

    #[inline(always)]
    fn decode_block<R: ByteSource>(
        &mut self,
        reader: &mut BitReader<R>,
        arena: &TableArena,
        tables: &ComponentTables,
        cmp: usize,
        out: &mut [i16; 64],
    ) -> Result<()> {
        let q = tables.quant.factors(arena);
        let mut coefficients = [0i32; 64];

        // DC difference is coded as a magnitude category followed by that many bits
        let category = tables.dc.decode(arena, reader)?;
        let diff = reader.decode_literal_bits(u32::from(category))?;
        let dc = self.dc_predictors[cmp].wrapping_add(diff);
        self.dc_predictors[cmp] = dc;
        coefficients[0] = dc.wrapping_mul(q[0]) >> 8;

        let mut z = 1usize;
        loop {
            let symbol = tables.ac.decode(arena, reader)?;
            if symbol == 0 {
                // end of block
                break;
            }

            z += usize::from(symbol >> 4);
            if z >= 64 {
                return err_exit_code(
                    ExitCode::MalformedStream,
                    "zero run extends past the end of the block",
                );
            }

            let bits = u32::from(symbol & 0x0f);
            if bits != 0 {
                let value = reader.decode_literal_bits(bits)?;
                let raster = usize::from(ZIGZAG_TO_RASTER[z]);
                coefficients[raster] = value.wrapping_mul(q[raster]) >> 8;
            }

            z += 1;
            if z >= 64 {
                break;
            }
        }

        if z == 1 || self.dc_only {
            // no AC terms, the block is flat
            out.fill(flat_sample(coefficients[0]));
        } else {
            (self.idct)(&coefficients, out);
        }

        Ok(())
    }
}
