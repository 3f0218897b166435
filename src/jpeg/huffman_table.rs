/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::bit_reader::BitReader;
use crate::decoder_error::{err_exit_code, ExitCode, Result};
use crate::structs::table_arena::{Span, TableArena};
use crate::ByteSource;

/// number of bits resolved by a single lookup in the fast table
pub const HUFF_LOOKUP_BITS: u32 = 8;

const LOOKUP_SIZE: usize = 1 << HUFF_LOOKUP_BITS;

/// largest magnitude category a DC difference can have with 8 bit samples
const MAX_DC_CATEGORY: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanClass {
    Dc = 0,
    Ac = 1,
}

/// Direct lookup of codes up to 8 bits long. DC entries pack the value in the low nibble
/// and the code length in the high nibble, AC entries pack the value in the low byte and
/// the length in the high byte. All ones marks a code longer than the table covers.
#[derive(Debug, Clone, Copy)]
enum FastLookup {
    None,
    Dc(Span<u8>),
    Ac(Span<u16>),
}

/// A canonical Huffman table whose storage lives in the table arena.
#[derive(Debug, Clone, Copy)]
pub struct HuffmanTable {
    counts: Span<u8>,
    codes: Span<u16>,
    values: Span<u8>,
    lookup: FastLookup,
    /// index of the first code longer than HUFF_LOOKUP_BITS
    long_offset: usize,
}

impl HuffmanTable {
    /// Builds the table from the 16 entry code length histogram and the symbol values
    /// as they appear in a DHT segment.
    pub fn build(
        arena: &mut TableArena,
        class: HuffmanClass,
        counts: &[u8; 16],
        values: &[u8],
        fast_lookup: bool,
    ) -> Result<Self> {
        let num_codes: usize = counts.iter().map(|&c| usize::from(c)).sum();
        if num_codes != values.len() || num_codes > 256 {
            return err_exit_code(
                ExitCode::MalformedStream,
                format!(
                    "huffman table declares {0} codes but has {1} values",
                    num_codes,
                    values.len()
                ),
            );
        }

        if class == HuffmanClass::Dc {
            if let Some(v) = values.iter().find(|&&v| v > MAX_DC_CATEGORY) {
                return err_exit_code(
                    ExitCode::MalformedStream,
                    format!("DC huffman value {0} out of range", v),
                );
            }
        }

        let counts_span = arena.alloc::<u8>(16)?;
        arena.get_mut(counts_span).copy_from_slice(counts);

        // assign canonical codes, each length continues where the previous one left off
        let codes_span = arena.alloc::<u16>(num_codes)?;
        {
            let codes = arena.get_mut(codes_span);
            let mut code: u32 = 0;
            let mut i = 0;
            for (bit_length, &count) in (1u32..).zip(counts.iter()) {
                for _ in 0..count {
                    if code >= (1 << bit_length) {
                        return err_exit_code(
                            ExitCode::MalformedStream,
                            format!("too many huffman codes of length {0}", bit_length),
                        );
                    }
                    codes[i] = code as u16;
                    code += 1;
                    i += 1;
                }
                code <<= 1;
            }
        }

        let values_span = arena.alloc::<u8>(num_codes)?;
        arena.get_mut(values_span).copy_from_slice(values);

        let mut table = HuffmanTable {
            counts: counts_span,
            codes: codes_span,
            values: values_span,
            lookup: FastLookup::None,
            long_offset: 0,
        };

        if fast_lookup {
            table.build_lookup(arena, class)?;
        }

        Ok(table)
    }

    fn build_lookup(&mut self, arena: &mut TableArena, class: HuffmanClass) -> Result<()> {
        // (first index, number of entries, packed value) for every short code
        let mut entries = [(0usize, 0usize, 0u16); LOOKUP_SIZE];
        let mut num_entries = 0;
        let mut i = 0;

        {
            let counts = arena.get(self.counts);
            let codes = arena.get(self.codes);
            let values = arena.get(self.values);

            for bit_length in 1..=HUFF_LOOKUP_BITS {
                for _ in 0..counts[bit_length as usize - 1] {
                    let shift = HUFF_LOOKUP_BITS - bit_length;
                    let packed = match class {
                        HuffmanClass::Dc => u16::from(values[i]) | ((bit_length as u16) << 4),
                        HuffmanClass::Ac => u16::from(values[i]) | ((bit_length as u16) << 8),
                    };
                    entries[num_entries] =
                        (usize::from(codes[i]) << shift, 1usize << shift, packed);
                    num_entries += 1;
                    i += 1;
                }
            }
        }
        self.long_offset = i;

        match class {
            HuffmanClass::Dc => {
                let span = arena.alloc::<u8>(LOOKUP_SIZE)?;
                let lookup = arena.get_mut(span);
                lookup.fill(0xff);
                for &(start, len, packed) in &entries[..num_entries] {
                    lookup[start..start + len].fill(packed as u8);
                }
                self.lookup = FastLookup::Dc(span);
            }
            HuffmanClass::Ac => {
                let span = arena.alloc::<u16>(LOOKUP_SIZE)?;
                let lookup = arena.get_mut(span);
                lookup.fill(0xffff);
                for &(start, len, packed) in &entries[..num_entries] {
                    lookup[start..start + len].fill(packed);
                }
                self.lookup = FastLookup::Ac(span);
            }
        }

        Ok(())
    }

    /// Extracts one symbol from the bit stream. Codes of 8 bits or less are resolved with
    /// a single lookup when the fast table was built, everything else is found by walking
    /// the canonical codes in order of increasing length.
    #[inline(always)]
    pub fn decode<R: ByteSource>(
        &self,
        arena: &TableArena,
        reader: &mut BitReader<R>,
    ) -> Result<u8> {
        let (mut index, first_length) = match self.lookup {
            FastLookup::None => (0, 1),
            FastLookup::Dc(span) => {
                let d = arena.get(span)[usize::from(reader.peek(HUFF_LOOKUP_BITS)?)];
                if d != 0xff {
                    reader.advance(u32::from(d >> 4))?;
                    return Ok(d & 0x0f);
                }
                (self.long_offset, HUFF_LOOKUP_BITS + 1)
            }
            FastLookup::Ac(span) => {
                let d = arena.get(span)[usize::from(reader.peek(HUFF_LOOKUP_BITS)?)];
                if d != 0xffff {
                    reader.advance(u32::from(d >> 8))?;
                    return Ok(d as u8);
                }
                (self.long_offset, HUFF_LOOKUP_BITS + 1)
            }
        };

        let counts = arena.get(self.counts);
        let codes = arena.get(self.codes);

        for bit_length in first_length..=16 {
            let count = usize::from(counts[bit_length as usize - 1]);
            if count == 0 {
                continue;
            }

            let code = reader.peek(bit_length)?;
            for _ in 0..count {
                if codes[index] == code {
                    reader.advance(bit_length)?;
                    return Ok(arena.get(self.values)[index]);
                }
                index += 1;
            }
        }

        err_exit_code(
            ExitCode::MalformedHuffmanCode,
            "no huffman code of 16 bits or less matches the stream",
        )
    }
}
