/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use log::debug;

use super::component_info::ComponentInfo;
use super::huffman_table::{HuffmanClass, HuffmanTable};
use super::input_window::InputWindow;
use super::jpeg_code;
use super::quantization_table::QuantizationTable;
use crate::consts::COLOR_CHANNEL_NUM_BLOCK_TYPES;
use crate::decoder_config::DecoderConfig;
use crate::decoder_error::{err_exit_code, AddContext, ExitCode, Result};
use crate::helpers::b_short;
use crate::structs::table_arena::TableArena;
use crate::ByteSource;

/// Everything the scan decoder needs to know, as gathered from the segments
/// between SOI and SOS.
#[derive(Debug, Default)]
pub struct JpegHeader {
    /// width of image
    pub img_width: u16,

    /// height of image
    pub img_height: u16,

    /// count of components, 1 or 3
    pub cmpc: usize,

    /// information for each component in frame order
    pub cmp_info: [ComponentInfo; COLOR_CHANNEL_NUM_BLOCK_TYPES],

    /// luma blocks per MCU horizontally
    pub mcu_blocks_x: u8,

    /// luma blocks per MCU vertically
    pub mcu_blocks_y: u8,

    /// restart interval in MCUs, 0 if there are no restart markers
    pub rsti: u16,

    /// quantization tables by DQT id
    pub q_tables: [Option<QuantizationTable>; 4],

    /// huffman tables by [id][class]
    pub h_tables: [[Option<HuffmanTable>; 2]; 2],

    frame_seen: bool,
}

/// Bounds reads to the declared length of one marker segment
struct Segment<'a, R> {
    window: &'a mut InputWindow<R>,
    remaining: usize,
    marker: u8,
}

impl<R: ByteSource> Segment<'_, R> {
    fn take(&mut self, amount: usize) -> Result<()> {
        if amount > self.remaining {
            return err_exit_code(
                ExitCode::MalformedStream,
                format!("segment ff{0:02x} is too short", self.marker),
            );
        }
        self.remaining -= amount;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.take(1)?;
        self.window.read_u8()
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.take(2)?;
        self.window.read_u16()
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        self.take(out.len())?;
        self.window.read_exact(out)
    }

    fn skip_rest(&mut self) -> Result<()> {
        let n = self.remaining;
        self.remaining = 0;
        self.window.skip(n)
    }
}

impl JpegHeader {
    /// number of luma blocks in each MCU
    pub fn luma_blocks(&self) -> usize {
        usize::from(self.mcu_blocks_x) * usize::from(self.mcu_blocks_y)
    }

    pub fn mcu_width(&self) -> u32 {
        u32::from(self.mcu_blocks_x) * 8
    }

    pub fn mcu_height(&self) -> u32 {
        u32::from(self.mcu_blocks_y) * 8
    }

    /// Scans for SOI and then processes segments until the start of scan is found. On
    /// success the window is positioned at the first byte of entropy coded data.
    pub fn parse<R: ByteSource>(
        &mut self,
        window: &mut InputWindow<R>,
        arena: &mut TableArena,
        config: &DecoderConfig,
    ) -> Result<()> {
        *self = JpegHeader::default();

        // anything before SOI is ignored, which also skips the tail of a previous image
        let mut previous = 0u8;
        loop {
            match window.next_byte()? {
                Some(b) => {
                    if b_short(previous, b) == 0xff00 | u16::from(jpeg_code::SOI) {
                        break;
                    }
                    previous = b;
                }
                None => {
                    return err_exit_code(ExitCode::TruncatedInput, "no start of image marker");
                }
            }
        }

        while self.parse_next_segment(window, arena, config).context()? {}

        debug!(
            "jpeg {0}x{1} components={2} mcu={3}x{4} restart_interval={5} table_bytes={6} scan_offset={7}",
            self.img_width,
            self.img_height,
            self.cmpc,
            self.mcu_width(),
            self.mcu_height(),
            self.rsti,
            arena.used_bytes(),
            window.position()
        );

        Ok(())
    }

    // returns true if we should continue parsing headers or false if we hit SOS and should stop
    fn parse_next_segment<R: ByteSource>(
        &mut self,
        window: &mut InputWindow<R>,
        arena: &mut TableArena,
        config: &DecoderConfig,
    ) -> Result<bool> {
        let b = window.read_u8()?;
        if b != 0xff {
            return err_exit_code(
                ExitCode::MalformedStream,
                format!("expected a marker but found {0:02x}", b),
            );
        }

        // any number of fill bytes may precede a marker
        let mut btype = window.read_u8()?;
        while btype == 0xff {
            btype = window.read_u8()?;
        }

        match btype {
            jpeg_code::EOI => {
                return err_exit_code(
                    ExitCode::UnsupportedFormat,
                    "end of image before any start of scan",
                );
            }
            jpeg_code::SOI => {
                return err_exit_code(ExitCode::MalformedStream, "soi marker found out of place");
            }
            jpeg_code::RST0..=jpeg_code::RST7 => {
                return err_exit_code(ExitCode::MalformedStream, "rst marker found out of place");
            }
            jpeg_code::TEM => return Ok(true),
            0 => {
                return err_exit_code(ExitCode::MalformedStream, "stuffed zero outside of scan");
            }
            _ => {}
        }

        let segment_size = window.read_u16()?;
        if segment_size < 2 {
            return err_exit_code(ExitCode::MalformedStream, "segment is too short");
        }

        let mut segment = Segment {
            window,
            remaining: usize::from(segment_size) - 2,
            marker: btype,
        };

        match btype {
            jpeg_code::SOF0 => self.parse_sof(&mut segment, config)?,
            jpeg_code::DHT => self.parse_dht(&mut segment, arena, config)?,
            jpeg_code::DQT => self.parse_dqt(&mut segment, arena)?,
            jpeg_code::DRI => {
                self.rsti = segment.read_u16()?;
            }
            jpeg_code::SOS => {
                self.parse_sos(&mut segment)?;
                segment.skip_rest()?;
                return Ok(false);
            }
            m if jpeg_code::is_unsupported_sof(m) => {
                return err_exit_code(
                    ExitCode::UnsupportedFormat,
                    format!("sof{0} marker found, only baseline images are supported", m & 0x0f),
                );
            }
            // APPn, COM, DNL and anything else we don't need
            _ => {}
        }

        segment.skip_rest()?;
        Ok(true)
    }

    fn parse_sof<R: ByteSource>(
        &mut self,
        segment: &mut Segment<R>,
        config: &DecoderConfig,
    ) -> Result<()> {
        if self.frame_seen {
            return err_exit_code(
                ExitCode::MalformedStream,
                "image cannot have multiple SOF blocks",
            );
        }

        let precision = segment.read_u8()?;
        if precision != 8 {
            return err_exit_code(
                ExitCode::UnsupportedFormat,
                format!("{0} bit data precision is not supported", precision),
            );
        }

        self.img_height = segment.read_u16()?;
        self.img_width = segment.read_u16()?;

        if self.img_width == 0 || self.img_height == 0 {
            return err_exit_code(ExitCode::MalformedStream, "image dimensions can't be zero");
        }

        if u32::from(self.img_width) > config.max_width
            || u32::from(self.img_height) > config.max_height
        {
            return err_exit_code(
                ExitCode::UnsupportedFormat,
                format!(
                    "image dimensions larger than {0}x{1}",
                    config.max_width, config.max_height
                ),
            );
        }

        self.cmpc = usize::from(segment.read_u8()?);
        if self.cmpc != 1 && self.cmpc != 3 {
            return err_exit_code(
                ExitCode::UnsupportedFormat,
                format!(
                    "image has {0} components, only 1 or 3 are supported",
                    self.cmpc
                ),
            );
        }

        for cmp in 0..self.cmpc {
            let jid = segment.read_u8()?;
            let sampling = segment.read_u8()?;
            let q_table_index = segment.read_u8()?;

            let legal = if cmp == 0 {
                matches!(sampling, 0x11 | 0x22 | 0x21)
            } else {
                sampling == 0x11
            };
            if !legal {
                return err_exit_code(
                    ExitCode::UnsupportedFormat,
                    format!(
                        "sampling factor {0:02x} of component {1} is not supported",
                        sampling, cmp
                    ),
                );
            }

            if q_table_index > 3 {
                return err_exit_code(
                    ExitCode::UnsupportedFormat,
                    "quantizationTableValue too big",
                );
            }

            self.cmp_info[cmp] = ComponentInfo {
                jid,
                sfh: sampling >> 4,
                sfv: sampling & 0x0f,
                q_table_index,
                huff_dc: 0,
                huff_ac: 0,
            };
        }

        // a single component scan is never interleaved, so its MCU is one block
        // regardless of the sampling factor it declares
        if self.cmpc == 1 {
            self.mcu_blocks_x = 1;
            self.mcu_blocks_y = 1;
        } else {
            self.mcu_blocks_x = self.cmp_info[0].sfh;
            self.mcu_blocks_y = self.cmp_info[0].sfv;
        }

        self.frame_seen = true;
        Ok(())
    }

    fn parse_dht<R: ByteSource>(
        &mut self,
        segment: &mut Segment<R>,
        arena: &mut TableArena,
        config: &DecoderConfig,
    ) -> Result<()> {
        while segment.remaining > 0 {
            let d = segment.read_u8()?;
            let class = d >> 4;
            let id = d & 0x0f;

            if class > 1 {
                return err_exit_code(
                    ExitCode::MalformedStream,
                    format!("invalid huffman table class {0}", class),
                );
            }

            if id > 1 {
                return err_exit_code(
                    ExitCode::UnsupportedFormat,
                    format!("huffman table id {0} is not supported", id),
                );
            }

            let mut counts = [0u8; 16];
            segment.read_exact(&mut counts)?;

            let num_codes: usize = counts.iter().map(|&c| usize::from(c)).sum();
            if num_codes > 256 {
                return err_exit_code(
                    ExitCode::MalformedStream,
                    format!("huffman table has {0} codes", num_codes),
                );
            }

            let mut values = [0u8; 256];
            segment.read_exact(&mut values[..num_codes])?;

            let class = if class == 0 {
                HuffmanClass::Dc
            } else {
                HuffmanClass::Ac
            };

            let table = HuffmanTable::build(
                arena,
                class,
                &counts,
                &values[..num_codes],
                config.fast_huffman,
            )
            .context()?;

            self.h_tables[usize::from(id)][class as usize] = Some(table);
        }

        Ok(())
    }

    fn parse_dqt<R: ByteSource>(
        &mut self,
        segment: &mut Segment<R>,
        arena: &mut TableArena,
    ) -> Result<()> {
        while segment.remaining > 0 {
            let d = segment.read_u8()?;
            let precision = d >> 4;
            let id = usize::from(d & 0x0f);

            if id > 3 {
                return err_exit_code(ExitCode::MalformedStream, "DQT has invalid index");
            }

            let mut values = [0u16; 64];
            match precision {
                0 => {
                    let mut raw = [0u8; 64];
                    segment.read_exact(&mut raw)?;
                    for (v, &r) in values.iter_mut().zip(raw.iter()) {
                        *v = u16::from(r);
                    }
                }
                1 => {
                    for v in values.iter_mut() {
                        *v = segment.read_u16()?;
                    }
                }
                _ => {
                    return err_exit_code(
                        ExitCode::MalformedStream,
                        format!("DQT precision {0} is invalid", precision),
                    );
                }
            }

            self.q_tables[id] = Some(QuantizationTable::build(arena, &values).context()?);
        }

        Ok(())
    }

    fn parse_sos<R: ByteSource>(&mut self, segment: &mut Segment<R>) -> Result<()> {
        if !self.frame_seen {
            return err_exit_code(ExitCode::MalformedStream, "start of scan before frame header");
        }

        let scan_components = usize::from(segment.read_u8()?);
        if scan_components != self.cmpc {
            return err_exit_code(
                ExitCode::UnsupportedFormat,
                format!(
                    "{0} components in scan, frame has {1}",
                    scan_components, self.cmpc
                ),
            );
        }

        for cmp in 0..self.cmpc {
            let jid = segment.read_u8()?;
            let tables = segment.read_u8()?;

            let info = &mut self.cmp_info[cmp];
            if jid != info.jid {
                return err_exit_code(
                    ExitCode::UnsupportedFormat,
                    "component id mismatch in start-of-scan",
                );
            }

            info.huff_dc = tables >> 4;
            info.huff_ac = tables & 0x0f;
            if info.huff_dc > 1 || info.huff_ac > 1 {
                return err_exit_code(
                    ExitCode::UnsupportedFormat,
                    format!("huffman table selector {0:02x} is not supported", tables),
                );
            }

            if self.h_tables[usize::from(info.huff_dc)][HuffmanClass::Dc as usize].is_none() {
                return err_exit_code(
                    ExitCode::MalformedStream,
                    format!("DC huffman table missing for component {0}", cmp),
                );
            }

            if self.h_tables[usize::from(info.huff_ac)][HuffmanClass::Ac as usize].is_none() {
                return err_exit_code(
                    ExitCode::MalformedStream,
                    format!("AC huffman table missing for component {0}", cmp),
                );
            }

            if self.q_tables[usize::from(info.q_table_index)].is_none() {
                return err_exit_code(
                    ExitCode::MalformedStream,
                    format!("quantization table missing for component {0}", cmp),
                );
            }
        }

        Ok(())
    }
}
