/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::input_window::InputWindow;
use super::jpeg_code;
use crate::decoder_error::{err_exit_code, ExitCode, Result};
use crate::helpers::devli;
use crate::ByteSource;

// Implementation of bit reader on top of the entropy coded segment of a JPEG stream
//
// Bytes are shifted into a 64 bit register 8 bits at a time. Stuffed 0xFF00 pairs
// become a single 0xFF. When a marker is hit (or the input ends) the register is padded
// with zero bits instead, and consuming any of that padding is an error. That way
// Huffman lookups can always peek 16 bits without caring where the data ends.
pub struct BitReader<R> {
    inner: InputWindow<R>,
    bits: u64,
    bits_left: u32,
    padding_bits: u32,
    marker: Option<u8>,
    eof: bool,
}

impl<R: ByteSource> BitReader<R> {
    pub fn new(inner: InputWindow<R>) -> Self {
        BitReader {
            inner,
            bits: 0,
            bits_left: 0,
            padding_bits: 0,
            marker: None,
            eof: false,
        }
    }

    /// Byte level access for the segment parser. Only valid while no scan is
    /// being decoded, since the register may hold bytes that were read ahead.
    pub fn window_mut(&mut self) -> &mut InputWindow<R> {
        &mut self.inner
    }

    pub fn into_window(self) -> InputWindow<R> {
        self.inner
    }

    /// forgets all buffered bits, called when a new scan starts
    pub fn reset(&mut self) {
        self.bits = 0;
        self.bits_left = 0;
        self.padding_bits = 0;
        self.marker = None;
        self.eof = false;
    }

    /// marker that stopped the entropy coded data, if one was seen
    #[cfg(test)]
    pub fn pending_marker(&self) -> Option<u8> {
        self.marker
    }

    #[cfg(test)]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    #[inline(always)]
    fn fill_register(&mut self, bits_to_read: u32) -> Result<()> {
        if self.bits_left < bits_to_read {
            self.fill_register_slow(bits_to_read)?;
        }
        Ok(())
    }

    #[cold]
    fn fill_register_slow(&mut self, bits_to_read: u32) -> Result<()> {
        while self.bits_left < bits_to_read {
            if self.marker.is_some() || self.eof {
                self.push_padding();
                continue;
            }

            match self.inner.next_byte()? {
                None => {
                    self.eof = true;
                }
                Some(0xff) => {
                    // 0xff is an escape code, if the next byte is zero, then it is just a normal 0xff
                    // otherwise it is a marker. Any number of 0xff fill bytes may precede a marker.
                    let mut next = self.inner.next_byte()?;
                    while next == Some(0xff) {
                        next = self.inner.next_byte()?;
                    }

                    match next {
                        Some(0) => self.push_byte(0xff),
                        Some(m) => self.marker = Some(m),
                        None => self.eof = true,
                    }
                }
                Some(b) => self.push_byte(b),
            }
        }
        Ok(())
    }

    #[inline(always)]
    fn push_byte(&mut self, b: u8) {
        self.bits = (self.bits << 8) | u64::from(b);
        self.bits_left += 8;
    }

    #[inline(always)]
    fn push_padding(&mut self) {
        self.bits <<= 8;
        self.bits_left += 8;
        self.padding_bits += 8;
    }

    /// returns the next `n` bits (1..=16) without consuming them
    #[inline(always)]
    pub fn peek(&mut self, n: u32) -> Result<u16> {
        self.fill_register(n)?;
        Ok(((self.bits >> (self.bits_left - n)) & ((1 << n) - 1)) as u16)
    }

    #[inline(always)]
    pub fn advance(&mut self, n: u32) -> Result<()> {
        self.bits_left -= n;
        if self.bits_left < self.padding_bits {
            return self.padding_consumed();
        }
        Ok(())
    }

    #[cold]
    fn padding_consumed(&self) -> Result<()> {
        if let Some(m) = self.marker {
            err_exit_code(
                ExitCode::MalformedStream,
                format!("entropy coded data ran into marker ff{0:02x}", m),
            )
        } else {
            err_exit_code(ExitCode::TruncatedInput, "entropy coded data is truncated")
        }
    }

    #[inline(always)]
    pub fn read(&mut self, n: u32) -> Result<u16> {
        if n == 0 {
            return Ok(0);
        }

        let v = self.peek(n)?;
        self.advance(n)?;
        Ok(v)
    }

    /// reads an `n` bit magnitude and sign extends it into a coefficient
    #[inline(always)]
    pub fn decode_literal_bits(&mut self, n: u32) -> Result<i32> {
        let v = self.read(n)?;
        Ok(i32::from(devli(n as u8, v)))
    }

    /// Handles a restart marker: the rest of the current byte is discarded and
    /// the next marker must be RSTn with n matching the expected sequence number.
    pub fn restart(&mut self, expected: u16) -> Result<()> {
        self.bits = 0;
        self.bits_left = 0;
        self.padding_bits = 0;

        let marker = match self.marker.take() {
            Some(m) => m,
            None => {
                if self.eof {
                    return err_exit_code(ExitCode::TruncatedInput, "missing restart marker");
                }

                if self.inner.read_u8()? != 0xff {
                    return err_exit_code(ExitCode::MalformedStream, "expected restart marker");
                }

                let mut m = self.inner.read_u8()?;
                while m == 0xff {
                    m = self.inner.read_u8()?;
                }
                m
            }
        };

        let expected_marker = jpeg_code::RST0 + (expected & 7) as u8;
        if marker != expected_marker {
            return err_exit_code(
                ExitCode::MalformedStream,
                format!(
                    "invalid restart marker ff{0:02x}, expected ff{1:02x}",
                    marker, expected_marker
                ),
            );
        }

        Ok(())
    }
}
