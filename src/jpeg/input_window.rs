/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use byteorder::{BigEndian, ByteOrder};

use crate::decoder_error::{err_exit_code, ExitCode, Result};
use crate::ByteSource;

/// Fixed size window over the caller's byte source. The buffer is allocated once
/// when the decoder is created and refilled in place.
pub struct InputWindow<R> {
    source: R,
    buffer: Box<[u8]>,
    pos: usize,
    len: usize,
    eof: bool,
    total_read: u64,
}

impl<R: ByteSource> InputWindow<R> {
    pub fn new(source: R, buffer_size: usize) -> Self {
        InputWindow {
            source,
            buffer: vec![0u8; buffer_size].into_boxed_slice(),
            pos: 0,
            len: 0,
            eof: false,
            total_read: 0,
        }
    }

    /// refills the window, returning false at the end of the input
    #[cold]
    fn refill(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }

        let n = self.source.read_bytes(&mut self.buffer)?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }

        if n > self.buffer.len() {
            return err_exit_code(
                ExitCode::AssertionFailure,
                "byte source reported more bytes than the buffer holds",
            );
        }

        self.pos = 0;
        self.len = n;
        self.total_read += n as u64;
        Ok(true)
    }

    /// returns the next byte, or None once the source is exhausted
    #[inline(always)]
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.pos == self.len && !self.refill()? {
            return Ok(None);
        }

        let b = self.buffer[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }

    /// reads a byte that is required to be there
    pub fn read_u8(&mut self) -> Result<u8> {
        match self.next_byte()? {
            Some(b) => Ok(b),
            None => err_exit_code(ExitCode::TruncatedInput, "unexpected end of input"),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(BigEndian::read_u16(&b))
    }

    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.len && !self.refill()? {
                return err_exit_code(ExitCode::TruncatedInput, "unexpected end of input");
            }

            let n = (self.len - self.pos).min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        Ok(())
    }

    pub fn skip(&mut self, mut count: usize) -> Result<()> {
        while count > 0 {
            if self.pos == self.len && !self.refill()? {
                return err_exit_code(ExitCode::TruncatedInput, "unexpected end of input");
            }

            let n = (self.len - self.pos).min(count);
            self.pos += n;
            count -= n;
        }
        Ok(())
    }

    /// number of bytes consumed from the source so far
    pub fn position(&self) -> u64 {
        self.total_read - (self.len - self.pos) as u64
    }

    pub fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_source(self) -> R {
        self.source
    }
}
