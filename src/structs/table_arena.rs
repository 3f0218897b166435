/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::marker::PhantomData;
use std::mem::{align_of, size_of};

use bytemuck::{cast_slice, cast_slice_mut, Pod};

use crate::decoder_error::{err_exit_code, ExitCode, Result};

/// Typed handle to a run of `T` inside a [`TableArena`]. Handles are only
/// meaningful for the arena that issued them and until it is reset.
#[derive(Debug)]
pub struct Span<T> {
    offset: usize,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for Span<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Span<T> {}

impl<T> Span<T> {
    fn words(&self) -> usize {
        (self.len * size_of::<T>() + 3) / 4
    }
}

/// Single pre-sized bump allocator for the per-image tables.
///
/// The storage is allocated once when the decoder is created. `prepare` resets it,
/// table segments carve pieces out of it, and once the scan header is parsed it is
/// frozen so that any allocation from the MCU loop is reported instead of silently
/// growing memory use.
pub struct TableArena {
    storage: Box<[u32]>,
    used: usize,
    frozen: bool,
}

impl TableArena {
    pub fn new(size_in_bytes: usize) -> Self {
        TableArena {
            storage: vec![0u32; (size_in_bytes + 3) / 4].into_boxed_slice(),
            used: 0,
            frozen: false,
        }
    }

    /// releases every table, invalidating all outstanding spans
    pub fn reset(&mut self) {
        self.used = 0;
        self.frozen = false;
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    #[cfg(test)]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn used_bytes(&self) -> usize {
        self.used * 4
    }

    #[cfg(test)]
    pub fn capacity_bytes(&self) -> usize {
        self.storage.len() * 4
    }

    /// allocates `len` zeroed elements, 4 byte aligned
    pub fn alloc<T: Pod>(&mut self, len: usize) -> Result<Span<T>> {
        if size_of::<T>() > 4 || align_of::<T>() > 4 {
            return err_exit_code(
                ExitCode::AssertionFailure,
                "arena only holds types of 4 bytes or less",
            );
        }

        if self.frozen {
            return err_exit_code(
                ExitCode::AssertionFailure,
                "table allocation attempted while decoding a scan",
            );
        }

        let span = Span {
            offset: self.used,
            len,
            _marker: PhantomData,
        };

        let end = self.used + span.words();
        if end > self.storage.len() {
            return err_exit_code(
                ExitCode::OutOfMemory,
                format!(
                    "table arena exhausted: {0} of {1} bytes used, {2} more needed",
                    self.used * 4,
                    self.storage.len() * 4,
                    span.words() * 4
                ),
            );
        }

        self.storage[self.used..end].fill(0);
        self.used = end;
        Ok(span)
    }

    #[inline(always)]
    pub fn get<T: Pod>(&self, span: Span<T>) -> &[T] {
        let words = &self.storage[span.offset..span.offset + span.words()];
        &cast_slice::<u32, T>(words)[..span.len]
    }

    pub fn get_mut<T: Pod>(&mut self, span: Span<T>) -> &mut [T] {
        let words = &mut self.storage[span.offset..span.offset + span.words()];
        &mut cast_slice_mut::<u32, T>(words)[..span.len]
    }
}
