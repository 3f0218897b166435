/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

#![doc = include_str!("../README.md")]
// Don't allow any unsafe code by default. Since this code has to potentially deal with
// badly/maliciously formatted images, we want this extra level of safety.
#![forbid(unsafe_code)]
#![forbid(non_ascii_idents)]
#![forbid(unused_extern_crates)]
#![forbid(macro_use_extern_crate)]
#![warn(missing_docs)]

mod consts;
mod decoder_config;
mod decoder_error;
mod helpers;
mod jpeg;
mod metrics;
mod structs;

use std::io::{ErrorKind, Read};

pub use decoder_config::{DecoderConfig, PixelFormat, WorkerPriority};
pub use decoder_error::{DecodeError, ExitCode, Result};
pub use helpers::catch_unwind_result;
pub use metrics::{CpuTimeMeasure, DecodeMetrics};
pub use structs::frame_buffer::FrameBuffer;
pub use structs::jpeg_decoder::{DecodeOutcome, JpegDecoder};
pub use structs::pipeline::{Pipeline, SharedRowSink, SharedTileSink};
pub use structs::tile_sink::{ImageInfo, Rect, RowSink, TileSink};

/// Source of the compressed bytes.
///
/// The decoder pulls from it whenever its input window runs dry. A read may return
/// fewer bytes than requested, and returning 0 means the end of the input.
///
/// We provide a blanket implementation for any type that implements `std::io::Read`.
pub trait ByteSource {
    /// Fills the start of `buffer` and returns the number of bytes written.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize>;
}

impl<T: Read> ByteSource for T {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize> {
        loop {
            match self.read(buffer) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

static GIT_VERSION: &str = git_version::git_version!(
    args = ["--abbrev=40", "--always", "--dirty=M"],
    fallback = "0"
);

static PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the git version used to build this libary as a static string.
pub fn get_git_version() -> &'static str {
    GIT_VERSION
}

/// Returns the version string of the library, which includes the package version and the git version.
/// This is useful for debugging and logging purposes to know the exact version of the library is being used
pub fn get_version_string() -> String {
    format!("{}-{}", PACKAGE_VERSION, get_git_version())
}
