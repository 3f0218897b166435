/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::decoder_error::{DecodeError, ExitCode};

/// Helper function to catch panics and convert them into the appropriate DecodeError
pub fn catch_unwind_result<R>(
    f: impl FnOnce() -> Result<R, DecodeError>,
) -> Result<R, DecodeError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(err) => Err(panic_to_error(err)),
    }
}

/// converts the payload of a caught panic into an AssertionFailure
pub fn panic_to_error(err: Box<dyn Any + Send>) -> DecodeError {
    if let Some(message) = err.downcast_ref::<&str>() {
        DecodeError::new(ExitCode::AssertionFailure, *message)
    } else if let Some(message) = err.downcast_ref::<String>() {
        DecodeError::new(ExitCode::AssertionFailure, message)
    } else {
        DecodeError::new(ExitCode::AssertionFailure, "unknown panic")
    }
}

/// Sign extends the `s` bit magnitude category `value` the way JPEG encodes
/// coefficients: values with the top bit clear are negative.
#[inline(always)]
pub const fn devli(s: u8, value: u16) -> i16 {
    let shifted = 1 << s;

    if value & (shifted >> 1) != 0 {
        value as i16
    } else {
        value.wrapping_add(2).wrapping_add(!shifted) as i16
    }
}

/// check to make sure the behavior hasn't changed even with the optimization
#[test]
fn devli_test() {
    for s in 0u8..15 {
        for value in 0..(1 << s) {
            assert_eq!(
                devli(s, value),
                if s == 0 {
                    value as i16
                } else if value < (1 << (s as u16 - 1)) {
                    value as i16 + (-1 << s as i16) + 1
                } else {
                    value as i16
                }
            );
        }
    }
}

#[inline(always)]
pub const fn b_short(v1: u8, v2: u8) -> u16 {
    ((v1 as u16) << 8) + v2 as u16
}

/// clamps a sample to the 0..=255 range of an output channel
#[inline(always)]
pub fn clip_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[cfg(test)]
pub fn get_rand_from_seed(seed: [u8; 32]) -> rand_chacha::ChaCha12Rng {
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    ChaCha12Rng::from_seed(seed)
}

#[test]
fn test_catch_unwind_result() {
    let r: Result<(), DecodeError> = catch_unwind_result(|| panic!("sink blew up"));
    let e = r.unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::AssertionFailure);
    assert_eq!(e.message(), "sink blew up");

    assert_eq!(catch_unwind_result(|| Ok(5)).unwrap(), 5);
}
