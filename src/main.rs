/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{stdin, stdout, IsTerminal, Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jpeg_tile_decoder::{
    get_version_string, CpuTimeMeasure, DecodeError, DecodeOutcome, DecoderConfig, ExitCode,
    FrameBuffer, ImageInfo, JpegDecoder, PixelFormat, Pipeline, Result, WorkerPriority,
};
use log::info;
use simple_logger::SimpleLogger;

/// what the command line asked for, apart from the decoder options
struct Options {
    input: Option<String>,
    output: Option<String>,
    multitask: bool,
    lineskip: u32,
    iterations: u32,
    overwrite: bool,
    config: DecoderConfig,
}

fn syntax_error(e: impl std::fmt::Display) -> DecodeError {
    DecodeError::new(ExitCode::InvalidParameter, e.to_string())
}

fn parse_format(s: &str) -> std::result::Result<PixelFormat, String> {
    match s {
        "rgb888" => Ok(PixelFormat::Rgb888),
        "rgb565" => Ok(PixelFormat::Rgb565),
        "gray" => Ok(PixelFormat::Grayscale),
        _ => Err(format!("unknown format {0}, expected rgb888, rgb565 or gray", s)),
    }
}

fn parse_args(mut args: pico_args::Arguments) -> Result<Option<Options>> {
    if args.contains("-version") {
        println!("jpeg_tile_util {0}", get_version_string());
        return Ok(None);
    }

    let mut config = DecoderConfig::default();

    if args.contains("-nofast") {
        config.fast_huffman = false;
    }
    if args.contains("-scalar") {
        config.simd_idct = false;
    }
    if args.contains("-highpriority") {
        config.worker_priority = WorkerPriority::High;
    }
    if args.contains("-lowpriority") {
        config.worker_priority = WorkerPriority::Low;
    }
    if let Some(scale) = args.opt_value_from_str("-scale").map_err(syntax_error)? {
        config.scale = scale;
    }
    if let Some(queue) = args.opt_value_from_str("-queue").map_err(syntax_error)? {
        config.queue_capacity = queue;
    }
    if let Some(format) = args
        .opt_value_from_fn("-format", parse_format)
        .map_err(syntax_error)?
    {
        config.pixel_format = format;
    }

    let options = Options {
        multitask: args.contains("-multitask"),
        overwrite: args.contains("-overwrite"),
        lineskip: args
            .opt_value_from_str("-lineskip")
            .map_err(syntax_error)?
            .unwrap_or(0),
        iterations: args
            .opt_value_from_str("-iter")
            .map_err(syntax_error)?
            .unwrap_or(1),
        input: args.opt_free_from_str().map_err(syntax_error)?,
        output: args.opt_free_from_str().map_err(syntax_error)?,
        config,
    };

    let remaining: Vec<OsString> = args.finish();
    if !remaining.is_empty() {
        return Err(syntax_error(format!("unknown arguments {0:?}", remaining)));
    }

    Ok(Some(options))
}

/// decodes the first image of the input into a frame buffer
fn decode_once<'a>(
    input: &'a [u8],
    options: &Options,
    pipeline: &mut Option<Pipeline>,
) -> Result<(FrameBuffer, DecodeOutcome, JpegDecoder<&'a [u8]>)> {
    let mut decoder = JpegDecoder::new(input, &options.config)?;
    decoder.prepare()?;

    let rows_done = Arc::new(AtomicU32::new(0));
    let mut row_sink = {
        let rows_done = rows_done.clone();
        move |_: &ImageInfo, first_row: u32, row_count: u32| {
            rows_done.store(first_row + row_count, Ordering::Relaxed);
            true
        }
    };

    let (frame, outcome) = match pipeline {
        Some(pipeline) => {
            let frame = Arc::new(Mutex::new(FrameBuffer::new(decoder.image_info())));
            let outcome = decoder.decomp_multitask(
                pipeline,
                frame.clone(),
                Some(Arc::new(Mutex::new(row_sink))),
                options.lineskip,
            )?;

            // the worker has dropped its handle by now
            let Some(frame) = Arc::into_inner(frame).and_then(|f| f.into_inner().ok()) else {
                return Err(DecodeError::new(
                    ExitCode::AssertionFailure,
                    "frame buffer still shared after decode",
                ));
            };
            (frame, outcome)
        }
        None => {
            let mut frame = FrameBuffer::new(decoder.image_info());
            let outcome = decoder.decomp(&mut frame, Some(&mut row_sink), options.lineskip)?;
            (frame, outcome)
        }
    };

    info!(
        "decoded {0}x{1} -> {2}x{3}, {4} rows reported",
        decoder.width(),
        decoder.height(),
        frame.width(),
        frame.height(),
        rows_done.load(Ordering::Relaxed)
    );

    Ok((frame, outcome, decoder))
}

/// binary PPM for color output, PGM for grayscale
fn write_netpbm<W: Write>(writer: &mut W, frame: &FrameBuffer, format: PixelFormat) -> Result<()> {
    let data = frame.data();
    match format {
        PixelFormat::Grayscale => {
            write!(writer, "P5\n{0} {1}\n255\n", frame.width(), frame.height())?;
            writer.write_all(data)?;
        }
        PixelFormat::Rgb888 => {
            write!(writer, "P6\n{0} {1}\n255\n", frame.width(), frame.height())?;
            writer.write_all(data)?;
        }
        PixelFormat::Rgb565 => {
            write!(writer, "P6\n{0} {1}\n255\n", frame.width(), frame.height())?;
            let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
            for p in data.chunks_exact(2) {
                let v = u16::from_be_bytes([p[0], p[1]]);
                rgb.push(((v >> 11) << 3) as u8);
                rgb.push((((v >> 5) & 0x3f) << 2) as u8);
                rgb.push(((v & 0x1f) << 3) as u8);
            }
            writer.write_all(&rgb)?;
        }
    }
    Ok(())
}

// wrap main so that errors get printed nicely without a panic
fn main_with_result() -> Result<()> {
    // only output the log if we are connected to a console (otherwise if there is redirection we would corrupt the file)
    if stdout().is_terminal() {
        if let Err(e) = SimpleLogger::new().init() {
            eprintln!("unable to initialize logging: {0}", e);
        }
    }

    let Some(options) = parse_args(pico_args::Arguments::from_env())? else {
        return Ok(());
    };

    let mut input_data = Vec::new();
    match &options.input {
        Some(filename) => {
            let mut file_in = File::open(filename)
                .map_err(|e| DecodeError::new(ExitCode::FileNotFound, e.to_string()))?;
            file_in.read_to_end(&mut input_data)?;
        }
        None => {
            if stdin().is_terminal() {
                return Err(syntax_error(
                    "source filename is needed or input needs to be redirected",
                ));
            }
            stdin().read_to_end(&mut input_data)?;
        }
    }

    let mut pipeline = if options.multitask {
        Some(Pipeline::new(&options.config)?)
    } else {
        None
    };

    let mut overall_cpu = Duration::ZERO;
    let mut result = None;

    for _ in 0..options.iterations.max(1) {
        let thread_cpu = CpuTimeMeasure::new();

        let (frame, outcome, decoder) = decode_once(&input_data, &options, &mut pipeline)?;
        let metrics = decoder.metrics();

        let iter_duration = thread_cpu.elapsed() + metrics.get_cpu_time_worker_time();
        info!(
            "{0:?}: {1} MCUs, {2} tiles ({3} queued, {4} inline), {5} row events",
            outcome,
            metrics.mcus_decoded(),
            metrics.tiles_emitted(),
            metrics.tiles_queued(),
            metrics.tiles_composited_inline(),
            metrics.row_events()
        );
        info!("Total CPU time consumed:{0}ms", iter_duration.as_millis());

        overall_cpu += iter_duration;
        result = Some(frame);
    }

    if options.iterations > 1 {
        info!(
            "Overall average CPU consumed per iteration {0}ms ",
            overall_cpu.as_millis() / u128::from(options.iterations)
        );
    }

    let Some(frame) = result else {
        return Ok(());
    };

    match &options.output {
        Some(output_file) => {
            let mut fileout = OpenOptions::new()
                .write(true)
                .create(options.overwrite)
                .truncate(options.overwrite)
                .create_new(!options.overwrite)
                .open(output_file)?;
            write_netpbm(&mut fileout, &frame, options.config.pixel_format)?;
        }
        None => {
            if stdout().is_terminal() {
                info!("no output file given, not writing the image to the console");
            } else {
                write_netpbm(&mut stdout().lock(), &frame, options.config.pixel_format)?;
            }
        }
    }

    Ok(())
}

fn main() {
    match main_with_result() {
        Ok(_) => {}
        Err(e) => {
            eprintln!(
                "error code: {0} {1} {2}",
                e.exit_code(),
                e.exit_code().as_integer_error_code(),
                e.message()
            );
            std::process::exit(e.exit_code().as_integer_error_code());
        }
    }
}
