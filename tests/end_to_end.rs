/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

mod common;

use std::hash::Hasher;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::{corrupt_first_dht, encode, test_pattern, Sampling};
use jpeg_tile_decoder::{
    ByteSource, DecodeOutcome, DecoderConfig, ExitCode, FrameBuffer, ImageInfo, JpegDecoder,
    PixelFormat, Pipeline, Rect, Result, RowSink, SharedRowSink, TileSink,
};
use rstest::rstest;
use siphasher::sip::SipHasher13;

const WIDTH: usize = 37;
const HEIGHT: usize = 21;

/// reads a file from the images directory for testing or benchmarking purposes
pub fn read_file(filename: &str, ext: &str) -> Vec<u8> {
    let filename = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("images")
        .join(filename.to_owned() + ext);
    let mut f = std::fs::File::open(filename).unwrap();

    let mut content = Vec::new();
    f.read_to_end(&mut content).unwrap();

    content
}

/// gradients without hard edges, so the only loss is from quantization
fn smooth_pattern(width: usize, height: usize) -> Vec<[u8; 3]> {
    let mut rgb = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            rgb.push([(x * 6) as u8, (y * 10) as u8, (255 - 3 * (x + y)) as u8]);
        }
    }
    rgb
}

fn luma(p: [u8; 3]) -> i32 {
    (0.299 * f64::from(p[0]) + 0.587 * f64::from(p[1]) + 0.114 * f64::from(p[2])).round() as i32
}

fn digest(data: &[u8]) -> u64 {
    let mut h = SipHasher13::new();
    h.write(data);
    h.finish()
}

/// Runs the prepared scan on the calling thread, or through `pipeline` if there is
/// one. The sinks are the same shared handles either way.
fn run_scan<R: ByteSource, T: TileSink + Send + 'static>(
    decoder: &mut JpegDecoder<R>,
    pipeline: Option<&mut Pipeline>,
    tile_sink: &Arc<Mutex<T>>,
    row_sink: Option<SharedRowSink>,
    lineskip: u32,
) -> Result<DecodeOutcome> {
    if let Some(pipeline) = pipeline {
        return decoder.decomp_multitask(pipeline, tile_sink.clone(), row_sink, lineskip);
    }

    let mut tiles = tile_sink.lock().unwrap();
    match row_sink {
        Some(row_sink) => {
            let mut guard = row_sink.lock().unwrap();
            let rows: &mut dyn RowSink = &mut *guard;
            decoder.decomp(&mut *tiles, Some(rows), lineskip)
        }
        None => decoder.decomp(&mut *tiles, None, lineskip),
    }
}

fn decode_to_frame(
    data: &[u8],
    config: &DecoderConfig,
    multitask: bool,
) -> Result<(DecodeOutcome, FrameBuffer)> {
    let mut decoder = JpegDecoder::new(data, config)?;
    decoder.prepare()?;

    let frame = Arc::new(Mutex::new(FrameBuffer::new(decoder.image_info())));
    let outcome = if multitask {
        let mut pipeline = Pipeline::new(config)?;
        run_scan(&mut decoder, Some(&mut pipeline), &frame, None, 0)?
    } else {
        run_scan(&mut decoder, None, &frame, None, 0)?
    };

    // the pipeline has given its handle back by the time the decode returns
    let frame = Arc::into_inner(frame).unwrap().into_inner().unwrap();
    Ok((outcome, frame))
}

/// decodes generated images of every supported layout and checks the pixels come back
/// close to what was encoded
#[rstest]
fn decodes_generated_images(
    #[values(Sampling::Gray, Sampling::S444, Sampling::S422, Sampling::S420)] sampling: Sampling,
    #[values(0, 1, 5)] restart_interval: u16,
    #[values(false, true)] multitask: bool,
) {
    let original = smooth_pattern(WIDTH, HEIGHT);
    let data = encode(WIDTH, HEIGHT, &original, sampling, restart_interval);

    let (outcome, frame) = decode_to_frame(&data, &DecoderConfig::default(), multitask).unwrap();
    assert_eq!(outcome, DecodeOutcome::Completed);
    assert_eq!((frame.width(), frame.height()), (WIDTH, HEIGHT));

    let mut max_error = 0;
    for (p, o) in frame.data().chunks_exact(3).zip(original.iter()) {
        if sampling == Sampling::Gray {
            assert!(p[0] == p[1] && p[1] == p[2]);
            max_error = max_error.max((i32::from(p[0]) - luma(*o)).abs());
        } else {
            for c in 0..3 {
                max_error = max_error.max((i32::from(p[c]) - i32::from(o[c])).abs());
            }
        }
    }

    let tolerance = match sampling {
        Sampling::Gray => 6,
        Sampling::S444 => 12,
        Sampling::S422 | Sampling::S420 => 24,
    };
    assert!(
        max_error <= tolerance,
        "{0:?} error {1} exceeds {2}",
        sampling,
        max_error,
        tolerance
    );
}

/// every output pixel is written by exactly one tile, at every scale
#[rstest]
fn tiles_cover_image_exactly(
    #[values(Sampling::Gray, Sampling::S444, Sampling::S422, Sampling::S420)] sampling: Sampling,
    #[values(0, 1, 2, 3)] scale: u8,
    #[values(false, true)] multitask: bool,
) {
    let data = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), sampling, 0);
    let config = DecoderConfig {
        scale,
        ..DecoderConfig::default()
    };

    let out_w = WIDTH >> scale;
    let out_h = HEIGHT >> scale;
    let coverage = Arc::new(Mutex::new(vec![0u32; out_w * out_h]));
    let area = Arc::new(AtomicUsize::new(0));

    let sink = {
        let coverage = coverage.clone();
        let area = area.clone();
        move |info: &ImageInfo, pixels: &[u8], rect: &Rect| {
        assert_eq!(pixels.len(), rect.area() * 3);
        assert_eq!((info.output_width, info.output_height), (out_w as u32, out_h as u32));

            area.fetch_add(rect.area(), Ordering::Relaxed);
            let mut c = coverage.lock().unwrap();
            for y in rect.top..=rect.bottom {
                for x in rect.left..=rect.right {
                    c[usize::from(y) * out_w + usize::from(x)] += 1;
                }
            }
            true
        }
    };
    let sink = Arc::new(Mutex::new(sink));

    let mut pipeline = Pipeline::new(&config).unwrap();
    let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();
    decoder.prepare().unwrap();
    let outcome = run_scan(
        &mut decoder,
        multitask.then_some(&mut pipeline),
        &sink,
        None,
        0,
    )
    .unwrap();

    assert_eq!(outcome, DecodeOutcome::Completed);
    assert_eq!(area.load(Ordering::Relaxed), out_w * out_h);
    assert!(coverage.lock().unwrap().iter().all(|&c| c == 1));
}

/// the pipelined decoder produces the same image as the single threaded one, including
/// when the queue is so short that most MCUs are composited inline
#[rstest]
fn pipelined_matches_single_threaded(
    #[values(1, 2, 24)] queue_capacity: usize,
    #[values(Sampling::S444, Sampling::S420)] sampling: Sampling,
    #[values(PixelFormat::Rgb888, PixelFormat::Rgb565, PixelFormat::Grayscale)]
    pixel_format: PixelFormat,
) {
    let data = encode(64, 48, &test_pattern(64, 48), sampling, 2);
    let config = DecoderConfig {
        queue_capacity,
        pixel_format,
        ..DecoderConfig::default()
    };

    let (_, single) = decode_to_frame(&data, &config, false).unwrap();
    let (outcome, pipelined) = decode_to_frame(&data, &config, true).unwrap();

    assert_eq!(outcome, DecodeOutcome::Completed);
    assert_eq!(single.data().len(), 64 * 48 * pixel_format.bytes_per_pixel());
    assert_eq!(digest(single.data()), digest(pipelined.data()));
    assert_eq!(single.data(), pipelined.data());
}

/// with a restart marker before every MCU the DC predictor is reset each time, so a flat
/// image must not drift as the scan progresses
#[test]
fn restart_interval_one_does_not_drift() {
    let original = vec![[200u8, 60, 90]; 64 * 16];
    let data = encode(64, 16, &original, Sampling::S444, 1);

    for multitask in [false, true] {
        let (_, frame) = decode_to_frame(&data, &DecoderConfig::default(), multitask).unwrap();
        for (i, p) in frame.data().chunks_exact(3).enumerate() {
            for c in 0..3 {
                assert!(
                    (i32::from(p[c]) - i32::from(original[i][c])).abs() <= 4,
                    "pixel {0} channel {1} is {2}",
                    i,
                    c,
                    p[c]
                );
            }
        }
    }
}

#[test]
fn corrupt_huffman_table_is_rejected() {
    let mut data = encode(16, 16, &test_pattern(16, 16), Sampling::S420, 0);
    corrupt_first_dht(&mut data);

    let mut decoder = JpegDecoder::new(&data[..], &DecoderConfig::default()).unwrap();
    let e = decoder.prepare().unwrap_err();
    assert!(
        matches!(
            e.exit_code(),
            ExitCode::MalformedStream | ExitCode::UnsupportedFormat
        ),
        "unexpected {0}",
        e
    );
}

/// Tile sink that counts its calls and returns false from the first one
fn refusing_sink(calls: &Arc<AtomicUsize>) -> Arc<Mutex<impl TileSink + Send + 'static>> {
    let calls = calls.clone();
    Arc::new(Mutex::new(move |_: &ImageInfo, _: &[u8], _: &Rect| {
        calls.fetch_add(1, Ordering::SeqCst);
        false
    }))
}

/// once the tile sink asks to stop, neither sink is called again
#[rstest]
fn stop_after_first_tile(
    #[values(false, true)] multitask: bool,
    #[values(1, 24)] queue_capacity: usize,
) {
    let data = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::S420, 0);
    let config = DecoderConfig {
        queue_capacity,
        ..DecoderConfig::default()
    };

    let tiles = Arc::new(AtomicUsize::new(0));
    let rows = Arc::new(AtomicUsize::new(0));
    let tile_sink = refusing_sink(&tiles);
    let row_sink: SharedRowSink = {
        let rows = rows.clone();
        Arc::new(Mutex::new(move |_: &ImageInfo, _: u32, _: u32| {
            rows.fetch_add(1, Ordering::SeqCst);
            true
        }))
    };

    let mut pipeline = Pipeline::new(&config).unwrap();
    let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();
    decoder.prepare().unwrap();
    let outcome = run_scan(
        &mut decoder,
        multitask.then_some(&mut pipeline),
        &tile_sink,
        Some(row_sink),
        0,
    )
    .unwrap();

    assert_eq!(outcome, DecodeOutcome::Interrupted);
    assert_eq!(tiles.load(Ordering::SeqCst), 1);
    assert_eq!(rows.load(Ordering::SeqCst), 0);
}

/// A slow sink that refuses its first tile, with a one entry queue so the decoding
/// thread composites most MCUs itself while the worker is busy. However the two
/// threads interleave, the sink sees exactly one call.
#[test]
fn stop_is_seen_by_both_threads() {
    let data = encode(64, 64, &test_pattern(64, 64), Sampling::S444, 0);
    let config = DecoderConfig {
        queue_capacity: 1,
        ..DecoderConfig::default()
    };

    let mut pipeline = Pipeline::new(&config).unwrap();
    for run in 0..300 {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = {
            let calls = calls.clone();
            Arc::new(Mutex::new(move |_: &ImageInfo, _: &[u8], _: &Rect| {
                calls.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_micros(20));
                false
            }))
        };

        let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();
        decoder.prepare().unwrap();
        let outcome = decoder
            .decomp_multitask(&mut pipeline, sink, None, 0)
            .unwrap();

        assert_eq!(outcome, DecodeOutcome::Interrupted, "run {0}", run);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "run {0}", run);
    }
}

/// byte source that counts how often the decoder pulls from it
struct CountingSource<'a> {
    data: &'a [u8],
    reads: Arc<AtomicUsize>,
}

impl Read for CountingSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.data.read(buf)
    }
}

/// after a sink refuses a tile the decoder doesn't read any further into the stream
#[test]
fn stop_reads_no_more_input() {
    let data = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::S420, 0);
    let config = DecoderConfig {
        input_buffer_size: 2,
        ..DecoderConfig::default()
    };

    let reads = Arc::new(AtomicUsize::new(0));
    let reads_at_stop = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        data: &data,
        reads: reads.clone(),
    };

    let mut decoder = JpegDecoder::new(source, &config).unwrap();
    decoder.prepare().unwrap();

    let outcome = {
        let reads = reads.clone();
        let reads_at_stop = reads_at_stop.clone();
        decoder
            .decomp(
                &mut |_: &ImageInfo, _: &[u8], _: &Rect| {
                    reads_at_stop.store(reads.load(Ordering::SeqCst), Ordering::SeqCst);
                    false
                },
                None,
                0,
            )
            .unwrap()
    };

    assert_eq!(outcome, DecodeOutcome::Interrupted);
    let at_stop = reads_at_stop.load(Ordering::SeqCst);
    assert!(at_stop > 0);
    assert_eq!(reads.load(Ordering::SeqCst), at_stop);
}

/// row events cover every output row once, in order, and only after the tiles they cover
#[rstest]
fn row_events_follow_their_tiles(
    #[values(0, 1, 5)] lineskip: u32,
    #[values(false, true)] multitask: bool,
) {
    // 5 MCUs per row, 3 MCU rows, the last one partial
    let data = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::S444, 0);
    let config = DecoderConfig {
        queue_capacity: 3,
        ..DecoderConfig::default()
    };

    let tiles = Arc::new(AtomicUsize::new(0));
    let events = Arc::new(Mutex::new(Vec::new()));
    let tile_sink = {
        let tiles = tiles.clone();
        Arc::new(Mutex::new(move |_: &ImageInfo, _: &[u8], _: &Rect| {
            tiles.fetch_add(1, Ordering::SeqCst);
            true
        }))
    };
    let row_sink: SharedRowSink = {
        let tiles = tiles.clone();
        let events = events.clone();
        Arc::new(Mutex::new(
            move |_: &ImageInfo, first_row: u32, row_count: u32| {
                let mcu_rows = (first_row + row_count).div_ceil(8) as usize;
                assert!(tiles.load(Ordering::SeqCst) >= mcu_rows * 5);
                events.lock().unwrap().push((first_row, row_count));
                true
            },
        ))
    };

    let mut pipeline = Pipeline::new(&config).unwrap();
    let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();
    decoder.prepare().unwrap();
    run_scan(
        &mut decoder,
        multitask.then_some(&mut pipeline),
        &tile_sink,
        Some(row_sink),
        lineskip,
    )
    .unwrap();

    let expected = match lineskip {
        0 => vec![(0, 8), (8, 8), (16, 5)],
        1 => vec![(0, 16), (16, 5)],
        _ => vec![(0, 21)],
    };
    assert_eq!(*events.lock().unwrap(), expected);
    assert_eq!(decoder.metrics().row_events(), expected.len() as u64);
}

/// cutting the stream short anywhere gives an error or a partial image, never a panic
#[rstest]
fn truncation_never_panics(#[values(false, true)] multitask: bool) {
    let data = encode(24, 16, &test_pattern(24, 16), Sampling::S420, 1);

    for k in 0..data.len() {
        match decode_to_frame(&data[..k], &DecoderConfig::default(), multitask) {
            Ok(_) => {}
            Err(e) => assert_ne!(
                e.exit_code(),
                ExitCode::AssertionFailure,
                "truncated at {0}: {1}",
                k,
                e
            ),
        }
    }
}

#[test]
fn solid_gray_block() {
    let data = encode(8, 8, &[[128u8; 3]; 64], Sampling::S444, 0);

    let mut tiles = Vec::new();
    let mut decoder = JpegDecoder::new(&data[..], &DecoderConfig::default()).unwrap();
    decoder.prepare().unwrap();
    decoder
        .decomp(
            &mut |_: &ImageInfo, pixels: &[u8], rect: &Rect| {
                tiles.push((*rect, pixels.to_vec()));
                true
            },
            None,
            0,
        )
        .unwrap();

    assert_eq!(tiles.len(), 1);
    assert_eq!(
        tiles[0].0,
        Rect {
            left: 0,
            right: 7,
            top: 0,
            bottom: 7
        }
    );
    assert_eq!(tiles[0].1.len(), 192);
    assert!(tiles[0].1.iter().all(|&v| (126..=130).contains(&v)));
}

/// the alternative output formats are exact conversions of the RGB output
#[test]
fn formats_match_rgb888() {
    let color = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::S420, 0);
    let gray = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::Gray, 0);

    let with_format = |data: &[u8], pixel_format| {
        let config = DecoderConfig {
            pixel_format,
            ..DecoderConfig::default()
        };
        decode_to_frame(data, &config, false).unwrap().1
    };

    let rgb = with_format(&color, PixelFormat::Rgb888);
    let packed = with_format(&color, PixelFormat::Rgb565);
    for (p, px) in packed.data().chunks_exact(2).zip(rgb.data().chunks_exact(3)) {
        let v = u16::from_be_bytes([p[0], p[1]]);
        let expected = (u16::from(px[0] >> 3) << 11)
            | (u16::from(px[1] >> 2) << 5)
            | u16::from(px[2] >> 3);
        assert_eq!(v, expected);
    }

    let rgb = with_format(&gray, PixelFormat::Rgb888);
    let luma = with_format(&gray, PixelFormat::Grayscale);
    assert_eq!(luma.bytes_per_pixel(), 1);
    for (l, px) in luma.data().iter().zip(rgb.data().chunks_exact(3)) {
        assert_eq!(*l, px[0]);
    }
}

/// every decoder option produces the same pixels
#[rstest]
fn fixtures_decode_identically_in_every_mode(
    #[values("python", "python-raw", "2x2")] file: &str,
) {
    let data = read_file(file, ".jpg");

    let (outcome, reference) = decode_to_frame(&data, &DecoderConfig::default(), false).unwrap();
    assert_eq!(outcome, DecodeOutcome::Completed);
    let expected = digest(reference.data());

    let variants = [
        DecoderConfig {
            fast_huffman: false,
            ..DecoderConfig::default()
        },
        DecoderConfig {
            simd_idct: false,
            ..DecoderConfig::default()
        },
        DecoderConfig::compact(),
        DecoderConfig {
            queue_capacity: 1,
            ..DecoderConfig::default()
        },
    ];

    for config in &variants {
        for multitask in [false, true] {
            let (_, frame) = decode_to_frame(&data, config, multitask).unwrap();
            assert_eq!(digest(frame.data()), expected, "{0:?}", config);
        }
    }
}

#[test]
fn fixture_geometry() {
    let data = read_file("python", ".jpg");
    let mut decoder = JpegDecoder::new(&data[..], &DecoderConfig::default()).unwrap();
    decoder.prepare().unwrap();

    let info = *decoder.image_info();
    assert_eq!((info.width, info.height), (16, 16));
    assert_eq!(info.components, 3);
    assert_eq!((info.mcu_width, info.mcu_height), (16, 16));

    let data = read_file("2x2", ".jpg");
    let (_, frame) = decode_to_frame(&data, &DecoderConfig::default(), false).unwrap();
    assert_eq!((frame.width(), frame.height()), (2, 2));
    assert_eq!(frame.data(), &[128u8; 12][..]);
}

#[test]
fn progressive_is_unsupported() {
    let data = read_file("progressive-stripe", ".jpg");
    let mut decoder = JpegDecoder::new(&data[..], &DecoderConfig::default()).unwrap();
    assert_eq!(
        decoder.prepare().unwrap_err().exit_code(),
        ExitCode::UnsupportedFormat
    );
}

#[test]
fn oversized_image_is_unsupported() {
    let data = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::S444, 0);
    let config = DecoderConfig {
        max_width: 32,
        ..DecoderConfig::default()
    };

    let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();
    assert_eq!(
        decoder.prepare().unwrap_err().exit_code(),
        ExitCode::UnsupportedFormat
    );
}

/// a panic inside the sink on the worker thread is reported rather than propagated
#[test]
fn worker_sink_panic_is_an_assertion() {
    let data = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::S444, 0);
    let config = DecoderConfig::default();

    let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();
    decoder.prepare().unwrap();

    let mut pipeline = Pipeline::new(&config).unwrap();
    let e = decoder
        .decomp_multitask(
            &mut pipeline,
            Arc::new(Mutex::new(|_: &ImageInfo, _: &[u8], rect: &Rect| -> bool {
                if rect.left == 8 {
                    panic!("sink failure");
                }
                true
            })),
            None,
            0,
        )
        .unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::AssertionFailure);

    // the pipeline is still usable afterwards
    let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();
    decoder.prepare().unwrap();
    let frame = Arc::new(Mutex::new(FrameBuffer::new(decoder.image_info())));
    let outcome = decoder
        .decomp_multitask(&mut pipeline, frame.clone(), None, 0)
        .unwrap();
    assert_eq!(outcome, DecodeOutcome::Completed);
    assert_eq!(decoder.metrics().tiles_emitted(), 15);
}

/// one worker thread serves every decode the pipeline runs
#[test]
fn pipeline_keeps_its_worker() {
    let data = encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::S444, 0);
    let config = DecoderConfig {
        queue_capacity: 64,
        ..DecoderConfig::default()
    };

    let threads = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let threads = threads.clone();
        Arc::new(Mutex::new(move |_: &ImageInfo, _: &[u8], _: &Rect| {
            threads.lock().unwrap().push(thread::current().id());
            true
        }))
    };

    let mut pipeline = Pipeline::new(&config).unwrap();
    for _ in 0..3 {
        let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();
        decoder.prepare().unwrap();
        decoder
            .decomp_multitask(&mut pipeline, sink.clone(), None, 0)
            .unwrap();
    }

    // the queue is deep enough that every MCU goes to the worker
    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 3 * 15);
    assert!(threads.iter().all(|id| *id == threads[0]));
    assert_ne!(threads[0], thread::current().id());

    drop(pipeline);
    assert_eq!(Arc::strong_count(&sink), 1);
}

/// several images back to back in one source are decoded one after the other
#[test]
fn concatenated_images() {
    let mut data = encode(16, 8, &test_pattern(16, 8), Sampling::S444, 0);
    data.extend(encode(WIDTH, HEIGHT, &test_pattern(WIDTH, HEIGHT), Sampling::S420, 2));

    let config = DecoderConfig::default();
    let mut pipeline = Pipeline::new(&config).unwrap();
    let mut decoder = JpegDecoder::new(&data[..], &config).unwrap();

    decoder.prepare().unwrap();
    assert_eq!((decoder.width(), decoder.height()), (16, 8));
    let mut frame = FrameBuffer::new(decoder.image_info());
    decoder.decomp(&mut frame, None, 0).unwrap();

    decoder.prepare().unwrap();
    assert_eq!((decoder.width(), decoder.height()), (37, 21));
    assert_eq!(decoder.restart_interval(), 2);
    let frame = Arc::new(Mutex::new(FrameBuffer::new(decoder.image_info())));
    let outcome = decoder
        .decomp_multitask(&mut pipeline, frame.clone(), None, 0)
        .unwrap();
    assert_eq!(outcome, DecodeOutcome::Completed);

    assert_eq!(decoder.metrics().mcus_decoded(), 2 + 3 * 2);
}
