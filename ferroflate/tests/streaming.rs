//! Push-model streaming tests: arbitrary input splits, output
//! backpressure, and state retention across calls.

use ferroflate::{
    CompressStatus, Compressor, DecompressStatus, Decompressor, Deflater, FlushMode, GzipDecoder,
    GzipEncoder, Inflater, ZlibDecoder, ZlibEncoder,
};

fn sample_data() -> Vec<u8> {
    let mut data = Vec::new();
    while data.len() < 150_000 {
        data.extend_from_slice(b"streaming payload that repeats itself over and over ");
    }
    data
}

/// Feed `input` to a decompressor in `chunk` sized pieces with a small
/// output buffer, collecting everything produced.
fn decompress_chunked<D: Decompressor>(
    decoder: &mut D,
    input: &[u8],
    chunk: usize,
    out_size: usize,
) -> Vec<u8> {
    let mut result = Vec::new();
    let mut out = vec![0u8; out_size];

    for piece in input.chunks(chunk) {
        let mut pos = 0;
        loop {
            let (used, written, status) = decoder.decompress(&piece[pos..], &mut out).unwrap();
            pos += used;
            result.extend_from_slice(&out[..written]);
            if status != DecompressStatus::NeedsOutput && pos >= piece.len() {
                break;
            }
        }
    }
    result
}

/// Push `input` through a compressor in `chunk` sized pieces.
fn compress_chunked<C: Compressor>(encoder: &mut C, input: &[u8], chunk: usize) -> Vec<u8> {
    let mut result = Vec::new();
    let mut out = vec![0u8; 4096];
    let mut pos = 0;

    loop {
        let end = (pos + chunk).min(input.len());
        let flush = if pos >= input.len() {
            FlushMode::Finish
        } else {
            FlushMode::None
        };
        let (used, written, status) = encoder.compress(&input[pos..end], &mut out, flush).unwrap();
        pos += used;
        result.extend_from_slice(&out[..written]);
        if status == CompressStatus::Done {
            break;
        }
    }
    result
}

#[test]
fn test_chunked_compression_matches_one_shot() {
    let data = sample_data();

    for chunk in [1usize << 16, 4096, 1023] {
        let mut deflater = Deflater::new(6).unwrap();
        let streamed = compress_chunked(&mut deflater, &data, chunk);
        assert_eq!(
            ferroflate::inflate(&streamed).unwrap(),
            data,
            "chunk {chunk}"
        );
    }

    // Below the block-buffering threshold the push path and the one-shot
    // path emit identical bytes, however the input was split.
    let small = &data[..40_000];
    let one_shot = ferroflate::deflate(small, 6).unwrap();
    for chunk in [40_001usize, 1000, 1] {
        let mut deflater = Deflater::new(6).unwrap();
        assert_eq!(
            compress_chunked(&mut deflater, small, chunk),
            one_shot,
            "chunk {chunk}"
        );
    }
}

#[test]
fn test_chunked_inflate_any_split() {
    let data = sample_data();
    let compressed = ferroflate::deflate(&data, 6).unwrap();

    for chunk in [1usize, 7, 1024, compressed.len()] {
        let mut inflater = Inflater::new();
        let result = decompress_chunked(&mut inflater, &compressed, chunk, 8192);
        assert_eq!(result, data, "chunk {chunk}");
        assert!(inflater.is_finished());
    }
}

#[test]
fn test_inflate_tiny_output_buffer() {
    let data = sample_data();
    let compressed = ferroflate::deflate(&data, 6).unwrap();

    let mut inflater = Inflater::new();
    let result = decompress_chunked(&mut inflater, &compressed, compressed.len(), 13);
    assert_eq!(result, data);
}

#[test]
fn test_needs_input_on_partial_stream() {
    let compressed = ferroflate::deflate(&sample_data(), 6).unwrap();

    let mut inflater = Inflater::new();
    let mut out = [0u8; 4096];
    let half = compressed.len() / 2;
    let (consumed, _, mut status) = inflater.decompress(&compressed[..half], &mut out).unwrap();
    assert_eq!(consumed, half);

    // Drain any backlog; without the rest of the input we must end on
    // NeedsInput, never an error.
    while status == DecompressStatus::NeedsOutput {
        let (_, _, next) = inflater.decompress(&[], &mut out).unwrap();
        status = next;
    }
    assert_eq!(status, DecompressStatus::NeedsInput);
    assert!(!inflater.is_finished());
}

#[test]
fn test_zlib_streaming_roundtrip() {
    let data = sample_data();

    let mut encoder = ZlibEncoder::new(6).unwrap();
    let compressed = compress_chunked(&mut encoder, &data, 4096);

    let mut decoder = ZlibDecoder::new();
    let result = decompress_chunked(&mut decoder, &compressed, 997, 8192);
    assert_eq!(result, data);
    assert!(decoder.is_finished());
}

#[test]
fn test_gzip_streaming_roundtrip() {
    let data = sample_data();

    let mut encoder = GzipEncoder::new(6).unwrap();
    let compressed = compress_chunked(&mut encoder, &data, 4096);

    let mut decoder = GzipDecoder::new();
    let result = decompress_chunked(&mut decoder, &compressed, 1, 8192);
    assert_eq!(result, data);
    assert!(decoder.is_finished());
}

#[test]
fn test_header_split_across_calls() {
    let compressed = ferroflate::zlib_compress(b"split header", 6).unwrap();

    let mut decoder = ZlibDecoder::new();
    let mut out = [0u8; 64];

    // One header byte only: no progress, no error.
    let (used, written, status) = decoder.decompress(&compressed[..1], &mut out).unwrap();
    assert_eq!((used, written), (1, 0));
    assert_eq!(status, DecompressStatus::NeedsInput);

    let result = decompress_chunked(&mut decoder, &compressed[1..], 3, 64);
    assert_eq!(result, b"split header");
}

#[test]
fn test_error_poisons_stream() {
    let mut inflater = Inflater::new();
    let mut out = [0u8; 64];

    assert!(inflater.decompress(&[0x07], &mut out).is_err());
    // The stream stays dead even for valid input.
    let good = ferroflate::deflate(b"ok", 6).unwrap();
    assert!(inflater.decompress(&good, &mut out).is_err());
}

#[test]
fn test_reset_allows_reuse() {
    let first = ferroflate::deflate(b"first stream", 6).unwrap();
    let second = ferroflate::deflate(b"second stream", 6).unwrap();

    let mut inflater = Inflater::new();
    assert_eq!(inflater.decompress_all(&first).unwrap(), b"first stream");

    Decompressor::reset(&mut inflater);
    assert_eq!(inflater.decompress_all(&second).unwrap(), b"second stream");
}

#[test]
fn test_compressor_rejects_input_after_done() {
    let mut deflater = Deflater::new(6).unwrap();
    let mut out = vec![0u8; 4096];

    let (_, _, status) = deflater
        .compress(b"only stream", &mut out, FlushMode::Finish)
        .unwrap();
    assert_eq!(status, CompressStatus::Done);
    assert!(deflater.is_finished());

    let (consumed, _, _) = deflater.compress(b"more", &mut out, FlushMode::None).unwrap();
    assert_eq!(consumed, 0);
}
