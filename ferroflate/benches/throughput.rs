//! Throughput benchmarks for the DEFLATE codec.

use ferroflate::{deflate, inflate};

fn main() {
    let test_cases = vec![
        ("small_random", generate_random(1024)),
        ("medium_random", generate_random(64 * 1024)),
        ("large_random", generate_random(1024 * 1024)),
        ("small_repeated", generate_repeated(1024)),
        ("medium_repeated", generate_repeated(64 * 1024)),
        ("large_repeated", generate_repeated(1024 * 1024)),
        ("small_text", generate_text_like(1024)),
        ("medium_text", generate_text_like(64 * 1024)),
        ("large_text", generate_text_like(1024 * 1024)),
    ];

    println!("DEFLATE Throughput Benchmarks");
    println!("=============================\n");

    for (name, data) in &test_cases {
        println!("Test: {} ({} bytes)", name, data.len());

        for level in [1, 6, 9] {
            let start = std::time::Instant::now();
            let compressed = deflate(data, level).expect("compression failed");
            let compress_time = start.elapsed();

            let start = std::time::Instant::now();
            let restored = inflate(&compressed).expect("decompression failed");
            let inflate_time = start.elapsed();

            assert_eq!(&restored, data);

            let mib = data.len() as f64 / 1024.0 / 1024.0;
            let ratio = data.len() as f64 / compressed.len() as f64;
            println!(
                "  Level {}: deflate {:7.2} MiB/s, inflate {:7.2} MiB/s, {:.2}x ratio ({} bytes)",
                level,
                mib / compress_time.as_secs_f64(),
                mib / inflate_time.as_secs_f64(),
                ratio,
                compressed.len()
            );
        }
        println!();
    }
}

fn generate_random(size: usize) -> Vec<u8> {
    // Simple LCG so runs are reproducible.
    let mut data = Vec::with_capacity(size);
    let mut seed = 12345u32;
    for _ in 0..size {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((seed >> 16) as u8);
    }
    data
}

fn generate_repeated(size: usize) -> Vec<u8> {
    let pattern = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn generate_text_like(size: usize) -> Vec<u8> {
    let words: &[&[u8]] = &[
        b"the", b"quick", b"brown", b"fox", b"jumps", b"over", b"lazy", b"dog", b"and", b"runs",
        b"through", b"forest", b"near", b"river", b"under", b"blue", b"sky", b"with", b"wind",
        b"blowing",
    ];
    let mut data = Vec::with_capacity(size);
    let mut seed = 42u32;

    while data.len() < size {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        let word_idx = (seed as usize) % words.len();
        data.extend_from_slice(words[word_idx]);
        data.push(b' ');
    }
    data.truncate(size);
    data
}
