//! ferroflate CLI - Pure Rust DEFLATE compression tool
//!
//! Compresses and decompresses files with raw DEFLATE, zlib, or gzip framing.

use clap::{Parser, Subcommand, ValueEnum};
use ferroflate::{Format, GzipHeader, Options};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ferroflate")]
#[command(
    author,
    version,
    about = "Pure Rust DEFLATE compression with zlib and gzip framing"
)]
#[command(long_about = "
ferroflate compresses and decompresses single files using DEFLATE
(RFC 1951), with optional zlib (RFC 1950) or gzip (RFC 1952) framing.

Examples:
  ferroflate compress data.txt
  ferroflate compress data.txt -o data.txt.gz
  ferroflate compress data.txt --format raw --level 9
  ferroflate decompress data.txt.gz
  ferroflate decompress data.zz --format zlib -o data.txt
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file
    #[command(alias = "c")]
    Compress {
        /// File to compress
        input: PathBuf,

        /// Output file (derived from the input name and format if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stream framing (inferred from the output extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<StreamFormat>,

        /// Compression level, 0 (store) through 9 (best)
        #[arg(short, long, default_value_t = 6)]
        level: u8,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decompress a file
    #[command(alias = "d", alias = "x")]
    Decompress {
        /// File to decompress
        input: PathBuf,

        /// Output file (derived from the input name if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stream framing (inferred from the input extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<StreamFormat>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Stream framing around the DEFLATE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StreamFormat {
    /// Bare DEFLATE bit stream
    Raw,
    /// zlib framing (RFC 1950)
    Zlib,
    /// gzip framing (RFC 1952)
    Gzip,
}

impl From<StreamFormat> for Format {
    fn from(format: StreamFormat) -> Self {
        match format {
            StreamFormat::Raw => Format::Raw,
            StreamFormat::Zlib => Format::Zlib,
            StreamFormat::Gzip => Format::Gzip,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            format,
            level,
            verbose,
        } => cmd_compress(&input, output, format, level, verbose),
        Commands::Decompress {
            input,
            output,
            format,
            verbose,
        } => cmd_decompress(&input, output, format, verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Pick the framing from an explicit flag or a filename extension.
fn infer_format(explicit: Option<StreamFormat>, path: &Path) -> Format {
    if let Some(format) = explicit {
        return format.into();
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "gz" | "gzip" => Format::Gzip,
        "deflate" => Format::Raw,
        _ => Format::Zlib,
    }
}

/// Default suffix for each framing when no output name is given.
fn format_extension(format: Format) -> &'static str {
    match format {
        Format::Raw => "deflate",
        Format::Zlib => "zz",
        Format::Gzip => "gz",
    }
}

fn cmd_compress(
    input: &PathBuf,
    output: Option<PathBuf>,
    format: Option<StreamFormat>,
    level: u8,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Infer from the output name when one is given, otherwise derive the
    // output name from the format.
    let format = match &output {
        Some(path) => infer_format(format, path),
        None => format.map(Format::from).unwrap_or_default(),
    };
    let output = output.unwrap_or_else(|| {
        let mut name = input.as_os_str().to_owned();
        name.push(".");
        name.push(format_extension(format));
        PathBuf::from(name)
    });

    let data = std::fs::read(input)?;

    let compressed = if format == Format::Gzip {
        // Record the original filename in the gzip header, as gzip(1) does.
        let filename = input.file_name().and_then(|n| n.to_str());
        let header = GzipHeader {
            filename: filename.map(String::from),
            ..GzipHeader::default()
        };
        ferroflate::gzip_compress_with_header(&data, header, level)?
    } else {
        ferroflate::compress(&data, &Options { level, format })?
    };

    if verbose {
        println!("Format: {:?}, level {}", format, level);
    }

    std::fs::write(&output, &compressed)?;
    print_summary(input, &output, data.len(), compressed.len());
    Ok(())
}

fn cmd_decompress(
    input: &PathBuf,
    output: Option<PathBuf>,
    format: Option<StreamFormat>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = infer_format(format, input);
    let data = std::fs::read(input)?;

    let output = output
        .or_else(|| {
            // A gzip header may carry the original filename.
            if format == Format::Gzip {
                if let Ok(Some(header)) = ferroflate::gzip_header(&data) {
                    if let Some(name) = header.filename {
                        return Some(input.with_file_name(name));
                    }
                }
            }
            None
        })
        .unwrap_or_else(|| default_decompressed_name(input));

    let decompressed = ferroflate::decompress(&data, format)?;

    if verbose {
        println!("Format: {:?}", format);
    }

    std::fs::write(&output, &decompressed)?;
    print_summary(input, &output, data.len(), decompressed.len());
    Ok(())
}

/// Strip a known compression suffix, or append `.out` when there is none.
fn default_decompressed_name(input: &Path) -> PathBuf {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "gz" | "gzip" | "zz" | "zlib" | "deflate" => input.with_extension(""),
        _ => {
            let mut name = input.as_os_str().to_owned();
            name.push(".out");
            PathBuf::from(name)
        }
    }
}

fn print_summary(input: &Path, output: &Path, in_size: usize, out_size: usize) {
    println!(
        "{} ({} bytes) -> {} ({} bytes)",
        input.display(),
        in_size,
        output.display(),
        out_size
    );
    if in_size > 0 && out_size > 0 {
        let ratio = if out_size <= in_size {
            (1.0 - out_size as f64 / in_size as f64) * 100.0
        } else {
            -((out_size as f64 / in_size as f64 - 1.0) * 100.0)
        };
        println!("Space saved: {:.1}%", ratio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_format_from_extension() {
        assert_eq!(
            infer_format(None, Path::new("data.txt.gz")),
            Format::Gzip
        );
        assert_eq!(
            infer_format(None, Path::new("data.deflate")),
            Format::Raw
        );
        assert_eq!(infer_format(None, Path::new("data.zz")), Format::Zlib);
        assert_eq!(infer_format(None, Path::new("data.bin")), Format::Zlib);
    }

    #[test]
    fn test_explicit_format_wins() {
        assert_eq!(
            infer_format(Some(StreamFormat::Raw), Path::new("data.gz")),
            Format::Raw
        );
    }

    #[test]
    fn test_default_decompressed_name() {
        assert_eq!(
            default_decompressed_name(Path::new("data.txt.gz")),
            Path::new("data.txt")
        );
        assert_eq!(
            default_decompressed_name(Path::new("data.bin")),
            Path::new("data.bin.out")
        );
    }
}
