//! vc5 CLI - encode, decode, and inspect VC-5 bitstreams.
//!
//! Works on raw little-endian 16-bit planar component files; packed pixel
//! formats are out of scope for this tool.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use vc5_rs::tag::{is_tag_optional, required_tag, CodecTag, START_MARKER};
use vc5_rs::{
    decode_image, encode_image, CodecError, ComponentArray, DecoderParameters, EncoderParameters,
    FileStream, ImageFormat, MemoryStream, UnpackedImage,
};

/// VC-5 (SMPTE ST 2073) wavelet still-image codec
#[derive(Parser)]
#[command(name = "vc5")]
#[command(version)]
#[command(about = "VC-5 wavelet codec for encoding and decoding still images", long_about = None)]
#[command(after_help = "EXAMPLES:
    vc5 encode -i frame.raw -o frame.vc5 -w 1920 -H 1080 -p bayer
    vc5 encode -i frame.raw -o frame.vc5 -w 1920 -H 1080 -p rgb --lossless
    vc5 decode -i frame.vc5 -o frame.raw
    vc5 info -i frame.vc5

Raw files hold each component array in row-major order, one channel after
another, 16 bits per sample, little endian.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode raw component arrays into a VC-5 bitstream
    #[command(visible_alias = "e")]
    Encode {
        /// Input raw component file
        #[arg(short, long)]
        input: PathBuf,

        /// Output bitstream file
        #[arg(short, long)]
        output: PathBuf,

        /// Image width in samples
        #[arg(short, long)]
        width: u32,

        /// Image height in rows
        #[arg(short = 'H', long)]
        height: u32,

        /// Pixel arrangement of the image
        #[arg(short = 'p', long = "pixel", default_value = "bayer", value_enum)]
        pixel: PixelFormat,

        /// Bits per component in the source (8-16)
        #[arg(short, long, default_value = "12")]
        bits: u32,

        /// Use a quantization divisor of one on every subband
        #[arg(long)]
        lossless: bool,
    },

    /// Decode a VC-5 bitstream to raw component arrays
    #[command(visible_alias = "d")]
    Decode {
        /// Input bitstream file
        #[arg(short, long)]
        input: PathBuf,

        /// Output raw component file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the header parameters of a VC-5 bitstream
    #[command(visible_alias = "i")]
    Info {
        /// Input bitstream file
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PixelFormat {
    /// Bayer pattern, four channels of quarter resolution
    Bayer,
    /// Three full-resolution RGB channels
    Rgb,
    /// Four full-resolution RGBA channels
    Rgba,
    /// Three full-resolution YCbCr channels
    Ycbcr,
}

impl PixelFormat {
    fn image_format(self) -> ImageFormat {
        match self {
            PixelFormat::Bayer => ImageFormat::Bayer,
            PixelFormat::Rgb | PixelFormat::Rgba => ImageFormat::Rgba,
            PixelFormat::Ycbcr => ImageFormat::YCbCrA,
        }
    }

    fn components_per_sample(self) -> u32 {
        match self {
            PixelFormat::Bayer => 1,
            PixelFormat::Rgb | PixelFormat::Ycbcr => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            width,
            height,
            pixel,
            bits,
            lossless,
        } => encode_command(&input, &output, width, height, pixel, bits, lossless),
        Commands::Decode { input, output } => decode_command(&input, &output),
        Commands::Info { input } => info_command(&input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::from(error.code() as u8)
        }
    }
}

fn encode_command(
    input: &PathBuf,
    output: &PathBuf,
    width: u32,
    height: u32,
    pixel: PixelFormat,
    bits: u32,
    lossless: bool,
) -> Result<(), CodecError> {
    let format = pixel.image_format();
    let parameters = EncoderParameters {
        image_format: format,
        image_width: width,
        image_height: height,
        components_per_sample: pixel.components_per_sample(),
        bits_per_component: bits,
        quant_table: if lossless {
            vc5_rs::IDENTITY_QUANT_TABLE
        } else {
            vc5_rs::DEFAULT_QUANT_TABLE
        },
        ..EncoderParameters::default()
    };

    let image = read_raw_image(input, format, width, height, pixel.components_per_sample(), bits)?;

    let mut stream = FileStream::create(output)?;
    encode_image(&image, &mut stream, &parameters)?;
    stream.flush()?;
    Ok(())
}

fn decode_command(input: &PathBuf, output: &PathBuf) -> Result<(), CodecError> {
    let bytes = fs::read(input).map_err(|_| CodecError::StreamIo)?;
    let mut stream = MemoryStream::from_vec(bytes);
    let image = decode_image(&mut stream, &DecoderParameters::default())?;

    let mut raw = Vec::new();
    for component in &image.components {
        for &sample in &component.data {
            raw.extend_from_slice(&sample.to_le_bytes());
        }
    }
    fs::write(output, raw).map_err(|_| CodecError::StreamIo)?;

    eprintln!(
        "decoded {}x{} {:?} image with {} channel(s)",
        image.width,
        image.height,
        image.format,
        image.components.len()
    );
    Ok(())
}

fn info_command(input: &PathBuf) -> Result<(), CodecError> {
    use vc5_rs::bitstream::BitstreamReader;

    let bytes = fs::read(input).map_err(|_| CodecError::StreamIo)?;
    let mut stream = MemoryStream::from_vec(bytes);
    let mut reader = BitstreamReader::new(&mut stream);

    if reader.get_long()? != START_MARKER {
        return Err(CodecError::MissingStartMarker);
    }
    println!("VC-5 bitstream");

    // Print the tag-value pairs up to the first chunk element.
    loop {
        let pair = match reader.get_segment() {
            Ok(pair) => pair,
            Err(CodecError::StreamEof) => break,
            Err(error) => return Err(error),
        };
        let tag = required_tag(pair.tag);
        if (tag as u16 & 0x6000) != 0 {
            println!("  first chunk element: 0x{:04X}", tag as u16);
            break;
        }
        let optional = if is_tag_optional(pair.tag) { " (optional)" } else { "" };
        match CodecTag::try_from(tag) {
            Ok(codec_tag) => {
                println!("  {:?} = {}{}", codec_tag, pair.value, optional);
            }
            Err(_) => {
                println!("  tag {} = {}{}", tag, pair.value, optional);
            }
        }
    }
    Ok(())
}

fn read_raw_image(
    input: &PathBuf,
    format: ImageFormat,
    width: u32,
    height: u32,
    components_per_sample: u32,
    bits: u32,
) -> Result<UnpackedImage, CodecError> {
    let bytes = fs::read(input).map_err(|_| CodecError::StreamIo)?;
    let (channel_width, channel_height, channel_total) = match format {
        ImageFormat::Bayer => (width / 2, height / 2, 4),
        _ => (width, height, components_per_sample as usize),
    };
    let samples_per_channel = (channel_width as usize) * (channel_height as usize);
    if bytes.len() != samples_per_channel * channel_total * 2 {
        return Err(CodecError::ImageDimensions);
    }

    let mut components = Vec::with_capacity(channel_total);
    for channel in 0..channel_total {
        let start = channel * samples_per_channel * 2;
        let data: Vec<u16> = bytes[start..start + samples_per_channel * 2]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        components.push(ComponentArray::with_data(
            channel_width,
            channel_height,
            bits,
            data,
        ));
    }
    Ok(UnpackedImage {
        format,
        width,
        height,
        components,
    })
}
