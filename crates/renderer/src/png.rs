//! PNG encoding for rendered maps.
//!
//! Drought maps use a handful of flat colours, so the encoder first tries an
//! indexed image (colour type 3) and only falls back to truecolour with alpha
//! (colour type 6) when more than 256 colours are present.

use cdi_common::{CdiError, CdiResult};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::Write;

use crate::style::Rgba;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const MAX_PALETTE_SIZE: usize = 256;

/// Images with at least this many pixels collect their colours in parallel.
const PARALLEL_THRESHOLD: usize = 64 * 64;

/// Encode RGBA pixels, choosing indexed output when the palette fits.
pub fn encode_png(pixels: &[u8], width: usize, height: usize) -> CdiResult<Vec<u8>> {
    if pixels.len() != width * height * 4 {
        return Err(CdiError::RenderError(format!(
            "pixel buffer holds {} bytes, expected {} for {}x{}",
            pixels.len(),
            width * height * 4,
            width,
            height
        )));
    }

    match build_palette(pixels) {
        Some((palette, indices)) => encode_indexed(width, height, &palette, &indices),
        None => encode_rgba(pixels, width, height),
    }
}

#[inline(always)]
fn pack(px: &[u8]) -> u32 {
    u32::from_le_bytes([px[0], px[1], px[2], px[3]])
}

#[inline(always)]
fn unpack(packed: u32) -> Rgba {
    let [r, g, b, a] = packed.to_le_bytes();
    (r, g, b, a)
}

/// Palette plus one index per pixel, or `None` past 256 colours.
fn build_palette(pixels: &[u8]) -> Option<(Vec<Rgba>, Vec<u8>)> {
    let colors = if pixels.len() / 4 >= PARALLEL_THRESHOLD {
        distinct_colors_parallel(pixels)?
    } else {
        distinct_colors(pixels)?
    };

    let lookup: HashMap<u32, u8> = colors
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, i as u8))
        .collect();
    let palette = colors.into_iter().map(unpack).collect();

    let indices = pixels
        .par_chunks_exact(4)
        .map(|px| lookup.get(&pack(px)).copied().unwrap_or(0))
        .collect();

    Some((palette, indices))
}

/// Distinct colours in first-seen order.
fn distinct_colors(pixels: &[u8]) -> Option<Vec<u32>> {
    let mut seen = HashSet::with_capacity(MAX_PALETTE_SIZE);
    let mut colors = Vec::with_capacity(MAX_PALETTE_SIZE);
    for px in pixels.chunks_exact(4) {
        let packed = pack(px);
        if seen.insert(packed) {
            if colors.len() == MAX_PALETTE_SIZE {
                return None;
            }
            colors.push(packed);
        }
    }
    Some(colors)
}

fn distinct_colors_parallel(pixels: &[u8]) -> Option<Vec<u32>> {
    let chunk_size = (pixels.len() / 4 / rayon::current_num_threads()).max(256) * 4;

    let partials: Vec<Option<Vec<u32>>> = pixels
        .par_chunks(chunk_size)
        .map(distinct_colors)
        .collect();

    let mut seen = HashSet::with_capacity(MAX_PALETTE_SIZE);
    let mut colors = Vec::with_capacity(MAX_PALETTE_SIZE);
    for partial in partials {
        for packed in partial? {
            if seen.insert(packed) {
                if colors.len() == MAX_PALETTE_SIZE {
                    return None;
                }
                colors.push(packed);
            }
        }
    }
    Some(colors)
}

fn header(width: usize, height: usize, color_type: u8) -> [u8; 13] {
    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&(width as u32).to_be_bytes());
    ihdr[4..8].copy_from_slice(&(height as u32).to_be_bytes());
    ihdr[8] = 8; // bit depth
    ihdr[9] = color_type;
    // compression, filter and interlace stay 0
    ihdr
}

fn encode_indexed(width: usize, height: usize, palette: &[Rgba], indices: &[u8]) -> CdiResult<Vec<u8>> {
    let mut png = SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &header(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|&(r, g, b, _)| [r, g, b]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|&(_, _, _, a)| a < 255) {
        let trns: Vec<u8> = palette.iter().map(|&(_, _, _, a)| a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    write_chunk(&mut png, b"IDAT", &deflate_scanlines(indices, width, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> CdiResult<Vec<u8>> {
    let mut png = SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &header(width, height, 6));
    write_chunk(&mut png, b"IDAT", &deflate_scanlines(pixels, width * 4, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Prefix every row with filter type 0 and zlib-compress the result.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> CdiResult<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (row_bytes + 1));
    for row in data.chunks_exact(row_bytes.max(1)).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let compress_failed = |e: std::io::Error| CdiError::RenderError(format!("IDAT compression failed: {}", e));
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&raw).map_err(compress_failed)?;
    encoder.finish().map_err(compress_failed)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
