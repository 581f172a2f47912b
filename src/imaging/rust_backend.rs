//! Production image backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::ImageReader` |
//! | Decode fallback (truncated JPEG) | `mozjpeg::Decompress` |
//! | Decode fallback (truncated PNG) | `png::Reader` row by row |
//! | Decode fallback (truncated GIF) | `gif::Decoder`, first frame |
//! | Decode fallback (truncated WebP) | libwebp incremental decoder (`libwebp-sys`) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `mozjpeg::Compress` (progressive, optimized Huffman) |
//! | Encode → WebP | `webp::Encoder::encode_advanced` (lossy, libwebp) |
//! | Encode → PNG, GIF | `image::DynamicImage::write_to` |
//! | Write | `tempfile::NamedTempFile` in the output directory, then `persist` |
//!
//! ## Truncated sources
//!
//! A source the `image` decoder rejects gets a second, tolerant pass with a
//! codec-specific decoder. Whatever pixels that pass recovers are kept and the
//! rest of the canvas stays black, so a cut-off download still yields
//! derivatives of its full declared size.
//!
//! Every output is written to a uniquely named temporary file next to its
//! destination and renamed into place, so an interrupted run never leaves a
//! half-written derivative under its final name.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::encoding::{prepare_for_encoding, select_encoding};
use super::params::{EncodeFormat, EncodeParams, ResizeParams};
use image::imageops::FilterType;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage,
};
use libwebp_sys::{VP8StatusCode, WEBP_CSP_MODE};
use std::ffi::c_int;
use std::io::{Cursor, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Backend built on the `image` crate with libwebp and mozjpeg encoders.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, reason: impl Into<String>) -> BackendError {
    BackendError::Decode {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Load and fully decode an image, reporting the format it was stored in.
fn load_image(path: &Path) -> Result<(DynamicImage, Option<EncodeFormat>), BackendError> {
    let mut reader = ImageReader::open(path)?.with_guessed_format()?;
    reader.no_limits();
    let format = reader
        .format()
        .and_then(EncodeFormat::from_image_format)
        .or_else(|| EncodeFormat::from_path(path));

    match (reader.decode(), format) {
        (Ok(img), _) => Ok((img, format)),
        (Err(e), Some(format)) => match decode_tolerant(path, format) {
            Ok(img) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "image is damaged, decoded what was readable"
                );
                Ok((img, Some(format)))
            }
            Err(retry) => {
                debug!(path = %path.display(), error = %retry, "tolerant decode failed");
                Err(decode_error(path, e.to_string()))
            }
        },
        (Err(e), None) => Err(decode_error(path, e.to_string())),
    }
}

/// Best-effort decode of a damaged or cut-off file.
fn decode_tolerant(path: &Path, format: EncodeFormat) -> Result<DynamicImage, BackendError> {
    let data = std::fs::read(path)?;
    match format {
        EncodeFormat::Jpeg => decode_jpeg_tolerant(path, &data),
        EncodeFormat::Png => decode_png_tolerant(path, &data),
        EncodeFormat::Gif => decode_gif_tolerant(path, &data),
        EncodeFormat::WebP => decode_webp_tolerant(path, &data),
    }
}

/// Decode a JPEG through mozjpeg, accepting premature end of data.
///
/// mozjpeg reports fatal libjpeg errors by unwinding, hence `catch_unwind`.
fn decode_jpeg_tolerant(path: &Path, data: &[u8]) -> Result<DynamicImage, BackendError> {
    let decoded = catch_unwind(AssertUnwindSafe(|| -> std::io::Result<(usize, usize, Vec<u8>)> {
        let decompress = mozjpeg::Decompress::new_mem(data)?;
        let (width, height) = (decompress.width(), decompress.height());
        let mut started = decompress.rgb()?;
        let scanlines: Vec<[u8; 3]> = started.read_scanlines()?;
        started.finish()?;
        Ok((width, height, scanlines.into_iter().flatten().collect()))
    }))
    .map_err(|_| decode_error(path, "libjpeg aborted"))?
    .map_err(|e| decode_error(path, e.to_string()))?;

    let (width, height, mut pixels) = decoded;
    // Pad with black if libjpeg stopped short of the declared height.
    pixels.resize(width * height * 3, 0);
    RgbImage::from_raw(width as u32, height as u32, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| decode_error(path, "decoded buffer does not match dimensions"))
}

/// Decode a PNG row by row, keeping every row that arrives before the data
/// runs out. Interlaced images keep whichever Adam7 passes completed.
fn decode_png_tolerant(path: &Path, data: &[u8]) -> Result<DynamicImage, BackendError> {
    let limits = png::Limits { bytes: usize::MAX };
    let mut decoder = png::Decoder::new_with_limits(Cursor::new(data), limits);
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| decode_error(path, e.to_string()))?;

    let (width, height) = (reader.info().width, reader.info().height);
    let (color, _) = reader.output_color_type();
    let samples = color.samples();
    let stride = width as usize * samples;
    let mut pixels = vec![0u8; stride * height as usize];

    let mut line = 0usize;
    loop {
        match reader.next_interlaced_row() {
            Ok(Some(row)) => match row.interlace() {
                png::InterlaceInfo::Adam7(info) => {
                    png::expand_interlaced_row(
                        &mut pixels,
                        stride,
                        row.data(),
                        info,
                        (samples * 8) as u8,
                    );
                }
                png::InterlaceInfo::Null(_) => {
                    if let Some(dst) = pixels.get_mut(line * stride..(line + 1) * stride) {
                        let src = row.data();
                        let n = src.len().min(stride);
                        dst[..n].copy_from_slice(&src[..n]);
                    }
                    line += 1;
                }
            },
            Ok(None) => break,
            Err(e) => {
                debug!(path = %path.display(), rows = line, error = %e, "PNG data ends early");
                break;
            }
        }
    }

    let img = match color {
        png::ColorType::Grayscale => {
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        png::ColorType::GrayscaleAlpha => {
            GrayAlphaImage::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8)
        }
        png::ColorType::Rgb => {
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        png::ColorType::Rgba => {
            RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
        }
        png::ColorType::Indexed => None,
    };
    img.ok_or_else(|| decode_error(path, "unexpected PNG pixel layout"))
}

/// Decode the first GIF frame onto a canvas of the logical screen size,
/// keeping whatever pixels the LZW stream produced before it broke off.
fn decode_gif_tolerant(path: &Path, data: &[u8]) -> Result<DynamicImage, BackendError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options
        .read_info(Cursor::new(data))
        .map_err(|e| decode_error(path, e.to_string()))?;

    let mut canvas = RgbaImage::new(u32::from(decoder.width()), u32::from(decoder.height()));
    let frame = decoder
        .next_frame_info()
        .map_err(|e| decode_error(path, e.to_string()))?
        .map(|f| (f.left, f.top, f.width, f.height));

    if let Some((left, top, width, height)) = frame {
        let mut buf = vec![0u8; decoder.buffer_size()];
        if let Err(e) = decoder.read_into_buffer(&mut buf) {
            debug!(path = %path.display(), error = %e, "GIF frame data ends early");
        }
        let frame = RgbaImage::from_raw(u32::from(width), u32::from(height), buf)
            .ok_or_else(|| decode_error(path, "GIF frame buffer does not match dimensions"))?;
        image::imageops::replace(&mut canvas, &frame, i64::from(left), i64::from(top));
    }
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Owns a libwebp incremental decoder and frees it on drop.
struct IncrementalWebP(*mut libwebp_sys::WebPIDecoder);

impl Drop for IncrementalWebP {
    fn drop(&mut self) {
        unsafe { libwebp_sys::WebPIDelete(self.0) };
    }
}

/// Decode a WebP with libwebp's incremental decoder, which accepts a stream
/// that stops early and exposes the rows finished so far.
fn decode_webp_tolerant(path: &Path, data: &[u8]) -> Result<DynamicImage, BackendError> {
    let (mut width, mut height): (c_int, c_int) = (0, 0);
    let ok =
        unsafe { libwebp_sys::WebPGetInfo(data.as_ptr(), data.len(), &mut width, &mut height) };
    if ok == 0 || width <= 0 || height <= 0 {
        return Err(decode_error(path, "invalid WebP header"));
    }
    let stride = width as usize * 4;
    let mut pixels = vec![0u8; stride * height as usize];

    // A null output buffer lets libwebp allocate and own the RGBA rows.
    let idec = unsafe {
        libwebp_sys::WebPINewRGB(WEBP_CSP_MODE::MODE_RGBA, std::ptr::null_mut(), 0, 0)
    };
    if idec.is_null() {
        return Err(decode_error(path, "libwebp decoder allocation failed"));
    }
    let idec = IncrementalWebP(idec);

    let status = unsafe { libwebp_sys::WebPIUpdate(idec.0, data.as_ptr(), data.len()) };
    if !matches!(
        status,
        VP8StatusCode::VP8_STATUS_OK
            | VP8StatusCode::VP8_STATUS_SUSPENDED
            | VP8StatusCode::VP8_STATUS_NOT_ENOUGH_DATA
    ) {
        return Err(decode_error(path, format!("libwebp: {status:?}")));
    }

    let [mut last_y, mut out_width, mut out_height, mut out_stride]: [c_int; 4] = [0; 4];
    let rgba = unsafe {
        libwebp_sys::WebPIDecGetRGB(
            idec.0,
            &mut last_y,
            &mut out_width,
            &mut out_height,
            &mut out_stride,
        )
    };
    if !rgba.is_null() && out_width == width && out_height == height && out_stride >= width * 4 {
        let rows = last_y.clamp(0, height) as usize;
        debug!(path = %path.display(), rows, "recovered WebP rows");
        for (y, dst) in pixels.chunks_exact_mut(stride).take(rows).enumerate() {
            // SAFETY: libwebp keeps `out_height` rows of `out_stride` bytes
            // alive at `rgba` until the decoder is deleted, and the first
            // `last_y` of them are fully decoded.
            let src = unsafe {
                std::slice::from_raw_parts(rgba.add(y * out_stride as usize), stride)
            };
            dst.copy_from_slice(src);
        }
    }

    RgbaImage::from_raw(width as u32, height as u32, pixels)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| decode_error(path, "decoded buffer does not match dimensions"))
}

/// Resample to exactly `width`×`height`, or pass the image through when it
/// already has that size.
fn resample(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if img.width() == width && img.height() == height {
        debug!(width, height, "size unchanged, skipping resample");
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    }
}

fn encode_error(path: &Path, reason: impl Into<String>) -> BackendError {
    BackendError::Encode {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Encode a prepared image into an in-memory file.
fn encode(img: &DynamicImage, params: EncodeParams, path: &Path) -> Result<Vec<u8>, BackendError> {
    match params {
        EncodeParams::Jpeg {
            quality,
            optimize,
            progressive,
        } => encode_jpeg(img, quality, optimize, progressive, path),
        EncodeParams::WebP {
            quality,
            method,
            exact,
        } => encode_webp(img, quality, method, exact, path),
        EncodeParams::Png => {
            let img = match img {
                DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                    DynamicImage::ImageRgba8(img.to_rgba8())
                }
                other => other.clone(),
            };
            write_with_image_crate(&img, ImageFormat::Png, path)
        }
        EncodeParams::Gif => {
            let img = DynamicImage::ImageRgba8(img.to_rgba8());
            write_with_image_crate(&img, ImageFormat::Gif, path)
        }
    }
}

fn write_with_image_crate(
    img: &DynamicImage,
    format: ImageFormat,
    path: &Path,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)
        .map_err(|e| encode_error(path, e.to_string()))?;
    Ok(buf.into_inner())
}

fn encode_jpeg(
    img: &DynamicImage,
    quality: u8,
    optimize: bool,
    progressive: bool,
    path: &Path,
) -> Result<Vec<u8>, BackendError> {
    let (color_space, pixels) = match img {
        DynamicImage::ImageLuma8(buf) => (mozjpeg::ColorSpace::JCS_GRAYSCALE, buf.as_raw()),
        DynamicImage::ImageRgb8(buf) => (mozjpeg::ColorSpace::JCS_RGB, buf.as_raw()),
        _ => return Err(encode_error(path, "JPEG input must be RGB8 or L8")),
    };
    let (width, height) = (img.width() as usize, img.height() as usize);

    catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
        let mut compress = mozjpeg::Compress::new(color_space);
        compress.set_size(width, height);
        compress.set_quality(quality as f32);
        if progressive {
            compress.set_progressive_mode();
        }
        compress.set_optimize_coding(optimize);
        let mut started = compress.start_compress(Vec::new())?;
        started.write_scanlines(pixels)?;
        started.finish()
    }))
    .map_err(|_| encode_error(path, "libjpeg aborted"))?
    .map_err(|e| encode_error(path, e.to_string()))
}

fn encode_webp(
    img: &DynamicImage,
    quality: f32,
    method: i32,
    exact: bool,
    path: &Path,
) -> Result<Vec<u8>, BackendError> {
    let (width, height) = (img.width(), img.height());
    let has_alpha = img.color().has_alpha();
    let pixels = if has_alpha {
        img.to_rgba8().into_raw()
    } else {
        img.to_rgb8().into_raw()
    };
    let encoder = if has_alpha {
        webp::Encoder::from_rgba(&pixels, width, height)
    } else {
        webp::Encoder::from_rgb(&pixels, width, height)
    };

    let mut config =
        webp::WebPConfig::new().map_err(|_| encode_error(path, "invalid libwebp config"))?;
    config.lossless = 0;
    config.quality = quality;
    config.method = method;
    config.exact = i32::from(exact);

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| encode_error(path, format!("{e:?}")))?;
    Ok(memory.to_vec())
}

/// Write `bytes` to `path` through a temporary file in the same directory
/// and an atomic rename. The temporary file is removed if anything fails.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (img, _) = load_image(path)?;
        Ok(Dimensions {
            width: img.width(),
            height: img.height(),
        })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let (img, source_format) = load_image(&params.source)?;
        let (format, encode_params) =
            select_encoding(source_format, &params.output, params.format, params.quality)?;
        debug!(
            source = %params.source.display(),
            output = %params.output.display(),
            %format,
            ?encode_params,
            width = params.width,
            height = params.height,
            "encoding derivative"
        );

        let resized = resample(img, params.width, params.height);
        let prepared = prepare_for_encoding(resized, format);
        let bytes = encode(&prepared, encode_params, &params.output)?;
        write_atomic(&params.output, &bytes)
    }
}
