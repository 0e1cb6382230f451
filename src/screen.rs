//! Screen color sampling for the ambient monitor effect
//!
//! The screenshot comes from an external command writing a binary PPM (P6)
//! to stdout, e.g. `grim -t ppm -` or `import -window root ppm:-`.

use std::process::{Command, Stdio};

use crate::light::{Rgb, ScreenColorSource};
use crate::{Error, Result};

/// Channel bounds for the averaged color; avoids full black and glaring white
const CHANNEL_MIN: u8 = 10;
const CHANNEL_MAX: u8 = 200;

/// Decoded P6 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Rgb>,
}

/// Runs a screenshot command and averages the centre of the image
#[derive(Debug, Clone)]
pub struct PpmCommandSource {
    program: String,
    args: Vec<String>,
}

impl PpmCommandSource {
    /// Build from an argv list; `None` if it is empty
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl ScreenColorSource for PpmCommandSource {
    fn sample(&self) -> Result<Rgb> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Screen(format!("failed to run {}: {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Screen(format!("screenshot failed: {stderr}")));
        }

        let image = parse_ppm(&output.stdout)?;
        center_average(&image.pixels, image.width, image.height)
            .ok_or_else(|| Error::Screen("empty screenshot".to_string()))
    }
}

/// Parse a binary PPM with maxval 255
///
/// # Errors
///
/// Returns error if the data is not a well-formed P6 image
pub fn parse_ppm(data: &[u8]) -> Result<Image> {
    let mut pos = 0;
    let mut fields = [0usize; 3];

    if data.get(..2) != Some(b"P6") {
        return Err(Error::Screen("not a P6 image".to_string()));
    }
    pos += 2;

    for field in &mut fields {
        skip_whitespace_and_comments(data, &mut pos);
        let start = pos;
        while data.get(pos).is_some_and(u8::is_ascii_digit) {
            pos += 1;
        }
        *field = std::str::from_utf8(&data[start..pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Screen("malformed PPM header".to_string()))?;
    }
    // exactly one whitespace byte separates the header from the raster
    pos += 1;

    let [width, height, maxval] = fields;
    if maxval != 255 {
        return Err(Error::Screen(format!("unsupported PPM maxval {maxval}")));
    }

    let len = width * height * 3;
    let raster = data
        .get(pos..pos + len)
        .ok_or_else(|| Error::Screen("truncated PPM raster".to_string()))?;
    let pixels = raster
        .chunks_exact(3)
        .map(|p| Rgb::new(p[0], p[1], p[2]))
        .collect();

    Ok(Image {
        width,
        height,
        pixels,
    })
}

fn skip_whitespace_and_comments(data: &[u8], pos: &mut usize) {
    while let Some(&byte) = data.get(*pos) {
        if byte == b'#' {
            while data.get(*pos).is_some_and(|b| *b != b'\n') {
                *pos += 1;
            }
        } else if byte.is_ascii_whitespace() {
            *pos += 1;
        } else {
            break;
        }
    }
}

/// Average color of the centre third of a `width` x `height` image,
/// channels clamped to `[10, 200]`
#[must_use]
pub fn center_average(pixels: &[Rgb], width: usize, height: usize) -> Option<Rgb> {
    if width == 0 || height == 0 || pixels.len() < width * height {
        return None;
    }

    let (x0, x1) = middle_third(width);
    let (y0, y1) = middle_third(height);

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for y in y0..y1 {
        for px in &pixels[y * width + x0..y * width + x1] {
            sum[0] += u64::from(px.r);
            sum[1] += u64::from(px.g);
            sum[2] += u64::from(px.b);
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }

    let avg = |s: u64| u8::try_from(s / count).unwrap_or(u8::MAX);
    Some(Rgb::new(avg(sum[0]), avg(sum[1]), avg(sum[2])).clamp_channels(CHANNEL_MIN, CHANNEL_MAX))
}

/// Bounds of the middle third, never empty for a non-empty side
fn middle_third(len: usize) -> (usize, usize) {
    let start = len / 3;
    let end = (len - len / 3).max(start + 1);
    (start, end)
}
