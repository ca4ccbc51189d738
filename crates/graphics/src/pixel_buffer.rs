use std::{fs::File, io::BufReader, path::Path};

use crate::{Color, Error, Result};

/// Describes the binary representation of a pixel in a pixel buffer.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
}

impl PixelFormat {
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
        }
    }

    fn write_color(self, color: Color, dst: &mut [u8]) {
        match self {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Self::Rgba8 => {
                for (dst, channel) in dst.iter_mut().zip([color.r, color.g, color.b, color.a]) {
                    *dst = (channel.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        }
    }
}

/// Describes how the color values of a pixel buffer are interpreted.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

/// A decoded 2D image, tightly packed row after row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    format: PixelFormat,
    color_space: ColorSpace,
    width: u32,
    height: u32,
    bytes: Box<[u8]>,
}

impl PixelBuffer {
    /// Creates a pixel buffer from a byte array. The byte array will be copied
    /// into the pixel buffer.
    pub fn from_bytes(
        bytes: &[u8],
        width: u32,
        format: PixelFormat,
        color_space: ColorSpace,
    ) -> Result<Self> {
        let row_size = width as usize * format.bytes_per_pixel();
        if width == 0 || bytes.is_empty() || bytes.len() % row_size != 0 {
            return Err(Error::UnsupportedImage(format!(
                "{} bytes do not form whole rows of {width} pixels",
                bytes.len()
            )));
        }

        let height = u32::try_from(bytes.len() / row_size)
            .map_err(|_| Error::UnsupportedImage("image too tall".into()))?;

        Ok(Self {
            format,
            color_space,
            width,
            height,
            bytes: bytes.into(),
        })
    }

    #[must_use]
    pub fn from_colors(
        colors: &[Color],
        width: u32,
        format: PixelFormat,
        color_space: ColorSpace,
    ) -> Self {
        let bytes_per_pixel = format.bytes_per_pixel();
        let mut bytes = vec![0; colors.len() * bytes_per_pixel];

        for (color, dst) in colors.iter().zip(bytes.chunks_exact_mut(bytes_per_pixel)) {
            format.write_color(*color, dst);
        }

        #[allow(clippy::cast_possible_truncation)]
        let height = (colors.len() / width.max(1) as usize) as u32;

        Self {
            format,
            color_space,
            width,
            height,
            bytes: bytes.into(),
        }
    }

    /// Decodes a PNG file into RGBA8. The color space is taken as sRGB
    /// regardless of what the file declares.
    pub fn load_png(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;

        let decode_error = |source| Error::ImageDecode {
            path: path.to_owned(),
            source,
        };

        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder.read_info().map_err(decode_error)?;

        let mut buffer = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buffer).map_err(decode_error)?;
        buffer.truncate(info.buffer_size());

        let rgba: Vec<u8> = match info.color_type {
            png::ColorType::Rgba => buffer,
            png::ColorType::Rgb => buffer
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => buffer
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            png::ColorType::Grayscale => buffer.iter().flat_map(|g| [*g, *g, *g, 255]).collect(),
            png::ColorType::Indexed => {
                return Err(Error::UnsupportedImage(format!(
                    "{}: palette was not expanded",
                    path.display()
                )))
            }
        };

        Ok(Self {
            format: PixelFormat::Rgba8,
            color_space: ColorSpace::Srgb,
            width: info.width,
            height: info.height,
            bytes: rgba.into(),
        })
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    #[must_use]
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn row_size(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> std::slice::ChunksExact<u8> {
        self.bytes.chunks_exact(self.row_size())
    }

    /// Builds the full mip chain, this image included, down to 1x1.
    #[must_use]
    pub fn mip_chain(&self) -> Vec<PixelBuffer> {
        let mut chain = Vec::with_capacity(mip_level_count(self.width, self.height) as usize);
        chain.push(self.clone());

        while let Some(last) = chain.last() {
            if last.width == 1 && last.height == 1 {
                break;
            }
            let next = last.downsample();
            chain.push(next);
        }

        chain
    }

    /// Halves both dimensions (rounding down, never below 1) with a 2x2 box
    /// filter. sRGB color channels are averaged in linear space.
    fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let bpp = self.format.bytes_per_pixel();
        let mut bytes = vec![0; width as usize * height as usize * bpp];

        let texel = |x: u32, y: u32| {
            let x = x.min(self.width - 1) as usize;
            let y = y.min(self.height - 1) as usize;
            let offset = (y * self.width as usize + x) * bpp;
            &self.bytes[offset..offset + bpp]
        };

        for y in 0..height {
            for x in 0..width {
                let samples = [
                    texel(2 * x, 2 * y),
                    texel(2 * x + 1, 2 * y),
                    texel(2 * x, 2 * y + 1),
                    texel(2 * x + 1, 2 * y + 1),
                ];

                let dst_offset = (y as usize * width as usize + x as usize) * bpp;
                let dst = &mut bytes[dst_offset..dst_offset + bpp];

                for channel in 0..bpp {
                    let is_alpha = channel == 3;
                    let average = samples
                        .iter()
                        .map(|s| self.decode_channel(s[channel], is_alpha))
                        .sum::<f32>()
                        / 4.0;
                    dst[channel] = self.encode_channel(average, is_alpha);
                }
            }
        }

        Self {
            format: self.format,
            color_space: self.color_space,
            width,
            height,
            bytes: bytes.into(),
        }
    }

    fn decode_channel(&self, value: u8, is_alpha: bool) -> f32 {
        let value = f32::from(value) / 255.0;
        match self.color_space {
            ColorSpace::Srgb if !is_alpha => srgb_to_linear(value),
            _ => value,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn encode_channel(&self, value: f32, is_alpha: bool) -> u8 {
        let value = match self.color_space {
            ColorSpace::Srgb if !is_alpha => linear_to_srgb(value),
            _ => value,
        };
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

/// Number of levels in a full mip chain for an image of the given size.
#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufWriter;

    use super::*;

    #[test]
    fn conversions() {
        let colors = [Color::RED, Color::GREEN, Color::BLUE, Color::WHITE];
        let buffer = PixelBuffer::from_colors(&colors, 2, PixelFormat::Rgba8, ColorSpace::Srgb);

        assert_eq!(buffer.width(), 2);
        assert_eq!(buffer.height(), 2);

        let mut it = buffer.rows();
        assert_eq!(it.next(), Some([255u8, 0, 0, 255, 0, 255, 0, 255].as_slice()));
        assert_eq!(it.next(), Some([0, 0, 255, 255, 255, 255, 255, 255].as_slice()));
        assert_eq!(it.next(), None);

        let copy = PixelBuffer::from_bytes(
            buffer.bytes(),
            2,
            PixelFormat::Rgba8,
            ColorSpace::Srgb,
        )
        .unwrap();
        assert_eq!(copy, buffer);

        assert!(PixelBuffer::from_bytes(&[0; 7], 2, PixelFormat::Rgba8, ColorSpace::Srgb).is_err());
    }

    #[test]
    fn mip_levels() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 17), 9);

        let image = PixelBuffer::from_colors(
            &[Color::WHITE; 12 * 5],
            12,
            PixelFormat::Rgba8,
            ColorSpace::Srgb,
        );
        let chain = image.mip_chain();

        let sizes: Vec<_> = chain.iter().map(|m| (m.width(), m.height())).collect();
        assert_eq!(sizes, [(12, 5), (6, 2), (3, 1), (1, 1)]);
        assert_eq!(chain.len() as u32, mip_level_count(12, 5));

        // A uniform image stays uniform at every level.
        for mip in &chain {
            assert!(mip.bytes().iter().all(|b| *b == 255));
        }
    }

    #[test]
    fn box_filter() {
        let black = Color::BLACK;
        let white = Color::WHITE;
        let linear = PixelBuffer::from_colors(
            &[black, white, white, black],
            2,
            PixelFormat::Rgba8,
            ColorSpace::Linear,
        );
        let mip = &linear.mip_chain()[1];
        assert_eq!(mip.bytes(), [128, 128, 128, 255]);

        // Half intensity in linear space is ~188 after sRGB encoding.
        let srgb = linear.with_color_space(ColorSpace::Srgb);
        let mip = &srgb.mip_chain()[1];
        assert_eq!(mip.bytes(), [188, 188, 188, 255]);
    }

    #[test]
    fn load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");

        {
            let file = File::create(&path).unwrap();
            let mut encoder = png::Encoder::new(BufWriter::new(file), 2, 1);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[10, 20, 30, 40, 50, 60]).unwrap();
        }

        let image = PixelBuffer::load_png(&path).unwrap();
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 1);
        assert_eq!(image.color_space(), ColorSpace::Srgb);
        assert_eq!(image.bytes(), [10, 20, 30, 255, 40, 50, 60, 255]);

        assert!(matches!(
            PixelBuffer::load_png(&dir.path().join("missing.png")),
            Err(Error::Io { .. })
        ));

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"definitely not a png").unwrap();
        assert!(matches!(
            PixelBuffer::load_png(&garbage),
            Err(Error::ImageDecode { .. })
        ));
    }
}
