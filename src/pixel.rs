//! Pixel data decoding.
//!
//! [`decode_frames`] locates the pixel data element, reads the image
//! description around it and returns a [`Frames`] iterator. Nothing is
//! decoded until the iterator is advanced, so taking only frame zero never
//! touches the bytes of the other frames.

use std::borrow::Cow;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Pixel, Rgb};
use tracing::debug;

use crate::dictionary::tags;
use crate::model::{DataSet, DicomObject, DicomValue, PixelFragments, Tag, Vr};
use crate::resolver::{find_element, tag_name};
use crate::transfer_syntax::{ByteOrder, Codec, TransferSyntax};
use crate::util::decode_numbers;
use crate::{CommonResult, DicomError};

const RLE_HEADER_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotometricInterpretation {
    Monochrome1,
    Monochrome2,
    Rgb,
    YbrFull,
    YbrFull422,
    PaletteColor,
    Other(String),
}

impl PhotometricInterpretation {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "MONOCHROME1" => PhotometricInterpretation::Monochrome1,
            "MONOCHROME2" => PhotometricInterpretation::Monochrome2,
            "RGB" => PhotometricInterpretation::Rgb,
            "YBR_FULL" => PhotometricInterpretation::YbrFull,
            "YBR_FULL_422" => PhotometricInterpretation::YbrFull422,
            "PALETTE COLOR" => PhotometricInterpretation::PaletteColor,
            other => PhotometricInterpretation::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PhotometricInterpretation::Monochrome1 => "MONOCHROME1",
            PhotometricInterpretation::Monochrome2 => "MONOCHROME2",
            PhotometricInterpretation::Rgb => "RGB",
            PhotometricInterpretation::YbrFull => "YBR_FULL",
            PhotometricInterpretation::YbrFull422 => "YBR_FULL_422",
            PhotometricInterpretation::PaletteColor => "PALETTE COLOR",
            PhotometricInterpretation::Other(s) => s,
        }
    }

    pub fn is_monochrome(&self) -> bool {
        matches!(
            self,
            PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2
        )
    }
}

/// The image pixel attributes that say how to read the pixel data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescription {
    pub rows: u16,
    pub columns: u16,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub pixel_representation: u16,
    pub photometric_interpretation: PhotometricInterpretation,
    pub planar_configuration: u16,
    pub number_of_frames: u32,
}

impl ImageDescription {
    pub fn from_dataset(dataset: &DataSet) -> CommonResult<Self> {
        let rows = required_u16(dataset, tags::ROWS)?;
        let columns = required_u16(dataset, tags::COLUMNS)?;
        let bits_allocated = required_u16(dataset, tags::BITS_ALLOCATED)?;
        let photometric_interpretation =
            find_element(dataset, tags::PHOTOMETRIC_INTERPRETATION)?
                .to_str()
                .map(PhotometricInterpretation::parse)
                .ok_or_else(|| DicomError::unsupported("empty PhotometricInterpretation"))?;

        let number_of_frames = match dataset.get(tags::NUMBER_OF_FRAMES).map(|e| e.to_i64()) {
            None | Some(None) => 1,
            Some(Some(n)) => u32::try_from(n)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| DicomError::unsupported(format!("NumberOfFrames {n}")))?,
        };

        Ok(ImageDescription {
            rows,
            columns,
            samples_per_pixel: optional_u16(dataset, tags::SAMPLES_PER_PIXEL, 1)?,
            bits_allocated,
            bits_stored: optional_u16(dataset, tags::BITS_STORED, bits_allocated)?,
            pixel_representation: optional_u16(dataset, tags::PIXEL_REPRESENTATION, 0)?,
            photometric_interpretation,
            planar_configuration: optional_u16(dataset, tags::PLANAR_CONFIGURATION, 0)?,
            number_of_frames,
        })
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_allocated / 8)
    }

    pub fn pixel_count(&self) -> usize {
        usize::from(self.rows) * usize::from(self.columns)
    }

    /// Size in bytes of one native frame.
    pub fn frame_size(&self) -> usize {
        self.pixel_count() * usize::from(self.samples_per_pixel) * self.bytes_per_sample()
    }

    pub fn is_signed(&self) -> bool {
        self.pixel_representation == 1
    }

    /// Rejects layouts that cannot be turned into a standard raster.
    fn check_supported(&self, transfer_syntax: &TransferSyntax) -> CommonResult<()> {
        use PhotometricInterpretation as Pi;

        if self.rows == 0 || self.columns == 0 {
            return Err(DicomError::unsupported("image has no rows or columns"));
        }
        if !matches!(self.bits_allocated, 8 | 16) {
            return Err(DicomError::unsupported(format!(
                "{} bits allocated",
                self.bits_allocated
            )));
        }
        if self.bits_stored == 0 || self.bits_stored > self.bits_allocated {
            return Err(DicomError::unsupported(format!(
                "{} bits stored in {} bits allocated",
                self.bits_stored, self.bits_allocated
            )));
        }
        if self.pixel_representation > 1 {
            return Err(DicomError::unsupported(format!(
                "pixel representation {}",
                self.pixel_representation
            )));
        }

        let jpeg = matches!(
            transfer_syntax.codec,
            Codec::JpegBaseline | Codec::JpegExtended
        );
        match (&self.photometric_interpretation, self.samples_per_pixel) {
            (Pi::Monochrome1 | Pi::Monochrome2, 1) => {}
            (Pi::Rgb, 3) if !self.is_signed() => {}
            (Pi::YbrFull, 3) if !self.is_signed() && self.bits_allocated == 8 => {}
            (Pi::YbrFull422, 3) if jpeg => {}
            (pi, spp) => {
                return Err(DicomError::unsupported(format!(
                    "{} with {} sample(s) per pixel and {} bits allocated",
                    pi.as_str(),
                    spp,
                    self.bits_allocated
                )))
            }
        }

        match transfer_syntax.codec {
            Codec::None | Codec::RleLossless => Ok(()),
            Codec::JpegBaseline | Codec::JpegExtended if self.bits_allocated == 8 => Ok(()),
            _ => Err(DicomError::unsupported(format!(
                "{} frames with {} bits allocated cannot be decoded",
                transfer_syntax.name, self.bits_allocated
            ))),
        }
    }
}

fn required_u16(dataset: &DataSet, tag: Tag) -> CommonResult<u16> {
    find_element(dataset, tag)?
        .to_u16()
        .ok_or_else(|| not_u16(tag))
}

fn optional_u16(dataset: &DataSet, tag: Tag, default: u16) -> CommonResult<u16> {
    match dataset.get(tag) {
        None => Ok(default),
        Some(element) => element.to_u16().ok_or_else(|| not_u16(tag)),
    }
}

fn not_u16(tag: Tag) -> DicomError {
    DicomError::unsupported(format!(
        "{} {} is not an unsigned 16-bit value",
        tag_name(tag).unwrap_or("attribute"),
        tag
    ))
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u32,
    pub image: DynamicImage,
}

/// Pixel data as stored, resolved once: either one contiguous native
/// buffer, or the fragments of each encapsulated frame.
#[derive(Debug)]
enum PixelPayload<'a> {
    Native {
        bytes: &'a [u8],
        /// 8-bit samples packed in big endian OW words.
        swap_pairs: bool,
    },
    Encapsulated(Vec<Vec<&'a [u8]>>),
}

/// Lazy, finite sequence of the frames of a pixel data element.
#[derive(Debug)]
pub struct Frames<'a> {
    description: ImageDescription,
    transfer_syntax: &'static TransferSyntax,
    payload: PixelPayload<'a>,
    next: u32,
}

pub fn decode_frames(object: &DicomObject) -> CommonResult<Frames<'_>> {
    let element = find_element(&object.dataset, tags::PIXEL_DATA)?;
    let description = ImageDescription::from_dataset(&object.dataset)?;
    let transfer_syntax = object.transfer_syntax;
    description.check_supported(transfer_syntax)?;

    let payload = match (&element.value, transfer_syntax.is_encapsulated()) {
        (DicomValue::Bytes(bytes), false) => PixelPayload::Native {
            bytes,
            swap_pairs: element.vr == Vr::OW
                && transfer_syntax.byte_order == ByteOrder::Big
                && description.bits_allocated == 8,
        },
        (DicomValue::PixelSequence(sequence), true) => PixelPayload::Encapsulated(
            group_fragments(sequence, description.number_of_frames)?,
        ),
        (DicomValue::PixelSequence(_), false) => {
            return Err(DicomError::unsupported(
                "encapsulated pixel data in a native transfer syntax",
            ))
        }
        (_, true) => {
            return Err(DicomError::unsupported(
                "native pixel data in an encapsulated transfer syntax",
            ))
        }
        (_, false) => {
            return Err(DicomError::unsupported(format!(
                "pixel data with VR {}",
                element.vr
            )))
        }
    };

    debug!(
        frames = description.number_of_frames,
        rows = description.rows,
        columns = description.columns,
        photometric_interpretation = description.photometric_interpretation.as_str(),
        transfer_syntax = transfer_syntax.name,
        "located pixel data"
    );

    Ok(Frames {
        description,
        transfer_syntax,
        payload,
        next: 0,
    })
}

impl<'a> Frames<'a> {
    pub fn description(&self) -> &ImageDescription {
        &self.description
    }

    fn decode(&self, index: u32) -> CommonResult<Frame> {
        let description = &self.description;

        let image = match &self.payload {
            PixelPayload::Native { bytes, swap_pairs } => {
                let size = description.frame_size();
                let start = index as usize * size;
                let short = || {
                    DicomError::frame(
                        index,
                        format!(
                            "pixel data holds {} bytes, frame needs bytes {}..{}",
                            bytes.len(),
                            start,
                            start + size
                        ),
                    )
                };
                let data = if *swap_pairs {
                    // a frame may start in the middle of a word
                    (start..start + size)
                        .map(|i| bytes.get(i ^ 1).copied())
                        .collect::<Option<Vec<_>>>()
                        .map(Cow::Owned)
                } else {
                    bytes.get(start..start + size).map(Cow::Borrowed)
                }
                .ok_or_else(short)?;
                decode_native(
                    &data,
                    description,
                    self.transfer_syntax.byte_order,
                    description.planar_configuration == 1,
                    index,
                )?
            }
            PixelPayload::Encapsulated(frames) => {
                let fragments = frames
                    .get(index as usize)
                    .filter(|fragments| !fragments.is_empty())
                    .ok_or_else(|| DicomError::frame(index, "no fragments for frame"))?;
                match self.transfer_syntax.codec {
                    Codec::JpegBaseline | Codec::JpegExtended => {
                        decode_jpeg(fragments, description, index)?
                    }
                    Codec::RleLossless => {
                        let data = decode_rle(fragments, description, index)?;
                        decode_native(&data, description, ByteOrder::Little, false, index)?
                    }
                    _ => {
                        return Err(DicomError::unsupported(format!(
                            "{} frames cannot be decoded",
                            self.transfer_syntax.name
                        )))
                    }
                }
            }
        };

        debug!(
            frame = index,
            width = image.width(),
            height = image.height(),
            "decoded frame"
        );

        Ok(Frame { index, image })
    }
}

impl Iterator for Frames<'_> {
    type Item = CommonResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.description.number_of_frames {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.decode(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.description.number_of_frames - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Frames<'_> {}

/// Assigns fragments to frames: through the basic offset table when there
/// is one, otherwise one fragment per frame, or everything to a single frame.
fn group_fragments(sequence: &PixelFragments, frames: u32) -> CommonResult<Vec<Vec<&[u8]>>> {
    let frames = frames as usize;
    let fragments = &sequence.fragments;

    if frames == 1 {
        return Ok(vec![fragments.iter().map(Vec::as_slice).collect()]);
    }

    if !sequence.offset_table.is_empty() {
        let table = &sequence.offset_table;
        if table.len() != frames {
            return Err(DicomError::frame(
                0,
                format!("offset table has {} entries for {} frames", table.len(), frames),
            ));
        }

        let mut grouped = vec![Vec::new(); frames];
        let mut position = 0u64;
        for fragment in fragments {
            let frame = table
                .iter()
                .rposition(|&start| u64::from(start) <= position)
                .ok_or_else(|| DicomError::frame(0, "offset table does not start at zero"))?;
            grouped[frame].push(fragment.as_slice());
            // item header + fragment
            position += 8 + fragment.len() as u64;
        }
        return Ok(grouped);
    }

    if fragments.len() == frames {
        return Ok(fragments.iter().map(|f| vec![f.as_slice()]).collect());
    }

    // no way to split them; later frames decode as missing
    debug!(
        fragments = fragments.len(),
        frames, "joining all fragments into frame 0"
    );
    let mut grouped = vec![Vec::new(); frames];
    if let Some(first) = grouped.first_mut() {
        first.extend(fragments.iter().map(Vec::as_slice));
    }
    Ok(grouped)
}

fn decode_native(
    data: &[u8],
    description: &ImageDescription,
    order: ByteOrder,
    planar: bool,
    index: u32,
) -> CommonResult<DynamicImage> {
    let width = u32::from(description.columns);
    let height = u32::from(description.rows);
    let pixels = description.pixel_count();
    let ybr = description.photometric_interpretation == PhotometricInterpretation::YbrFull;

    match (description.samples_per_pixel, description.bits_allocated) {
        (1, 8) => {
            let samples = data.iter().map(|&v| normalize_8(v, description)).collect();
            Ok(DynamicImage::ImageLuma8(buffer::<Luma<u8>>(
                width, height, samples, index,
            )?))
        }
        (1, 16) => {
            let samples = read_u16(data, order)
                .map(|v| normalize_16(v, description))
                .collect();
            Ok(DynamicImage::ImageLuma16(buffer::<Luma<u16>>(
                width, height, samples, index,
            )?))
        }
        (3, 8) => {
            let mut samples = interleave(data.to_vec(), pixels, planar);
            if ybr {
                ybr_full_to_rgb(&mut samples);
            }
            Ok(DynamicImage::ImageRgb8(buffer::<Rgb<u8>>(
                width, height, samples, index,
            )?))
        }
        (3, 16) => {
            let samples = interleave(read_u16(data, order).collect(), pixels, planar);
            Ok(DynamicImage::ImageRgb16(buffer::<Rgb<u16>>(
                width, height, samples, index,
            )?))
        }
        (spp, bits) => Err(DicomError::unsupported(format!(
            "{spp} sample(s) per pixel with {bits} bits allocated"
        ))),
    }
}

fn buffer<P: Pixel>(
    width: u32,
    height: u32,
    samples: Vec<P::Subpixel>,
    index: u32,
) -> CommonResult<ImageBuffer<P, Vec<P::Subpixel>>> {
    let found = samples.len();
    ImageBuffer::from_raw(width, height, samples).ok_or_else(|| {
        DicomError::frame(
            index,
            format!("{found} samples do not fill a {width}x{height} frame"),
        )
    })
}

fn read_u16(data: &[u8], order: ByteOrder) -> impl Iterator<Item = u16> + '_ {
    data.chunks_exact(2).map(move |c| match order {
        ByteOrder::Little => u16::from_le_bytes([c[0], c[1]]),
        ByteOrder::Big => u16::from_be_bytes([c[0], c[1]]),
    })
}

/// Keeps the stored bits only. Signed samples are sign-extended and
/// biased by half the range so they order correctly as unsigned.
fn normalize_8(raw: u8, description: &ImageDescription) -> u8 {
    let bits = u32::from(description.bits_stored.min(8));
    let value = if bits >= 8 { raw } else { raw & ((1u8 << bits) - 1) };
    if !description.is_signed() {
        return value;
    }
    let shift = 8 - bits;
    let signed = ((value << shift) as i8) >> shift;
    (i16::from(signed) + 0x80) as u8
}

fn normalize_16(raw: u16, description: &ImageDescription) -> u16 {
    let bits = u32::from(description.bits_stored.min(16));
    let value = if bits >= 16 { raw } else { raw & ((1u16 << bits) - 1) };
    if !description.is_signed() {
        return value;
    }
    let shift = 16 - bits;
    let signed = ((value << shift) as i16) >> shift;
    (i32::from(signed) + 0x8000) as u16
}

/// Planar (RRR..GGG..BBB..) to interleaved (RGBRGB..).
fn interleave<T: Copy + Default>(samples: Vec<T>, pixels: usize, planar: bool) -> Vec<T> {
    if !planar {
        return samples;
    }
    let mut out = vec![T::default(); samples.len()];
    for sample in 0..3 {
        for pixel in 0..pixels {
            out[pixel * 3 + sample] = samples[sample * pixels + pixel];
        }
    }
    out
}

fn ybr_full_to_rgb(samples: &mut [u8]) {
    fn clamp(v: f64) -> u8 {
        v.round().clamp(0.0, 255.0) as u8
    }

    for pixel in samples.chunks_exact_mut(3) {
        let y = f64::from(pixel[0]);
        let cb = f64::from(pixel[1]) - 128.0;
        let cr = f64::from(pixel[2]) - 128.0;
        pixel[0] = clamp(y + 1.402 * cr);
        pixel[1] = clamp(y - 0.344136 * cb - 0.714136 * cr);
        pixel[2] = clamp(y + 1.772 * cb);
    }
}

fn joined<'a>(fragments: &[&'a [u8]]) -> Cow<'a, [u8]> {
    match fragments {
        [single] => Cow::Borrowed(*single),
        _ => Cow::Owned(fragments.concat()),
    }
}

fn decode_jpeg(
    fragments: &[&[u8]],
    description: &ImageDescription,
    index: u32,
) -> CommonResult<DynamicImage> {
    let data = joined(fragments);
    let image = image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
        .map_err(|e| DicomError::frame(index, e.to_string()))?;

    let expected = (u32::from(description.columns), u32::from(description.rows));
    if (image.width(), image.height()) != expected {
        return Err(DicomError::frame(
            index,
            format!(
                "JPEG frame is {}x{}, expected {}x{}",
                image.width(),
                image.height(),
                expected.0,
                expected.1
            ),
        ));
    }

    // the decoder already converts YCbCr to RGB
    Ok(if description.samples_per_pixel == 1 {
        DynamicImage::ImageLuma8(image.into_luma8())
    } else {
        DynamicImage::ImageRgb8(image.into_rgb8())
    })
}

/// RLE Lossless: a 64 byte header of segment offsets, one PackBits segment
/// per byte of each sample, most significant byte first. Produces native
/// little endian, interleaved samples.
fn decode_rle(
    fragments: &[&[u8]],
    description: &ImageDescription,
    index: u32,
) -> CommonResult<Vec<u8>> {
    let data = joined(fragments);
    if data.len() < RLE_HEADER_LENGTH {
        return Err(DicomError::frame(index, "RLE header is truncated"));
    }

    let header = decode_numbers(
        &data[..RLE_HEADER_LENGTH],
        ByteOrder::Little,
        u32::from_le_bytes,
        u32::from_be_bytes,
    );
    let bytes_per_sample = description.bytes_per_sample();
    let samples_per_pixel = usize::from(description.samples_per_pixel);
    let segments = header[0] as usize;
    if segments != bytes_per_sample * samples_per_pixel {
        return Err(DicomError::frame(
            index,
            format!(
                "{} RLE segments, expected {}",
                segments,
                bytes_per_sample * samples_per_pixel
            ),
        ));
    }

    let mut bounds = header[1..=segments]
        .iter()
        .map(|&offset| offset as usize)
        .collect::<Vec<_>>();
    bounds.push(data.len());

    let pixels = description.pixel_count();
    let mut out = vec![0u8; pixels * samples_per_pixel * bytes_per_sample];

    for sample in 0..samples_per_pixel {
        for byte in 0..bytes_per_sample {
            let segment = sample * bytes_per_sample + byte;
            let (start, end) = (bounds[segment], bounds[segment + 1]);
            if start < RLE_HEADER_LENGTH || start > end || end > data.len() {
                return Err(DicomError::frame(
                    index,
                    format!("RLE segment {segment} spans {start}..{end}"),
                ));
            }

            let decoded = unpack_bits(&data[start..end], pixels)
                .map_err(|reason| DicomError::frame(index, reason))?;
            let le_byte = bytes_per_sample - 1 - byte;
            for (pixel, value) in decoded.into_iter().enumerate() {
                out[(pixel * samples_per_pixel + sample) * bytes_per_sample + le_byte] = value;
            }
        }
    }

    Ok(out)
}

/// PackBits: a header byte n in 0..=127 copies the next n+1 bytes, n in
/// -127..=-1 repeats the next byte 1-n times, -128 is a no-op.
fn unpack_bits(segment: &[u8], expected: usize) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(expected);
    let mut i = 0;

    while out.len() < expected && i < segment.len() {
        let n = segment[i] as i8;
        i += 1;
        if n >= 0 {
            let count = n as usize + 1;
            let literal = segment
                .get(i..i + count)
                .ok_or("literal run overruns the segment")?;
            out.extend_from_slice(literal);
            i += count;
        } else if n != -128 {
            let count = (1 - isize::from(n)) as usize;
            let value = *segment.get(i).ok_or("replicate run overruns the segment")?;
            out.extend(std::iter::repeat(value).take(count));
            i += 1;
        }
    }

    if out.len() < expected {
        return Err(format!(
            "segment decoded to {} of {} bytes",
            out.len(),
            expected
        ));
    }
    out.truncate(expected);
    Ok(out)
}
