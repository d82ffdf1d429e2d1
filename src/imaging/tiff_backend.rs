//! TIFF stack backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Write stack | `tiff::encoder::TiffEncoder`, one `Gray8` page per plane |
//! | Resolve series | `tiff::decoder::Decoder` IFD walk (no pixel decode) |
//! | Legacy open, first plane | `image::ImageReader` (independent decoder) |
//! | Legacy open, stack size | ImageJ `images=` entry, else the first series' depth |
//!
//! ## Series rules
//!
//! Pages flagged as reduced-resolution copies (`NewSubfileType` bit 0) are
//! skipped. Consecutive remaining pages with the same width, height and
//! sample layout form one series; any change starts the next series.

use super::backend::{BackendError, LegacyImage, Series, StackBackend};
use super::imagej;
use super::shape::Shape;
use image::ImageReader;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tiff::decoder::Decoder;
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;
use tiff::{ColorType, TiffError};
use tracing::debug;

/// File extensions treated as stacks.
const STACK_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// `NewSubfileType` bit marking a reduced-resolution copy of another page.
const REDUCED_RESOLUTION: u32 = 1;

/// Returns true if `path` has a TIFF extension (case-insensitive).
pub fn is_stack_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| STACK_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Backend built on the `tiff` and `image` crates.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct TiffBackend;

impl TiffBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TiffBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-page facts needed to group pages into series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageInfo {
    width: u32,
    height: u32,
    bits_per_sample: u8,
    samples_per_pixel: u8,
    reduced: bool,
}

impl PageInfo {
    fn same_layout(&self, series: &Series) -> bool {
        self.width == series.width
            && self.height == series.height
            && self.bits_per_sample == series.bits_per_sample
            && self.samples_per_pixel == series.samples_per_pixel
    }
}

fn tiff_error(path: &Path, err: TiffError) -> BackendError {
    match err {
        TiffError::IoError(e) => BackendError::Io(e),
        other => BackendError::Decode(format!("{}: {}", path.display(), other)),
    }
}

/// Encoder failures other than I/O mean the buffer cannot be stored as TIFF.
fn encode_error(path: &Path, err: TiffError) -> BackendError {
    match err {
        TiffError::IoError(e) => BackendError::Io(e),
        other => BackendError::IncompatibleShape(format!("{}: {}", path.display(), other)),
    }
}

fn check_is_file(path: &Path) -> Result<(), BackendError> {
    if path.is_dir() {
        return Err(BackendError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, BackendError> {
    check_is_file(path)?;
    let file = File::open(path)?;
    Decoder::new(BufReader::new(file)).map_err(|e| tiff_error(path, e))
}

#[allow(unreachable_patterns)]
fn sample_layout(color: ColorType) -> (u8, u8) {
    match color {
        ColorType::Gray(bits) | ColorType::Palette(bits) => (bits, 1),
        ColorType::GrayA(bits) => (bits, 2),
        ColorType::RGB(bits) | ColorType::YCbCr(bits) => (bits, 3),
        ColorType::RGBA(bits) | ColorType::CMYK(bits) => (bits, 4),
        _ => (0, 0),
    }
}

fn read_page_info<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<PageInfo, TiffError> {
    let (width, height) = decoder.dimensions()?;
    let (bits_per_sample, samples_per_pixel) = sample_layout(decoder.colortype()?);
    let subfile = decoder
        .find_tag_unsigned::<u32>(Tag::NewSubfileType)?
        .unwrap_or(0);
    Ok(PageInfo {
        width,
        height,
        bits_per_sample,
        samples_per_pixel,
        reduced: subfile & REDUCED_RESOLUTION != 0,
    })
}

/// Read the first page's `ImageDescription`, if any.
fn read_description<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Option<String>, TiffError> {
    match decoder.find_tag(Tag::ImageDescription)? {
        Some(value) => Ok(Some(value.into_string()?)),
        None => Ok(None),
    }
}

/// Walk every IFD and group pages into series.
fn collect_series<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Vec<Series>, TiffError> {
    let mut series: Vec<Series> = Vec::new();
    let mut page = 0usize;

    loop {
        let info = read_page_info(decoder)?;
        debug!(
            page,
            width = info.width,
            height = info.height,
            reduced = info.reduced,
            "ifd"
        );

        if !info.reduced {
            match series.last_mut() {
                Some(last) if info.same_layout(last) => last.depth += 1,
                _ => series.push(Series {
                    index: series.len(),
                    width: info.width,
                    height: info.height,
                    depth: 1,
                    bits_per_sample: info.bits_per_sample,
                    samples_per_pixel: info.samples_per_pixel,
                }),
            }
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
        page += 1;
    }

    Ok(series)
}

/// Encode `shape` as zero-filled Gray8 pages into `file`.
fn encode_stack(file: File, path: &Path, shape: &Shape) -> Result<(), BackendError> {
    let plane = vec![0u8; shape.plane_len()];
    let description = imagej::format_description(shape.depth());

    let mut writer = BufWriter::new(file);
    {
        let mut encoder = TiffEncoder::new(&mut writer).map_err(|e| encode_error(path, e))?;
        for page in 0..shape.depth() {
            let mut image = encoder
                .new_image::<colortype::Gray8>(shape.width(), shape.height())
                .map_err(|e| encode_error(path, e))?;
            if page == 0 {
                image
                    .encoder()
                    .write_tag(Tag::ImageDescription, description.as_str())
                    .map_err(|e| encode_error(path, e))?;
            }
            image.write_data(&plane).map_err(|e| encode_error(path, e))?;
        }
    }
    writer.flush()?;
    Ok(())
}

impl StackBackend for TiffBackend {
    fn write_stack(&self, path: &Path, shape: &Shape) -> Result<(), BackendError> {
        shape.validate()?;
        let file = File::create(path)?;
        if let Err(e) = encode_stack(file, path, shape) {
            // Never leave a truncated stack behind.
            let _ = fs::remove_file(path);
            return Err(e);
        }
        debug!(path = %path.display(), %shape, "wrote stack");
        Ok(())
    }

    fn open_series(&self, path: &Path) -> Result<Vec<Series>, BackendError> {
        let mut decoder = open_decoder(path)?;
        let series = collect_series(&mut decoder).map_err(|e| tiff_error(path, e))?;
        debug!(path = %path.display(), count = series.len(), "resolved series");
        Ok(series)
    }

    fn open_image(&self, path: &Path) -> Result<LegacyImage, BackendError> {
        check_is_file(path)?;
        let first_plane = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                BackendError::Decode(format!("Failed to decode {}: {}", path.display(), e))
            })?;

        let mut decoder = open_decoder(path)?;
        let declared = read_description(&mut decoder)
            .map_err(|e| tiff_error(path, e))?
            .as_deref()
            .and_then(imagej::parse)
            .and_then(|desc| desc.images.or(desc.slices));

        let stack_size = match declared {
            Some(images) => images,
            None => collect_series(&mut decoder)
                .map_err(|e| tiff_error(path, e))?
                .first()
                .map(|s| s.depth)
                .unwrap_or(0),
        };

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(LegacyImage {
            title,
            width: first_plane.width(),
            height: first_plane.height(),
            stack_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shape(axes: &[u64]) -> Shape {
        Shape::new(axes.to_vec()).unwrap()
    }

    /// Write raw Gray8 pages with no ImageJ block. `reduced` pages get
    /// `NewSubfileType = 1`.
    fn write_raw_pages(path: &Path, pages: &[(u32, u32, bool)]) {
        let mut file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(&mut file).unwrap();
        for &(w, h, reduced) in pages {
            let mut image = encoder.new_image::<colortype::Gray8>(w, h).unwrap();
            if reduced {
                image
                    .encoder()
                    .write_tag(Tag::NewSubfileType, REDUCED_RESOLUTION)
                    .unwrap();
            }
            image.write_data(&vec![7u8; (w * h) as usize]).unwrap();
        }
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert!(is_stack_file(Path::new("a/test.tif")));
        assert!(is_stack_file(Path::new("dummy3.TIFF")));
        assert!(!is_stack_file(Path::new("notes.txt")));
        assert!(!is_stack_file(Path::new("tif")));
    }

    #[test]
    fn written_stack_resolves_to_one_series() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.tif");
        let backend = TiffBackend::new();
        backend.write_stack(&path, &shape(&[1024, 1024, 2])).unwrap();

        let series = backend.open_series(&path).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].dimensions(), (1024, 1024, 2));
        assert_eq!(series[0].bits_per_sample, 8);
        assert_eq!(series[0].samples_per_pixel, 1);
    }

    #[test]
    fn single_plane_stack_has_depth_one() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dummy0.tiff");
        let backend = TiffBackend::new();
        backend.write_stack(&path, &shape(&[256, 256])).unwrap();

        let series = backend.open_series(&path).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].dimensions(), (256, 256, 1));
    }

    #[test]
    fn higher_axes_become_planes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hyper.tif");
        let backend = TiffBackend::new();
        backend.write_stack(&path, &shape(&[16, 8, 2, 3])).unwrap();

        let series = backend.open_series(&path).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].dimensions(), (16, 8, 6));
    }

    #[test]
    fn rewriting_same_shape_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.tif");
        let b = tmp.path().join("b.tif");
        let backend = TiffBackend::new();
        backend.write_stack(&a, &shape(&[32, 32, 2])).unwrap();
        backend.write_stack(&b, &shape(&[32, 32, 2])).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn write_into_missing_directory_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("test.tif");
        let err = TiffBackend::new()
            .write_stack(&path, &shape(&[8, 8]))
            .unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }

    #[test]
    fn unencodable_shape_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("huge.tif");
        // Built directly, skipping Shape::new.
        let huge = Shape(vec![u32::MAX as u64, u32::MAX as u64]);

        let err = TiffBackend::new().write_stack(&path, &huge).unwrap_err();
        assert!(matches!(err, BackendError::IncompatibleShape(_)));
        assert!(!path.exists());
    }

    #[test]
    fn sample_layout_of_common_color_types() {
        assert_eq!(sample_layout(ColorType::Gray(8)), (8, 1));
        assert_eq!(sample_layout(ColorType::GrayA(16)), (16, 2));
        assert_eq!(sample_layout(ColorType::RGB(8)), (8, 3));
        assert_eq!(sample_layout(ColorType::CMYK(8)), (8, 4));
    }

    #[test]
    fn differing_page_sizes_split_series() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mixed.tif");
        write_raw_pages(
            &path,
            &[(32, 32, false), (32, 32, false), (16, 8, false)],
        );

        let series = TiffBackend::new().open_series(&path).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].dimensions(), (32, 32, 2));
        assert_eq!(series[1].dimensions(), (16, 8, 1));
        assert_eq!(series[1].index, 1);
    }

    #[test]
    fn reduced_resolution_pages_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pyramid.tif");
        write_raw_pages(&path, &[(64, 64, false), (32, 32, true), (64, 64, false)]);

        let series = TiffBackend::new().open_series(&path).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].dimensions(), (64, 64, 2));
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = TiffBackend::new()
            .open_series(&tmp.path().join("nope.tif"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }

    #[test]
    fn directory_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let backend = TiffBackend::new();
        assert!(matches!(
            backend.open_series(tmp.path()),
            Err(BackendError::NotAFile(_))
        ));
        assert!(matches!(
            backend.open_image(tmp.path()),
            Err(BackendError::NotAFile(_))
        ));
    }

    #[test]
    fn non_tiff_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fake.tif");
        std::fs::write(&path, b"hello, this is not a tiff file").unwrap();
        let err = TiffBackend::new().open_series(&path).unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[test]
    fn legacy_open_reads_imagej_stack_size() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.tif");
        let backend = TiffBackend::new();
        backend.write_stack(&path, &shape(&[1024, 1024, 2])).unwrap();

        let image = backend.open_image(&path).unwrap();
        assert_eq!(image.title, "test");
        assert_eq!(image.width, 1024);
        assert_eq!(image.height, 1024);
        assert_eq!(image.stack_size, 2);
    }

    #[test]
    fn legacy_open_counts_pages_without_description() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plain.tif");
        write_raw_pages(&path, &[(20, 10, false), (20, 10, false), (20, 10, false)]);

        let image = TiffBackend::new().open_image(&path).unwrap();
        assert_eq!((image.width, image.height), (20, 10));
        assert_eq!(image.stack_size, 3);
    }

    #[test]
    fn first_plane_is_zero_filled() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("zeros.tif");
        TiffBackend::new()
            .write_stack(&path, &shape(&[40, 30, 2]))
            .unwrap();

        let img = ImageReader::open(&path).unwrap().decode().unwrap();
        assert!(img.to_luma8().pixels().all(|p| p.0[0] == 0));
    }
}
