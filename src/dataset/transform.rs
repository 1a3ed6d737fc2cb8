//! Image preprocessing pipeline
//!
//! A [`Preprocessor`] is an ordered list of [`Transform`] steps followed by
//! tensor conversion. Evaluation images (train/validation) are randomly
//! cropped and resized with Lanczos resampling; test images are only
//! converted, since they are expected to arrive at the model's input size.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageReader, RgbImage};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, SubmissionError};

/// Side of the square crop fed to the classifier
pub const DEFAULT_CROP_SIZE: u32 = 128;

/// Preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub crop_size: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            crop_size: DEFAULT_CROP_SIZE,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.crop_size == 0 {
            return Err(SubmissionError::Config("Crop size must be positive".to_string()));
        }
        Ok(())
    }
}

/// A single image transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    /// Uniformly random `size`x`size` window. With `pad_if_needed`, a short
    /// axis is zero-padded by its deficit on both sides first.
    RandomCrop { size: u32, pad_if_needed: bool },
    /// Shorter edge to `size`, aspect ratio kept, Lanczos3 filter
    Resize { size: u32 },
}

impl Transform {
    pub fn apply<R: Rng + ?Sized>(&self, image: DynamicImage, rng: &mut R) -> Result<DynamicImage> {
        match *self {
            Transform::RandomCrop {
                size,
                pad_if_needed,
            } => random_crop(image, size, pad_if_needed, rng),
            Transform::Resize { size } => Ok(resize_shorter_edge(image, size)),
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, Transform::RandomCrop { .. })
    }
}

fn random_crop<R: Rng + ?Sized>(
    image: DynamicImage,
    size: u32,
    pad_if_needed: bool,
    rng: &mut R,
) -> Result<DynamicImage> {
    let mut image = image;
    let (width, height) = image.dimensions();

    if pad_if_needed && (width < size || height < size) {
        let pad_x = size.saturating_sub(width);
        let pad_y = size.saturating_sub(height);
        let mut canvas = RgbImage::new(width + 2 * pad_x, height + 2 * pad_y);
        imageops::overlay(&mut canvas, &image.to_rgb8(), pad_x as i64, pad_y as i64);
        image = DynamicImage::ImageRgb8(canvas);
    }

    let (width, height) = image.dimensions();
    if width < size || height < size {
        return Err(SubmissionError::Dataset(format!(
            "Crop size {} larger than image {}x{}",
            size, width, height
        )));
    }

    let x = rng.gen_range(0..=width - size);
    let y = rng.gen_range(0..=height - size);
    Ok(image.crop_imm(x, y, size, size))
}

fn resize_shorter_edge(image: DynamicImage, size: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = if width <= height {
        (size, (size as u64 * height as u64 / width.max(1) as u64) as u32)
    } else {
        ((size as u64 * width as u64 / height.max(1) as u64) as u32, size)
    };

    if (new_width, new_height) == (width, height) {
        return image;
    }
    image.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Channel-first float image, values in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTensor {
    /// Flattened `[channels, height, width]`
    pub data: Vec<f32>,
    pub shape: [usize; 3],
}

impl ImageTensor {
    /// Convert to RGB and lay out as CHW, scaling bytes to `[0, 1]`
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let num_pixels = (width * height) as usize;

        let mut data = vec![0.0f32; 3 * num_pixels];
        for (i, pixel) in rgb.pixels().enumerate() {
            data[i] = pixel[0] as f32 / 255.0;
            data[num_pixels + i] = pixel[1] as f32 / 255.0;
            data[2 * num_pixels + i] = pixel[2] as f32 / 255.0;
        }

        Self {
            data,
            shape: [3, height as usize, width as usize],
        }
    }
}

/// Ordered transforms plus tensor conversion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preprocessor {
    transforms: Vec<Transform>,
}

impl Preprocessor {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self { transforms }
    }

    /// Train/validation pipeline: random crop (padded), Lanczos resize, tensor
    pub fn evaluation(config: &PreprocessConfig) -> Self {
        Self::new(vec![
            Transform::RandomCrop {
                size: config.crop_size,
                pad_if_needed: true,
            },
            Transform::Resize {
                size: config.crop_size,
            },
        ])
    }

    /// Test pipeline: tensor conversion only
    pub fn test() -> Self {
        Self::default()
    }

    /// True when no step draws from the RNG
    pub fn is_deterministic(&self) -> bool {
        !self.transforms.iter().any(Transform::is_random)
    }

    pub fn apply<R: Rng + ?Sized>(&self, image: DynamicImage, rng: &mut R) -> Result<ImageTensor> {
        let mut image = image;
        for transform in &self.transforms {
            image = transform.apply(image, rng)?;
        }
        Ok(ImageTensor::from_image(&image))
    }

    /// Decode the image at `path` and run the pipeline on it
    pub fn load_and_apply<R: Rng + ?Sized>(&self, path: &Path, rng: &mut R) -> Result<ImageTensor> {
        let image = ImageReader::open(path)
            .map_err(|e| SubmissionError::ImageLoad(path.to_path_buf(), e.to_string()))?
            .decode()
            .map_err(|e| SubmissionError::ImageLoad(path.to_path_buf(), e.to_string()))?;
        self.apply(image, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_to_tensor_is_chw_and_normalized() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 2, Rgb([255, 0, 51])));
        let tensor = ImageTensor::from_image(&image);

        assert_eq!(tensor.shape, [3, 2, 4]);
        assert_eq!(tensor.data.len(), 3 * 2 * 4);
        assert!(tensor.data[..8].iter().all(|&v| v == 1.0));
        assert!(tensor.data[8..16].iter().all(|&v| v == 0.0));
        assert!((tensor.data[16] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_test_pipeline_is_deterministic() {
        let preprocessor = Preprocessor::test();
        assert!(preprocessor.is_deterministic());

        let image = gradient(128, 128);
        let a = preprocessor.apply(image.clone(), &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        let b = preprocessor.apply(image, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_evaluation_pipeline_has_fixed_shape() {
        let preprocessor = Preprocessor::evaluation(&PreprocessConfig::default());
        assert!(!preprocessor.is_deterministic());

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for (w, h) in [(300, 200), (128, 128), (90, 150), (40, 40)] {
            let tensor = preprocessor.apply(gradient(w, h), &mut rng).unwrap();
            assert_eq!(tensor.shape, [3, 128, 128], "input {}x{}", w, h);
            assert!(tensor.data.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_random_crop_location_varies() {
        let crop = Transform::RandomCrop {
            size: 128,
            pad_if_needed: true,
        };
        let image = gradient(400, 400);

        let outputs: Vec<_> = (0..8)
            .map(|seed| {
                let cropped = crop
                    .apply(image.clone(), &mut ChaCha8Rng::seed_from_u64(seed))
                    .unwrap();
                assert_eq!(cropped.dimensions(), (128, 128));
                cropped.to_rgb8().get_pixel(0, 0).0
            })
            .collect();

        assert!(outputs.iter().any(|p| *p != outputs[0]));
    }

    #[test]
    fn test_padding_is_zero_filled() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 128, Rgb([200, 200, 200])));
        let cropped = random_crop(image, 128, true, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let rgb = cropped.to_rgb8();

        // 10 px of content inside at least 118 px of black
        let bright = rgb.pixels().filter(|p| p[0] == 200).count();
        assert_eq!(bright, 10 * 128);
        assert!(rgb.pixels().any(|p| p[0] == 0));
    }

    #[test]
    fn test_crop_without_padding_rejects_small_image() {
        let result = random_crop(gradient(64, 64), 128, false, &mut ChaCha8Rng::seed_from_u64(0));
        assert!(result.is_err());
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let resized = resize_shorter_edge(gradient(256, 512), 128);
        assert_eq!(resized.dimensions(), (128, 256));

        let same = resize_shorter_edge(gradient(128, 128), 128);
        assert_eq!(same.dimensions(), (128, 128));
    }

    #[test]
    fn test_load_missing_file_is_image_error() {
        let result = Preprocessor::test().load_and_apply(
            Path::new("/definitely/not/here.png"),
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(SubmissionError::ImageLoad(..))));
    }
}
