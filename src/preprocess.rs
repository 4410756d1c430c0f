//! Fixed image preprocessing applied to every upload before the forward pass.
//!
//! Images are coerced to RGB, resized to `IMAGE_SIZE`×`IMAGE_SIZE` (aspect
//! ratio is not preserved), scaled to `[0, 1]` and normalized per channel with
//! the statistics the backbone was pretrained with. The constants must stay in
//! lockstep with the exported weights.

use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::{Array3, Array4, Axis};

use crate::error::PredictError;

pub const IMAGE_SIZE: u32 = 224;
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

pub fn decode(image_data: &[u8]) -> Result<DynamicImage, PredictError> {
    Ok(image::load_from_memory(image_data)?)
}

fn resize_rgb(image: &DynamicImage) -> RgbImage {
    // Grayscale, RGBA and palette images all end up with three channels here.
    let rgb = image.to_rgb8();
    image::imageops::resize(&rgb, IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
}

/// Converts a decoded image into a normalized CHW array of shape `(3, 224, 224)`.
pub fn to_input(image: &DynamicImage) -> Array3<f32> {
    let resized = resize_rgb(image);
    let size = IMAGE_SIZE as usize;

    Array3::from_shape_fn((3, size, size), |(c, y, x)| {
        let value = resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (value - MEAN[c]) / STD[c]
    })
}

/// Decodes raw upload bytes into a batch of one, shape `(1, 3, 224, 224)`.
pub fn preprocess(image_data: &[u8]) -> Result<Array4<f32>, PredictError> {
    let image = decode(image_data)?;
    Ok(to_input(&image).insert_axis(Axis(0)))
}
