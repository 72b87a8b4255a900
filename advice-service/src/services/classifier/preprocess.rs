use candle_core::{DType, Device, Tensor};
use image::{imageops::FilterType, DynamicImage};

/// ImageNet channel statistics the backbone was trained with.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize to `size`×`size`, force RGB, normalise and add a batch axis.
///
/// Output layout is `(1, 3, size, size)` in `f32`.
pub fn image_to_tensor(
    image: &DynamicImage,
    size: usize,
    device: &Device,
) -> candle_core::Result<Tensor> {
    let side = size as u32;
    let rgb = image
        .resize_exact(side, side, FilterType::Triangle)
        .to_rgb8()
        .into_raw();

    let mean = Tensor::new(&IMAGENET_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGENET_STD, device)?.reshape((3, 1, 1))?;

    Tensor::from_vec(rgb, (size, size, 3), device)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(1.0 / 255.0, 0.0)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?
        .unsqueeze(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn output_has_batch_channel_layout() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(50, 30));
        let tensor = image_to_tensor(&img, 32, &Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 32, 32]);
        assert_eq!(tensor.dtype(), DType::F32);
    }

    #[test]
    fn normalises_each_channel() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 255])));
        let tensor = image_to_tensor(&img, 4, &Device::Cpu).unwrap();
        let values = tensor.squeeze(0).unwrap().to_vec3::<f32>().unwrap();

        let expected = [
            (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0],
            (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1],
            (1.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2],
        ];
        for (channel, want) in expected.iter().enumerate() {
            let got = values[channel][2][3];
            assert!((got - want).abs() < 1e-4, "channel {channel}: {got} vs {want}");
        }
    }

    #[test]
    fn grayscale_input_is_expanded_to_three_channels() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([128])));
        let tensor = image_to_tensor(&img, 16, &Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 16, 16]);
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 20, |x, y| {
            Rgb([(x * 12) as u8, (y * 12) as u8, ((x + y) * 6) as u8])
        }));
        let a = image_to_tensor(&img, 16, &Device::Cpu).unwrap();
        let b = image_to_tensor(&img, 16, &Device::Cpu).unwrap();
        let diff = (a - b).unwrap().abs().unwrap().sum_all().unwrap();
        assert_eq!(diff.to_scalar::<f32>().unwrap(), 0.0);
    }
}
