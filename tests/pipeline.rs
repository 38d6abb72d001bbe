use image::{GenericImageView, GrayImage, Rgb, RgbImage};
use zoompaint::{Config, Error, Inpaint, Pipeline};

/// Paints every mask-0 pixel a fixed colour so the output shows exactly
/// which pixels the mask selected.
struct FillBackground {
    colour: Rgb<u8>,
    seen: Vec<(RgbImage, GrayImage, String)>,
}

impl FillBackground {
    fn new(colour: [u8; 3]) -> Self {
        Self {
            colour: Rgb(colour),
            seen: Vec::new(),
        }
    }
}

impl Inpaint for FillBackground {
    fn inpaint(
        &mut self,
        image: &RgbImage,
        mask: &GrayImage,
        prompt: &str,
    ) -> zoompaint::Result<RgbImage> {
        zoompaint::pipeline::check_mask(image, mask)?;
        self.seen
            .push((image.clone(), mask.clone(), prompt.to_string()));

        let mut out = image.clone();
        for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
            if m[0] == 0 {
                *pixel = self.colour;
            }
        }
        Ok(out)
    }
}

fn black_square_on_white(size: u32, square: u32) -> RgbImage {
    let start = (size - square) / 2;
    let end = start + square;
    RgbImage::from_fn(size, size, |x, y| {
        if (start..end).contains(&x) && (start..end).contains(&y) {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

#[test]
fn zoomed_square_is_isolated_in_mask() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("square.png");
    let output = dir.path().join("filled.png");
    let mask_path = dir.path().join("mask.png");

    black_square_on_white(1024, 400).save(&input).unwrap();

    let config = Config {
        zoom: 2.0,
        mask_output: Some(mask_path.clone()),
        ..Config::default()
    };
    let mut inpainter = FillBackground::new([0, 128, 255]);
    let mut pipeline = Pipeline::new(config, &mut inpainter).unwrap();
    pipeline
        .process(&input, &output, "a marble countertop")
        .unwrap();

    let (seen_image, seen_mask, prompt) = &inpainter.seen[0];
    assert_eq!(prompt, "a marble countertop");
    assert_eq!(seen_image.dimensions(), (512, 512));
    assert_eq!(seen_mask.dimensions(), (512, 512));

    // The 400px square shrinks to about 200px around the center of the crop.
    let mask = image::open(&mask_path).unwrap().to_luma8();
    assert_eq!(&mask, seen_mask);
    for y in (170..340).step_by(10) {
        for x in (170..340).step_by(10) {
            assert_eq!(mask.get_pixel(x, y)[0], 255, "object at ({x}, {y})");
        }
    }
    for &(x, y) in &[(0, 0), (511, 511), (100, 256), (256, 100), (420, 256), (256, 420)] {
        assert_eq!(mask.get_pixel(x, y)[0], 0, "background at ({x}, {y})");
    }

    let object = mask.pixels().filter(|p| p[0] == 255).count();
    assert!(
        (196 * 196..=212 * 212).contains(&object),
        "object covers {object} pixels"
    );

    let filled = image::open(&output).unwrap().to_rgb8();
    assert_eq!(filled.get_pixel(0, 0), &Rgb([0, 128, 255]));
    assert_eq!(filled.get_pixel(256, 256), &Rgb([0, 0, 0]));
}

#[test]
fn unit_zoom_passes_original_image_through() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("small.png");
    let output = dir.path().join("out.png");

    let mut source = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));
    source.put_pixel(10, 10, Rgb([0, 0, 0]));
    source.save(&input).unwrap();

    let mut pipeline = Pipeline::new(Config::default(), FillBackground::new([9, 9, 9])).unwrap();
    pipeline.process(&input, &output, "fog").unwrap();
    let inpainter = pipeline.into_inner();

    let (seen_image, seen_mask, _) = &inpainter.seen[0];
    assert_eq!(seen_image, &source);
    assert_eq!(seen_mask.pixels().filter(|p| p[0] == 255).count(), 9);
    assert_eq!(image::open(&output).unwrap().dimensions(), (64, 48));
}

#[test]
fn small_image_cannot_be_zoomed() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("small.png");
    let output = dir.path().join("out.png");
    RgbImage::new(256, 256).save(&input).unwrap();

    let config = Config {
        zoom: 2.0,
        ..Config::default()
    };
    let mut inpainter = FillBackground::new([0, 0, 0]);
    let mut pipeline = Pipeline::new(config, &mut inpainter).unwrap();
    let err = pipeline.process(&input, &output, "x").unwrap_err();

    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert!(!output.exists());
    assert!(inpainter.seen.is_empty());
}

#[test]
fn missing_input_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut inpainter = FillBackground::new([0, 0, 0]);
    let mut pipeline = Pipeline::new(Config::default(), &mut inpainter).unwrap();

    let err = pipeline
        .process(dir.path().join("nope.png"), dir.path().join("out.png"), "x")
        .unwrap_err();

    assert!(matches!(err, Error::ImageLoad { .. }));
    assert!(!err.is_model_error());
}
