//! Offscreen rendering on a real adapter. Skipped when the machine has none.

use lamina::math::{color_matrix, Rect2D, Vec4};
use lamina::{GpuContext, Renderer, RendererConfig, Scene};

const SIZE: u32 = 8;

fn renderer() -> Option<Renderer> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = RendererConfig::default();
    match GpuContext::new(&config) {
        Ok(context) => Some(Renderer::from_context(
            &context,
            lamina::renderer::OFFSCREEN_FORMAT,
            config,
        )),
        Err(e) => {
            log::warn!("Skipping GPU test: {}", e);
            None
        }
    }
}

fn pixel(image: &image::RgbaImage, x: u32, y: u32) -> [u8; 4] {
    image.get_pixel(x, y).0
}

fn close(a: u8, b: u8) -> bool {
    a.abs_diff(b) <= 2
}

#[test]
fn test_rectangle_readback() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    let mut scene = Scene::new();
    let root = scene.create_root();
    let rect = scene.create_rectangle(
        Rect2D::from_xywh(2.0, 2.0, 4.0, 4.0),
        Vec4::new(1.0, 0.0, 0.0, 1.0),
    );
    scene.append(root, rect);

    let target = renderer.create_offscreen_target(SIZE, SIZE);
    assert!(renderer.render_offscreen(&scene, &target));
    renderer.frame_swapped();

    let image = renderer.read_pixels(&target, 0, 0, SIZE, SIZE).unwrap();
    assert_eq!(pixel(&image, 3, 3), [255, 0, 0, 255]);
    assert_eq!(pixel(&image, 0, 0), [0, 0, 0, 255]);
    assert_eq!(pixel(&image, 7, 7), [0, 0, 0, 255]);
    assert_eq!(renderer.last_frame_stats().draws, 1);
}

#[test]
fn test_color_filter_readback() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    let mut scene = Scene::new();
    let root = scene.create_root();
    let filter = scene.create_color_filter(color_matrix::grayscale());
    let rect = scene.create_rectangle(
        Rect2D::from_xywh(0.0, 0.0, 8.0, 8.0),
        Vec4::new(1.0, 0.0, 0.0, 1.0),
    );
    scene.append(filter, rect);
    scene.append(root, filter);

    let target = renderer.create_offscreen_target(SIZE, SIZE);
    assert!(renderer.render_offscreen(&scene, &target));

    let image = renderer.read_pixels(&target, 4, 4, 1, 1).unwrap();
    let [r, g, b, a] = pixel(&image, 0, 0);
    assert!(close(r, g) && close(g, b), "not gray: {:?}", [r, g, b]);
    assert!(r > 0 && r < 255);
    assert_eq!(a, 255);

    let stats = renderer.last_frame_stats();
    assert_eq!(stats.layers, 1);
    renderer.frame_swapped();
    assert_eq!(renderer.pool_stats().outstanding, 0);
}

#[test]
fn test_uploaded_texture_readback() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    let green: Vec<u8> = [0, 255, 0, 255].repeat(4);
    let texture = renderer
        .create_texture_from_pixels(2, 2, &green, false)
        .unwrap();

    let mut scene = Scene::new();
    let root = scene.create_root();
    let node = scene.create_texture(Rect2D::from_xywh(0.0, 0.0, 8.0, 8.0), Some(texture));
    scene.append(root, node);

    let target = renderer.create_offscreen_target(SIZE, SIZE);
    assert!(renderer.render_offscreen(&scene, &target));

    let image = renderer.read_pixels(&target, 0, 0, SIZE, SIZE).unwrap();
    assert_eq!(pixel(&image, 4, 4), [0, 255, 0, 255]);

    renderer.destroy_texture(texture);
}

#[test]
fn test_invalid_requests_are_errors() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    let target = renderer.create_offscreen_target(SIZE, SIZE);
    assert!(matches!(
        renderer.read_pixels(&target, 4, 4, 8, 8),
        Err(lamina::Error::Readback(_))
    ));
    assert!(matches!(
        renderer.read_pixels(&target, u32::MAX, 0, 2, 1),
        Err(lamina::Error::Readback(_))
    ));
    assert!(matches!(
        renderer.create_texture_from_pixels(2, 2, &[0; 3], false),
        Err(lamina::Error::InvalidTexture(_))
    ));
    assert!(matches!(
        renderer.create_texture_from_file("does/not/exist.png"),
        Err(lamina::Error::Image(_))
    ));
}
