use manga_overlay_rust::overlay::{FONT_SIZE_MAX, FONT_SIZE_MIN};
use manga_overlay_rust::{BoundingBox, DescrambleGrid, Point, Size, TextRegion, layout};

#[test]
fn half_scale_region_with_offset() {
    let mut region = TextRegion::new(BoundingBox::new(100.0, 100.0, 300.0, 150.0), "こんにちは");
    region.font_size_hint = Some(20.0);

    let boxes = layout(
        &[region],
        Size::new(1000.0, 1000.0),
        Size::new(500.0, 500.0),
        Point::new(10.0, 20.0),
    );

    let placed = &boxes[0];
    assert_eq!(placed.left, 50.0);
    assert_eq!(placed.top, 67.5);
    assert_eq!(placed.width, 120.0);
    assert_eq!(placed.height, 30.0);
    assert_eq!(placed.font_size_px, FONT_SIZE_MIN);
    assert_eq!(placed.display_text, "こんにちは");
    assert_eq!(placed.tooltip_text, "こんにちは");
}

#[test]
fn vertical_text_wraps_to_fit_the_box() {
    let text = "あ".repeat(30);
    let mut region = TextRegion::new(BoundingBox::new(0.0, 0.0, 75.0, 400.0), text.clone());
    region.font_size_hint = Some(20.0);
    region.is_vertical = true;

    let boxes = layout(
        &[region],
        Size::new(1000.0, 1000.0),
        Size::new(1000.0, 1000.0),
        Point::default(),
    );

    let lines: Vec<&str> = boxes[0].display_text.lines().collect();
    assert_eq!(lines.len(), 8);
    assert!(lines.iter().all(|line| line.chars().count() <= 4));
    assert_eq!(lines.concat(), text);
}

#[test]
fn font_size_is_clamped() {
    let mut large = TextRegion::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0), "big");
    large.font_size_hint = Some(200.0);
    let small = TextRegion::new(BoundingBox::new(0.0, 0.0, 100.0, 10.0), "small");

    let boxes = layout(
        &[large, small],
        Size::new(100.0, 100.0),
        Size::new(100.0, 100.0),
        Point::default(),
    );

    assert_eq!(boxes[0].font_size_px, FONT_SIZE_MAX);
    assert_eq!(boxes[1].font_size_px, FONT_SIZE_MIN);
}

#[test]
fn grid_moves_second_tile_down_one_row() {
    let grid = DescrambleGrid::new(800, 1200, 4).unwrap();
    assert_eq!(grid.tile_width, 200);
    assert_eq!(grid.tile_height, 296);
    assert_eq!(grid.permute(1), 4);

    let step = grid.moves().into_iter().find(|step| step.index == 1).unwrap();
    assert_eq!((step.src_x, step.src_y), (200, 0));
    assert_eq!((step.dst_x, step.dst_y), (0, 296));
}
