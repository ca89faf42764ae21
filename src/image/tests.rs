use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let data = data
        .into_iter()
        .flat_map(|row| row.into_iter())
        .flat_map(|col| col.0)
        .collect::<Vec<_>>();
    Image::from_rgba8(Resolution::new(W as u32, H as u32), &data)
}

#[test]
fn from_rgba8_layout() {
    let image = mkimage([[C::RED, C::GREEN, C::BLUE], [C::YELLOW, C::BLACK, C::CYAN]]);
    assert_eq!(image.resolution(), Resolution::new(3, 2));
    assert_eq!(image.get(0, 0), C::RED);
    assert_eq!(image.get(2, 0), C::BLUE);
    assert_eq!(image.get(1, 1), C::BLACK);
    assert_eq!(image.data().len(), 3 * 2 * 4);
}

#[test]
#[should_panic(expected = "incorrect buffer size")]
fn from_rgba8_wrong_size() {
    Image::from_rgba8(Resolution::new(2, 2), &[0; 15]);
}

#[test]
fn flip_horizontal() {
    let mut image = mkimage([[C::RED, C::GREEN, C::BLUE], [C::YELLOW, C::BLACK, C::CYAN]]);
    image.flip_horizontal_in_place();
    assert_eq!(
        image,
        mkimage([[C::BLUE, C::GREEN, C::RED], [C::CYAN, C::BLACK, C::YELLOW]])
    );
}

#[test]
fn get_or_null() {
    let image = mkimage([[C::RED, C::GREEN], [C::BLUE, C::YELLOW]]);
    assert_eq!(image.get_or_null(1, 1), C::YELLOW);
    assert_eq!(image.get_or_null(-1, 0), C::NULL);
    assert_eq!(image.get_or_null(0, 2), C::NULL);
    assert_eq!(image.get_or_null(2, 0), C::NULL);
}

#[test]
fn new_image_is_transparent() {
    let image = Image::new(4, 3);
    assert!(image.data().chunks(4).all(|px| px == C::NULL.0));
}

#[test]
fn unsupported_extension() {
    let err = Image::load("frame.bmp").unwrap_err();
    assert!(err.to_string().contains("supported extensions"));

    let err = Image::new(1, 1).save("frame.bmp").unwrap_err();
    assert!(err.to_string().contains("supported extensions"));
}

#[test]
fn decode_garbage_jpeg_fails() {
    assert!(Image::decode_jpeg(&[0xff, 0xd8, 0x00, 0x01, 0x02]).is_err());
    assert!(Image::decode_jpeg(&[]).is_err());
}
