//! Keep-aspect letterboxing

use crate::geometry::{Rect, Size};

/// Largest rectangle of `ratio` (width / height) centered inside `size`
///
/// Bars are added on the left and right when the drawable is wider than the
/// ratio, above and below when it is taller.
pub fn letterbox(size: Size, ratio: f64) -> Rect {
    if !size.is_valid() {
        return Rect::from_size(size);
    }

    if size.width / size.height > ratio {
        let width = size.height * ratio;
        Rect::new((size.width - width) / 2.0, 0.0, width, size.height)
    } else {
        let height = size.width / ratio;
        Rect::new(0.0, (size.height - height) / 2.0, size.width, height)
    }
}
