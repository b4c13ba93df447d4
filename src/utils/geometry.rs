// SPDX-License-Identifier: GPL-3.0-only

use cosmic_monitors_config::{Rect, Transform};
use smithay::utils::{Physical, Rectangle, Transform as SmithayTransform};

pub trait RectExt {
    fn as_physical(&self) -> Rectangle<i32, Physical>;
}

impl RectExt for Rect {
    fn as_physical(&self) -> Rectangle<i32, Physical> {
        Rectangle::new((self.x, self.y).into(), (self.width, self.height).into())
    }
}

pub trait TransformExt {
    fn to_smithay(&self) -> SmithayTransform;
}

impl TransformExt for Transform {
    fn to_smithay(&self) -> SmithayTransform {
        match self {
            Transform::Normal => SmithayTransform::Normal,
            Transform::_90 => SmithayTransform::_90,
            Transform::_180 => SmithayTransform::_180,
            Transform::_270 => SmithayTransform::_270,
            Transform::Flipped => SmithayTransform::Flipped,
            Transform::Flipped90 => SmithayTransform::Flipped90,
            Transform::Flipped180 => SmithayTransform::Flipped180,
            Transform::Flipped270 => SmithayTransform::Flipped270,
        }
    }
}

/// Whether any two of the rectangles intersect with a non-empty area.
pub fn any_overlap(rects: &[Rect]) -> bool {
    rects.iter().enumerate().any(|(i, a)| {
        rects[i + 1..]
            .iter()
            .any(|b| a.as_physical().overlaps(b.as_physical()))
    })
}
