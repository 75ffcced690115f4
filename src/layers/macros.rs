//! Macros to reduce boilerplate in overlay attribute implementations

/// Implements `common()` / `common_mut()` of `OverlayAttributes` for a
/// record that flattens `CommonAttrs` into the named field.
///
/// Usage:
/// ```ignore
/// impl OverlayAttributes for MarkerAttrs {
///     const KIND: OverlayKind = OverlayKind::Marker;
///     impl_common_accessors!(common);
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! impl_common_accessors {
    ($common_field:ident) => {
        fn common(&self) -> &$crate::layers::base::CommonAttrs {
            &self.$common_field
        }

        fn common_mut(&mut self) -> &mut $crate::layers::base::CommonAttrs {
            &mut self.$common_field
        }
    };
}

/// Implements `HasPath` for a record whose path lives in `points`.
#[macro_export]
macro_rules! impl_has_path {
    ($attrs:ty, closed = $closed:expr) => {
        impl $crate::traits::HasPath for $attrs {
            fn points(&self) -> &[$crate::core::geo::LatLng] {
                &self.points
            }

            fn points_mut(&mut self) -> &mut Vec<$crate::core::geo::LatLng> {
                &mut self.points
            }

            fn is_closed(&self) -> bool {
                $closed
            }
        }
    };
}
