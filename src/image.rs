use std::fmt;

pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/500x750?text=No+Image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    W92,
    W154,
    W185,
    W342,
    #[default]
    W500,
    W780,
    W1280,
    H632,
    Original,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::W92 => "w92",
            ImageSize::W154 => "w154",
            ImageSize::W185 => "w185",
            ImageSize::W342 => "w342",
            ImageSize::W500 => "w500",
            ImageSize::W780 => "w780",
            ImageSize::W1280 => "w1280",
            ImageSize::H632 => "h632",
            ImageSize::Original => "original",
        }
    }

    /// Pixel width used in `srcset` descriptors. `h632` is height-bound and
    /// `original` has no fixed width.
    pub fn width(&self) -> Option<u32> {
        match self {
            ImageSize::W92 => Some(92),
            ImageSize::W154 => Some(154),
            ImageSize::W185 => Some(185),
            ImageSize::W342 => Some(342),
            ImageSize::W500 => Some(500),
            ImageSize::W780 => Some(780),
            ImageSize::W1280 => Some(1280),
            ImageSize::H632 => Some(632),
            ImageSize::Original => None,
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute CDN URL for an image path, or the placeholder when the movie or
/// person has no image.
pub fn image_url(path: Option<&str>, size: ImageSize) -> String {
    match path {
        Some(p) if !p.is_empty() => {
            format!("{IMAGE_BASE}/{}/{}", size, p.trim_start_matches('/'))
        }
        _ => PLACEHOLDER_IMAGE.to_string(),
    }
}

pub fn srcset(path: Option<&str>, sizes: &[ImageSize]) -> String {
    sizes
        .iter()
        .filter_map(|s| s.width().map(|w| format!("{} {}w", image_url(path, *s), w)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_cdn_url_with_default_size() {
        assert_eq!(
            image_url(Some("/example.jpg"), ImageSize::default()),
            "https://image.tmdb.org/t/p/w500/example.jpg"
        );
    }

    #[test]
    fn builds_cdn_url_with_custom_size() {
        assert_eq!(
            image_url(Some("/example.jpg"), ImageSize::Original),
            "https://image.tmdb.org/t/p/original/example.jpg"
        );
    }

    #[test]
    fn missing_path_falls_back_to_placeholder() {
        assert_eq!(image_url(None, ImageSize::W342), PLACEHOLDER_IMAGE);
        assert_eq!(image_url(Some(""), ImageSize::H632), PLACEHOLDER_IMAGE);
    }

    #[test]
    fn srcset_lists_each_width() {
        let set = srcset(
            Some("/p.jpg"),
            &[ImageSize::W342, ImageSize::W500, ImageSize::Original],
        );
        assert_eq!(
            set,
            "https://image.tmdb.org/t/p/w342/p.jpg 342w, https://image.tmdb.org/t/p/w500/p.jpg 500w"
        );
    }
}
