use std::sync::LazyLock;

use crate::request::{GenerationRequest, Quality};
use crate::styles::StyleCatalog;

pub const HIGH_QUALITY_MODIFIER: &str = "high quality, detailed, professional";
pub const ULTRA_QUALITY_MODIFIER: &str = "ultra high definition, masterpiece, award winning";

static DEFAULT_CATALOG: LazyLock<StyleCatalog> = LazyLock::new(StyleCatalog::default);

/// Builds the text sent to the generation service using the built-in styles.
pub fn compose(request: &GenerationRequest) -> String {
    compose_with(&DEFAULT_CATALOG, request)
}

/// Appends, in order: style modifier, high-quality phrase, ultra phrase, layout hint.
pub fn compose_with(catalog: &StyleCatalog, request: &GenerationRequest) -> String {
    let mut parts: Vec<&str> = vec![request.prompt.as_str()];

    if let Some(modifier) = request
        .style
        .as_deref()
        .and_then(|style| catalog.modifier_for(style))
    {
        parts.push(modifier);
    }

    if matches!(request.quality, Quality::High | Quality::Ultra) {
        parts.push(HIGH_QUALITY_MODIFIER);
    }
    if request.quality == Quality::Ultra {
        parts.push(ULTRA_QUALITY_MODIFIER);
    }

    if let Some(hint) = request.aspect_ratio.layout_hint() {
        parts.push(hint);
    }

    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use crate::request::{AspectRatio, GenerationRequest, Quality};

    use super::compose;

    #[test]
    fn full_modifier_chain_is_ordered() {
        let request = GenerationRequest::new("cat")
            .with_style("cinematic")
            .with_quality(Quality::Ultra)
            .with_aspect_ratio(AspectRatio::Widescreen);
        assert_eq!(
            compose(&request),
            "cat, cinematic lighting, dramatic, movie-like composition, high quality, detailed, professional, ultra high definition, masterpiece, award winning, wide landscape format"
        );
    }

    #[test]
    fn defaults_leave_prompt_untouched() {
        let request = GenerationRequest::new("cat")
            .with_style("none")
            .with_quality(Quality::Standard)
            .with_aspect_ratio(AspectRatio::Square);
        assert_eq!(compose(&request), "cat");
        assert_eq!(compose(&GenerationRequest::new("cat")), "cat");
    }

    #[test]
    fn high_quality_adds_single_phrase() {
        let request = GenerationRequest::new("harbor at dawn").with_quality(Quality::High);
        assert_eq!(
            compose(&request),
            "harbor at dawn, high quality, detailed, professional"
        );
    }

    #[test]
    fn unknown_style_is_ignored() {
        let request = GenerationRequest::new("owl")
            .with_style("watercolor")
            .with_aspect_ratio(AspectRatio::Vertical);
        assert_eq!(compose(&request), "owl, vertical format");
    }

    #[test]
    fn prompt_is_kept_verbatim() {
        let request = GenerationRequest::new("  spaced  prompt ").with_style("vintage");
        assert_eq!(
            compose(&request),
            "  spaced  prompt , vintage style, retro aesthetic, nostalgic atmosphere"
        );
    }
}
