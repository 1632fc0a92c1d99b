use indexmap::IndexMap;

/// Style id that never contributes a modifier.
pub const NO_STYLE: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSpec {
    pub id: String,
    pub name: String,
    pub description: String,
    pub modifier: String,
}

impl StyleSpec {
    pub fn is_noop(&self) -> bool {
        self.id == NO_STYLE || self.modifier.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: IndexMap<String, StyleSpec>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StyleCatalog {
    pub fn new(styles: Option<IndexMap<String, StyleSpec>>) -> Self {
        Self {
            styles: styles.unwrap_or_else(default_styles),
        }
    }

    pub fn get(&self, id: &str) -> Option<&StyleSpec> {
        self.styles.get(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &StyleSpec> {
        self.styles.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }

    /// Modifier phrase for `id`, or `None` for the no-op style and unknown ids.
    pub fn modifier_for(&self, id: &str) -> Option<&str> {
        let style = self.get(id)?;
        if style.is_noop() {
            return None;
        }
        Some(style.modifier.as_str())
    }
}

fn default_styles() -> IndexMap<String, StyleSpec> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str, name: &str, description: &str, modifier: &str| {
        map.insert(
            id.to_string(),
            StyleSpec {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                modifier: modifier.to_string(),
            },
        );
    };

    insert(NO_STYLE, "Default", "No specific style applied", "");
    insert(
        "photorealistic",
        "Photorealistic",
        "Realistic, detailed photography style",
        "photorealistic, highly detailed, professional photography",
    );
    insert(
        "artistic",
        "Artistic",
        "Creative and expressive artistic style",
        "artistic, creative, expressive, unique style",
    );
    insert(
        "cinematic",
        "Cinematic",
        "Movie-like dramatic lighting and composition",
        "cinematic lighting, dramatic, movie-like composition",
    );
    insert(
        "fantasy",
        "Fantasy",
        "Magical and mystical atmosphere",
        "fantasy art, magical, ethereal, mystical atmosphere",
    );
    insert(
        "abstract",
        "Abstract",
        "Geometric shapes and creative interpretation",
        "abstract art, geometric shapes, creative interpretation",
    );
    insert(
        "vintage",
        "Vintage",
        "Retro aesthetic with nostalgic atmosphere",
        "vintage style, retro aesthetic, nostalgic atmosphere",
    );

    map
}
