use serde::{Deserialize, Serialize};

/// Descriptive metadata attached to a [`Composition`](crate::model::Composition).
///
/// The three sub-groups (IPTC, EXIF, schema.org) carry overlapping fields and
/// must stay mutually consistent; [`Metadata::autofill`] is the one routine
/// that writes all of them from shared context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub alt_text: String,
    pub file_name: String,
    pub iptc: IptcFields,
    pub exif: ExifFields,
    pub schema_org: SchemaOrgFields,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IptcFields {
    pub creator: String,
    pub copyright: String,
    pub caption: String,
    pub headline: String,
    pub keywords: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifFields {
    pub artist: String,
    pub copyright: String,
    pub image_description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaOrgFields {
    pub name: String,
    pub description: String,
    pub author: String,
    pub copyright_holder: String,
    pub license: String,
}

/// Upstream business context used to seed metadata, typically a brand
/// profile extracted from the user's site.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub name: String,
    pub website: String,
    pub logo_url: String,
    pub brand_colors: Vec<crate::color::Color>,
}

/// Words dropped when deriving a semantic file name. Includes common filler
/// words and SEO superlatives; "Best Coffee Makers 2024" must reduce to
/// `coffee-makers-2024`.
pub const FILE_NAME_STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "for", "nor", "so", "yet", "of", "to", "in", "on", "at",
    "by", "as", "is", "are", "was", "were", "be", "been", "it", "its", "this", "that", "these",
    "those", "your", "our", "my", "with", "from", "into", "how", "what", "why", "when", "where",
    "which", "who", "best", "top", "guide", "ultimate",
];

/// Extensions recognized (and stripped) when swapping a file name's extension
/// at export time.
pub const KNOWN_IMAGE_EXTENSIONS: &[&str] = &["avif", "webp", "jpeg", "jpg", "png", "gif"];

/// Derive a search-friendly file name stem from a title.
///
/// Lowercases, strips non-alphanumerics, drops stop words, and joins the
/// first four remaining words with hyphens. Falls back to `hero-image` when
/// nothing significant remains. The returned stem carries no extension; the
/// export pipeline appends one for the chosen format.
pub fn semantic_file_name(title: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for raw in title.split_whitespace() {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if cleaned.is_empty() {
            continue;
        }
        if FILE_NAME_STOP_WORDS.contains(&cleaned.as_str()) {
            continue;
        }
        words.push(cleaned);
        if words.len() == 4 {
            break;
        }
    }

    if words.is_empty() {
        "hero-image".to_string()
    } else {
        words.join("-")
    }
}

/// Strip one trailing recognized image extension, if present.
pub fn strip_image_extension(file_name: &str) -> &str {
    if let Some((stem, ext)) = file_name.rsplit_once('.')
        && KNOWN_IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    {
        return stem;
    }
    file_name
}

impl Metadata {
    /// Fill every metadata group from shared context, keeping them aligned.
    ///
    /// `headline` feeds names/captions, `entity` enriches the description,
    /// and the business profile supplies creator/copyright fields. Existing
    /// non-empty values are preserved; autofill only fills gaps, which keeps
    /// it idempotent.
    pub fn autofill(&mut self, headline: &str, entity: &str, profile: &BusinessProfile, year: i32) {
        let copyright = format!("Copyright {year} {}", profile.name);
        let description = describe(headline, entity);

        fill(&mut self.alt_text, &description);
        fill(&mut self.file_name, &semantic_file_name(headline));

        fill(&mut self.iptc.creator, &profile.name);
        fill(&mut self.iptc.copyright, &copyright);
        fill(&mut self.iptc.caption, &description);
        fill(&mut self.iptc.headline, headline);
        if self.iptc.keywords.is_empty() {
            self.iptc.keywords = derive_keywords(headline, entity);
        }

        fill(&mut self.exif.artist, &profile.name);
        fill(&mut self.exif.copyright, &copyright);
        fill(&mut self.exif.image_description, &description);

        fill(&mut self.schema_org.name, headline);
        fill(&mut self.schema_org.description, &description);
        fill(&mut self.schema_org.author, &profile.name);
        fill(&mut self.schema_org.copyright_holder, &profile.name);
    }

    /// schema.org `ImageObject` record for the caller to place in page markup.
    /// Never embedded in the encoded binary.
    pub fn schema_org_json(&self) -> serde_json::Value {
        serde_json::json!({
            "@context": "https://schema.org",
            "@type": "ImageObject",
            "name": self.schema_org.name,
            "description": self.schema_org.description,
            "author": { "@type": "Organization", "name": self.schema_org.author },
            "copyrightHolder": { "@type": "Organization", "name": self.schema_org.copyright_holder },
            "license": self.schema_org.license,
        })
    }
}

/// Keyword candidates: significant headline words plus the entity name.
pub fn derive_keywords(headline: &str, entity: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    if !entity.trim().is_empty() {
        keywords.push(entity.trim().to_lowercase());
    }
    for raw in headline.split_whitespace() {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if cleaned.len() < 3 || FILE_NAME_STOP_WORDS.contains(&cleaned.as_str()) {
            continue;
        }
        if !keywords.contains(&cleaned) {
            keywords.push(cleaned);
        }
    }
    keywords.truncate(8);
    keywords
}

fn describe(headline: &str, entity: &str) -> String {
    let headline = headline.trim();
    let entity = entity.trim();
    match (headline.is_empty(), entity.is_empty()) {
        (false, false) => format!("Hero image for \"{headline}\" featuring {entity}"),
        (false, true) => format!("Hero image for \"{headline}\""),
        (true, false) => format!("Hero image featuring {entity}"),
        (true, true) => String::new(),
    }
}

fn fill(slot: &mut String, value: &str) {
    if slot.trim().is_empty() && !value.is_empty() {
        *slot = value.to_string();
    }
}
