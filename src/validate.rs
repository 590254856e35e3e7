use serde::{Deserialize, Serialize};

use chrono::Datelike as _;

use crate::{
    color::{Color, contrast_ratio},
    error::{HeroshotError, HeroshotResult},
    metadata::{derive_keywords, semantic_file_name},
    model::{BackgroundSource, Composition, LayerKind, LayerRect, TextOverlayLayer},
};

pub const MIN_ALT_TEXT_LEN: usize = 30;
pub const MIN_KEYWORDS: usize = 3;
pub const MIN_TEXT_CONTRAST: f64 = 4.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Accessibility,
    Seo,
    Content,
    Layout,
}

/// Outcome of one rule against one composition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    pub category: RuleCategory,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    pub auto_fix_available: bool,
}

/// Derived, never persisted: re-computed from the composition on every
/// mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rule_results: Vec<RuleResult>,
    /// round(passed / total × 100)
    pub score: u8,
}

impl ValidationReport {
    pub fn errors(&self) -> Vec<&RuleResult> {
        self.rule_results
            .iter()
            .filter(|r| !r.passed && r.severity == Severity::Error)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&RuleResult> {
        self.rule_results
            .iter()
            .filter(|r| !r.passed && r.severity == Severity::Warning)
            .collect()
    }

    /// Export is gated on zero errors; warnings never block.
    pub fn can_export(&self) -> bool {
        self.errors().is_empty()
    }

    pub fn result(&self, rule_id: &str) -> Option<&RuleResult> {
        self.rule_results.iter().find(|r| r.rule_id == rule_id)
    }
}

type CheckFn = fn(&Composition) -> (bool, String);
type FixFn = fn(&Composition, &FixContext) -> Composition;
type FixAvailableFn = fn(&Composition) -> bool;

struct Rule {
    id: &'static str,
    name: &'static str,
    category: RuleCategory,
    severity: Severity,
    check: CheckFn,
    fix: Option<FixFn>,
    /// Some fixes need context from elsewhere in the composition; when that
    /// context is absent the fix is not offered.
    fix_available: Option<FixAvailableFn>,
}

/// Context shared by auto-fixes that synthesize dated or derived values.
#[derive(Clone, Copy, Debug)]
pub struct FixContext {
    pub year: i32,
}

impl Default for FixContext {
    fn default() -> Self {
        Self {
            year: chrono::Utc::now().year(),
        }
    }
}

const RULES: &[Rule] = &[
    Rule {
        id: "alt-text-present",
        name: "Alt text is present",
        category: RuleCategory::Accessibility,
        severity: Severity::Error,
        check: check_alt_text_present,
        fix: Some(fix_alt_text),
        fix_available: None,
    },
    Rule {
        id: "alt-text-descriptive",
        name: "Alt text is descriptive",
        category: RuleCategory::Accessibility,
        severity: Severity::Warning,
        check: check_alt_text_descriptive,
        fix: Some(fix_alt_text),
        fix_available: None,
    },
    Rule {
        id: "file-name-descriptive",
        name: "File name is descriptive",
        category: RuleCategory::Seo,
        severity: Severity::Warning,
        check: check_file_name,
        fix: Some(fix_file_name),
        fix_available: None,
    },
    Rule {
        id: "iptc-creator-present",
        name: "IPTC creator is set",
        category: RuleCategory::Seo,
        severity: Severity::Warning,
        check: check_iptc_creator,
        fix: Some(fix_iptc_creator),
        fix_available: Some(has_creator_context),
    },
    Rule {
        id: "copyright-present",
        name: "Copyright notice is set",
        category: RuleCategory::Seo,
        severity: Severity::Warning,
        check: check_copyright,
        fix: Some(fix_copyright),
        fix_available: Some(has_creator_context),
    },
    Rule {
        id: "keywords-present",
        name: "Keywords are set",
        category: RuleCategory::Seo,
        severity: Severity::Warning,
        check: check_keywords,
        fix: Some(fix_keywords),
        fix_available: Some(has_keyword_context),
    },
    Rule {
        id: "caption-present",
        name: "Caption is set",
        category: RuleCategory::Seo,
        severity: Severity::Warning,
        check: check_caption,
        fix: Some(fix_caption),
        fix_available: Some(|comp| !comp.metadata.alt_text.trim().is_empty()),
    },
    Rule {
        id: "headline-text-present",
        name: "A visible headline overlay has text",
        category: RuleCategory::Content,
        severity: Severity::Warning,
        check: check_headline_text,
        fix: None,
        fix_available: None,
    },
    Rule {
        id: "background-present",
        name: "A background layer exists",
        category: RuleCategory::Content,
        severity: Severity::Warning,
        check: check_background_present,
        fix: None,
        fix_available: None,
    },
    Rule {
        id: "central-object-contained",
        name: "Central object is centered and in bounds",
        category: RuleCategory::Layout,
        severity: Severity::Error,
        check: check_central_object,
        fix: Some(fix_central_object),
        fix_available: None,
    },
    Rule {
        id: "text-contrast",
        name: "Headline contrast meets minimum",
        category: RuleCategory::Accessibility,
        severity: Severity::Warning,
        check: check_text_contrast,
        fix: Some(fix_text_contrast),
        fix_available: None,
    },
];

/// Evaluate every rule. Pure function of the composition.
pub fn evaluate(comp: &Composition) -> ValidationReport {
    let mut rule_results = Vec::with_capacity(RULES.len());
    for rule in RULES {
        let (passed, message) = (rule.check)(comp);
        let fixable = rule.fix.is_some()
            && rule.fix_available.map(|f| f(comp)).unwrap_or(true);
        rule_results.push(RuleResult {
            rule_id: rule.id.to_string(),
            rule_name: rule.name.to_string(),
            category: rule.category,
            passed,
            severity: rule.severity,
            message,
            auto_fix_available: !passed && fixable,
        });
    }

    let passed = rule_results.iter().filter(|r| r.passed).count();
    let score = ((passed as f64 / rule_results.len() as f64) * 100.0).round() as u8;
    ValidationReport {
        rule_results,
        score,
    }
}

/// Apply the fix for one failing rule, returning a new composition.
///
/// A rule that already passes is a no-op (the input is returned unchanged),
/// which makes fixes idempotent. A rule with no available fix is an error.
pub fn apply_fix(
    comp: &Composition,
    rule_id: &str,
    ctx: &FixContext,
) -> HeroshotResult<Composition> {
    let rule = RULES
        .iter()
        .find(|r| r.id == rule_id)
        .ok_or_else(|| HeroshotError::validation(format!("unknown rule '{rule_id}'")))?;

    let (passed, _) = (rule.check)(comp);
    if passed {
        return Ok(comp.clone());
    }

    let fix = rule
        .fix
        .ok_or_else(|| HeroshotError::validation(format!("rule '{rule_id}' has no auto-fix")))?;
    if let Some(available) = rule.fix_available
        && !available(comp)
    {
        return Err(HeroshotError::validation(format!(
            "auto-fix for '{rule_id}' needs context the composition does not have"
        )));
    }

    Ok(fix(comp, ctx))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedFix {
    pub rule_id: String,
    pub rule_name: String,
}

/// Report from [`apply_all_fixes`]: what changed, and what still fails after
/// one pass. Fixes are applied once each in rule order; no fixed point is
/// assumed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixReport {
    pub applied: Vec<AppliedFix>,
    pub report: ValidationReport,
}

pub fn apply_all_fixes(comp: &Composition, ctx: &FixContext) -> (Composition, FixReport) {
    let mut current = comp.clone();
    let mut applied = Vec::new();

    for rule in RULES {
        let (passed, _) = (rule.check)(&current);
        if passed {
            continue;
        }
        let Some(fix) = rule.fix else { continue };
        if let Some(available) = rule.fix_available
            && !available(&current)
        {
            continue;
        }
        current = fix(&current, ctx);
        applied.push(AppliedFix {
            rule_id: rule.id.to_string(),
            rule_name: rule.name.to_string(),
        });
    }

    let report = evaluate(&current);
    (current, FixReport { applied, report })
}

// --- checks ---

fn check_alt_text_present(comp: &Composition) -> (bool, String) {
    if comp.metadata.alt_text.trim().is_empty() {
        (false, "Image has no alt text".to_string())
    } else {
        (true, "Alt text is set".to_string())
    }
}

fn check_alt_text_descriptive(comp: &Composition) -> (bool, String) {
    let len = comp.metadata.alt_text.trim().chars().count();
    if len < MIN_ALT_TEXT_LEN {
        (
            false,
            format!("Alt text has {len} characters; at least {MIN_ALT_TEXT_LEN} recommended"),
        )
    } else {
        (true, "Alt text is descriptive".to_string())
    }
}

fn check_file_name(comp: &Composition) -> (bool, String) {
    let stem = crate::metadata::strip_image_extension(comp.metadata.file_name.trim());
    let generic = stem.is_empty()
        || matches!(stem, "image" | "untitled" | "download" | "export" | "img");
    if generic {
        (
            false,
            format!("File name \"{stem}\" is not descriptive"),
        )
    } else {
        (true, "File name is descriptive".to_string())
    }
}

fn check_iptc_creator(comp: &Composition) -> (bool, String) {
    if comp.metadata.iptc.creator.trim().is_empty() {
        (false, "IPTC creator is empty".to_string())
    } else {
        (true, "IPTC creator is set".to_string())
    }
}

fn check_copyright(comp: &Composition) -> (bool, String) {
    let iptc = comp.metadata.iptc.copyright.trim();
    let exif = comp.metadata.exif.copyright.trim();
    if iptc.is_empty() || exif.is_empty() {
        (false, "Copyright notice is missing".to_string())
    } else if iptc != exif {
        (false, "IPTC and EXIF copyright notices differ".to_string())
    } else {
        (true, "Copyright notice is set".to_string())
    }
}

fn check_keywords(comp: &Composition) -> (bool, String) {
    let n = comp
        .metadata
        .iptc
        .keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .count();
    if n < MIN_KEYWORDS {
        (
            false,
            format!("Only {n} keywords set; at least {MIN_KEYWORDS} recommended"),
        )
    } else {
        (true, "Keywords are set".to_string())
    }
}

fn check_caption(comp: &Composition) -> (bool, String) {
    if comp.metadata.iptc.caption.trim().is_empty() {
        (false, "IPTC caption is empty".to_string())
    } else {
        (true, "Caption is set".to_string())
    }
}

fn check_headline_text(comp: &Composition) -> (bool, String) {
    let has = comp.layers.iter().any(|l| {
        l.visible
            && matches!(&l.kind, LayerKind::TextOverlay(t) if !t.text.trim().is_empty())
    });
    if has {
        (true, "Headline overlay has text".to_string())
    } else {
        (false, "No visible text overlay with content".to_string())
    }
}

fn check_background_present(comp: &Composition) -> (bool, String) {
    if comp.background().is_some() {
        (true, "Background layer exists".to_string())
    } else {
        (false, "Composition has no background layer".to_string())
    }
}

fn check_central_object(comp: &Composition) -> (bool, String) {
    match comp.central_object() {
        None => (true, "No central object layer".to_string()),
        Some(layer) => {
            if layer.rect.is_within_canvas() && layer.rect.is_axis_centered() {
                (true, "Central object is centered and in bounds".to_string())
            } else {
                (
                    false,
                    "Central object is off-center or outside the canvas".to_string(),
                )
            }
        }
    }
}

fn check_text_contrast(comp: &Composition) -> (bool, String) {
    for layer in &comp.layers {
        let LayerKind::TextOverlay(text) = &layer.kind else {
            continue;
        };
        if !layer.visible || text.text.trim().is_empty() {
            continue;
        }
        let Some(backdrop) = effective_backdrop(comp, text) else {
            continue; // image backdrop: contrast not statically computable
        };
        let ratio = contrast_ratio(text.text_color, backdrop);
        if ratio < MIN_TEXT_CONTRAST {
            return (
                false,
                format!(
                    "Headline contrast {ratio:.1}:1 is below {MIN_TEXT_CONTRAST}:1 for layer '{}'",
                    layer.id
                ),
            );
        }
    }
    (true, "Text contrast meets minimum".to_string())
}

/// The color the headline visually sits on: its own pill fill when opaque
/// enough, otherwise a color background. `None` when the backdrop is an
/// image.
fn effective_backdrop(comp: &Composition, text: &TextOverlayLayer) -> Option<Color> {
    if let Some(bg) = text.background_color
        && bg.a >= 128
    {
        return Some(bg);
    }
    match comp.background().map(|l| &l.kind) {
        Some(LayerKind::Background(bg)) => match &bg.source {
            BackgroundSource::Color { color } => Some(*color),
            _ => None,
        },
        _ => None,
    }
}

// --- fixes (pure: composition in, new composition out) ---

fn synthesize_alt_text(comp: &Composition) -> String {
    let headline = comp.layers.iter().find_map(|l| match &l.kind {
        LayerKind::TextOverlay(t) if !t.text.trim().is_empty() => Some(t.text.trim()),
        _ => None,
    });
    let entity = comp.layers.iter().find_map(|l| match &l.kind {
        LayerKind::CentralObject(o) if !o.entity_name.trim().is_empty() => {
            Some(o.entity_name.trim())
        }
        _ => None,
    });

    let mut alt = match (headline, entity) {
        (Some(h), Some(e)) => format!("Hero image featuring {e} with the headline \"{h}\""),
        (Some(h), None) => format!("Hero image with the headline \"{h}\""),
        (None, Some(e)) => format!("Hero image featuring {e} on a styled background"),
        (None, None) => "Custom hero image with a styled background composition".to_string(),
    };
    if alt.chars().count() < MIN_ALT_TEXT_LEN {
        alt.push_str(" on a styled background");
    }
    alt
}

fn fix_alt_text(comp: &Composition, _ctx: &FixContext) -> Composition {
    let mut fixed = comp.clone();
    fixed.metadata.alt_text = synthesize_alt_text(comp);
    fixed
}

fn fix_file_name(comp: &Composition, _ctx: &FixContext) -> Composition {
    let mut fixed = comp.clone();
    let title = comp
        .layers
        .iter()
        .find_map(|l| match &l.kind {
            LayerKind::TextOverlay(t) if !t.text.trim().is_empty() => Some(t.text.clone()),
            _ => None,
        })
        .unwrap_or_else(|| comp.metadata.alt_text.clone());
    fixed.metadata.file_name = semantic_file_name(&title);
    fixed
}

fn creator_context(comp: &Composition) -> Option<String> {
    [
        &comp.metadata.schema_org.author,
        &comp.metadata.schema_org.copyright_holder,
        &comp.metadata.exif.artist,
        &comp.metadata.iptc.creator,
    ]
    .into_iter()
    .find(|s| !s.trim().is_empty())
    .map(|s| s.trim().to_string())
}

fn has_creator_context(comp: &Composition) -> bool {
    creator_context(comp).is_some()
}

fn keyword_context(comp: &Composition) -> (String, String) {
    let headline = comp
        .layers
        .iter()
        .find_map(|l| match &l.kind {
            LayerKind::TextOverlay(t) => Some(t.text.clone()),
            _ => None,
        })
        .unwrap_or_default();
    let entity = comp
        .layers
        .iter()
        .find_map(|l| match &l.kind {
            LayerKind::CentralObject(o) => Some(o.entity_name.clone()),
            _ => None,
        })
        .unwrap_or_default();
    (headline, entity)
}

// The fix is only offered when it can actually satisfy the rule; a headline
// of nothing but stop words cannot yield enough keywords.
fn has_keyword_context(comp: &Composition) -> bool {
    let (headline, entity) = keyword_context(comp);
    derive_keywords(&headline, &entity).len() >= MIN_KEYWORDS
}

fn fix_iptc_creator(comp: &Composition, _ctx: &FixContext) -> Composition {
    let mut fixed = comp.clone();
    if let Some(name) = creator_context(comp) {
        fixed.metadata.iptc.creator = name.clone();
        if fixed.metadata.exif.artist.trim().is_empty() {
            fixed.metadata.exif.artist = name;
        }
    }
    fixed
}

fn fix_copyright(comp: &Composition, ctx: &FixContext) -> Composition {
    let mut fixed = comp.clone();
    if let Some(name) = creator_context(comp) {
        let notice = format!("Copyright {} {name}", ctx.year);
        fixed.metadata.iptc.copyright = notice.clone();
        fixed.metadata.exif.copyright = notice;
    }
    fixed
}

fn fix_keywords(comp: &Composition, _ctx: &FixContext) -> Composition {
    let mut fixed = comp.clone();
    let (headline, entity) = keyword_context(comp);
    fixed.metadata.iptc.keywords = derive_keywords(&headline, &entity);
    fixed
}

fn fix_caption(comp: &Composition, _ctx: &FixContext) -> Composition {
    let mut fixed = comp.clone();
    fixed.metadata.iptc.caption = comp.metadata.alt_text.clone();
    if fixed.metadata.exif.image_description.trim().is_empty() {
        fixed.metadata.exif.image_description = comp.metadata.alt_text.clone();
    }
    fixed
}

fn fix_central_object(comp: &Composition, _ctx: &FixContext) -> Composition {
    let mut fixed = comp.clone();
    if let Some(layer) = fixed
        .layers
        .iter_mut()
        .find(|l| matches!(l.kind, LayerKind::CentralObject(_)))
    {
        layer.rect = LayerRect::centered(layer.rect.width, layer.rect.height);
    }
    fixed
}

fn fix_text_contrast(comp: &Composition, _ctx: &FixContext) -> Composition {
    let mut fixed = comp.clone();
    let backdrops: Vec<Option<Color>> = fixed
        .layers
        .iter()
        .map(|l| match &l.kind {
            LayerKind::TextOverlay(t) => effective_backdrop(comp, t),
            _ => None,
        })
        .collect();

    for (layer, backdrop) in fixed.layers.iter_mut().zip(backdrops) {
        let LayerKind::TextOverlay(text) = &mut layer.kind else {
            continue;
        };
        let Some(backdrop) = backdrop else { continue };
        if contrast_ratio(text.text_color, backdrop) >= MIN_TEXT_CONTRAST {
            continue;
        }
        // Flip to whichever of black/white clears the bar by the wider margin.
        text.text_color = if contrast_ratio(Color::WHITE, backdrop)
            >= contrast_ratio(Color::BLACK, backdrop)
        {
            Color::WHITE
        } else {
            Color::BLACK
        };
    }
    fixed
}
