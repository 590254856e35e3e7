use heroshot::{Color, Composition};
use heroshot::model::{BackgroundLayer, BackgroundSource, Layer, LayerKind, LayerRect};
use heroshot::validate::{self, FixContext, Severity};

fn color_bg_comp() -> Composition {
    let mut comp = Composition::blank(1200, 630);
    comp.add_layer(Layer {
        id: "bg".to_string(),
        name: "Background".to_string(),
        visible: true,
        locked: false,
        opacity: 100,
        rect: LayerRect::new(0.0, 0.0, 100.0, 100.0),
        kind: LayerKind::Background(BackgroundLayer {
            source: BackgroundSource::Color {
                color: Color::parse_hex("#1f2937").unwrap(),
            },
        }),
    })
    .unwrap();
    comp
}

#[test]
fn fresh_color_background_blocks_export_on_alt_text_only() {
    let comp = color_bg_comp();
    let report = validate::evaluate(&comp);

    assert!(!report.can_export());
    let errors = report.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].rule_id, "alt-text-present");
    assert_eq!(errors[0].severity, Severity::Error);
    assert!(errors[0].auto_fix_available);

    let fixed = validate::apply_fix(&comp, "alt-text-present", &FixContext { year: 2024 }).unwrap();
    let after = validate::evaluate(&fixed);
    assert_eq!(after.errors().len(), 0);
    assert!(after.can_export());
    assert!(after.score > report.score);
}

#[test]
fn evaluate_is_pure() {
    let comp = color_bg_comp();
    let before = comp.clone();
    let first = validate::evaluate(&comp);
    let second = validate::evaluate(&comp);
    assert_eq!(first, second);
    assert_eq!(comp, before);
}

#[test]
fn fix_all_then_fix_all_again_is_stable() {
    let ctx = FixContext { year: 2024 };
    let mut comp = color_bg_comp();
    comp.metadata.schema_org.author = "Acme Studio".to_string();

    let (fixed, report) = validate::apply_all_fixes(&comp, &ctx);
    assert!(!report.applied.is_empty());
    assert!(report.report.can_export());

    let (fixed_again, second) = validate::apply_all_fixes(&fixed, &ctx);
    assert_eq!(fixed_again, fixed);
    assert!(second.applied.is_empty());
}

#[test]
fn warnings_never_block_export() {
    let mut comp = color_bg_comp();
    comp.metadata.alt_text = "Dark blue-gray hero background for the product roundup".to_string();

    let report = validate::evaluate(&comp);
    assert!(!report.warnings().is_empty());
    assert!(report.can_export());
}

#[test]
fn unfixable_rules_report_no_auto_fix() {
    let comp = Composition::blank(800, 400);
    let report = validate::evaluate(&comp);

    let bg = report.result("background-present").unwrap();
    assert!(!bg.passed);
    assert!(!bg.auto_fix_available);

    // Creator fix needs a source value somewhere in the metadata.
    let creator = report.result("iptc-creator-present").unwrap();
    assert!(!creator.passed);
    assert!(!creator.auto_fix_available);
}

#[test]
fn central_object_rule_round_trips_through_fix() {
    use heroshot::model::CentralObjectLayer;

    let mut comp = color_bg_comp();
    comp.add_layer(Layer {
        id: "obj".to_string(),
        name: "Product".to_string(),
        visible: true,
        locked: false,
        opacity: 100,
        rect: LayerRect::centered(50.0, 60.0),
        kind: LayerKind::CentralObject(CentralObjectLayer {
            entity_name: "Coffee Maker".to_string(),
            image_url: "maker.png".to_string(),
        }),
    })
    .unwrap();
    comp.layer_mut("obj").unwrap().rect.x = 0.0;

    let report = validate::evaluate(&comp);
    assert!(!report.result("central-object-contained").unwrap().passed);
    assert!(!report.can_export());

    let fixed =
        validate::apply_fix(&comp, "central-object-contained", &FixContext { year: 2024 })
            .unwrap();
    assert!(validate::evaluate(&fixed).result("central-object-contained").unwrap().passed);
}
