use das_config::Config;

fn parse(text: &str) -> Config {
    toml::from_str(text).unwrap()
}

#[test]
fn default_sections_survive_partial_files() {
    let cfg = parse(
        r#"
[amplifier]
seed_launch_ma = 150

[diagnostics]
test_duration_s = 5
"#,
    );
    cfg.validate().unwrap();
    assert_eq!(cfg.amplifier.seed_launch_ma, 150);
    assert_eq!(cfg.amplifier.current_step_ma, 10);
    assert_eq!(cfg.diagnostics.test_duration_s, 5);
    assert_eq!(cfg.fiber.region_gap, 200);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = toml::from_str::<Config>("[amplifier]\nlaunch_mah = 100\n");
    assert!(err.is_err());
}

#[test]
fn seed_above_ceiling_is_rejected() {
    let cfg = parse("[amplifier]\nseed_launch_ma = 2000\n");
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("launch ceiling"));
}

#[test]
fn zero_step_is_rejected() {
    let cfg = parse("[amplifier]\ncurrent_step_ma = 0\n");
    assert!(cfg.validate().is_err());
}

#[test]
fn saturation_threshold_must_be_normalized() {
    let cfg = parse("[amplifier]\nsaturation_threshold = 1.2\n");
    assert!(cfg.validate().is_err());
}

#[test]
fn dither_fraction_must_be_a_fraction() {
    let cfg = parse("[dither]\nend_threshold_fraction = 1.5\n");
    assert!(cfg.validate().is_err());
}

#[test]
fn malformed_channel_range_passes_validation() {
    // recovered by substitution at use, not rejected here
    let cfg = parse("[diagnostics]\nchannel_range = \"banana\"\n");
    cfg.validate().unwrap();
}
