#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use proptest::prelude::*;

    use crate::config::CoachConfig;
    use crate::setup_assistant::limits::is_multiple_of;
    use crate::setup_assistant::*;
    use crate::track_metadata::{CornerDirection, TrackCorner, TrackGeometry};

    const LOOSE_ENTRY_RULES: &str = r#"{
        "feel_key_map": {
            "No issue / skip": "no_issue",
            "Loose on entry": "loose_entry"
        },
        "symptoms": {
            "loose_entry": {
                "tires": {
                    "LF_pressure": {"units": " psi", "delta": {"slight": -0.5, "moderate": -1.0, "severe": -1.5}}
                },
                "chassis": {
                    "LF_caster_deg": {"units": " deg", "delta": {"slight": 0.5, "moderate": 1.0, "severe": 1.5}}
                }
            }
        },
        "temp_comp": {"deadband_f": 5}
    }"#;

    const PRESSURE_LIMITS: &str = r#"{
        "allowed_parameters": {"tires": ["LF_pressure", "RF_pressure", "LR_pressure", "RR_pressure"]},
        "limits": {"pressure": {"min": 10, "max": 60, "increment": 0.5}}
    }"#;

    fn corner(name: &str, direction: CornerDirection, bank_deg: f64, angle_deg: f64) -> TrackCorner {
        TrackCorner::new(name.to_string(), direction, bank_deg, angle_deg).unwrap()
    }

    fn single_corner_track(direction: CornerDirection, bank_deg: f64, angle_deg: f64) -> TrackGeometry {
        let mut geometry = TrackGeometry::new("Test Road Course".to_string()).with_baseline_temp(85.0);
        geometry.add_corner(corner("T1", direction, bank_deg, angle_deg));
        geometry
    }

    fn road_course() -> TrackGeometry {
        let mut geometry = TrackGeometry::new("Test Road Course".to_string()).with_baseline_temp(85.0);
        geometry.add_corner(corner("T1", CornerDirection::Right, 2.0, 150.0));
        geometry.add_corner(corner("Esses", CornerDirection::Mixed, 3.0, 70.0));
        geometry.add_corner(corner("T5", CornerDirection::Left, 20.0, 30.0));
        geometry
    }

    fn feedback(entries: &[(&str, &str, i32)]) -> FeedbackSet {
        entries
            .iter()
            .map(|(corner, symptom, severity)| {
                (corner.to_string(), CornerFeedback::new(symptom, *severity))
            })
            .collect()
    }

    fn minimal_assistant() -> SetupAssistant {
        SetupAssistant::new(CoachConfig::from_json_strs(LOOSE_ENTRY_RULES, PRESSURE_LIMITS).unwrap())
    }

    fn default_assistant() -> SetupAssistant {
        SetupAssistant::with_defaults().unwrap()
    }

    fn lines(plan: &Plan, category: SetupCategory) -> Vec<String> {
        plan.display_lines(category)
    }

    #[test]
    fn test_severe_loose_entry_on_flat_right_hander() {
        let assistant = minimal_assistant();
        let track = single_corner_track(CornerDirection::Right, 2.0, 150.0);
        let feedback = feedback(&[("T1", "Loose on entry", 8)]);

        let plan = assistant.compute(
            &PlanRequest::new("Test Road Course", Some(&track), &feedback).with_current_temp(85.0),
        );

        assert_eq!(lines(&plan, SetupCategory::Tires), vec!["RF_pressure: -2.5 psi"]);
        assert!(plan.recommendations.iter().all(|l| l.parameter_name != "LF_pressure"));
        assert_eq!(plan.recommendations.len(), 1);
        assert_eq!(plan.temp_tier, 0);
        assert_eq!(plan.findings.len(), 1);
        assert!(plan.findings[0].starts_with("T1 (Right; bank 2°, angle 150°; scale x1.56)"));
        assert!(plan.findings[0].ends_with("Loose on entry (severe)"));

        let used = &plan.corners_used[0];
        assert_eq!(used.factor, 1.5625);
        assert_eq!(used.tier, SeverityTier::Severe);
        assert_eq!(used.symptom_key, "loose_entry");
    }

    #[test]
    fn test_left_and_mixed_corners_do_not_mirror() {
        let assistant = minimal_assistant();
        for direction in [CornerDirection::Left, CornerDirection::Mixed] {
            let track = single_corner_track(direction, 8.0, 90.0);
            let feedback = feedback(&[("T1", "Loose on entry", 5)]);
            let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &feedback));
            assert_eq!(lines(&plan, SetupCategory::Tires), vec!["LF_pressure: -1 psi"]);
        }
    }

    #[test]
    fn test_unlisted_parameters_are_filtered() {
        let assistant = minimal_assistant();
        let track = single_corner_track(CornerDirection::Left, 8.0, 90.0);
        let feedback = feedback(&[("T1", "Loose on entry", 9)]);
        let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &feedback));

        assert!(plan.recommendations.chassis.is_empty());
        assert!(plan.recommendations.iter().all(|l| l.parameter_name != "LF_caster_deg"));
        assert_eq!(plan.recommendations.len(), 1);
    }

    #[test]
    fn test_full_rule_block_on_right_hander() {
        let assistant = default_assistant();
        let track = single_corner_track(CornerDirection::Right, 2.0, 150.0);
        let feedback = feedback(&[("T1", "Loose on entry", 10)]);
        let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &feedback));

        assert_eq!(
            lines(&plan, SetupCategory::Tires),
            vec!["RF_pressure: -2.5 psi", "LR_pressure: -2.5 psi"]
        );
        assert_eq!(
            lines(&plan, SetupCategory::Chassis),
            vec!["rear_trackbar_in: -1.25 in", "crossweight_percent: +0.5 %"]
        );
        assert_eq!(
            lines(&plan, SetupCategory::Suspension),
            vec!["RF_shock_rebound_clicks: +5 clicks"]
        );
        assert!(plan.recommendations.rear_end.is_empty());
    }

    #[test]
    fn test_temperature_lines_come_first() {
        let assistant = default_assistant();
        let track = single_corner_track(CornerDirection::Left, 8.0, 90.0);
        let feedback = feedback(&[("T1", "Loose on exit", 2)]);
        let plan = assistant.compute(
            &PlanRequest::new("Test Road Course", Some(&track), &feedback).with_current_temp(96.0),
        );

        assert_eq!(plan.temp_tier, 2);
        assert_eq!(plan.temp_diff_f, 11.0);
        assert_eq!(plan.findings.len(), 2);
        assert_eq!(plan.findings[0], "Temperature: 11°F hotter than baseline (tier 2)");

        // hotter block first, then the corner's RR pressure
        assert_eq!(
            lines(&plan, SetupCategory::Tires),
            vec![
                "LF_pressure: -1 psi",
                "RF_pressure: -1 psi",
                "LR_pressure: -1 psi",
                "RR_pressure: -1 psi",
                "RR_pressure: -0.5 psi",
            ]
        );
        assert_eq!(
            lines(&plan, SetupCategory::RearEnd),
            vec!["diff_preload_ftlbs: +10 ft-lbs", "diff_preload_ftlbs: +5 ft-lbs"]
        );
    }

    #[test]
    fn test_temperature_is_not_scaled_or_mirrored() {
        let assistant = default_assistant();
        let track = single_corner_track(CornerDirection::Right, 2.0, 150.0);
        let plan = assistant.compute(
            &PlanRequest::new("Test Road Course", Some(&track), &FeedbackSet::new())
                .with_current_temp(60.0),
        );

        assert_eq!(plan.temp_tier, 3);
        assert_eq!(plan.findings, vec!["Temperature: 25°F cooler than baseline (tier 3)"]);
        assert_eq!(
            lines(&plan, SetupCategory::Chassis),
            vec!["rear_ride_height_in: +0.15 in"]
        );
        assert_eq!(lines(&plan, SetupCategory::Tires)[0], "LF_pressure: +1.5 psi");
        assert!(plan.corners_used.is_empty());
    }

    #[test]
    fn test_deadband_produces_nothing() {
        let assistant = default_assistant();
        let track = road_course();
        let plan = assistant.compute(
            &PlanRequest::new("Test Road Course", Some(&track), &FeedbackSet::new())
                .with_current_temp(89.0),
        );
        assert!(!plan.has_changes());
        assert_eq!(plan.temp_tier, 0);
        assert!(plan.render_text().contains("Nothing to change"));
    }

    #[test]
    fn test_no_issue_and_zero_severity_are_skipped() {
        let assistant = default_assistant();
        let track = road_course();
        let feedback = feedback(&[
            ("T1", "No issue / skip", 9),
            ("Esses", "Tight mid-corner", 0),
            ("T5", "", 6),
        ]);
        let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &feedback));

        assert!(plan.findings.is_empty());
        assert!(plan.recommendations.is_empty());
        assert!(plan.corners_used.is_empty());
        assert!(plan.input_warnings.is_empty());
    }

    #[test]
    fn test_zero_deltas_are_dropped() {
        let rules = r#"{
            "feel_key_map": {"Loose on entry": "loose_entry"},
            "symptoms": {
                "loose_entry": {
                    "tires": {"LF_pressure": {"units": "psi", "delta": {"slight": -0.5, "severe": -1.5}}}
                }
            },
            "temp_comp": {},
            "scaling": {"bank_high_mult": 0.3}
        }"#;
        let assistant = SetupAssistant::new(CoachConfig::from_json_strs(rules, PRESSURE_LIMITS).unwrap());
        let track = single_corner_track(CornerDirection::Left, 20.0, 30.0);

        // -0.5 x 0.255 snaps to zero and is not shown
        let slight = feedback(&[("T1", "Loose on entry", 2)]);
        let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &slight));
        assert!(plan.recommendations.is_empty());
        assert_eq!(plan.findings.len(), 1);
        assert!(!plan.render_text().contains("+0"));

        let severe = feedback(&[("T1", "Loose on entry", 9)]);
        let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &severe));
        assert_eq!(lines(&plan, SetupCategory::Tires), vec!["LF_pressure: -0.5 psi"]);

        // moderate tier missing from the rule, finding only
        let moderate = feedback(&[("T1", "Loose on entry", 5)]);
        let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &moderate));
        assert!(plan.recommendations.is_empty());
    }

    #[test]
    fn test_unknown_inputs_degrade_gracefully() {
        let assistant = default_assistant();
        let track = road_course();
        let feedback = feedback(&[
            ("T1", "Snap oversteer", 8),
            ("Esses", "Other", 5),
            ("T99", "Loose on entry", 8),
        ]);
        let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &feedback));

        // "Other" is a known key with no rules: a finding but no changes
        assert_eq!(plan.findings.len(), 1);
        assert!(plan.findings[0].starts_with("Esses (Mixed"));
        assert!(plan.recommendations.is_empty());
        assert_eq!(plan.corners_used[0].symptom_key, "other");
    }

    #[test]
    fn test_unknown_track_only_gets_temperature() {
        let assistant = default_assistant();
        let feedback = feedback(&[("T1", "Loose on entry", 8)]);
        let request = PlanRequest::new("Nowhere Speedway", None, &feedback)
            .with_temperature(TemperatureContext::new(85.0, 92.0));
        let plan = assistant.compute(&request);

        assert_eq!(plan.track, "Nowhere Speedway");
        assert_eq!(plan.baseline_temp_f, DEFAULT_BASELINE_TEMP_F);
        assert_eq!(plan.temp_tier, 1);
        assert_eq!(plan.findings.len(), 1);
        assert!(plan.corners_used.is_empty());
        assert_eq!(plan.recommendations.tires.len(), 4);
    }

    #[test]
    fn test_invalid_baseline_names_the_field() {
        let assistant = default_assistant();
        let empty = FeedbackSet::new();
        let request = PlanRequest::new("Test Road Course", None, &empty)
            .with_temperature(TemperatureContext::new(f64::NAN, 90.0));
        let plan = assistant.compute(&request);

        assert_eq!(plan.input_warnings.len(), 1);
        assert!(
            plan.input_warnings[0]
                .starts_with("Temperature compensation skipped: baseline_temp_f")
        );
        assert!(!plan.input_warnings[0].contains("current_temp_f"));
        assert!(plan.findings.is_empty());
    }

    #[test]
    fn test_invalid_inputs_are_rejected_individually() {
        let assistant = default_assistant();
        let track = road_course();
        let feedback = feedback(&[("T1", "Loose on entry", 11), ("T5", "Tight on entry", 4)]);
        let request = PlanRequest::new("Test Road Course", Some(&track), &feedback)
            .with_temperature(TemperatureContext::new(85.0, 200.0));
        let plan = assistant.compute(&request);

        assert_eq!(plan.input_warnings.len(), 2);
        assert_eq!(
            plan.input_warnings[0],
            "Temperature compensation skipped: current_temp_f 200 is outside 40..150 °F"
        );
        assert!(plan.input_warnings[1].contains("T1.severity"));
        assert_eq!(plan.temp_tier, 0);

        // the valid corner still contributes
        assert_eq!(plan.corners_used.len(), 1);
        assert_eq!(plan.corners_used[0].corner, "T5");
        assert!(plan.render_text().contains("Warning: Invalid user input"));
    }

    #[test]
    fn test_findings_follow_corner_order() {
        let assistant = default_assistant();
        let track = road_course();
        let feedback = feedback(&[
            ("T5", "Traction wheelspin", 4),
            ("T1", "Brakes locking", 3),
            ("Esses", "tight_mid", 6),
        ]);
        let plan = assistant.compute(
            &PlanRequest::new("Test Road Course", Some(&track), &feedback)
                .with_run_type(RunType::Qualifying),
        );

        let corners: Vec<&str> = plan.corners_used.iter().map(|c| c.corner.as_str()).collect();
        assert_eq!(corners, vec!["T1", "Esses", "T5"]);
        assert_eq!(plan.run_type, RunType::Qualifying);
        assert_eq!(plan.corners_used[0].tier, SeverityTier::Slight);
        assert_eq!(plan.corners_used[1].symptom_key, "tight_mid");
    }

    #[test]
    fn test_note_is_passed_through() {
        let assistant = default_assistant();
        let track = road_course();
        let mut feedback = FeedbackSet::new();
        feedback.insert(
            "T5".to_string(),
            CornerFeedback::new("Tight on exit", 5).with_note("pushes up the track"),
        );
        let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &feedback));
        assert!(plan.findings[0].ends_with("(moderate) - pushes up the track"));
        assert_eq!(plan.corners_used[0].note, "pushes up the track");
    }

    #[test]
    fn test_compute_is_deterministic() {
        let assistant = default_assistant();
        let track = road_course();
        let feedback = feedback(&[
            ("T1", "Loose on entry", 8),
            ("Esses", "Porpoising / Bottoming", 5),
            ("T5", "Loose mid-corner", 2),
        ]);
        let request = PlanRequest::new("Test Road Course", Some(&track), &feedback).with_current_temp(71.0);

        let first = assistant.compute(&request).to_json().unwrap();
        let second = assistant.compute(&request).to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_shared_engine_across_threads() {
        let assistant = Arc::new(default_assistant());
        let track = Arc::new(road_course());
        let feedback = Arc::new(feedback(&[("T1", "Loose on exit", 7), ("T5", "Tight mid-corner", 9)]));

        let expected = assistant
            .compute(&PlanRequest::new("Test Road Course", Some(&*track), &*feedback))
            .to_json()
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let assistant = Arc::clone(&assistant);
                let track = Arc::clone(&track);
                let feedback = Arc::clone(&feedback);
                thread::spawn(move || {
                    assistant
                        .compute(&PlanRequest::new("Test Road Course", Some(&*track), &*feedback))
                        .to_json()
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    fn symptom_label() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("No issue / skip"),
            Just("Loose on entry"),
            Just("Loose mid-corner"),
            Just("Loose on exit"),
            Just("Tight on entry"),
            Just("Tight mid-corner"),
            Just("Tight on exit"),
            Just("Brakes locking"),
            Just("Traction wheelspin"),
            Just("Porpoising / Bottoming"),
            Just("Other"),
        ]
    }

    fn corner_direction() -> impl Strategy<Value = CornerDirection> {
        prop_oneof![
            Just(CornerDirection::Left),
            Just(CornerDirection::Right),
            Just(CornerDirection::Mixed),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_every_line_is_allowed_snapped_and_non_zero(
            symptom in symptom_label(),
            severity in 0i32..=10,
            direction in corner_direction(),
            bank_deg in 0.0f64..35.0,
            angle_deg in 1.0f64..360.0,
            current_f in 40.0f64..150.0,
        ) {
            let assistant = default_assistant();
            let track = single_corner_track(direction, bank_deg, angle_deg);
            let feedback = feedback(&[("T1", symptom, severity)]);
            let plan = assistant.compute(
                &PlanRequest::new("Test Road Course", Some(&track), &feedback).with_current_temp(current_f),
            );

            let config = assistant.config();
            for line in plan.recommendations.iter() {
                prop_assert!(config.registry().is_allowed(&line.parameter_name));
                prop_assert_eq!(config.registry().category_of(&line.parameter_name), Some(line.category));
                prop_assert!(line.delta != 0.0);
                let increment = config.limits().increment_for(&line.parameter_name);
                prop_assert!(is_multiple_of(line.delta, increment), "{} not on {} grid", line.delta, increment);
            }
            prop_assert!(plan.input_warnings.is_empty());
        }

        #[test]
        fn prop_right_handers_never_touch_the_unloaded_front_pressure(
            severity in 1i32..=10,
            bank_deg in 0.0f64..35.0,
            angle_deg in 1.0f64..360.0,
        ) {
            let assistant = minimal_assistant();
            let track = single_corner_track(CornerDirection::Right, bank_deg, angle_deg);
            let feedback = feedback(&[("T1", "Loose on entry", severity)]);
            let plan = assistant.compute(&PlanRequest::new("Test Road Course", Some(&track), &feedback));

            prop_assert!(plan.recommendations.iter().all(|l| l.parameter_name == "RF_pressure"));
        }
    }
}
