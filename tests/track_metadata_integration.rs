// Integration test for track geometry loading

use garage_coach::{CoachError, CornerDirection, TrackCatalog};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_track_catalog_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tracks.json");
    fs::write(
        &path,
        r#"{
            "Silverstone GP": {
                "baseline_temp": 77,
                "corners": [
                    {"corner": "Copse", "direction": "Right", "bank_deg": 0, "angle_deg": 95},
                    {"name": "Maggotts", "dir": "L", "angle_deg": 40},
                    "Stowe"
                ]
            }
        }"#,
    )
    .unwrap();

    let catalog = TrackCatalog::from_file(&path).unwrap();
    assert_eq!(catalog.list_available_tracks(), vec!["Silverstone GP"]);

    let track = catalog.get("silverstone gp").unwrap();
    assert_eq!(track.baseline_temp_f, Some(77.0));
    assert_eq!(track.corners.len(), 3);
    assert_eq!(track.corners[0].name, "Copse");
    assert_eq!(track.corners[0].direction, CornerDirection::Right);
    assert_eq!(track.corners[1].direction, CornerDirection::Left);
    assert_eq!(track.corners[2].direction, CornerDirection::Mixed);
    assert!(track.validate_corners().is_ok());
}

#[test]
fn test_missing_track_file_is_an_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = TrackCatalog::from_file(&temp_dir.path().join("nope.json"));
    assert!(matches!(result, Err(CoachError::ConfigIOError { .. })));
}

#[test]
fn test_shipped_catalog() {
    let catalog = TrackCatalog::embedded().unwrap();

    let glen = catalog.get("Watkins Glen International (Cup)").unwrap();
    assert_eq!(glen.baseline_temp_f, Some(85.0));
    let carousel = glen.get_corner("T5 Carousel").unwrap();
    assert_eq!(carousel.direction, CornerDirection::Right);
    assert_eq!(carousel.angle_deg, 150.0);

    // bare corner names fall back to unknown geometry
    let sonoma = catalog.get("Sonoma Raceway").unwrap();
    assert!(sonoma.corners.iter().all(|c| c.direction == CornerDirection::Mixed));
    assert_eq!(sonoma.baseline_temp_f, None);
}
