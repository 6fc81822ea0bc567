//! Tests for the study-region filter.

use swath_common::bbox::{Edge, GeoBoundingBox, StudyRegion};

fn region() -> StudyRegion {
    // north, south, east, west
    StudyRegion::new(-4.5, -25.5, 15.5, -15.5).unwrap()
}

// ============================================================================
// Boxes entirely beyond one edge
// ============================================================================

#[test]
fn test_rejects_box_north_of_region() {
    let swath = GeoBoundingBox::new(5.0, -4.0, 10.0, 0.0);
    assert_eq!(region().rejection(&swath), Some(Edge::North));
    assert!(!region().accepts(&swath));
}

#[test]
fn test_rejects_box_south_of_region() {
    let swath = GeoBoundingBox::new(-28.0, -30.0, 10.0, 0.0);
    assert_eq!(region().rejection(&swath), Some(Edge::South));
    assert!(!region().accepts(&swath));
}

#[test]
fn test_rejects_box_east_of_region() {
    let swath = GeoBoundingBox::new(-10.0, -20.0, 30.0, 16.0);
    assert_eq!(region().rejection(&swath), Some(Edge::East));
    assert!(!region().accepts(&swath));
}

#[test]
fn test_rejects_box_west_of_region() {
    let swath = GeoBoundingBox::new(-10.0, -20.0, -16.0, -40.0);
    assert_eq!(region().rejection(&swath), Some(Edge::West));
    assert!(!region().accepts(&swath));
}

// ============================================================================
// Boxes straddling one edge
// ============================================================================

#[test]
fn test_accepts_box_straddling_north_edge() {
    let swath = GeoBoundingBox::new(5.0, -10.0, 10.0, 0.0);
    assert!(region().accepts(&swath));
}

#[test]
fn test_accepts_box_straddling_south_edge() {
    let swath = GeoBoundingBox::new(-20.0, -35.0, 10.0, 0.0);
    assert!(region().accepts(&swath));
}

#[test]
fn test_accepts_box_straddling_east_edge() {
    let swath = GeoBoundingBox::new(-10.0, -20.0, 25.0, 10.0);
    assert!(region().accepts(&swath));
}

#[test]
fn test_accepts_box_straddling_west_edge() {
    let swath = GeoBoundingBox::new(-10.0, -20.0, -10.0, -30.0);
    assert!(region().accepts(&swath));
}

// ============================================================================
// Touching and containment
// ============================================================================

#[test]
fn test_accepts_box_touching_each_edge() {
    let r = region();
    assert!(r.accepts(&GeoBoundingBox::new(0.0, -4.5, 10.0, 0.0)));
    assert!(r.accepts(&GeoBoundingBox::new(-25.5, -40.0, 10.0, 0.0)));
    assert!(r.accepts(&GeoBoundingBox::new(-10.0, -20.0, 30.0, 15.5)));
    assert!(r.accepts(&GeoBoundingBox::new(-10.0, -20.0, -15.5, -30.0)));
}

#[test]
fn test_accepts_box_inside_and_enclosing() {
    let r = region();
    assert!(r.accepts(&GeoBoundingBox::new(-10.0, -20.0, 5.0, -5.0)));
    assert!(r.accepts(&GeoBoundingBox::new(10.0, -40.0, 40.0, -40.0)));
}

#[test]
fn test_accepts_is_deterministic() {
    let r = region();
    let swath = GeoBoundingBox::new(-28.0, -30.0, 10.0, 0.0);
    let first = r.accepts(&swath);
    for _ in 0..10 {
        assert_eq!(r.accepts(&swath), first);
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_region_from_yaml() {
    let yaml = "north: -4.5\nsouth: -25.5\neast: 15.5\nwest: -15.5\n";
    let parsed: StudyRegion = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(parsed, StudyRegion::southeast_atlantic());
}

#[test]
fn test_inverted_region_from_yaml_fails() {
    let yaml = "north: -25.5\nsouth: -4.5\neast: 15.5\nwest: -15.5\n";
    assert!(serde_yaml::from_str::<StudyRegion>(yaml).is_err());
}
