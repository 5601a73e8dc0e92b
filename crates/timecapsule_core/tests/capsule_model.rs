use timecapsule_core::{Capsule, CapsuleId, CapsuleValidationError, Principal};

const NOW: u64 = 1_700_000_000_000_000_000;

fn sample(contents: &[&str], open_date: u64) -> Capsule {
    Capsule::new(
        CapsuleId::from_bytes(&[7u8; 32]),
        Principal::new("alice"),
        contents.iter().map(|value| value.to_string()).collect(),
        open_date,
        NOW,
    )
}

#[test]
fn new_capsule_starts_sealed() {
    let capsule = sample(&["hello"], NOW + 1);
    assert!(!capsule.is_opened);
    assert_eq!(capsule.created_date, NOW);
    assert!(capsule.validate().is_ok());
}

#[test]
fn validate_rejects_empty_contents() {
    let capsule = sample(&[], NOW + 1);
    assert_eq!(capsule.validate(), Err(CapsuleValidationError::EmptyContents));
}

#[test]
fn validate_rejects_empty_creator() {
    let mut capsule = sample(&["x"], NOW + 1);
    capsule.creator = Principal::new("");
    assert_eq!(capsule.validate(), Err(CapsuleValidationError::EmptyCreator));
}

#[test]
fn validate_requires_open_date_strictly_after_creation() {
    let capsule = sample(&["x"], NOW);
    assert!(matches!(
        capsule.validate(),
        Err(CapsuleValidationError::OpenDateNotAfterCreation { .. })
    ));
}

#[test]
fn validate_rejects_timestamps_sqlite_cannot_store() {
    let capsule = sample(&["x"], u64::MAX);
    assert_eq!(
        capsule.validate(),
        Err(CapsuleValidationError::TimestampOutOfRange(u64::MAX))
    );
}

#[test]
fn time_gate_opens_at_open_date() {
    let capsule = sample(&["x"], NOW + 10);
    assert!(!capsule.is_unlockable_at(NOW + 9));
    assert!(capsule.is_unlockable_at(NOW + 10));
    assert!(capsule.is_unlockable_at(NOW + 11));
}

#[test]
fn render_contents_joins_with_comma_space() {
    let capsule = sample(&["hello", "world"], NOW + 1);
    assert_eq!(capsule.render_contents(), "hello, world");
}

#[test]
fn ownership_compares_principals() {
    let capsule = sample(&["x"], NOW + 1);
    assert!(capsule.is_owned_by(&Principal::new("alice")));
    assert!(!capsule.is_owned_by(&Principal::new("bob")));
}

#[test]
fn serde_shape_uses_plain_strings_for_id_and_creator() {
    let capsule = sample(&["a", "b"], NOW + 5);
    let json = serde_json::to_value(&capsule).unwrap();

    assert_eq!(json["id"], "07".repeat(32));
    assert_eq!(json["creator"], "alice");
    assert_eq!(json["contents"], serde_json::json!(["a", "b"]));
    assert_eq!(json["open_date"], NOW + 5);
    assert_eq!(json["is_opened"], false);
    assert_eq!(json["created_date"], NOW);

    let decoded: Capsule = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, capsule);
}

#[test]
fn serde_rejects_malformed_id() {
    let json = serde_json::json!({
        "id": "not-hex",
        "creator": "alice",
        "contents": ["x"],
        "open_date": NOW + 1,
        "is_opened": false,
        "created_date": NOW,
    });
    assert!(serde_json::from_value::<Capsule>(json).is_err());
}
