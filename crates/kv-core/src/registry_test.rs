use super::*;
use crate::migration::MigrationName;
use crate::source::{EmbeddedMigration, EmbeddedSource};
use chrono::TimeZone;

fn desc(id: i64, name: &str) -> MigrationDescriptor {
    MigrationDescriptor::reversible(
        id,
        MigrationName::try_new(name).unwrap(),
        format!("CREATE TABLE {name} (id INT);"),
        format!("DROP TABLE {name};"),
    )
}

#[test]
fn test_registry_sorts_by_id() {
    let registry =
        Registry::from_descriptors(vec![desc(3, "c"), desc(1, "a"), desc(2, "b")]).unwrap();
    let ids: Vec<i64> = registry.iter().map(|m| m.id().value()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_registry_rejects_duplicate_id() {
    let err = Registry::from_descriptors(vec![desc(1, "a"), desc(1, "b")]).unwrap_err();
    match err {
        RegistryError::DuplicateId { id, first, second } => {
            assert_eq!(id, MigrationId::new(1));
            let mut names = [first, second];
            names.sort();
            assert_eq!(names, ["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected DuplicateId, got {other:?}"),
    }
}

#[test]
fn test_registry_rejects_duplicate_name() {
    let err = Registry::from_descriptors(vec![desc(2, "same"), desc(1, "same")]).unwrap_err();
    match err {
        RegistryError::DuplicateName {
            name,
            first,
            second,
        } => {
            assert_eq!(name, "same");
            assert_eq!(first, MigrationId::new(1));
            assert_eq!(second, MigrationId::new(2));
        }
        other => panic!("expected DuplicateName, got {other:?}"),
    }
}

#[test]
fn test_empty_registry() {
    let registry = Registry::from_descriptors(vec![]).unwrap();
    assert!(registry.is_empty());
    assert_eq!(registry.last_id(), None);
}

#[test]
fn test_get_and_contains() {
    let registry = Registry::from_descriptors(vec![desc(10, "a"), desc(20, "b")]).unwrap();
    assert_eq!(registry.get(MigrationId::new(20)).unwrap().name(), "b");
    assert!(registry.contains(MigrationId::new(10)));
    assert!(!registry.contains(MigrationId::new(15)));
}

#[test]
fn test_next_id_uses_timestamp() {
    let registry = Registry::from_descriptors(vec![desc(20250711090750, "a")]).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 7, 15, 6, 38, 42).unwrap();
    assert_eq!(registry.next_id(now).value(), 20250715063842);
}

#[test]
fn test_next_id_never_goes_backwards() {
    let registry = Registry::from_descriptors(vec![desc(20250715063842, "a")]).unwrap();
    // Same second as the last migration
    let now = Utc.with_ymd_and_hms(2025, 7, 15, 6, 38, 42).unwrap();
    assert_eq!(registry.next_id(now).value(), 20250715063843);

    // Clock behind the last migration
    let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(registry.next_id(earlier).value(), 20250715063843);
}

#[test]
fn test_next_id_on_empty_registry() {
    let registry = Registry::default();
    let now = Utc.with_ymd_and_hms(2025, 7, 11, 9, 7, 50).unwrap();
    assert_eq!(registry.next_id(now).value(), 20250711090750);
}

#[test]
fn test_load_from_source() {
    static MIGRATIONS: &[EmbeddedMigration] = &[
        EmbeddedMigration {
            id: 2,
            name: "b",
            up: "SELECT 2;",
            down: None,
        },
        EmbeddedMigration {
            id: 1,
            name: "a",
            up: "SELECT 1;",
            down: None,
        },
    ];
    let registry = Registry::load(&EmbeddedSource::new(MIGRATIONS)).unwrap();
    let names: Vec<&str> = registry.iter().map(|m| m.name().as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}
