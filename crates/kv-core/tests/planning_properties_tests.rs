//! Planning properties over directory-backed registries.
//!
//! These tests lay out real migration directories, load them through
//! `DirectorySource`, and check the planner's ordering and round-trip
//! behaviour against simulated history sets.

use kv_core::source::{DOWN_FILE, UP_FILE};
use kv_core::{
    plan_down, plan_up, DirectorySource, MigrationId, PlannerError, Registry, RegistryError,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_migration(root: &Path, stem: &str, with_down: bool) {
    let dir = root.join(stem);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(UP_FILE), format!("-- {stem}\nSELECT 1;\n")).unwrap();
    if with_down {
        fs::write(dir.join(DOWN_FILE), "SELECT 0;\n").unwrap();
    }
}

fn kiosk_layout(root: &Path) {
    // Created out of order on purpose; discovery must not depend on it
    write_migration(root, "m20250715_063842_create_kiosk_version_platforms_table", true);
    write_migration(root, "m20250801_120000_add_platform_index", true);
    write_migration(root, "m20250711_090750_create_kiosk_versions_table", true);
}

fn apply(applied: &mut BTreeSet<MigrationId>, ids: &[MigrationId]) {
    applied.extend(ids.iter().copied());
}

fn revert(applied: &mut BTreeSet<MigrationId>, ids: &[MigrationId]) {
    for id in ids {
        applied.remove(id);
    }
}

#[test]
fn test_directory_registry_is_sorted_by_id() {
    let tmp = tempdir().unwrap();
    kiosk_layout(tmp.path());

    let registry = Registry::load(&DirectorySource::new(tmp.path())).unwrap();
    let names: Vec<&str> = registry.iter().map(|m| m.name().as_str()).collect();
    assert_eq!(
        names,
        vec![
            "create_kiosk_versions_table",
            "create_kiosk_version_platforms_table",
            "add_platform_index",
        ]
    );
}

#[test]
fn test_up_then_up_again_is_empty() {
    let tmp = tempdir().unwrap();
    kiosk_layout(tmp.path());
    let registry = Registry::load(&DirectorySource::new(tmp.path())).unwrap();

    let mut applied = BTreeSet::new();
    let plan = plan_up(&registry, &applied).unwrap();
    assert_eq!(plan.len(), 3);
    apply(&mut applied, &plan.ids());

    assert!(plan_up(&registry, &applied).unwrap().is_empty());
}

#[test]
fn test_revert_then_reapply_restores_applied_set() {
    let tmp = tempdir().unwrap();
    kiosk_layout(tmp.path());
    let registry = Registry::load(&DirectorySource::new(tmp.path())).unwrap();

    let mut applied = BTreeSet::new();
    let initial = plan_up(&registry, &applied).unwrap();
    apply(&mut applied, &initial.ids());
    let before = applied.clone();

    for count in 1..=3 {
        let down = plan_down(&registry, &applied, count).unwrap();
        assert_eq!(down.len(), count);
        revert(&mut applied, &down.ids());

        let up = plan_up(&registry, &applied).unwrap();
        assert_eq!(up.ids().iter().rev().copied().collect::<Vec<_>>(), down.ids());
        apply(&mut applied, &up.ids());
        assert_eq!(applied, before);
    }
}

#[test]
fn test_irreversible_directory_migration_blocks_down() {
    let tmp = tempdir().unwrap();
    write_migration(tmp.path(), "m0001_seed_platforms", false);
    write_migration(tmp.path(), "m0002_add_column", true);
    let registry = Registry::load(&DirectorySource::new(tmp.path())).unwrap();

    let applied: BTreeSet<MigrationId> = [1, 2].into_iter().map(MigrationId::new).collect();
    let err = plan_down(&registry, &applied, 2).unwrap_err();
    assert_eq!(err, PlannerError::Irreversible(MigrationId::new(1)));
}

#[test]
fn test_deleted_migration_is_orphaned() {
    let tmp = tempdir().unwrap();
    write_migration(tmp.path(), "m0001_first", true);
    write_migration(tmp.path(), "m0002_second", true);
    let registry = Registry::load(&DirectorySource::new(tmp.path())).unwrap();
    let applied: BTreeSet<MigrationId> = [1, 2].into_iter().map(MigrationId::new).collect();
    assert!(plan_up(&registry, &applied).unwrap().is_empty());

    fs::remove_dir_all(tmp.path().join("m0002_second")).unwrap();
    let registry = Registry::load(&DirectorySource::new(tmp.path())).unwrap();
    let err = plan_up(&registry, &applied).unwrap_err();
    assert_eq!(err, PlannerError::OrphanedHistory(MigrationId::new(2)));
}

#[test]
fn test_duplicate_id_across_directories() {
    let tmp = tempdir().unwrap();
    write_migration(tmp.path(), "m0001_first", true);
    write_migration(tmp.path(), "0001_other", true);

    let err = Registry::load(&DirectorySource::new(tmp.path())).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateId { .. }));
}

#[test]
fn test_duplicate_name_across_directories() {
    let tmp = tempdir().unwrap();
    write_migration(tmp.path(), "m0001_create_users", true);
    write_migration(tmp.path(), "m0002_create_users", true);

    let err = Registry::load(&DirectorySource::new(tmp.path())).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateName { .. }));
}
