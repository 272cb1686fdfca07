use super::*;
use crate::migration::MigrationName;

fn reversible(id: i64) -> MigrationDescriptor {
    MigrationDescriptor::reversible(
        id,
        MigrationName::try_new(format!("m{id}")).unwrap(),
        format!("CREATE TABLE t{id} (id INT);"),
        format!("DROP TABLE t{id};"),
    )
}

fn irreversible(id: i64) -> MigrationDescriptor {
    MigrationDescriptor::irreversible(
        id,
        MigrationName::try_new(format!("m{id}")).unwrap(),
        format!("CREATE TABLE t{id} (id INT);"),
    )
}

fn registry(migrations: Vec<MigrationDescriptor>) -> Registry {
    Registry::from_descriptors(migrations).unwrap()
}

fn ids(values: &[i64]) -> BTreeSet<MigrationId> {
    values.iter().copied().map(MigrationId::new).collect()
}

fn raw(plan: &MigrationPlan<'_>) -> Vec<i64> {
    plan.ids().into_iter().map(MigrationId::value).collect()
}

#[test]
fn test_plan_up_all_pending() {
    let reg = registry(vec![reversible(2), reversible(1)]);
    let plan = plan_up(&reg, &ids(&[])).unwrap();
    assert_eq!(plan.direction(), Direction::Up);
    assert_eq!(raw(&plan), vec![1, 2]);
}

#[test]
fn test_plan_up_skips_applied() {
    let reg = registry(vec![reversible(1), reversible(2), reversible(3)]);
    let plan = plan_up(&reg, &ids(&[1])).unwrap();
    assert_eq!(raw(&plan), vec![2, 3]);
}

#[test]
fn test_plan_up_fills_gap_in_order() {
    let reg = registry(vec![reversible(1), reversible(2), reversible(3)]);
    let plan = plan_up(&reg, &ids(&[1, 3])).unwrap();
    assert_eq!(raw(&plan), vec![2]);
}

#[test]
fn test_plan_up_empty_registry() {
    let reg = registry(vec![]);
    let plan = plan_up(&reg, &ids(&[])).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_plan_up_is_idempotent_once_applied() {
    let reg = registry(vec![reversible(1), reversible(2), reversible(3)]);
    let first = plan_up(&reg, &ids(&[])).unwrap();
    let applied: BTreeSet<MigrationId> = first.ids().into_iter().collect();
    let second = plan_up(&reg, &applied).unwrap();
    assert!(second.is_empty());
}

#[test]
fn test_plan_up_limit() {
    let reg = registry(vec![reversible(1), reversible(2), reversible(3)]);
    let plan = plan_up(&reg, &ids(&[])).unwrap().limit(2);
    assert_eq!(raw(&plan), vec![1, 2]);
}

#[test]
fn test_plan_up_orphaned_history() {
    let reg = registry(vec![reversible(1)]);
    let err = plan_up(&reg, &ids(&[1, 5])).unwrap_err();
    assert_eq!(err, PlannerError::OrphanedHistory(MigrationId::new(5)));
}

#[test]
fn test_plan_down_default_reverts_last() {
    let reg = registry(vec![reversible(1), reversible(2)]);
    let plan = plan_down(&reg, &ids(&[1, 2]), 1).unwrap();
    assert_eq!(plan.direction(), Direction::Down);
    assert_eq!(raw(&plan), vec![2]);
}

#[test]
fn test_plan_down_newest_first() {
    let reg = registry(vec![reversible(1), reversible(2), reversible(3)]);
    let plan = plan_down(&reg, &ids(&[1, 2, 3]), 3).unwrap();
    assert_eq!(raw(&plan), vec![3, 2, 1]);
}

#[test]
fn test_plan_down_count_larger_than_applied() {
    let reg = registry(vec![reversible(1), reversible(2), reversible(3)]);
    let plan = plan_down(&reg, &ids(&[1, 2]), 10).unwrap();
    assert_eq!(raw(&plan), vec![2, 1]);
}

#[test]
fn test_plan_down_nothing_applied() {
    let reg = registry(vec![reversible(1)]);
    let plan = plan_down(&reg, &ids(&[]), 1).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_plan_down_zero_count() {
    let reg = registry(vec![reversible(1)]);
    let plan = plan_down(&reg, &ids(&[1]), 0).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_plan_down_irreversible_selected() {
    let reg = registry(vec![irreversible(1), reversible(2)]);
    let err = plan_down(&reg, &ids(&[1, 2]), 2).unwrap_err();
    assert_eq!(err, PlannerError::Irreversible(MigrationId::new(1)));
}

#[test]
fn test_plan_down_irreversible_not_selected() {
    let reg = registry(vec![irreversible(1), reversible(2)]);
    let plan = plan_down(&reg, &ids(&[1, 2]), 1).unwrap();
    assert_eq!(raw(&plan), vec![2]);
}

#[test]
fn test_plan_down_never_contains_irreversible() {
    let reg = registry(vec![reversible(1), irreversible(2), reversible(3)]);
    for count in 0..=3 {
        if let Ok(plan) = plan_down(&reg, &ids(&[1, 2, 3]), count) {
            assert!(plan.steps().iter().all(|m| m.is_reversible()));
        }
    }
}

#[test]
fn test_plan_down_orphaned_history() {
    let reg = registry(vec![reversible(1)]);
    let err = plan_down(&reg, &ids(&[1, 2]), 1).unwrap_err();
    assert_eq!(err, PlannerError::OrphanedHistory(MigrationId::new(2)));
}
