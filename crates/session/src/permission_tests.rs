// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use proptest::collection::{btree_set, vec};
use proptest::prelude::*;

use super::*;
use crate::storage::MemoryStorage;
use crate::test_support::login_grant;

fn set(names: &[&str]) -> PermissionSet {
    PermissionSet::new(names.iter().copied(), false)
}

const NONE: [&str; 0] = [];

#[test]
fn single_permission() {
    let perms = set(&["employee.read"]);
    assert!(perms.has_permission("employee.read"));
    assert!(!perms.has_permission("employee.write"));
}

#[yare::parameterized(
    one_held = { &["leave.approve", "payroll.read"], true },
    none_held = { &["payroll.read", "payroll.write"], false },
    empty = { &[], false },
)]
fn any_of(names: &[&str], expected: bool) {
    let perms = set(&["leave.approve", "employee.read"]);
    assert_eq!(perms.has_any_permission(names), expected);
}

#[yare::parameterized(
    all_held = { &["leave.approve", "employee.read"], true },
    one_missing = { &["leave.approve", "payroll.read"], false },
    empty = { &[], true },
)]
fn all_of(names: &[&str], expected: bool) {
    let perms = set(&["leave.approve", "employee.read"]);
    assert_eq!(perms.has_all_permissions(names), expected);
}

#[test]
fn empty_requirement_asymmetry() {
    let perms = PermissionSet::default();
    assert!(perms.has_all_permissions(NONE));
    assert!(!perms.has_any_permission(NONE));
}

#[test]
fn admin_passes_everything_with_empty_set() {
    let admin = PermissionSet::new(NONE, true);
    assert!(admin.is_admin());
    assert!(admin.has_permission("anything"));
    assert!(admin.has_any_permission(NONE));
    assert!(admin.has_all_permissions(NONE));
    assert!(admin.has_any_permission(["x", "y"]));
    assert!(admin.has_all_permissions(["x", "y"]));
}

#[yare::parameterized(
    exact = { &["admin"], true },
    upper = { &["ADMIN"], true },
    mixed = { &["employee", "Admin"], true },
    other = { &["hr", "manager"], false },
    none = { &[], false },
)]
fn admin_role_detection(roles: &[&str], expected: bool) {
    assert_eq!(roles_grant_admin(roles), expected);
}

#[test]
fn requirement_defaults_to_any_of() {
    let perms = set(&["evaluation.read"]);
    let req = PermissionRequirement::any_of(["evaluation.read", "evaluation.write"]);
    assert!(!req.require_all);
    assert!(req.is_satisfied_by(&perms));
    assert!(!PermissionRequirement::all_of(["evaluation.read", "evaluation.write"])
        .is_satisfied_by(&perms));
}

#[test]
fn admin_only_requirement() {
    let req = PermissionRequirement::admin_only();
    assert!(!req.is_satisfied_by(&set(&["role.manage"])));
    assert!(req.is_satisfied_by(&PermissionSet::new(NONE, true)));
}

#[test]
fn empty_requirement_follows_mode() {
    let perms = PermissionSet::default();
    assert!(!PermissionRequirement::any_of(NONE).is_satisfied_by(&perms));
    assert!(PermissionRequirement::all_of(NONE).is_satisfied_by(&perms));
}

#[test]
fn requirement_deserializes_with_defaults() -> anyhow::Result<()> {
    let req: PermissionRequirement = serde_json::from_str(r#"{"permissions":["leave.read"]}"#)?;
    assert_eq!(req, PermissionRequirement::any_of(["leave.read"]));
    Ok(())
}

#[test]
fn evaluator_reads_live_session() -> anyhow::Result<()> {
    let session = SessionStore::new(Arc::new(MemoryStorage::new()));
    let evaluator = PermissionEvaluator::new(Arc::clone(&session));
    assert!(!evaluator.has_permission("department.read"));

    session.login(login_grant("a.b.c", &["department.read"], &[]))?;
    assert!(evaluator.has_permission("department.read"));
    assert!(evaluator.has_any_permission(["department.write", "department.read"]));
    assert!(!evaluator.has_all_permissions(["department.write", "department.read"]));
    assert!(!evaluator.is_admin());
    assert!(evaluator.check(&PermissionRequirement::any_of(["department.read"])));

    session.logout();
    assert!(!evaluator.has_permission("department.read"));
    Ok(())
}

#[test]
fn evaluator_admin_override() -> anyhow::Result<()> {
    let session = SessionStore::new(Arc::new(MemoryStorage::new()));
    let evaluator = PermissionEvaluator::new(Arc::clone(&session));
    session.login(login_grant("a.b.c", &[], &["admin"]))?;
    assert!(evaluator.is_admin());
    assert!(evaluator.has_permission("role.manage"));
    assert!(evaluator.has_any_permission(NONE));
    assert!(evaluator.check(&PermissionRequirement::admin_only()));
    Ok(())
}

proptest! {
    #[test]
    fn any_and_all_match_set_semantics(
        held in btree_set("[a-e]", 0..5),
        asked in vec("[a-e]", 0..5),
    ) {
        let perms = PermissionSet::new(held.iter().cloned(), false);
        prop_assert_eq!(perms.has_any_permission(&asked), asked.iter().any(|n| held.contains(n)));
        prop_assert_eq!(perms.has_all_permissions(&asked), asked.iter().all(|n| held.contains(n)));
    }

    #[test]
    fn admin_overrides_any_input(
        held in btree_set("[a-e]", 0..5),
        asked in vec("[a-z]{1,8}", 0..5),
    ) {
        let perms = PermissionSet::new(held, true);
        prop_assert!(perms.has_any_permission(&asked));
        prop_assert!(perms.has_all_permissions(&asked));
        for name in &asked {
            prop_assert!(perms.has_permission(name));
        }
    }
}
