//! Tests for the permission policy

use rstest::rstest;

use taxonomy::config::PolicyConfig;
use taxonomy::domain::{Action, PermissionPolicy, Policy, Role};

#[rstest]
#[case(Role::Admin, Action::Create, true)]
#[case(Role::Admin, Action::Update, true)]
#[case(Role::Admin, Action::Delete, true)]
#[case(Role::Admin, Action::Move, true)]
#[case(Role::NodeManager, Action::Create, true)]
#[case(Role::NodeManager, Action::Update, true)]
#[case(Role::NodeManager, Action::Delete, false)]
#[case(Role::NodeManager, Action::Move, true)]
#[case(Role::NodeLead, Action::Create, false)]
#[case(Role::NodeLead, Action::Update, true)]
#[case(Role::NodeLead, Action::Delete, false)]
#[case(Role::NodeLead, Action::Move, false)]
#[case(Role::User, Action::Create, false)]
#[case(Role::User, Action::Update, false)]
#[case(Role::User, Action::Delete, false)]
#[case(Role::User, Action::Move, false)]
fn given_default_policy_when_checking_then_matches_table(
    #[case] role: Role,
    #[case] action: Action,
    #[case] expected: bool,
) {
    let policy = PermissionPolicy::default();

    assert_eq!(policy.allowed(role, action), expected);
    assert_eq!(policy.allowed_by_name(role, action.as_str()), expected);
}

#[rstest]
#[case("read")]
#[case("")]
#[case("DELETE")]
#[case("archive")]
fn given_unknown_action_name_when_checking_then_denied_for_every_role(#[case] action: &str) {
    let policy = PermissionPolicy::default();

    for role in Role::ALL {
        assert!(!policy.allowed_by_name(role, action), "{role} / {action:?}");
    }
}

#[test]
fn given_overrides_when_building_policy_then_only_named_rows_change() {
    let config = PolicyConfig {
        delete: vec!["node_manager".to_string()],
        update: vec!["!node_lead".to_string()],
        ..PolicyConfig::default()
    };

    let policy = config.to_policy().unwrap();

    assert!(policy.allowed(Role::NodeManager, Action::Delete));
    assert!(policy.allowed(Role::Admin, Action::Delete));
    assert!(!policy.allowed(Role::NodeLead, Action::Update));
    assert!(policy.allowed(Role::NodeManager, Action::Update));
    assert!(policy.allowed(Role::NodeManager, Action::Create));
    assert!(!policy.allowed(Role::User, Action::Move));
}

#[test]
fn given_default_policy_when_listing_table_then_rows_in_action_order() {
    let table = PermissionPolicy::default().table();

    let actions: Vec<Action> = table.iter().map(|(a, _)| *a).collect();
    assert_eq!(actions, Action::ALL.to_vec());
    assert_eq!(table[2].1, vec![Role::Admin]);
}
