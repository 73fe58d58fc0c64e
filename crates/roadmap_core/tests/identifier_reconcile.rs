use proptest::prelude::*;
use roadmap_core::db::open_db_in_memory;
use roadmap_core::model::identifier::Identifier;
use roadmap_core::model::org::{NewOrg, Org, OrgLinks, OrgTypes, OrgValidationError};
use roadmap_core::reconcile::{plan, reconcile, IdentifierAction};
use roadmap_core::repo::identifier_repo::IdentifierRepository;
use roadmap_core::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use roadmap_core::repo::RepoError;

const SHIBBOLETH: i64 = 1;
const ROR: i64 = 2;
const FUNDREF: i64 = 3;

fn org_with(identifiers: Vec<Identifier>) -> Org {
    Org {
        id: 1,
        name: "Example University".to_string(),
        abbreviation: None,
        contact_email: None,
        contact_name: None,
        logo: None,
        links: OrgLinks::default(),
        org_type: OrgTypes::INSTITUTION,
        managed: false,
        feedback_enabled: false,
        feedback_msg: None,
        tracker_code: None,
        language_id: None,
        identifiers,
    }
}

fn held_strategy() -> impl Strategy<Value = Vec<Identifier>> {
    prop::collection::btree_map(1i64..=3, "[a-c]{1,3}", 0..=3).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(scheme_id, value)| Identifier::persisted(scheme_id * 10, scheme_id, value))
            .collect()
    })
}

fn candidate_strategy() -> impl Strategy<Value = Identifier> {
    (
        prop::option::of(prop::sample::select(vec![10i64, 20, 30, 99])),
        1i64..=4,
        "[a-c ]{0,3}",
    )
        .prop_map(|(id, scheme_id, value)| Identifier {
            id,
            scheme_id,
            value,
        })
}

fn scheme_count(org: &Org, scheme_id: i64) -> usize {
    org.identifiers
        .iter()
        .filter(|identifier| identifier.scheme_id == scheme_id)
        .count()
}

proptest! {
    #[test]
    fn at_most_one_identifier_per_scheme(held in held_strategy(), candidate in candidate_strategy()) {
        let reconciled = reconcile(org_with(held), &candidate);
        for scheme_id in 1..=4 {
            prop_assert!(scheme_count(&reconciled.org, scheme_id) <= 1);
        }
        prop_assert!(reconciled.org.validate().is_ok());
    }

    #[test]
    fn other_schemes_are_untouched(held in held_strategy(), candidate in candidate_strategy()) {
        let reconciled = reconcile(org_with(held.clone()), &candidate);
        let others = |identifiers: &[Identifier]| {
            identifiers
                .iter()
                .filter(|identifier| identifier.scheme_id != candidate.scheme_id)
                .cloned()
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(others(&held), others(&reconciled.org.identifiers));
    }

    #[test]
    fn reconciling_twice_equals_once(held in held_strategy(), candidate in candidate_strategy()) {
        let once = reconcile(org_with(held), &candidate);
        let twice = reconcile(once.org.clone(), &candidate);
        prop_assert_eq!(once.org, twice.org);
        prop_assert!(twice.action.is_noop());
    }

    #[test]
    fn blank_proposals_never_change_anything(held in held_strategy(), scheme_id in 1i64..=4, value in " {0,3}") {
        let candidate = Identifier::proposed(scheme_id, value);
        let reconciled = reconcile(org_with(held.clone()), &candidate);
        prop_assert_eq!(reconciled.action, IdentifierAction::Ignored);
        prop_assert_eq!(reconciled.org.identifiers, held);
    }
}

#[test]
fn decision_table_covers_each_branch() {
    let held = vec![Identifier::persisted(10, SHIBBOLETH, "urn:old")];

    assert_eq!(
        plan(&held, &Identifier::persisted(10, SHIBBOLETH, "")),
        IdentifierAction::Destroy(10)
    );
    assert_eq!(
        plan(&held, &Identifier::persisted(11, SHIBBOLETH, "")),
        IdentifierAction::Ignored
    );
    assert_eq!(
        plan(&held, &Identifier::proposed(SHIBBOLETH, "urn:old")),
        IdentifierAction::Unchanged
    );
    assert_eq!(
        plan(&held, &Identifier::proposed(SHIBBOLETH, "urn:new")),
        IdentifierAction::Replace {
            previous: held[0].clone(),
            identifier: Identifier::proposed(SHIBBOLETH, "urn:new"),
        }
    );
    assert_eq!(
        plan(&held, &Identifier::proposed(ROR, "https://ror.org/0abc")),
        IdentifierAction::Create(Identifier::proposed(ROR, "https://ror.org/0abc"))
    );
}

#[test]
fn save_org_creates_replaces_and_destroys_in_storage() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrgRepository::new(&mut conn);
    let org_id = repo.create_org(&NewOrg::new("Example University")).unwrap();
    let org = repo.get_org(org_id).unwrap().unwrap();

    let saved = repo
        .save_org(
            &org,
            &[
                Identifier::proposed(SHIBBOLETH, "urn:idp:one"),
                Identifier::proposed(ROR, "https://ror.org/0abc"),
            ],
        )
        .unwrap();
    assert_eq!(saved.org.identifiers.len(), 2);
    assert_eq!(saved.changes.added.len(), 2);
    let shib = saved.org.identifier_for_scheme(SHIBBOLETH).unwrap().clone();
    let ror = saved.org.identifier_for_scheme(ROR).unwrap().clone();

    let replaced = repo
        .save_org(&saved.org, &[Identifier::proposed(SHIBBOLETH, "urn:idp:two")])
        .unwrap();
    let new_shib = replaced.org.identifier_for_scheme(SHIBBOLETH).unwrap();
    assert_eq!(new_shib.value, "urn:idp:two");
    assert_ne!(new_shib.id, shib.id);
    assert_eq!(replaced.org.identifier_for_scheme(ROR), Some(&ror));
    assert_eq!(replaced.changes.removed, vec![shib.id.unwrap()]);

    let blanked = Identifier {
        id: new_shib.id,
        scheme_id: SHIBBOLETH,
        value: String::new(),
    };
    let destroyed = repo.save_org(&replaced.org, &[blanked]).unwrap();
    assert!(matches!(destroyed.actions[0], IdentifierAction::Destroy(_)));
    assert_eq!(destroyed.org.identifier_for_scheme(SHIBBOLETH), None);
    assert_eq!(destroyed.org.identifier_for_scheme(ROR), Some(&ror));
}

#[test]
fn resubmitting_same_value_keeps_row_identity() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrgRepository::new(&mut conn);
    let org_id = repo.create_org(&NewOrg::new("Example University")).unwrap();
    let org = repo.get_org(org_id).unwrap().unwrap();

    let first = repo
        .save_org(&org, &[Identifier::proposed(FUNDREF, "100000001")])
        .unwrap();
    let found = repo.find_or_build(org_id, FUNDREF, " 100000001 ").unwrap();
    assert_eq!(found, first.org.identifiers[0]);

    let second = repo.save_org(&first.org, &[found]).unwrap();
    assert_eq!(second.actions, vec![IdentifierAction::Unchanged]);
    assert!(second.changes.is_empty());
    assert_eq!(second.org.identifiers, first.org.identifiers);
}

#[test]
fn invalid_profile_persists_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrgRepository::new(&mut conn);
    let org_id = repo.create_org(&NewOrg::new("Example University")).unwrap();
    let mut org = repo.get_org(org_id).unwrap().unwrap();
    org.name = "  ".to_string();

    let err = repo
        .save_org(&org, &[Identifier::proposed(ROR, "https://ror.org/0abc")])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(OrgValidationError::BlankName)
    ));

    let stored = repo.get_org(org_id).unwrap().unwrap();
    assert_eq!(stored.name, "Example University");
    assert!(stored.identifiers.is_empty());
}

#[test]
fn saving_unknown_org_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrgRepository::new(&mut conn);
    let org = org_with(Vec::new());

    let err = repo.save_org(&org, &[]).unwrap_err();
    assert!(matches!(err, RepoError::OrgNotFound(1)));
}

#[test]
fn deleting_org_cascades_to_identifiers() {
    let mut conn = open_db_in_memory().unwrap();
    let org_id = {
        let mut repo = SqliteOrgRepository::new(&mut conn);
        let org_id = repo.create_org(&NewOrg::new("Example University")).unwrap();
        let org = repo.get_org(org_id).unwrap().unwrap();
        repo.save_org(&org, &[Identifier::proposed(ROR, "https://ror.org/0abc")])
            .unwrap();
        org_id
    };

    conn.execute("DELETE FROM orgs WHERE id = ?1;", [org_id])
        .unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM identifiers;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn storage_guard_surfaces_as_duplicate_identifier() {
    let mut conn = open_db_in_memory().unwrap();
    let org_id = {
        let mut repo = SqliteOrgRepository::new(&mut conn);
        let org_id = repo.create_org(&NewOrg::new("Example University")).unwrap();
        let org = repo.get_org(org_id).unwrap().unwrap();
        repo.save_org(&org, &[Identifier::proposed(SHIBBOLETH, "urn:idp:one")])
            .unwrap();
        org_id
    };
    // Stands in for a concurrent writer: the replaced row survives its delete.
    conn.execute_batch(
        "CREATE TRIGGER keep_identifiers BEFORE DELETE ON identifiers
         BEGIN SELECT RAISE(IGNORE); END;",
    )
    .unwrap();

    let mut repo = SqliteOrgRepository::new(&mut conn);
    let mut org = repo.get_org(org_id).unwrap().unwrap();
    org.abbreviation = Some("EU".to_string());
    let err = repo
        .save_org(&org, &[Identifier::proposed(SHIBBOLETH, "urn:idp:two")])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::DuplicateIdentifier {
            org_id: failed_org,
            scheme_id: SHIBBOLETH,
        } if failed_org == org_id
    ));

    let stored = repo.get_org(org_id).unwrap().unwrap();
    assert_eq!(stored.abbreviation, None);
    assert_eq!(stored.identifiers.len(), 1);
    assert_eq!(stored.identifiers[0].value, "urn:idp:one");
}
