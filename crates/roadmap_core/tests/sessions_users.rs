use roadmap_core::db::open_db_in_memory;
use roadmap_core::model::org::NewOrg;
use roadmap_core::model::user::{NewUser, OmniauthIdentity, Role};
use roadmap_core::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use roadmap_core::repo::session_repo::{SessionData, SessionError, SqliteSessionStore};
use roadmap_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use roadmap_core::repo::RepoError;

#[test]
fn session_payload_survives_save_and_load() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSessionStore::new(&conn);
    let session_id = store.generate_id();

    assert_eq!(store.load(&session_id).unwrap(), None);

    let mut data = SessionData::default();
    data.insert("org_id", "Example University");
    store.save(&session_id, &data).unwrap();

    let loaded = store.load(&session_id).unwrap().unwrap();
    assert_eq!(loaded.get_str("org_id"), Some("Example University"));

    data.remove("org_id");
    store.save(&session_id, &data).unwrap();
    assert!(store.load(&session_id).unwrap().unwrap().is_empty());

    assert!(store.destroy(&session_id).unwrap());
    assert!(!store.destroy(&session_id).unwrap());
}

#[test]
fn session_ids_up_to_255_characters_are_accepted() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSessionStore::new(&conn);

    let longest = "a".repeat(255);
    store.save(&longest, &SessionData::default()).unwrap();

    let err = store
        .save(&"a".repeat(256), &SessionData::default())
        .unwrap_err();
    assert!(matches!(err, SessionError::SessionIdTooLong { length: 256 }));
    assert!(matches!(
        store.load(" ").unwrap_err(),
        SessionError::BlankSessionId
    ));
}

#[test]
fn generated_session_ids_are_unique() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSessionStore::new(&conn);
    assert_ne!(store.generate_id(), store.generate_id());
}

#[test]
fn users_link_and_find_federated_identity() {
    let mut conn = open_db_in_memory().unwrap();
    let org_id = SqliteOrgRepository::new(&mut conn)
        .create_org(&NewOrg::new("Example University"))
        .unwrap();

    let users = SqliteUserRepository::new(&conn);
    let user_id = users
        .create_user(&NewUser {
            email: "researcher@example.ac.uk".to_string(),
            org_id: Some(org_id),
            role: Role::OrgAdmin,
        })
        .unwrap();

    let identity = OmniauthIdentity::new("shibboleth", "researcher@idp.example.ac.uk");
    assert_eq!(users.find_by_identity(&identity).unwrap(), None);

    users.link_identity(user_id, &identity).unwrap();
    let found = users.find_by_identity(&identity).unwrap().unwrap();
    assert_eq!(found.id, user_id);
    assert_eq!(found.org_id, Some(org_id));
    assert!(found.can_org_admin());
    assert!(!found.can_super_admin());
    assert_eq!(found.identity, Some(identity));
}

#[test]
fn linking_rejects_oversized_uid_and_unknown_user() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::new(&conn);

    let oversized = OmniauthIdentity::new("shibboleth", "u".repeat(256));
    assert!(matches!(
        users.link_identity(1, &oversized).unwrap_err(),
        RepoError::UserValidation(_)
    ));

    let identity = OmniauthIdentity::new("shibboleth", "someone");
    assert!(matches!(
        users.link_identity(99, &identity).unwrap_err(),
        RepoError::UserNotFound(99)
    ));
}

#[test]
fn user_lookup_returns_none_for_unknown_id() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::new(&conn);
    assert_eq!(users.get_user(7).unwrap(), None);
}
