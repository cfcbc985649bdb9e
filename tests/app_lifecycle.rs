use std::sync::Arc;

use firebase_auth_admin::{App, Credentials, FirebaseAuth};

#[test]
fn app_owns_one_memoized_auth_facade() {
    let app = App::initialize("lifecycle-memoized", Credentials::from_project_id("p")).unwrap();
    let first = FirebaseAuth::for_app(&app);
    let second = FirebaseAuth::for_app(&app);
    assert!(Arc::ptr_eq(&first, &second));
    app.delete();
}

#[test]
fn deleting_the_app_destroys_its_facade() {
    let app = App::initialize("lifecycle-destroy", Credentials::from_project_id("p")).unwrap();
    let auth = FirebaseAuth::for_app(&app);
    app.delete();
    let err = auth.create_custom_token("alice").unwrap_err();
    assert!(err.message().contains("no longer alive"), "{}", err.message());
}

#[test]
fn destroyed_facades_fail_before_any_work() {
    let auth = FirebaseAuth::builder(Credentials::from_project_id("p"))
        .emulator_host(Some("localhost:9099".to_owned()))
        .build();
    auth.destroy();
    // Even operations that would otherwise only do local validation report
    // the dead facade first.
    assert!(auth.get_user("alice").unwrap_err().message().contains("no longer alive"));
    assert!(auth.list_users(None, 10).unwrap_err().message().contains("no longer alive"));
    assert!(auth.verify_id_token("x").unwrap_err().message().contains("no longer alive"));
}

#[test]
fn tenant_facades_share_the_lifecycle() {
    let auth = FirebaseAuth::builder(Credentials::from_project_id("p"))
        .emulator_host(Some("localhost:9099".to_owned()))
        .build();
    let manager = auth.tenant_manager().unwrap();
    let t1 = manager.auth_for_tenant("t-1").unwrap();
    let t1_again = manager.auth_for_tenant("t-1").unwrap();
    assert!(Arc::ptr_eq(&t1, &t1_again));

    auth.destroy();
    assert!(t1.create_custom_token("alice").is_err());
}
