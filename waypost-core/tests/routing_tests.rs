use waypost_core::{Error, Methods, RouteTable};
use serde_json::json;

fn table() -> RouteTable<&'static str> {
    let mut table = RouteTable::new();
    table.add("topics", "/topics", ["GET", "POST"]).unwrap();
    table.add("topic", "/topics/<int:topic_id>", ["GET"]).unwrap();
    table.add("files", "/items/<path:rest>", ["GET"]).unwrap();
    table
}

#[test]
fn test_typed_int_parameter() {
    let table = table();
    let found = table.match_route("/topics/42", "GET").unwrap();
    assert_eq!(*found.endpoint(), "topic");
    assert_eq!(found.params["topic_id"], json!(42));
    assert!(found.params["topic_id"].is_i64());
}

#[test]
fn test_int_parameter_rejects_letters() {
    let table = table();
    let err = table.match_route("/topics/abc", "GET").unwrap_err();
    assert!(matches!(err, Error::RouteNotFound(_)));
}

#[test]
fn test_path_parameter_captures_slashes() {
    let table = table();
    let found = table.match_route("/items/a/b/c.txt", "GET").unwrap();
    assert_eq!(found.params["rest"], json!("a/b/c.txt"));
}

#[test]
fn test_overlapping_routes_prefer_first_registered() {
    let mut table = RouteTable::new();
    table.add("by-id", "/users/<int:id>", ["GET"]).unwrap();
    table.add("by-name", "/users/<string:name>", ["GET"]).unwrap();
    table.add("catch-all", "/<path:anything>", ["GET"]).unwrap();

    assert_eq!(*table.match_route("/users/7", "GET").unwrap().endpoint(), "by-id");
    assert_eq!(
        *table.match_route("/users/bob", "GET").unwrap().endpoint(),
        "by-name"
    );
    assert_eq!(
        *table.match_route("/users/bob/extra", "GET").unwrap().endpoint(),
        "catch-all"
    );
}

#[test]
fn test_reverse_registration_flips_winner() {
    let mut table = RouteTable::new();
    table.add("by-name", "/users/<string:name>", ["GET"]).unwrap();
    table.add("by-id", "/users/<int:id>", ["GET"]).unwrap();

    let found = table.match_route("/users/7", "GET").unwrap();
    assert_eq!(*found.endpoint(), "by-name");
    assert_eq!(found.params["name"], json!("7"));
}

#[test]
fn test_method_mismatch_is_indistinguishable_from_missing_path() {
    let table = table();
    let wrong_method = table.match_route("/topics/1", "DELETE").unwrap_err();
    let missing_path = table.match_route("/nothing", "GET").unwrap_err();

    assert_eq!(wrong_method.status_code(), 404);
    assert_eq!(missing_path.status_code(), 404);
    assert_eq!(wrong_method.name(), missing_path.name());
}

#[test]
fn test_methods_are_case_insensitive() {
    let table = table();
    assert!(table.match_route("/topics", "post").is_ok());
}

#[test]
fn test_forged_method_tag_rejected() {
    let table = table();
    assert!(table.match_route("/topics", "GET]/topics[GET").is_err());
}

#[test]
fn test_matcher_rebuilt_after_late_registration() {
    let mut table = table();
    assert!(table.build().is_ok());
    assert!(table.match_route("/late", "GET").is_err());

    table.add("late", "/late", Methods::Any).unwrap();
    assert_eq!(*table.match_route("/late", "OPTIONS").unwrap().endpoint(), "late");
    assert_eq!(table.len(), 4);
}

#[test]
fn test_registration_errors_are_eager() {
    let mut table: RouteTable<&str> = RouteTable::new();
    for template in ["/a/<int:id", "/a/<bogus:id>", "/a/<int:id>/<int:id>", "/a>"] {
        let err = table.add("x", template, ["GET"]).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { .. }), "{}", template);
    }
    assert!(table.is_empty());
}
