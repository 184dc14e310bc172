use dir_routing::{select, Validator};

const VALID_CID: &str = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

/// A single validated value is always the winner when `select` chooses
/// among candidates for a key.
#[test]
fn valid_single_value_always_wins_select() {
    let key = format!("/skills/programming/golang/{VALID_CID}/Peer1");
    assert!(Validator::skills().validate(&key, None).is_ok());
    assert_eq!(select(&key, &[None]).unwrap(), 0);
}

/// A valid key, an empty path component, and a malformed CID.
#[test]
fn scenario_five_named_keys() {
    let ok_key = format!("/skills/programming/golang/{VALID_CID}/Peer1");
    assert!(Validator::skills().validate(&ok_key, None).is_ok());

    let empty_component = format!("/skills//golang/{VALID_CID}/Peer1");
    assert!(Validator::skills().validate(&empty_component, None).is_err());

    let bad_cid = "/domains/ai/invalid-cid/Peer1";
    assert!(Validator::domains().validate(bad_cid, None).is_err());
}
