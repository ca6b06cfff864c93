use super::*;

#[test]
fn department_parsing_is_case_insensitive() {
    assert_eq!(
        "Engineering".parse::<Department>().expect("should parse"),
        Department::Engineering
    );
    assert_eq!(
        "  HR  ".parse::<Department>().expect("should parse"),
        Department::Hr
    );
    assert_eq!(
        "finance".parse::<Department>().expect("should parse"),
        Department::Finance
    );
}

#[test]
fn unknown_department_is_rejected() {
    let err = "legal".parse::<Department>().expect_err("should reject");
    assert!(matches!(err, crate::ChatError::Config(_)));
    assert!(err.to_string().contains("legal"));
}

#[test]
fn general_is_not_a_requester_department() {
    // "general" marks broadcast documents; it is not an identity a caller
    // may query as.
    assert!("general".parse::<Department>().is_err());
}

#[test]
fn broadcast_segment_maps_to_broadcast_tag() {
    assert_eq!(
        DepartmentTag::from_path_segment("general"),
        Some(DepartmentTag::Broadcast)
    );
    assert_eq!(
        DepartmentTag::from_path_segment("General"),
        Some(DepartmentTag::Broadcast)
    );
}

#[test]
fn department_segment_maps_to_single_tag() {
    assert_eq!(
        DepartmentTag::from_path_segment("hr"),
        Some(DepartmentTag::Single(Department::Hr))
    );
    assert_eq!(
        DepartmentTag::from_path_segment("Marketing"),
        Some(DepartmentTag::Single(Department::Marketing))
    );
}

#[test]
fn unrecognized_segment_maps_to_none() {
    assert_eq!(DepartmentTag::from_path_segment("resources"), None);
    assert_eq!(DepartmentTag::from_path_segment(""), None);
}

#[test]
fn permission_soundness_over_full_enumeration() {
    // Visible iff broadcast-tagged or tag department equals the requester,
    // for every (requester, tag) pair in the enumeration.
    for requester in Department::ALL {
        assert!(is_visible(requester, &DepartmentTag::Broadcast));

        for tagged in Department::ALL {
            let tag = DepartmentTag::Single(tagged);
            assert_eq!(is_visible(requester, &tag), requester == tagged);
        }
    }
}

#[test]
fn tag_serde_round_trip() {
    for tag in [
        DepartmentTag::Broadcast,
        DepartmentTag::Single(Department::Engineering),
        DepartmentTag::Single(Department::Sales),
    ] {
        let json = serde_json::to_string(&tag).expect("serialize");
        let back: DepartmentTag = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, tag);
    }
}

#[test]
fn display_matches_path_convention() {
    assert_eq!(Department::Hr.to_string(), "hr");
    assert_eq!(DepartmentTag::Broadcast.to_string(), "general");
    assert_eq!(
        DepartmentTag::Single(Department::Finance).to_string(),
        "finance"
    );
}
