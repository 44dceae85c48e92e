//! Case table for the rename advisory.

use redline::advisory::{RenameAdvisory, DEFAULT_LOCALE};

#[test]
fn no_names_at_all() {
    let advisory = RenameAdvisory::new(
        "en", Vec::<(String, String)>::new());

    assert!(!advisory.should_show());
    assert!(advisory.document_message().is_none());
}

#[test]
fn only_a_default_name() {
    let advisory = RenameAdvisory::new("en", vec![
        (DEFAULT_LOCALE, "Test"),
    ]);

    assert!(!advisory.should_show());
}

#[test]
fn default_plus_matching_localized_name() {
    let advisory = RenameAdvisory::new("en", vec![
        (DEFAULT_LOCALE, "Test"),
        ("en", "Test EN"),
    ]);

    assert!(advisory.should_show());
    assert_eq!(
        advisory.document_message().unwrap(),
        "This document also has localized names which will not be changed \
         by this rename: default: \u{201c}Test\u{201d}, \
         en: \u{201c}Test EN\u{201d}.",
    );
}

#[test]
fn the_warning_does_not_depend_on_the_requester_locale() {
    let english = RenameAdvisory::new("en", vec![
        (DEFAULT_LOCALE, "Test"),
        ("en", "Test EN"),
    ]);
    let french = RenameAdvisory::new("fr", vec![
        (DEFAULT_LOCALE, "Test"),
        ("en", "Test EN"),
    ]);

    assert!(french.should_show());
    assert_eq!(english.document_message(), french.document_message());
}

#[test]
fn only_a_foreign_localized_name() {
    let advisory = RenameAdvisory::new("en", vec![
        ("fr", "Test FR"),
    ]);

    assert!(advisory.should_show());
}

#[test]
fn only_a_localized_name_matching_the_request_locale() {
    // Nothing would survive the rename that the user does not already
    // see, so no warning is due.
    let advisory = RenameAdvisory::new("en", vec![
        ("en", "Test EN"),
    ]);

    assert!(!advisory.should_show());
}

#[test]
fn folder_wording_differs_from_document_wording() {
    let advisory = RenameAdvisory::new("en", vec![
        ("fr", "Test FR"),
    ]);

    let document = advisory.document_message().unwrap();
    let folder = advisory.folder_message().unwrap();
    assert!(document.starts_with("This document"));
    assert!(folder.starts_with("This folder"));
}
