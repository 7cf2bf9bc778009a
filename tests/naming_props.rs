use std::fs;

use chrono::NaiveDate;
use paste_ex::naming::{
    display_width, generate_file_name_on, shorten_for_display, FALLBACK_FILE_NAME,
    MAX_NAME_PROBES,
};
use proptest::prelude::*;

fn path_like() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            Just('\\'),
            Just('/'),
            Just('.'),
            proptest::char::range('a', 'z'),
            proptest::char::range('A', 'Z'),
            Just('目'),
            Just('录'),
            Just('文'),
        ],
        0..120,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #[test]
    fn shortened_path_never_exceeds_width(path in path_like(), max in 0usize..80) {
        let shortened = shorten_for_display(&path, max);
        prop_assert!(display_width(&shortened) <= max);
        if display_width(&path) <= max {
            prop_assert_eq!(&shortened, &path);
        }
    }

    #[test]
    fn shortening_is_idempotent(path in path_like(), max in 0usize..80) {
        let once = shorten_for_display(&path, max);
        let twice = shorten_for_display(&once, max);
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn allocated_names_never_collide_up_to_the_probe_limit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");

    for _ in 0..=MAX_NAME_PROBES {
        let name = generate_file_name_on(dir.path(), "png", date);
        assert_ne!(name, FALLBACK_FILE_NAME);
        let path = dir.path().join(format!("{}.png", name));
        assert!(!path.exists(), "collision on {}", name);
        fs::write(&path, b"").expect("create");
    }

    assert_eq!(
        generate_file_name_on(dir.path(), "png", date),
        FALLBACK_FILE_NAME
    );
}
