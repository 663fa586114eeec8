use std::fs;

use crate::common::UnionFixture;
use unionmount::overlay::types::{
    AccessMask, FileAttributes, LayerType, OpenDisposition, OpenRequest, RequestContext,
};
use unionmount::FsError;

fn read_all(fixture: &UnionFixture, path: &str, ctx: u64) -> (Option<LayerType>, String) {
    let ctx = RequestContext(ctx);
    let info = fixture
        .fs
        .open_or_create(
            path,
            ctx,
            OpenRequest::new(AccessMask::GENERIC_READ, OpenDisposition::Open),
        )
        .expect("open for read");

    let mut buf = vec![0u8; 256];
    let n = fixture.fs.read(ctx, &mut buf, 0, false).expect("read");
    fixture.fs.close(ctx);
    (info.layer, String::from_utf8_lossy(&buf[..n]).into_owned())
}

#[test]
fn test_overlay_file_shadows_base_file() {
    let fixture = UnionFixture::new();
    fixture.write_base("notes.txt", "base version");
    fixture.write_overlay("notes.txt", "overlay version");

    let (layer, contents) = read_all(&fixture, "/notes.txt", 1);
    assert_eq!(layer, Some(LayerType::Overlay));
    assert_eq!(contents, "overlay version");
}

#[test]
fn test_base_only_file_reads_through() {
    let fixture = UnionFixture::new();
    fixture.write_base("docs/readme.md", "from base");

    let (layer, contents) = read_all(&fixture, "/docs/readme.md", 1);
    assert_eq!(layer, Some(LayerType::Base));
    assert_eq!(contents, "from base");
}

#[test]
fn test_metadata_follows_precedence() {
    let fixture = UnionFixture::new();
    fixture.write_base("a.txt", "0123456789");
    fixture.write_overlay("a.txt", "abc");
    fixture.write_base("b.txt", "12345");

    let a = fixture.fs.get_metadata("/a.txt").unwrap();
    assert_eq!(a.length, 3);
    assert_eq!(a.file_name, "a.txt");

    let b = fixture.fs.get_metadata("/b.txt").unwrap();
    assert_eq!(b.length, 5);

    assert_eq!(fixture.fs.get_metadata("/c.txt"), Err(FsError::NotFound));
}

#[test]
fn test_root_is_synthesized() {
    let fixture = UnionFixture::new();
    let root = fixture.fs.get_metadata("/").unwrap();

    assert!(root.attributes.contains(FileAttributes::DIRECTORY));
    assert!(root.is_directory());
}

#[test]
fn test_listing_is_union_of_both_layers() {
    let fixture = UnionFixture::new();
    fixture.write_base("base_only.txt", "b");
    fixture.write_base("shared.txt", "base");
    fixture.write_overlay("shared.txt", "overlay!");
    fixture.write_overlay("overlay_only.txt", "o");
    fixture.mkdir_base("sub");

    let listing = fixture.fs.list_children("/").unwrap();

    assert_eq!(listing.len(), 4);
    for name in ["base_only.txt", "shared.txt", "overlay_only.txt", "sub"] {
        assert!(listing.contains(name), "missing {}", name);
    }
    assert_eq!(listing.get("shared.txt").unwrap().length, 8);
    assert!(listing.get("sub").unwrap().is_directory());
}

#[test]
fn test_listing_collapses_names_case_insensitively() {
    let fixture = UnionFixture::new();
    fixture.write_base("README.md", "base readme");
    fixture.write_overlay("readme.md", "overlay");

    let listing = fixture.fs.list_children("/").unwrap();

    assert_eq!(listing.len(), 1);
    let entry = listing.get("Readme.MD").unwrap();
    assert_eq!(entry.file_name, "readme.md");
    assert_eq!(entry.length, "overlay".len() as u64);
}

#[test]
fn test_directory_present_in_one_layer_only() {
    let fixture = UnionFixture::new();
    fixture.write_base("lib/a.rs", "a");

    let listing = fixture.fs.list_children("/lib").unwrap();
    assert_eq!(listing.len(), 1);
    assert!(listing.contains("a.rs"));

    assert_eq!(
        fixture.fs.list_children("/missing").unwrap_err(),
        FsError::NotFound
    );
}

#[test]
fn test_pattern_listing_filters_union() {
    let fixture = UnionFixture::new();
    fixture.write_base("main.rs", "");
    fixture.write_overlay("lib.RS", "");
    fixture.write_overlay("Cargo.toml", "");

    let listing = fixture.fs.list_children_matching("/", "*.rs").unwrap();
    let mut names: Vec<_> = listing.iter().map(|e| e.file_name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["lib.RS".to_string(), "main.rs".to_string()]);

    let everything = fixture.fs.list_children_matching("/", "*").unwrap();
    assert_eq!(everything.len(), 3);
}

#[test]
fn test_missing_parent_is_path_not_found() {
    let fixture = UnionFixture::new();

    let err = fixture
        .fs
        .open_or_create(
            "/nowhere/file.txt",
            RequestContext(1),
            OpenRequest::new(AccessMask::GENERIC_READ, OpenDisposition::Open),
        )
        .unwrap_err();
    assert_eq!(err, FsError::PathNotFound);
}

#[test]
fn test_base_layer_untouched_by_reads() {
    let fixture = UnionFixture::new();
    let base_file = fixture.write_base("keep.txt", "pristine");

    read_all(&fixture, "/keep.txt", 7);

    assert_eq!(fs::read_to_string(base_file).unwrap(), "pristine");
    assert!(!fixture.overlay.join("keep.txt").exists());
}
