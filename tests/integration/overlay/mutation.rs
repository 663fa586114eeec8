use std::fs;

use crate::common::UnionFixture;
use unionmount::overlay::security::{SecurityDescriptor, SecuritySections};
use unionmount::overlay::types::{
    AccessMask, LayerType, OpenDisposition, OpenRequest, RequestContext,
};
use unionmount::FsError;

fn create_new(fixture: &UnionFixture, path: &str, ctx: RequestContext) -> Result<(), FsError> {
    fixture
        .fs
        .open_or_create(
            path,
            ctx,
            OpenRequest::new(
                AccessMask::GENERIC_READ | AccessMask::GENERIC_WRITE,
                OpenDisposition::CreateNew,
            ),
        )
        .map(|_| ())
}

#[test]
fn test_create_lands_in_overlay_only() {
    let fixture = UnionFixture::new();
    let ctx = RequestContext(1);

    create_new(&fixture, "/fresh.txt", ctx).unwrap();
    fixture.fs.write(ctx, b"hello union", 0).unwrap();
    fixture.fs.flush(ctx).unwrap();
    fixture.fs.close(ctx);

    assert_eq!(
        fs::read_to_string(fixture.overlay.join("fresh.txt")).unwrap(),
        "hello union"
    );
    assert!(!fixture.base.join("fresh.txt").exists());
}

#[test]
fn test_create_new_collides_with_base_entry() {
    let fixture = UnionFixture::new();
    fixture.write_base("taken.txt", "base");

    assert_eq!(
        create_new(&fixture, "/taken.txt", RequestContext(1)),
        Err(FsError::FileExists)
    );
    assert!(!fixture.overlay.join("taken.txt").exists());
}

#[test]
fn test_write_then_read_round_trip_through_handles() {
    let fixture = UnionFixture::new();
    let writer = RequestContext(10);
    let reader = RequestContext(11);

    create_new(&fixture, "/data.bin", writer).unwrap();
    fixture.fs.write(writer, b"0123456789", 0).unwrap();
    fixture.fs.write(writer, b"AB", 4).unwrap();
    fixture.fs.close(writer);

    let info = fixture
        .fs
        .open_or_create(
            "/data.bin",
            reader,
            OpenRequest::new(AccessMask::READ_DATA, OpenDisposition::Open),
        )
        .unwrap();
    assert_eq!(info.layer, Some(LayerType::Overlay));

    let mut buf = [0u8; 32];
    let n = fixture.fs.read(reader, &mut buf, 2, false).unwrap();
    assert_eq!(&buf[..n], b"23AB6789");
    fixture.fs.close(reader);
}

#[test]
fn test_write_open_of_base_only_file_does_not_copy_up() {
    let fixture = UnionFixture::new();
    fixture.write_base("ro.txt", "base");

    let err = fixture
        .fs
        .open_or_create(
            "/ro.txt",
            RequestContext(1),
            OpenRequest::new(AccessMask::WRITE_DATA, OpenDisposition::Open),
        )
        .unwrap_err();

    assert_eq!(err, FsError::NotFound);
    assert!(!fixture.overlay.join("ro.txt").exists());
}

#[test]
fn test_delete_only_affects_overlay() {
    let fixture = UnionFixture::new();
    fixture.write_base("shared.txt", "base");
    fixture.write_overlay("shared.txt", "overlay");
    fixture.write_base("base_only.txt", "base");

    fixture.fs.delete_file("/shared.txt").unwrap();

    assert!(!fixture.overlay.join("shared.txt").exists());
    assert!(fixture.base.join("shared.txt").exists());
    // The base copy shows through again.
    assert_eq!(fixture.fs.get_metadata("/shared.txt").unwrap().length, 4);

    assert_eq!(
        fixture.fs.delete_file("/base_only.txt"),
        Err(FsError::AccessDenied)
    );
    assert!(fixture.base.join("base_only.txt").exists());
}

#[test]
fn test_delete_directory_rules() {
    let fixture = UnionFixture::new();
    fixture.mkdir_overlay("empty");
    fixture.write_overlay("full/keep.txt", "x");
    fixture.mkdir_base("base_dir");

    fixture.fs.delete_directory("/empty").unwrap();
    assert!(!fixture.overlay.join("empty").exists());

    assert_eq!(fixture.fs.delete_directory("/full"), Err(FsError::Error));
    assert_eq!(
        fixture.fs.delete_directory("/base_dir"),
        Err(FsError::AccessDenied)
    );
    assert_eq!(fixture.fs.delete_directory("/"), Err(FsError::AccessDenied));
}

#[test]
fn test_move_refuses_existing_destination_without_replace() {
    let fixture = UnionFixture::new();
    fixture.write_overlay("a.txt", "A");
    fixture.write_overlay("b.txt", "B");

    assert_eq!(
        fixture
            .fs
            .move_file("/a.txt", "/b.txt", false, RequestContext(1)),
        Err(FsError::FileExists)
    );
    assert_eq!(
        fs::read_to_string(fixture.overlay.join("b.txt")).unwrap(),
        "B"
    );
}

#[test]
fn test_move_with_replace_overwrites_overlay_destination() {
    let fixture = UnionFixture::new();
    fixture.write_overlay("a.txt", "A");
    fixture.write_overlay("b.txt", "B");

    fixture
        .fs
        .move_file("/a.txt", "/b.txt", true, RequestContext(1))
        .unwrap();

    assert!(!fixture.overlay.join("a.txt").exists());
    assert_eq!(
        fs::read_to_string(fixture.overlay.join("b.txt")).unwrap(),
        "A"
    );
}

fn read_through(fixture: &UnionFixture, path: &str, ctx: RequestContext) -> (LayerType, String) {
    let info = fixture
        .fs
        .open_or_create(
            path,
            ctx,
            OpenRequest::new(AccessMask::GENERIC_READ, OpenDisposition::Open),
        )
        .expect("open for read");
    let mut buf = [0u8; 64];
    let n = fixture.fs.read(ctx, &mut buf, 0, false).expect("read");
    fixture.fs.close(ctx);
    (
        info.layer.expect("file opens bind a layer"),
        String::from_utf8_lossy(&buf[..n]).into_owned(),
    )
}

#[test]
fn test_move_replace_over_base_only_destination() {
    let fixture = UnionFixture::new();
    fixture.write_overlay("draft.txt", "new draft");
    fixture.write_base("final.txt", "old final");

    fixture
        .fs
        .move_file("/draft.txt", "/final.txt", true, RequestContext(1))
        .unwrap();

    assert_eq!(
        read_through(&fixture, "/final.txt", RequestContext(2)),
        (LayerType::Overlay, "new draft".to_string())
    );
    assert_eq!(
        fixture.fs.get_metadata("/draft.txt"),
        Err(FsError::NotFound)
    );
}

#[test]
fn test_move_replace_from_base_only_source() {
    let fixture = UnionFixture::new();
    fixture.write_base("report.txt", "base report");
    fixture.write_overlay("summary.txt", "overlay summary");

    fixture
        .fs
        .move_file("/report.txt", "/summary.txt", true, RequestContext(1))
        .unwrap();

    assert_eq!(
        read_through(&fixture, "/summary.txt", RequestContext(2)),
        (LayerType::Base, "base report".to_string())
    );
    assert_eq!(
        fixture.fs.get_metadata("/report.txt"),
        Err(FsError::NotFound)
    );
}

#[test]
fn test_failed_replace_leaves_destination_intact() {
    let fixture = UnionFixture::new();
    fixture.write_base("a.txt", "base");
    fixture.write_overlay("only_here/b.txt", "keep me");

    assert_eq!(
        fixture
            .fs
            .move_file("/a.txt", "/only_here/b.txt", true, RequestContext(1)),
        Err(FsError::PathNotFound)
    );
    assert_eq!(
        read_through(&fixture, "/only_here/b.txt", RequestContext(2)),
        (LayerType::Overlay, "keep me".to_string())
    );
    assert!(fixture.base.join("a.txt").exists());
}

#[test]
fn test_metadata_only_open_of_absent_entry() {
    let fixture = UnionFixture::new();
    let ctx = RequestContext(5);

    let info = fixture
        .fs
        .open_or_create(
            "/not_yet.txt",
            ctx,
            OpenRequest::new(AccessMask::SYNCHRONIZE, OpenDisposition::Open),
        )
        .unwrap();

    assert_eq!(info.layer, None);
    assert!(!info.created);
    assert_eq!(fixture.fs.open_handle_count(), 1);
    assert!(!fixture.overlay.join("not_yet.txt").exists());
    fixture.fs.close(ctx);
    assert_eq!(fixture.fs.open_handle_count(), 0);
}

#[test]
fn test_move_releases_the_callers_handle() {
    let fixture = UnionFixture::new();
    let ctx = RequestContext(3);
    create_new(&fixture, "/moving.txt", ctx).unwrap();
    assert_eq!(fixture.fs.open_handle_count(), 1);

    fixture
        .fs
        .move_file("/moving.txt", "/moved.txt", false, ctx)
        .unwrap();

    assert_eq!(fixture.fs.open_handle_count(), 0);
    assert!(fixture.overlay.join("moved.txt").exists());
}

#[test]
fn test_set_end_of_file_truncates_and_extends() {
    let fixture = UnionFixture::new();
    let ctx = RequestContext(4);
    create_new(&fixture, "/size.txt", ctx).unwrap();
    fixture.fs.write(ctx, b"0123456789", 0).unwrap();

    fixture.fs.set_end_of_file(ctx, 4).unwrap();
    assert_eq!(fixture.fs.get_metadata("/size.txt").unwrap().length, 4);

    fixture.fs.set_allocation_size(ctx, 64).unwrap();
    assert_eq!(fixture.fs.get_metadata("/size.txt").unwrap().length, 64);
    fixture.fs.close(ctx);
}

#[test]
fn test_security_applies_to_every_present_layer() {
    let fixture = UnionFixture::new();
    fixture.write_base("acl.txt", "base");
    fixture.write_overlay("acl.txt", "overlay");

    let descriptor = SecurityDescriptor(vec![1, 2, 3, 4]);
    fixture
        .fs
        .set_security("/acl.txt", SecuritySections::DACL, &descriptor)
        .unwrap();
    assert_eq!(
        fixture
            .fs
            .get_security("/acl.txt", SecuritySections::DACL)
            .unwrap(),
        descriptor
    );

    // With the overlay copy gone the base copy answers, and it was updated too.
    fixture.fs.delete_file("/acl.txt").unwrap();
    assert_eq!(
        fixture
            .fs
            .get_security("/acl.txt", SecuritySections::DACL)
            .unwrap(),
        descriptor
    );
}

#[test]
fn test_security_on_missing_entry() {
    let fixture = UnionFixture::new();
    assert_eq!(
        fixture
            .fs
            .get_security("/ghost.txt", SecuritySections::OWNER)
            .unwrap_err(),
        FsError::NotFound
    );
}
