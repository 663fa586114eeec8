use std::sync::Arc;
use std::thread;

use crate::common::UnionFixture;
use unionmount::overlay::types::{AccessMask, OpenDisposition, OpenRequest, RequestContext};

#[test]
fn test_independent_contexts_on_many_threads() {
    let fixture = Arc::new(UnionFixture::new());
    fixture.write_base("shared.txt", "shared base contents");

    let workers: Vec<_> = (0..8u64)
        .map(|i| {
            let fixture = Arc::clone(&fixture);
            thread::spawn(move || {
                let fs = &fixture.fs;
                let writer = RequestContext(100 + i);
                let reader = RequestContext(200 + i);
                let name = format!("/worker_{}.txt", i);
                let body = format!("payload from worker {}", i);

                fs.open_or_create(
                    &name,
                    writer,
                    OpenRequest::new(AccessMask::GENERIC_WRITE, OpenDisposition::CreateNew),
                )
                .unwrap();
                fs.write(writer, body.as_bytes(), 0).unwrap();
                fs.close(writer);

                fs.open_or_create(
                    "/shared.txt",
                    reader,
                    OpenRequest::new(AccessMask::GENERIC_READ, OpenDisposition::Open),
                )
                .unwrap();
                let mut buf = [0u8; 64];
                let n = fs.read(reader, &mut buf, 0, false).unwrap();
                fs.close(reader);

                assert_eq!(&buf[..n], b"shared base contents");
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert_eq!(fixture.fs.open_handle_count(), 0);
    let listing = fixture.fs.list_children("/").unwrap();
    assert_eq!(listing.len(), 9);
    for i in 0..8 {
        let path = fixture.overlay.join(format!("worker_{}.txt", i));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            format!("payload from worker {}", i)
        );
    }
}
