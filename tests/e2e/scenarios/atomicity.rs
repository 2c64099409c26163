use crate::harness::{Assertion, Scenario};

#[test]
fn test_failed_commit_records_nothing() {
    Scenario::new("failed_commit")
        .with_file("a.txt", b"v1")
        .checkpoint("good", "edit", &["a.txt"])
        .write("b.txt", b"partial")
        .inject_commit_failure()
        .checkpoint("bad", "edit", &["a.txt", "b.txt"])
        .assert(Assertion::CreateFailed { label: "bad".into() })
        .assert_count(1)
        .assert(Assertion::ShadowFileAbsent {
            path: "files/b.txt".into(),
        })
        .assert_head_attached()
        .run()
        .unwrap();
}

#[test]
fn test_other_checkpoints_unaffected_by_failed_commit() {
    Scenario::new("failed_commit_then_restore")
        .with_file("a.txt", b"v1")
        .checkpoint("good", "edit", &["a.txt"])
        .write("a.txt", b"v2")
        .write("b.txt", b"partial")
        .inject_commit_failure()
        .checkpoint("bad", "edit", &["a.txt", "b.txt"])
        .clear_commit_failure()
        .write("b.txt", b"local")
        .restore("good")
        .assert(Assertion::LastRestoreSucceeded(true))
        .assert_file("a.txt", b"v1")
        // b.txt was never part of a visible checkpoint, so it is left alone.
        .assert_file("b.txt", b"local")
        .assert(Assertion::ShadowFileAbsent {
            path: "files/b.txt".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_checkpointing_resumes_after_failure_clears() {
    Scenario::new("resume_after_failure")
        .with_file("a.txt", b"v1")
        .inject_commit_failure()
        .checkpoint("bad", "edit", &["a.txt"])
        .assert(Assertion::CreateFailed { label: "bad".into() })
        .clear_commit_failure()
        .checkpoint("good", "edit", &["a.txt"])
        .assert_count(1)
        .write("a.txt", b"v2")
        .restore("good")
        .assert_file("a.txt", b"v1")
        .run()
        .unwrap();
}
