use mixdeck_core::{
    MixJob, TimelineEvent,
    persistence::{JobReport, load_job_report, save_job_report},
};
use proptest::prelude::*;

fn fixture_report() -> JobReport {
    let mut job = MixJob::new("fixture");
    job.telemetry.recipe = Some("default".to_string());
    job.telemetry.duration_seconds = Some(3.5);
    JobReport {
        status: job.status(),
        telemetry: job.telemetry,
        timeline: vec![
            TimelineEvent::new("queued", "queued", 0),
            TimelineEvent::new("loading_stems", "loading stems", 10),
        ],
    }
}

fn no_panic_load(path: &std::path::Path) -> bool {
    std::panic::catch_unwind(|| {
        let _ = load_job_report(path);
    })
    .is_ok()
}

#[test]
fn saved_report_loads_back() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("nested").join("fixture_mix.report.json");
    let report = fixture_report();
    save_job_report(&path, &report).expect("saving report should work");
    let loaded = load_job_report(&path).expect("loading report should work");
    assert_eq!(loaded, report);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn random_report_bytes_do_not_panic(raw in prop::collection::vec(any::<u8>(), 0..4096)) {
        let temp = tempfile::tempdir().expect("tempdir should be creatable");
        let path = temp.path().join("corrupt_random.report.json");
        std::fs::write(&path, raw).expect("writing random payload should work");
        prop_assert!(no_panic_load(&path));
    }

    #[test]
    fn truncated_report_payloads_do_not_panic(prefix_len in 0usize..4096usize) {
        let temp = tempfile::tempdir().expect("tempdir should be creatable");
        let path = temp.path().join("corrupt_truncated.report.json");
        save_job_report(&path, &fixture_report()).expect("saving fixture report should work");

        let mut payload = std::fs::read(&path).expect("reading saved report should work");
        let truncated_len = prefix_len.min(payload.len());
        let complete = truncated_len == payload.len();
        payload.truncate(truncated_len);
        std::fs::write(&path, payload).expect("writing truncated payload should work");

        prop_assert!(no_panic_load(&path));
        prop_assert_eq!(load_job_report(&path).is_ok(), complete);
    }

    #[test]
    fn mutated_report_payloads_do_not_panic(index in 0usize..4096usize, delta in any::<u8>()) {
        let temp = tempfile::tempdir().expect("tempdir should be creatable");
        let path = temp.path().join("corrupt_mutated.report.json");
        save_job_report(&path, &fixture_report()).expect("saving fixture report should work");

        let mut payload = std::fs::read(&path).expect("reading saved report should work");
        if !payload.is_empty() {
            let target = index % payload.len();
            payload[target] ^= delta.max(1);
        }
        std::fs::write(&path, payload).expect("writing mutated payload should work");

        prop_assert!(no_panic_load(&path));
    }
}
