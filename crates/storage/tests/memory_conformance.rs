use cadre_storage::conformance::run_conformance_suite;
use cadre_storage::MemoryStorage;

#[tokio::test]
async fn memory_backend_passes_the_conformance_suite() {
    let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
    assert_eq!(report.failed, 0, "{report}");
}
