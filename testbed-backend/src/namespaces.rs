//! Store namespaces owned by the managers.

pub const BENCH_CONFIG: &str = "bench-config";
pub const BENCH_CONFIG_BY_NAME: &str = "bench-config-by-name";
pub const BENCH_RESULTS: &str = "bench-results";

pub const COMPLIANCE_CONFIG: &str = "compliance-config";
pub const COMPLIANCE_CONFIG_BY_NAME: &str = "compliance-config-by-name";
pub const COMPLIANCE_RESULTS: &str = "compliance-results";
/// Per-test failure details, keyed by `"<run-id>/<test-name>"`.
pub const COMPLIANCE_ERRORS: &str = "compliance-errors";
