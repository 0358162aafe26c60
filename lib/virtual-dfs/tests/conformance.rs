use pretty_assertions::assert_eq;
use tempfile::TempDir;
use url::Url;
use virtual_dfs::conformance::{self, ScenarioError, DEFAULT_ROOT};
use virtual_dfs::{DfsClient, OpenMode};

fn host_client() -> (TempDir, DfsClient) {
    let temp = TempDir::new().unwrap();
    let url = Url::from_directory_path(temp.path()).unwrap();
    let client = DfsClient::connect(url.as_str()).unwrap();
    (temp, client)
}

#[test]
fn mem_backend_passes_scenario() {
    let client = DfsClient::connect("mem://").unwrap();
    conformance::run_scenario(&client, DEFAULT_ROOT, &mut |_| {}).unwrap();
}

#[test]
fn mem_backend_passes_scenario_with_tiny_buffers() {
    let client = DfsClient::connect("mem://?buffer_size=1").unwrap();
    conformance::run_scenario(&client, "/tiny/nested/root", &mut |_| {}).unwrap();
    assert!(client.exists("/tiny/nested").unwrap());
}

#[test]
fn host_backend_passes_scenario() {
    let (temp, client) = host_client();
    conformance::run_scenario(&client, DEFAULT_ROOT, &mut |_| {}).unwrap();
    assert!(!temp.path().join("test").exists());
}

#[test]
fn scenario_clears_stale_files() {
    let client = DfsClient::connect("mem://").unwrap();
    for stale in ["/test/file1", "/test/file2", "/test/file3"] {
        client.write_all(stale, b"left over from an earlier run").unwrap();
    }
    conformance::run_scenario(&client, DEFAULT_ROOT, &mut |_| {}).unwrap();
}

#[test]
fn scenario_stops_at_first_failure() {
    let (_temp, client) = host_client();
    // A file where the scenario wants its directory.
    let mut file = client.open_file("/blocked", OpenMode::WriteOnly).unwrap();
    file.close().unwrap();

    let mut passed = Vec::new();
    let err = conformance::run_scenario(&client, "/blocked", &mut |step| {
        passed.push(step.to_string())
    })
    .unwrap_err();

    assert!(passed.is_empty(), "{passed:?}");
    match err {
        ScenarioError::Dfs { step, source } => {
            assert_eq!(step, "create directory");
            assert_eq!(source.kind(), virtual_dfs::ErrorKind::TypeConflict);
        }
        other => panic!("unexpected error: {other}"),
    }
}
