use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use virtual_dfs_cli::cli::DfsCmd;

fn dfs(args: &[&str]) -> anyhow::Result<String> {
    let cmd = DfsCmd::try_parse_from(std::iter::once("dfs").chain(args.iter().copied()))?;
    let mut out = Vec::new();
    cmd.execute(&mut out)?;
    Ok(String::from_utf8(out)?)
}

#[test]
fn check_passes_on_both_backends() {
    let output = dfs(&["check"]).unwrap();
    assert!(output.ends_with("mem:// passed the conformance scenario\n"), "{output}");

    let temp = TempDir::new().unwrap();
    let url = format!("file://{}", temp.path().display());
    let output = dfs(&["-v", "check", "--backend", &url, "--root", "/scratch"]).unwrap();
    assert!(output.contains("[pass] synced content visible\n"), "{output}");
    assert!(!temp.path().join("scratch").exists());
}

#[test]
fn commands_share_a_backend_directory() {
    let temp = TempDir::new().unwrap();
    let url = format!("file://{}", temp.path().display());
    let local = temp.path().join("upload");
    std::fs::write(&local, "hello").unwrap();
    let local = local.to_str().unwrap();

    dfs(&["mkdir", "--backend", &url, "/data"]).unwrap();
    dfs(&["put", "--backend", &url, local, "/data/hello.txt"]).unwrap();
    assert_eq!(dfs(&["ls", "--backend", &url, "/data"]).unwrap(), "/data/hello.txt\n");
    assert_eq!(dfs(&["cat", "--backend", &url, "/data/hello.txt"]).unwrap(), "hello");
    assert_eq!(
        dfs(&["stat", "--backend", &url, "/data/hello.txt"]).unwrap(),
        "/data/hello.txt: file, 5 bytes\n"
    );
}

#[test]
fn invalid_arguments_are_rejected() {
    assert!(dfs(&[]).is_err());
    assert!(dfs(&["mv", "/only-one"]).is_err());
    assert!(dfs(&["ls", "--backend", "mem://", "relative"]).is_err());
}
