// CLI integration tests for manifest-driven bootstrap runs.
use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_hdlrun");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn last_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text
        .lines()
        .rev()
        .find(|line| line.starts_with('{'))
        .expect("json line");
    parse_json(line)
}

fn write_project(root: &Path, manifest: &str) {
    fs::write(root.join("hdlrun.json"), manifest).expect("write manifest");
    fs::write(root.join("axi_stream_patch_pkg.vhd"), "-- pkg\n").expect("write pkg");
    for name in ["tb_a.vhdl", "tb_b.vhdl", "tb_c.vhdl"] {
        fs::write(root.join(name), "-- tb\n").expect("write tb");
    }
}

const BLOG_MANIFEST: &str = r#"{
    "libraries": [{
        "name": "blog_lib",
        "sources": ["axi_stream_patch_pkg.vhd", "*.vhdl"],
        "options": {"disable_ieee_warnings": true}
    }],
    "global_options": {"modelsim.vsim_flags": ["-L altera_mf"]},
    "bundles": ["check_preprocessing"]
}"#;

#[test]
fn dry_run_prints_project_snapshot() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_project(temp.path(), BLOG_MANIFEST);
    let out_dir = temp.path().join("out");

    let output = cmd()
        .args([
            "--manifest",
            temp.path().join("hdlrun.json").to_str().unwrap(),
            "--output-path",
            out_dir.to_str().unwrap(),
            "--simulator",
            "ghdl",
            "--dry-run",
            "--list",
            "blog_lib.*",
        ])
        .output()
        .expect("dry run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let snapshot = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    let project = &snapshot["project"];
    assert_eq!(project["simulator"], "ghdl");
    let libraries = project["libraries"].as_array().expect("libraries");
    assert_eq!(libraries.len(), 1);
    assert_eq!(libraries[0]["name"], "blog_lib");
    assert_eq!(libraries[0]["sources"].as_array().expect("sources").len(), 4);
    assert_eq!(libraries[0]["options"]["disable_ieee_warnings"], true);
    assert_eq!(libraries[0]["check_preprocessing"], true);
    assert_eq!(project["global_options"]["modelsim.vsim_flags"][0], "-L altera_mf");
    assert_eq!(snapshot["engine_args"]["list"], true);
    assert_eq!(snapshot["engine_args"]["patterns"][0], "blog_lib.*");

    assert!(out_dir.join("ghdl/libraries/blog_lib").is_dir());
}

#[test]
fn missing_manifest_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd()
        .args([
            "--manifest",
            temp.path().join("nope.json").to_str().unwrap(),
            "--dry-run",
        ])
        .output()
        .expect("run");
    assert_eq!(output.status.code().unwrap(), 3);
}

#[test]
fn unrecognized_option_is_reported_with_key() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_project(
        temp.path(),
        r#"{"libraries": [{"name": "blog_lib", "options": {"disable_ieee_warning": true}}]}"#,
    );
    let out_dir = temp.path().join("out");

    let output = cmd()
        .args([
            "--manifest",
            temp.path().join("hdlrun.json").to_str().unwrap(),
            "--output-path",
            out_dir.to_str().unwrap(),
            "--dry-run",
        ])
        .output()
        .expect("run");
    assert_eq!(output.status.code().unwrap(), 9);
    let err = last_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "UnrecognizedOption");
    assert_eq!(err["error"]["option"], "disable_ieee_warning");
    assert_eq!(err["error"]["library"], "blog_lib");
    assert!(!out_dir.exists());
}

#[test]
fn missing_engine_is_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_project(temp.path(), BLOG_MANIFEST);
    let output = cmd()
        .args([
            "--manifest",
            temp.path().join("hdlrun.json").to_str().unwrap(),
            "--simulator",
            "ghdl",
        ])
        .output()
        .expect("run");
    assert_eq!(output.status.code().unwrap(), 2);
}

#[test]
fn empty_glob_emits_notice_and_continues() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_project(
        temp.path(),
        r#"{"libraries": [{"name": "blog_lib", "sources": ["*.vhdl", "*.sv"]}]}"#,
    );
    let output = cmd()
        .args([
            "--manifest",
            temp.path().join("hdlrun.json").to_str().unwrap(),
            "--output-path",
            temp.path().join("out").to_str().unwrap(),
            "--simulator",
            "ghdl",
            "--dry-run",
        ])
        .env("RUST_LOG", "off")
        .output()
        .expect("run");
    assert!(output.status.success());
    let notice = last_json_line(&output.stderr);
    assert_eq!(notice["notice"]["kind"], "empty_sources");
    assert_eq!(notice["notice"]["details"]["pattern"], "*.sv");
}

#[cfg(unix)]
#[test]
fn engine_exit_code_becomes_process_exit_code() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().expect("tempdir");
    let tools = tempfile::tempdir().expect("tools");
    write_project(temp.path(), BLOG_MANIFEST);
    let out_dir = temp.path().join("out");

    let vlib = tools.path().join("vlib");
    fs::write(&vlib, "#!/bin/sh\nmkdir -p \"$1\"\n").expect("write vlib");
    fs::set_permissions(&vlib, fs::Permissions::from_mode(0o755)).expect("chmod");

    // Runner records its arguments and fails the run the way a failing test suite would.
    let args_file = tools.path().join("args.txt");
    let runner = tools.path().join("runner");
    fs::write(
        &runner,
        format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\ntest -f \"$2\" || exit 99\nexit 4\n",
            args_file.display()
        ),
    )
    .expect("write runner");
    fs::set_permissions(&runner, fs::Permissions::from_mode(0o755)).expect("chmod");

    let output = cmd()
        .args([
            "--manifest",
            temp.path().join("hdlrun.json").to_str().unwrap(),
            "--output-path",
            out_dir.to_str().unwrap(),
            "--library-tool",
            vlib.to_str().unwrap(),
            "--engine",
            runner.to_str().unwrap(),
            "-p",
            "2",
            "--clean",
        ])
        .output()
        .expect("run");
    assert_eq!(
        output.status.code().unwrap(),
        4,
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(out_dir.join("modelsim/libraries/blog_lib").is_dir());
    let snapshot = parse_json(&fs::read_to_string(out_dir.join("project.json")).expect("snapshot"));
    assert_eq!(snapshot["libraries"][0]["name"], "blog_lib");

    let args = fs::read_to_string(&args_file).expect("args");
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(args[0], "--project");
    assert!(args.contains(&"--num-threads"));
    assert!(args.contains(&"2"));
    assert!(!args.contains(&"--clean"));
}

#[cfg(unix)]
#[test]
fn failing_library_tool_aborts_before_engine() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().expect("tempdir");
    let tools = tempfile::tempdir().expect("tools");
    write_project(temp.path(), BLOG_MANIFEST);

    let vlib = tools.path().join("vlib");
    fs::write(&vlib, "#!/bin/sh\necho '** Error: license unavailable' >&2\nexit 1\n")
        .expect("write vlib");
    fs::set_permissions(&vlib, fs::Permissions::from_mode(0o755)).expect("chmod");
    let marker = tools.path().join("engine-ran");
    let runner = tools.path().join("runner");
    fs::write(&runner, format!("#!/bin/sh\ntouch '{}'\n", marker.display())).expect("runner");
    fs::set_permissions(&runner, fs::Permissions::from_mode(0o755)).expect("chmod");

    let output = cmd()
        .args([
            "--manifest",
            temp.path().join("hdlrun.json").to_str().unwrap(),
            "--output-path",
            temp.path().join("out").to_str().unwrap(),
            "--library-tool",
            vlib.to_str().unwrap(),
            "--engine",
            runner.to_str().unwrap(),
        ])
        .output()
        .expect("run");
    assert_eq!(output.status.code().unwrap(), 11);
    let err = last_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Tool");
    assert_eq!(err["error"]["exit_status"], 1);
    assert!(!marker.exists());
}
