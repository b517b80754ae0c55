// End-to-end bootstrap sequence against the library API.
use std::fs;
use std::path::{Path, PathBuf};

use hdlrun::api::{
    Bundle, BootstrapConfig, DirState, Engine, Error, NativeLibraryTool, OptionKey, OptionValue,
    OutputLayout, Project, ProjectBuilder, RunManifest, SimOption, Simulator, prepare_dir, run,
};

struct RecordingEngine {
    seen: Option<Project>,
    native_dirs_present: Vec<bool>,
    exit_code: i32,
}

impl RecordingEngine {
    fn new(exit_code: i32) -> Self {
        Self {
            seen: None,
            native_dirs_present: Vec::new(),
            exit_code,
        }
    }
}

impl Engine for RecordingEngine {
    fn run(&mut self, project: &Project) -> Result<i32, Error> {
        self.native_dirs_present = project
            .user_libraries()
            .map(|library| library.native_path().is_dir())
            .collect();
        self.seen = Some(project.clone());
        Ok(self.exit_code)
    }
}

fn write_sources(root: &Path) {
    fs::write(root.join("axi_stream_patch_pkg.vhd"), "package axi_stream_patch_pkg is end;\n")
        .expect("write pkg");
    for name in ["tb_a.vhdl", "tb_b.vhdl", "tb_c.vhdl"] {
        fs::write(root.join(name), "-- test bench\n").expect("write tb");
    }
}

#[cfg(unix)]
fn fake_vlib(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("vlib");
    fs::write(&script, "#!/bin/sh\nmkdir -p \"$1\"\n").expect("write vlib");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
    script
}

#[cfg(unix)]
#[test]
fn blog_lib_sequence_step_by_step() {
    let work = tempfile::tempdir().expect("tempdir");
    let tools = tempfile::tempdir().expect("tools");
    write_sources(work.path());
    let layout = OutputLayout::new(work.path().join("vunit_out"), Simulator::Modelsim);

    assert_eq!(prepare_dir(&layout.libraries_dir()).expect("prepare"), DirState::Created);
    let native = layout.native_library("blog_lib");
    NativeLibraryTool::with_program(fake_vlib(tools.path()))
        .create(&native)
        .expect("vlib");

    let mut builder = ProjectBuilder::new(layout.clone(), work.path());
    let lib = builder.create_library("blog_lib").expect("create");
    let explicit = builder
        .add_sources(lib, "axi_stream_patch_pkg.vhd")
        .expect("explicit");
    assert_eq!(explicit.added.len(), 1);
    let globbed = builder.add_sources(lib, "*.vhdl").expect("glob");
    assert_eq!(globbed.matched.len(), 3);

    builder
        .set_library_option(lib, SimOption::DisableIeeeWarnings(true))
        .expect("library option");
    builder.set_global_option(SimOption::ModelsimVsimFlags(vec!["-L altera_mf".to_string()]));
    builder.enable(Bundle::CheckPreprocessing).expect("preprocess");

    let mut engine = RecordingEngine::new(0);
    let exit_code = engine.run(&builder.freeze()).expect("engine");
    assert_eq!(exit_code, 0);
    assert_eq!(engine.native_dirs_present, [true]);

    let project = engine.seen.expect("project handed off");
    assert_eq!(project.libraries().len(), 1);
    let library = &project.libraries()[0];
    assert_eq!(library.name(), "blog_lib");
    assert_eq!(library.sources().len(), 4);
    assert_eq!(
        library.options().get(OptionKey::DisableIeeeWarnings),
        Some(&OptionValue::Bool(true))
    );
    assert!(library.check_preprocessing());
    assert_eq!(
        project.global_options().get(OptionKey::ModelsimVsimFlags),
        Some(&OptionValue::List(vec!["-L altera_mf".to_string()]))
    );
    assert_eq!(project.bundles(), &[Bundle::CheckPreprocessing]);
}

#[cfg(unix)]
#[test]
fn blog_lib_manifest_runs_through_bootstrap() {
    let work = tempfile::tempdir().expect("tempdir");
    let tools = tempfile::tempdir().expect("tools");
    write_sources(work.path());
    let manifest = RunManifest::from_json_str(
        r#"{
            "libraries": [{
                "name": "blog_lib",
                "sources": ["axi_stream_patch_pkg.vhd", "*.vhdl"],
                "options": {"disable_ieee_warnings": true}
            }],
            "global_options": {"modelsim.vsim_flags": ["-L altera_mf"]},
            "bundles": ["check_preprocessing"]
        }"#,
    )
    .expect("manifest");
    let config = BootstrapConfig::new(
        OutputLayout::new(work.path().join("vunit_out"), Simulator::Modelsim),
        work.path(),
    )
    .with_library_tool(NativeLibraryTool::with_program(fake_vlib(tools.path())));

    let mut engine = RecordingEngine::new(1);
    let exit_code = run(&config, &manifest, &mut engine).expect("bootstrap");
    assert_eq!(exit_code, 1);
    assert_eq!(engine.native_dirs_present, [true]);

    let project = engine.seen.expect("project");
    let library = project.library("blog_lib").expect("blog_lib");
    assert_eq!(library.sources().len(), 4);
    assert_eq!(
        library.native_path(),
        work.path().join("vunit_out/modelsim/libraries/blog_lib")
    );

    // Output root is reusable by the next run once the lock is released.
    let mut engine = RecordingEngine::new(0);
    assert_eq!(run(&config, &manifest, &mut engine).expect("rerun"), 0);
}

#[test]
fn bundles_contribute_libraries_in_any_order() {
    let work = tempfile::tempdir().expect("tempdir");
    write_sources(work.path());
    let manifest = RunManifest::from_json_str(
        r#"{
            "libraries": [{"name": "blog_lib", "sources": ["*.vhdl"]}],
            "bundles": ["verification_components"]
        }"#,
    )
    .expect("manifest");
    let config = BootstrapConfig::new(
        OutputLayout::new(work.path().join("vunit_out"), Simulator::Ghdl),
        work.path(),
    );
    let mut engine = RecordingEngine::new(0);
    run(&config, &manifest, &mut engine).expect("bootstrap");

    let project = engine.seen.expect("project");
    assert_eq!(
        project.bundles(),
        &[Bundle::Osvvm, Bundle::VerificationComponents]
    );
    let osvvm = project.library("osvvm").expect("osvvm");
    assert_eq!(osvvm.provided_by(), Some(Bundle::Osvvm));
    assert_eq!(project.user_libraries().count(), 1);
    assert!(!project.library("blog_lib").expect("lib").check_preprocessing());
}
