use assert_cmd::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_manifest(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp manifest");
    tmp.write_all(xml.as_bytes()).expect("write manifest");
    tmp
}

const GRADIENT: &str = r#"<demo>
  <name>Gradient</name>
  <vertex>attribute vec3 aVertexPosition; void main() { gl_Position = vec4(aVertexPosition, 1.0); }</vertex>
  <fragment>precision mediump float; uniform vec2 uResolution; void main() { gl_FragColor = vec4(gl_FragCoord.xy / uResolution, 0.0, 1.0); }</fragment>
  <uniform name="uResolution" type="vec2" value="400 400" readonly="true"/>
  <uniform name="uTime" type="float" value="0" readonly="true"/>
</demo>
"#;

#[test]
fn cli_renders_frames_and_prints_summary() {
    let manifest = write_manifest(GRADIENT);
    let mut cmd = Command::cargo_bin("shader-playground").expect("binary exists");
    cmd.arg(manifest.path())
        .arg("--frames")
        .arg("2")
        .arg("--device-pixel-ratio")
        .arg("2");
    cmd.assert()
        .success()
        .stdout(contains("Loaded demo Gradient (2 uniform(s), Single mode)"))
        .stdout(contains(" - uResolution = "))
        .stdout(contains("Mounted demo \"Gradient\" (Single) at 800x800"))
        .stdout(contains(" - buffer 0: 12 vertex values"))
        .stdout(contains("Frame 2: 1 draw(s), 0 offscreen bind(s)"))
        .stdout(contains("drawArrays(TRIANGLE_STRIP, 0, 4)"))
        .stdout(contains("Total draw calls: 2"));
}

#[test]
fn cli_summary_only_skips_uniform_listing() {
    let manifest = write_manifest(GRADIENT);
    let mut cmd = Command::cargo_bin("shader-playground").expect("binary exists");
    cmd.arg(manifest.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Total draw calls: 1"))
        .stdout(contains(" - uResolution = ").not());
}

#[test]
fn cli_reports_invalid_manifests() {
    let manifest = write_manifest("<demo><name>Broken</name></demo>");
    let mut cmd = Command::cargo_bin("shader-playground").expect("binary exists");
    cmd.arg(manifest.path());
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse demo manifest"))
        .stderr(contains("<vertex> tag is missing"));
}

#[test]
fn cli_rejects_unknown_flags() {
    let manifest = write_manifest(GRADIENT);
    let mut cmd = Command::cargo_bin("shader-playground").expect("binary exists");
    cmd.arg(manifest.path()).arg("--watch");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --watch"));
}
