use assert_cmd::Command;
use islet::test_utils::ComponentFixture;
use predicates::prelude::*;

fn islet(fixture: &ComponentFixture) -> Command {
    let mut cmd = Command::cargo_bin("islet").unwrap();
    cmd.current_dir(fixture.root()).env_remove("RUST_LOG").env_remove("ISLET_CONFIG");
    cmd
}

#[test]
fn test_render_prints_document() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    islet(&fixture)
        .args(["render", "pages/index", "--assign", "title=Shop", "-a", "notice=Hi", "-a", "items=[1,2]"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<title>Shop</title>"))
        .stdout(predicate::str::contains("<li>1</li>"))
        .stdout(predicate::str::contains("<li>2</li>"))
        .stdout(predicate::str::contains("app.component(\"SampleCounter\", __islet_c"));
}

#[test]
fn test_render_to_file() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let output = fixture.root().join("out.html");
    islet(&fixture)
        .args(["render", "pages/index", "-a", "notice=Hi", "-a", "items=[]", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓"));
    let html = std::fs::read_to_string(output).unwrap();
    assert!(html.contains("<h1>Welcome</h1>"));
}

#[test]
fn test_render_missing_page_fails() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    islet(&fixture)
        .args(["render", "pages/missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Component 'pages/missing' not found"))
        .stderr(predicate::str::contains("islet list"));
}

#[test]
fn test_compile_prints_module() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    islet(&fixture)
        .args(["compile", "components/notice"])
        .assert()
        .success()
        .stdout(predicate::str::ends_with("export default { render };\n"));
}

#[test]
fn test_module_rejects_traversal() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    islet(&fixture)
        .args(["module", "c=..%2F..%2Fetc%2Fpasswd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("400"));
}

#[test]
fn test_list_with_root_flag_and_config() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let scope = fixture.identity("components/sample-counter").scope_id().to_string();

    let mut cmd = Command::cargo_bin("islet").unwrap();
    cmd.env_remove("ISLET_CONFIG")
        .arg("--root")
        .arg(fixture.root())
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("components/sample-counter"))
        .stdout(predicate::str::contains(scope))
        .stdout(predicate::str::contains("4 component(s)"));

    fixture.write_file("islet.toml", "default_title = \"From config\"\n").unwrap();
    islet(&fixture)
        .args(["render", "components/notice", "-a", "text=x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<title>From config</title>"));
}

#[test]
fn test_invalid_config_is_reported() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    fixture.write_file("islet.toml", "client_module_path = \"relative\"\n").unwrap();
    islet(&fixture)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("client_module_path"));
}
