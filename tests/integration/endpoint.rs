use islet::endpoint::{JAVASCRIPT_CONTENT_TYPE, TEXT_CONTENT_TYPE};
use islet::engine::Engine;
use islet::test_utils::ComponentFixture;

#[tokio::test]
async fn test_serves_client_module() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());

    let response = engine.endpoint().handle("c=components%2Fsample-counter").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, JAVASCRIPT_CONTENT_TYPE);
    assert!(response.body.contains("import { compile as __compile } from \"vue\";"));
    assert!(response.body.contains("const __sfc__ ="));
    let scope = fixture.identity("components/sample-counter").scope_attribute();
    assert!(response.body.contains(&format!("export default {{ ...__sfc__, render, __scopeId: \"{scope}\" }};")));
}

#[tokio::test]
async fn test_component_without_script() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());

    let module = engine.compile_for_client("components/notice").await.unwrap();
    assert!(module.ends_with("export default { render };\n"));
    assert!(!module.contains("__sfc__"));
}

#[tokio::test]
async fn test_full_request_target_is_accepted() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());

    let bare = engine.endpoint().handle("c=pages%2Findex").await;
    let target = engine.endpoint().handle("/_islet/module?c=pages%2Findex").await;
    assert_eq!(bare, target);
    assert!(bare.is_success());
}

#[tokio::test]
async fn test_rejected_ids() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());
    let endpoint = engine.endpoint();

    for query in ["c=..%2F..%2Fetc%2Fpasswd", "c=../../etc/passwd", "c=%2Fetc%2Fpasswd", "c=", "x=1"] {
        let response = endpoint.handle(query).await;
        assert_eq!(response.status, 400, "{query}: {}", response.body);
        assert_eq!(response.content_type, TEXT_CONTENT_TYPE);
    }

    let missing = endpoint.handle("c=components%2Fnope").await;
    assert_eq!(missing.status, 404);

    let broken = endpoint.handle("c=pages%2Fbroken").await;
    assert_eq!(broken.status, 200, "client compilation defers expressions to the browser");
}
