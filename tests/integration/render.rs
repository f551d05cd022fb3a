use islet::core::IsletError;
use islet::engine::Engine;
use islet::page::{PageLogic, RequestContext};
use islet::render::document::mount_id;
use islet::resolver::Resolver;
use islet::store::AssignmentStore;
use islet::test_utils::ComponentFixture;
use futures::FutureExt;
use serde_json::json;

fn sample_store() -> AssignmentStore {
    let mut store = AssignmentStore::new();
    store
        .assign("title", "Home")
        .assign("notice", "Saved")
        .assign("items", json!(["apples", "pears"]));
    store
}

#[tokio::test]
async fn test_sample_page_document() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());

    let html = engine.render("pages/index", &sample_store()).await.unwrap();

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Home</title>"));
    assert!(html.contains("<h1>Welcome</h1>"));
    assert!(html.contains("Clicks: 0"));
    assert!(html.contains("<p class=\"notice\">Saved</p>"));
    assert!(html.contains("<li>apples</li>"));
    assert!(html.contains("<li>pears</li>"));
    assert!(html.contains(r#"<script type="importmap">"#));

    let scope = fixture.identity("components/sample-counter").scope_attribute();
    assert!(html.contains(&format!(".counter[{scope}]")), "scoped style missing:\n{html}");
    assert!(html.contains("main { margin: 0 auto; }"));
}

#[tokio::test]
async fn test_repeated_tag_is_imported_and_registered_once() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());

    let html = engine.render("pages/index", &sample_store()).await.unwrap();

    assert_eq!(html.matches(r#"from "/_islet/module?c=components%2Fsample-counter";"#).count(), 1);
    assert_eq!(html.matches(r#"app.component("SampleCounter", __islet_c"#).count(), 1);
    assert_eq!(html.matches(r#"app.component("Notice", __islet_c"#).count(), 1);
    assert!(!html.contains("import SampleCounter"));
    assert!(html.contains(r#"import __islet_root from "/_islet/module?c=pages%2Findex";"#));
}

#[tokio::test]
async fn test_store_snapshot_is_embedded_under_instance_id() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());
    let store = sample_store();

    let instance = engine.render_instance("pages/index", &store).await.unwrap();
    assert_eq!(instance.state, store.get_all());
    assert!(!instance.state.contains_key("heading"));

    let html = engine.render("pages/index", &store).await.unwrap();
    assert!(html.contains(r#"(window.__ISLET_STATE__ = window.__ISLET_STATE__ || {})["#));
    assert!(html.contains(r#""items":["apples","pears"]"#));
}

#[tokio::test]
async fn test_two_renders_use_distinct_instances() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());
    let store = sample_store();

    let first = engine.render_instance("pages/index", &store).await.unwrap();
    let second = engine.render_instance("pages/index", &store).await.unwrap();
    assert_ne!(first.instance_id, second.instance_id);

    let html = engine.render("pages/index", &store).await.unwrap();
    let mount_ids: Vec<&str> = html.match_indices("id=\"islet-").map(|(i, _)| &html[i..i + 10 + 32]).collect();
    assert_eq!(mount_ids.len(), 1);
    assert!(!html.contains(&mount_id(&first.instance_id)));
}

#[tokio::test]
async fn test_script_data_wins_over_store() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());
    let mut store = sample_store();
    store.assign("heading", "From the store");

    let html = engine.render("pages/index", &store).await.unwrap();
    assert!(html.contains("<h1>Welcome</h1>"));
    assert!(!html.contains("<h1>From the store</h1>"));
}

#[test]
fn test_store_reset_between_requests() {
    let mut store = AssignmentStore::new();
    store.assign("a", 1).assign("b", 2);
    let mut snapshot = store.get_all();
    assert_eq!(snapshot, *json!({"a": 1, "b": 2}).as_object().unwrap());
    snapshot.insert("c".to_string(), json!(3));
    store.assign("a", 5);
    assert_eq!(snapshot["a"], json!(1));
    assert_eq!(store.get_all(), *json!({"a": 5, "b": 2}).as_object().unwrap());

    store.reset();
    assert!(store.is_empty());
    assert!(store.get_all().is_empty());
}

#[tokio::test]
async fn test_lowercase_tags_are_markup_and_names_dedupe() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let resolver = Resolver::new(fixture.root(), "components");

    let resolved = resolver
        .resolve("<div><SampleCounter/><sample-counter/><SampleCounter/><Unknown/></div>")
        .await;
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].reference.name(), "SampleCounter");
    assert_eq!(resolved[0].identity.id(), "components/sample-counter");
}

#[tokio::test]
async fn test_serve_page_maps_failures_to_statuses() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());

    let logic = PageLogic::function(|request, store| {
        async move {
            store
                .assign("title", format!("Page {}", request.path))
                .assign("notice", "hi")
                .assign("items", json!([]));
            Ok(())
        }
        .boxed()
    });
    let ok = engine.serve_page("pages/index", Some(&logic), RequestContext::new("/")).await;
    assert_eq!(ok.status, 200);
    assert!(ok.body.contains("<title>Page /</title>"));

    let broken = engine.serve_page("pages/broken", None, RequestContext::new("/broken")).await;
    assert_eq!(broken.status, 500);

    let missing = engine.serve_page("pages/nope", None, RequestContext::new("/nope")).await;
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn test_compile_error_names_component() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let engine = Engine::new(fixture.config());

    let err = engine.render("pages/broken", &AssignmentStore::new()).await.unwrap_err();
    assert!(matches!(err, IsletError::Compile { .. }), "{err}");
    assert_eq!(err.component_id(), Some("pages/broken"));
}
