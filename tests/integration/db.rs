use futures::FutureExt;
use futures::future::BoxFuture;
use islet::db::{BuiltQuery, Connection, ConnectionGuard, Connector, Query, Row};
use islet::engine::Engine;
use islet::page::{PageHandler, PageLogic, RequestContext};
use islet::store::AssignmentStore;
use islet::test_utils::ComponentFixture;
use serde_json::{Value, json};
use std::sync::Arc;

/// A connection serving a fixed table of products.
struct Catalog;

impl Connection for Catalog {
    fn fetch_all_rows<'a>(&'a self, query: &'a BuiltQuery) -> BoxFuture<'a, anyhow::Result<Vec<Row>>> {
        async move {
            let min_price = query.params.first().and_then(Value::as_i64).unwrap_or(0);
            let rows = [("kettle", 30), ("lamp", 45), ("mug", 8)]
                .into_iter()
                .filter(|(_, price)| *price >= min_price)
                .map(|(name, price)| {
                    json!({ "name": name, "price": price }).as_object().cloned().unwrap_or_default()
                })
                .collect();
            Ok(rows)
        }
        .boxed()
    }

    fn fetch_row<'a>(&'a self, query: &'a BuiltQuery) -> BoxFuture<'a, anyhow::Result<Option<Row>>> {
        async move { Ok(self.fetch_all_rows(query).await?.into_iter().next()) }.boxed()
    }

    fn execute<'a>(&'a self, _query: &'a BuiltQuery) -> BoxFuture<'a, anyhow::Result<u64>> {
        async { Ok(0) }.boxed()
    }

    fn close(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        async { Ok(()) }.boxed()
    }
}

struct CatalogConnector;

impl Connector for CatalogConnector {
    type Connection = Catalog;

    fn connect(&self) -> BoxFuture<'_, anyhow::Result<Catalog>> {
        async { Ok(Catalog) }.boxed()
    }
}

struct ProductsPage {
    db: Arc<ConnectionGuard<CatalogConnector>>,
}

impl PageHandler for ProductsPage {
    fn handle<'a>(
        &'a self,
        request: &'a RequestContext,
        store: &'a mut AssignmentStore,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            let min: i64 = request.query.get("min").map_or(Ok(0), |v| v.parse())?;
            let query = Query::new("SELECT name, price FROM products WHERE price >= :min ORDER BY name").bind("min", min);
            let rows = self.db.fetch_all_rows(&query).await?;
            store.assign("title", "Products").assign("products", Value::Array(rows.into_iter().map(Value::Object).collect()));
            Ok(())
        }
        .boxed()
    }
}

#[tokio::test]
async fn test_page_logic_reads_through_connection_guard() {
    let fixture = ComponentFixture::new().unwrap();
    fixture
        .write(
            "pages/products",
            "<template><ul><li v-for=\"p in products\">{{ p.name }}: {{ p.price }}</li></ul></template>",
        )
        .unwrap();
    let engine = Engine::new(fixture.config());
    let db = Arc::new(ConnectionGuard::new(CatalogConnector));
    let logic = PageLogic::object(ProductsPage { db: Arc::clone(&db) });

    assert!(!db.is_connected());
    let response = engine
        .serve_page("pages/products", Some(&logic), RequestContext::new("/products").with_query("min", "20"))
        .await;
    assert_eq!(response.status, 200, "{}", response.body);
    assert!(response.body.contains("<li>kettle: 30</li><li>lamp: 45</li>"));
    assert!(!response.body.contains("mug"));

    let again = engine.serve_page("pages/products", Some(&logic), RequestContext::new("/products")).await;
    assert!(again.body.contains("<li>mug: 8</li>"));
    assert_eq!(db.connect_attempts(), 1);
    assert!(db.is_connected());
}

#[tokio::test]
async fn test_bad_query_input_becomes_error_page() {
    let fixture = ComponentFixture::new().unwrap();
    fixture.write("pages/products", "<template><p>x</p></template>").unwrap();
    let engine = Engine::new(fixture.config());
    let logic = PageLogic::object(ProductsPage {
        db: Arc::new(ConnectionGuard::new(CatalogConnector)),
    });

    let response = engine
        .serve_page("pages/products", Some(&logic), RequestContext::new("/products").with_query("min", "cheap"))
        .await;
    assert_eq!(response.status, 500);
    assert!(response.body.contains("invalid digit"));
}
