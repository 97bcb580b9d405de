//! Warnings emitted through `tracing`, captured with a scoped subscriber.

use std::fmt;
use std::sync::{Arc, Mutex};

use fleetview::application::{DataRegistry, Loader, LoaderOptions};
use fleetview::domain::entity::Params;
use serde_json::{Value, json};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Captured {
    message: String,
    cache_key: Option<String>,
}

/// Records every WARN event seen by the subscriber it is layered onto.
#[derive(Clone, Default)]
struct WarnCapture {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl WarnCapture {
    fn events(&self) -> Vec<Captured> {
        self.events.lock().expect("capture lock").clone()
    }

    fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.message).collect()
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    cache_key: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "cache_key" => self.cache_key = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for WarnCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().expect("capture lock").push(Captured {
            message: visitor.message,
            cache_key: visitor.cache_key,
        });
    }
}

fn gated_loader(registry: &DataRegistry) -> Loader {
    registry.create_loader(
        "pods",
        |_params: Params| async { Ok(vec![json!({ "id": "x" })]) },
        LoaderOptions {
            required_params: Some(vec!["clusterId".into()]),
            ..Default::default()
        },
    )
}

#[test]
fn re_registering_a_loader_warns_once() {
    let capture = WarnCapture::default();
    let registry = DataRegistry::default();

    tracing::subscriber::with_default(tracing_subscriber::registry().with(capture.clone()), || {
        registry.create_loader(
            "pods",
            |_params: Params| async { Ok(Vec::new()) },
            LoaderOptions::default(),
        );
        registry.create_loader(
            "pods",
            |_params: Params| async { Ok(vec![json!({ "id": "x" })]) },
            LoaderOptions::default(),
        );
    });

    assert_eq!(
        capture.events(),
        vec![Captured {
            message: "Loader re-registered; previous loader replaced".to_string(),
            cache_key: Some("pods".to_string()),
        }]
    );
}

#[tokio::test]
async fn explicit_refetch_without_required_params_warns() {
    let capture = WarnCapture::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));
    let registry = DataRegistry::default();
    let loader = gated_loader(&registry);

    let items = loader.refetch(&Params::new()).await.expect("gated refetch");

    assert!(items.is_empty());
    assert_eq!(
        capture.messages(),
        vec!["Refetch skipped: required params missing".to_string()]
    );
}

#[tokio::test]
async fn gated_loads_without_explicit_refetch_stay_silent() {
    let capture = WarnCapture::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));
    let registry = DataRegistry::default();
    let loader = gated_loader(&registry);

    let mut params = Params::new();
    params.insert("clusterId".into(), Value::Null);
    assert!(loader.load(&params).await.expect("gated load").is_empty());

    loader.invalidate_cache();
    assert!(loader.load(&Params::new()).await.expect("invalidated gated load").is_empty());
    assert!(
        loader
            .load_with(&Params::new(), Some(false))
            .await
            .expect("explicit no-refetch load")
            .is_empty()
    );

    assert!(capture.events().is_empty(), "unexpected warnings: {:?}", capture.events());
    assert!(loader.is_invalidated());
}
