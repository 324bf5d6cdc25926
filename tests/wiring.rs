use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use wirebox::{
    value, Cleanup, Config, Container, InstantiateErrorKind, ParamSpec, Registry, ResolveErrorKind, ScopedResource,
    TypeSpec, Value,
};

struct Pool {
    size: i64,
}

struct PoolHandle {
    size: i64,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScopedResource for PoolHandle {
    fn enter(&mut self) -> Result<Value, InstantiateErrorKind> {
        self.log.lock().push(format!("open({})", self.size));
        Ok(Value::instance(Pool { size: self.size }))
    }

    fn exit(&mut self, _error: Option<&anyhow::Error>) -> Result<(), anyhow::Error> {
        self.log.lock().push(format!("close({})", self.size));
        Ok(())
    }
}

fn registry(log: Arc<Mutex<Vec<String>>>) -> Registry {
    let session_log = log.clone();
    Registry::builder()
        .value("base_size", 4)
        .scoped(
            "pool",
            vec![ParamSpec::required("size", TypeSpec::Int)],
            move |args| {
                Ok(PoolHandle {
                    size: args.require_int("size")?,
                    log: log.clone(),
                })
            },
        )
        .generator(
            "session",
            vec![ParamSpec::required("pool", TypeSpec::instance_of::<Pool>())],
            move |args| {
                let pool = args.require_instance::<Pool>("pool")?;
                let log = session_log.clone();
                log.lock().push(format!("session({})", pool.size));
                let cleanup: Cleanup = Box::new(move || {
                    log.lock().push("end-session".into());
                    Ok(())
                });
                Ok((Value::from("session"), cleanup))
            },
        )
        .build()
        .unwrap()
}

#[test]
fn test_configured_graph_lifecycle() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let config = Config::from_value(&value!({
        "pool": { "size": { "-expr": "refs.base_size * 2" } },
    }))
    .unwrap();

    let container = Container::new(registry(log.clone()), config).unwrap();
    container.ensure_constructible("session").unwrap();
    assert!(log.lock().is_empty());

    let session = container.get("session").unwrap();
    assert_eq!(session, Value::from("session"));

    let pool = container
        .get_expected("pool", &TypeSpec::instance_of::<Pool>())
        .unwrap();
    assert_eq!(pool.downcast::<Pool>().unwrap().size, 8);

    container.close().unwrap();
    assert_eq!(
        *log.lock(),
        vec![
            "open(8)".to_string(),
            "session(8)".to_string(),
            "end-session".to_string(),
            "close(8)".to_string(),
        ],
    );
}

#[test]
fn test_scope_helper_reports_body_error() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let err = wirebox::with_container(registry(log.clone()), Config::empty(), |container| {
        container.get("base_size")?;
        Err::<(), _>(anyhow!("startup aborted"))
    })
    .unwrap_err();

    assert_eq!(err.to_string(), "startup aborted");
}

#[test]
fn test_unknown_component_chain_points_at_requester() {
    let container = Container::new(Registry::default(), Config::empty()).unwrap();
    let err = container.get("ghost").unwrap_err();

    let ResolveErrorKind::UnknownComponent { name, chain } = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(name, "ghost");
    assert!(chain.is_empty());
}
