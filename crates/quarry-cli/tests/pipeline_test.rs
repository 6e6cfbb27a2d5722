//! End-to-end pipeline tests against the real binary wiring: the
//! built-in selection engine plus the redis and mongodb plugins, with
//! filesystem fixtures in a temp directory. No backend servers are
//! required; the backend scenarios exercise the unconfigured and
//! misconfigured paths, which must fail before any network activity.

use quarry_cli::pipeline::{run, PipelineError, RunOptions};
use quarry_query::BackendPlugin;
use quarry_query_mongodb::MongoPlugin;
use quarry_query_redis::RedisPlugin;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn plugins() -> Vec<Arc<dyn BackendPlugin>> {
    vec![Arc::new(RedisPlugin::new()), Arc::new(MongoPlugin::new())]
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(source: &str, query: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("src.json"), source).unwrap();
        fs::write(dir.path().join("query.qry"), query).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            query: self.path("query.qry"),
            source: self.path("src.json"),
            destination: self.path("out.json"),
            configurations: None,
            overrides: HashMap::new(),
        }
    }
}

fn read_output(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn select_field_writes_value_to_destination() {
    let fixture = Fixture::new("{\"a\": 1}", "a");
    let opts = fixture.options();

    let result = run(&opts, &plugins()).await.unwrap();

    assert_eq!(result, json!(1));
    assert_eq!(read_output(&opts.destination), json!(1));
}

#[tokio::test]
async fn select_nested_path() {
    let fixture = Fixture::new("{\"a\": {\"b\": [10, 20]}}", "a.b.1");
    let opts = fixture.options();

    run(&opts, &plugins()).await.unwrap();
    assert_eq!(read_output(&opts.destination), json!(20));
}

#[tokio::test]
async fn backend_function_without_configuration_fails_and_writes_nothing() {
    let fixture = Fixture::new("{}", "redis_get(\"c1\", \"greeting\")");
    let opts = fixture.options();

    let err = run(&opts, &plugins()).await.unwrap_err();

    match err {
        PipelineError::Exec(inner) => {
            assert!(inner.to_string().contains("No redis backend configured"));
        }
        other => panic!("expected Exec error, got: {other}"),
    }
    assert!(!opts.destination.exists());
}

#[tokio::test]
async fn mongo_function_without_configuration_fails_and_writes_nothing() {
    let fixture = Fixture::new("{}", "mongo_find_one(\"m1\", \"db\", \"users\")");
    let opts = fixture.options();

    let err = run(&opts, &plugins()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Exec(_)));
    assert!(!opts.destination.exists());
}

#[tokio::test]
async fn malformed_configuration_aborts_before_reading_inputs() {
    let dir = TempDir::new().unwrap();
    let conf = dir.path().join("quarry.yaml");
    fs::write(&conf, "redis: [not, a, mapping]").unwrap();

    // Source and query deliberately do not exist: if configuration were
    // not checked first, the run would fail with InvalidInput instead.
    let opts = RunOptions {
        query: dir.path().join("missing.qry"),
        source: dir.path().join("missing.json"),
        destination: dir.path().join("out.json"),
        configurations: Some(conf),
        overrides: HashMap::new(),
    };

    let err = run(&opts, &plugins()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
    assert!(!opts.destination.exists());
}

#[tokio::test]
async fn unreadable_source_is_invalid_input() {
    let fixture = Fixture::new("{}", "a");
    let mut opts = fixture.options();
    opts.source = fixture.path("missing.json");

    let err = run(&opts, &plugins()).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
}

#[tokio::test]
async fn non_json_source_is_invalid_input() {
    let fixture = Fixture::new("definitely not json", "a");
    let opts = fixture.options();

    let err = run(&opts, &plugins()).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
}

#[tokio::test]
async fn unreadable_query_is_invalid_query() {
    let fixture = Fixture::new("{}", "a");
    let mut opts = fixture.options();
    opts.query = fixture.path("missing.qry");

    let err = run(&opts, &plugins()).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidQuery(_)));
}

#[tokio::test]
async fn unparsable_query_is_compile_error() {
    let fixture = Fixture::new("{}", "redis_get(\"c1\"");
    let opts = fixture.options();

    let err = run(&opts, &plugins()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Compile(_)));
    assert!(!opts.destination.exists());
}

#[tokio::test]
async fn named_configuration_with_wrong_name_fails_without_connecting() {
    let fixture = Fixture::new("{}", "redis_get(\"c9\", \"greeting\")");
    let conf = fixture.path("quarry.yaml");
    fs::write(&conf, "redis:\n  c1: \"redis://localhost:6379\"\n").unwrap();

    let mut opts = fixture.options();
    opts.configurations = Some(conf);

    // The name c9 was never configured; resolution fails before any
    // connection attempt, so this is an execution error even though no
    // server is running.
    let err = run(&opts, &plugins()).await.unwrap_err();
    match err {
        PipelineError::Exec(inner) => {
            assert!(inner.to_string().contains("Unknown redis connection"));
        }
        other => panic!("expected Exec error, got: {other}"),
    }
    assert!(!opts.destination.exists());
}
