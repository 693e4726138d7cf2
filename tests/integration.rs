use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use argot::commands::definition::{BeforeOutcome, HookResult, Hooks};
use argot::commands::option::{OptionValue, Options};
use argot::commands::registry::DefinitionError;
use argot::config_file::ConfigError;
use argot::plan::PlanError;
use argot::runner::{RunError, Runner, UnitEvent};
use argot::{Project, UnitConfig, load_config};

type Log = Arc<Mutex<Vec<String>>>;

fn write_config(dir: &std::path::Path, content: &str) -> String {
    let path = dir.join(".argot.yaml");
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

fn record(log: &Log, entry: String) -> impl Future<Output = HookResult> + Send + 'static + use<> {
    let log = Arc::clone(log);
    async move {
        log.lock().push(entry);
        Ok(())
    }
}

fn skip() -> impl Future<Output = HookResult<BeforeOutcome>> + Send + 'static {
    async { Ok(BeforeOutcome::Skip) }
}

fn fail(message: &'static str) -> impl Future<Output = HookResult> + Send + 'static {
    async move { Err(message.into()) }
}

/// Hooks that log `<name>`, `<name>:after` and `<name>:after_all` according to which
/// fragments the config declares; `skip_if` always skips
fn recording_hooks(log: &Log) -> impl FnMut(&UnitConfig) -> Hooks + '_ {
    move |unit| {
        let mut hooks = Hooks::new();
        if unit.hooks.skip_if.is_some() {
            hooks = hooks.before(|_| skip());
        }
        if unit.hooks.run.is_some() {
            let (log, name) = (Arc::clone(log), unit.name.clone());
            hooks = hooks.exec(move |_| record(&log, name.clone()));
        }
        if unit.hooks.after.is_some() {
            let (log, name) = (Arc::clone(log), unit.name.clone());
            hooks = hooks.after(move |_| record(&log, format!("{name}:after")));
        }
        if unit.hooks.after_all.is_some() {
            let (log, name) = (Arc::clone(log), unit.name.clone());
            hooks = hooks.after_all(move |_| record(&log, format!("{name}:after_all")));
        }
        hooks
    }
}

fn load(dir: &std::path::Path, content: &str, log: &Log) -> Result<Project, ConfigError> {
    let path = write_config(dir, content);
    load_config(Some(&path), recording_hooks(log))
}

const PROJECT: &str = r#"
argot_version: "0.1.0"
name: app
options:
  - name: verbose
    aliases: [v]
    global: true
commands:
  - name: build
    description: Build everything
    run: make
    after: echo built
    depends_on: [lint]
    options:
      - name: profile
        aliases: [p]
        value: true
  - name: deploy
    topic: true
    commands:
      - name: apply
        run: apply
        depends_on: [lint, fmt]
        options:
          - name: env
            value: true
  - name: secret
    private: true
    run: leak
tasks:
  - name: fmt
    run: fmt
  - name: lint
    run: lint
    depends_on: [fmt]
    after_all: report
"#;

async fn run_all(project: &mut Project, args: &[&str]) -> Result<(), RunError> {
    let plan = project.resolve(args);
    assert!(plan.success, "unexpected diagnostics: {plan}");
    let units: Vec<_> = plan
        .commands()
        .map(|(unit, item)| (unit, item.options.clone()))
        .collect();
    let mut runner = Runner::new(&mut project.registry);
    let mut result = Ok(());
    for (unit, options) in units {
        result = runner.run(unit, options).await;
        if result.is_err() {
            break;
        }
    }
    runner.run_after_all().await;
    result
}

#[test]
fn test_load_config_minimal() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let project = load(dir.path(), PROJECT, &log).unwrap();
    assert_eq!(project.tree.name, "app");
    assert_eq!(project.tree.children.len(), 3);
    assert_eq!(project.cwd, dir.path().canonicalize().unwrap());
    // Two tasks and four commands; the topic has no unit
    assert_eq!(project.registry.len(), 6);
    assert!(project.registry.find_task("lint").is_some());
}

#[test]
fn test_load_config_bare_file_name() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
argot_version: '0.1.0'
name: app
commands:
  - name: build
    run: 'true'
"#,
    );
    std::env::set_current_dir(dir.path()).unwrap();

    let mut dirs = Vec::new();
    let project = load_config(Some(".argot.yaml"), |unit: &UnitConfig| {
        dirs.push(unit.cwd.clone());
        Hooks::new()
    })
    .unwrap();

    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(project.cwd, expected);
    assert_eq!(dirs, vec![expected.clone(), expected]);
}

#[test]
fn test_plan_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let project = load(dir.path(), PROJECT, &log).unwrap();
    let plan = project.resolve(&["deploy", "apply", "--env=prod", "-v", "--nope", "secret"]);
    assert!(!plan.success);
    insta::assert_snapshot!(plan.to_string(), @r"
    app deploy
    app deploy apply --env=prod [unknown command: secret] [unknown options: --nope]
    app --verbose
    ");
}

#[test]
fn test_global_option_routed_to_owner() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let project = load(dir.path(), PROJECT, &log).unwrap();
    let plan = project.resolve(&["build", "-v", "-p", "release"]);
    assert!(plan.success);
    assert_eq!(plan.items.len(), 2);
    assert_eq!(plan.items[0].path, vec!["app", "build"]);
    assert_eq!(
        plan.items[0].option("profile"),
        Some(&OptionValue::Value("release".to_string()))
    );
    assert_eq!(plan.items[1].path, vec!["app"]);
    assert_eq!(plan.items[1].option("verbose"), Some(&OptionValue::Flag(true)));
}

#[test]
fn test_plan_json() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let project = load(dir.path(), PROJECT, &log).unwrap();
    let plan = project.resolve(&["build", "--profile", "debug"]);
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["items"][0]["path"], serde_json::json!(["app", "build"]));
    assert_eq!(json["items"][0]["options"]["profile"], "debug");
    assert!(json["items"][0].get("unknown_options").is_none());
}

#[test]
fn test_load_config_duplicate_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let result = load(
        dir.path(),
        r#"
argot_version: "0.1.0"
name: app
commands:
  - name: db
    topic: true
    commands:
      - name: status
      - name: status
"#,
        &log,
    );
    match result {
        Err(ConfigError::Plan(PlanError::DuplicateCommand { name, path })) => {
            assert_eq!(name, "status");
            assert_eq!(path, "app db");
        }
        other => panic!("Expected DuplicateCommand, got: {other:?}"),
    }
}

#[test]
fn test_load_config_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let result = load(
        dir.path(),
        r#"
argot_version: "0.1.0"
name: app
tasks:
  - name: a
    depends_on: [b]
  - name: b
    depends_on: [a]
"#,
        &log,
    );
    match result {
        Err(ConfigError::Definition(DefinitionError::Cycle(path))) => {
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"a".to_string()));
            assert!(path.contains(&"b".to_string()));
        }
        other => panic!("Expected Cycle, got: {other:?}"),
    }
}

#[test]
fn test_load_config_missing_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let result = load(
        dir.path(),
        r#"
argot_version: "0.1.0"
name: app
commands:
  - name: build
    depends_on: [nope]
"#,
        &log,
    );
    match result {
        Err(ConfigError::Definition(DefinitionError::MissingDependency { unit, dependency })) => {
            assert_eq!(unit, "build");
            assert_eq!(dependency, "nope");
        }
        other => panic!("Expected MissingDependency, got: {other:?}"),
    }
}

#[test]
fn test_config_empty_name_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let result = load(
        dir.path(),
        r#"
argot_version: "0.1.0"
name: app
commands:
  - name: ""
"#,
        &log,
    );
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[tokio::test]
async fn test_run_dependency_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let mut project = load(dir.path(), PROJECT, &log).unwrap();
    run_all(&mut project, &["build"]).await.unwrap();
    assert_eq!(
        *log.lock(),
        vec!["fmt", "lint", "build", "build:after", "lint:after_all"]
    );
}

#[tokio::test]
async fn test_run_shared_dependencies_once() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let mut project = load(dir.path(), PROJECT, &log).unwrap();
    run_all(&mut project, &["build"]).await.unwrap();
    run_all(&mut project, &["deploy", "apply"]).await.unwrap();
    assert_eq!(
        *log.lock(),
        vec!["fmt", "lint", "build", "build:after", "lint:after_all", "apply"]
    );
}

#[tokio::test]
async fn test_run_skip_if() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let mut project = load(
        dir.path(),
        r#"
argot_version: "0.1.0"
name: app
commands:
  - name: build
    run: make
    depends_on: [codegen]
tasks:
  - name: codegen
    run: gen
    skip_if: "test -f generated"
"#,
        &log,
    )
    .unwrap();

    let build = project.plan.child(project.plan.root(), "build").unwrap();
    let build = project.plan.node(build).command.unwrap();
    let codegen = project.registry.find_task("codegen").unwrap();

    let mut runner = Runner::new(&mut project.registry);
    let mut events = runner.subscribe();
    runner.execute(build, Options::new()).await.unwrap();
    drop(runner);

    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            UnitEvent::Start(codegen),
            UnitEvent::Skipped(codegen),
            UnitEvent::Start(build),
            UnitEvent::Stop(build),
        ]
    );
    assert_eq!(*log.lock(), vec!["build"]);
}

#[tokio::test]
async fn test_run_passes_options_to_hooks() {
    let dir = tempfile::tempdir().unwrap();
    let seen: Arc<Mutex<Option<Options>>> = Arc::default();
    let path = write_config(
        dir.path(),
        r#"
argot_version: "0.1.0"
name: app
commands:
  - name: build
    run: make
    options:
      - name: profile
        value: true
"#,
    );
    let sink = Arc::clone(&seen);
    let mut project = load_config(Some(&path), move |_| {
        let sink = Arc::clone(&sink);
        Hooks::new().exec(move |ctx| {
            let sink = Arc::clone(&sink);
            async move {
                *sink.lock() = Some((*ctx.options).clone());
                HookResult::Ok(())
            }
        })
    })
    .unwrap();

    let plan = project.resolve(&["build", "--profile", "release"]);
    let (unit, item) = plan.commands().next().unwrap();
    let options = item.options.clone();
    Runner::new(&mut project.registry)
        .run(unit, options)
        .await
        .unwrap();

    let captured = seen.lock().clone().unwrap();
    assert_eq!(
        captured.get("profile"),
        Some(&OptionValue::Value("release".to_string()))
    );
}

#[tokio::test]
async fn test_run_failure_still_fires_after_all() {
    let dir = tempfile::tempdir().unwrap();
    let log = Log::default();
    let path = write_config(
        dir.path(),
        r#"
argot_version: "0.1.0"
name: app
commands:
  - name: build
    run: make
    depends_on: [report]
tasks:
  - name: report
    after_all: summary
"#,
    );
    let mut project = load_config(Some(&path), |unit: &UnitConfig| {
        let mut hooks = recording_hooks(&log)(unit);
        if unit.name == "build" {
            hooks = hooks.exec(|_| fail("compile error"));
        }
        hooks
    })
    .unwrap();

    let build = project.plan.child(project.plan.root(), "build").unwrap();
    let build = project.plan.node(build).command.unwrap();
    let result = Runner::new(&mut project.registry)
        .execute(build, Options::new())
        .await;
    match result {
        Err(RunError::Hook { unit, .. }) => assert_eq!(unit, "build"),
        other => panic!("Expected a hook failure, got: {other:?}"),
    }
    assert_eq!(*log.lock(), vec!["report:after_all"]);
}
