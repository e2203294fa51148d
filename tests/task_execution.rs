//! Integration tests for task execution

mod common;

use common::{create_test_config, read};
use makeflow::cli::App;
use makeflow::error::{ExecutionError, MakeflowError, TaskError, VariableError};
use makeflow::runner::Verbosity;
use std::collections::HashMap;
use std::fs::{self, File};
use std::time::{Duration, SystemTime};

fn load(content: &str) -> (tempfile::TempDir, App) {
    let (dir, path) = create_test_config(content);
    let app = App::with_config_file(path).unwrap();
    (dir, app)
}

fn run(app: &App, targets: &[&str], overrides: &[(&str, &str)]) -> makeflow::Result<()> {
    let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
    let overrides: HashMap<String, String> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    app.run_targets(&targets, &overrides, Verbosity::Silent, false)
}

#[test]
fn test_prerequisites_run_first() {
    let (dir, app) = load(
        r#"
tasks:
  A:
    run: echo A >> order
  B:
    deps: [A]
    run: echo B >> order
  C:
    deps: [A, B]
    run: echo C >> order
"#,
    );

    run(&app, &["C"], &[]).unwrap();
    assert_eq!(read(dir.path(), "order"), "A\nB\nC\n");
}

#[test]
fn test_failing_action_stops_the_run() {
    let (dir, app) = load(
        r#"
tasks:
  X:
    run:
      - exit 3
      - touch second-action
  after:
    deps: [X]
    run: touch after
"#,
    );

    let err = run(&app, &["after"], &[]).unwrap_err();
    assert_eq!(err.exit_code(), 3);
    match err {
        MakeflowError::Execution(ExecutionError::ActionFailed {
            task,
            action_index,
            command,
            position,
            plan_len,
            ..
        }) => {
            assert_eq!(task, "X");
            assert_eq!(action_index, 0);
            assert_eq!(command, "exit 3");
            assert_eq!((position, plan_len), (1, 2));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("second-action").exists());
    assert!(!dir.path().join("after").exists());
}

#[test]
fn test_override_wins_over_default() {
    let (dir, app) = load(
        r#"
vars:
  - TAG=localbuild
  - IMAGE=registry.local/app:$(TAG)
tasks:
  tag:
    run: echo $(IMAGE) > image
"#,
    );

    run(&app, &["tag"], &[]).unwrap();
    assert_eq!(read(dir.path(), "image"), "registry.local/app:localbuild\n");

    run(&app, &["tag"], &[("TAG", "ci123")]).unwrap();
    assert_eq!(read(dir.path(), "image"), "registry.local/app:ci123\n");
}

#[test]
fn test_exported_variables_reach_actions() {
    let (dir, app) = load(
        r#"
vars:
  - name: STAGE
    value: staging
    export: true
  - HIDDEN=secret
tasks:
  env:
    run: echo "${STAGE}-${HIDDEN:-unset}" > env
"#,
    );

    run(&app, &["env"], &[]).unwrap();
    assert_eq!(read(dir.path(), "env"), "staging-unset\n");
}

#[test]
fn test_undefined_variable_before_any_action() {
    let (dir, app) = load(
        r#"
tasks:
  first:
    run: touch first
  second:
    deps: [first]
    run: echo $(MISSING_VARIABLE_FOR_TEST)
"#,
    );

    let err = run(&app, &["second"], &[]).unwrap_err();
    assert!(matches!(
        err,
        MakeflowError::Variable(VariableError::UndefinedVariable { ref name })
            if name == "MISSING_VARIABLE_FOR_TEST"
    ));
    assert_eq!(err.exit_code(), 2);
    assert!(!dir.path().join("first").exists());
}

#[test]
fn test_cycle_runs_nothing() {
    let (dir, app) = load(
        r#"
tasks:
  A:
    deps: [B]
    run: touch a
  B:
    deps: [A]
    run: touch b
"#,
    );

    let err = run(&app, &["A"], &[]).unwrap_err();
    assert!(matches!(
        err,
        MakeflowError::Task(TaskError::CyclicDependency { .. })
    ));
    assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");
    assert!(fs::read_dir(dir.path()).unwrap().count() == 1);
}

#[test]
fn test_computed_variable_once_per_run() {
    let (dir, app) = load(
        r#"
vars:
  - SHA!=echo call >> calls; echo abc123
tasks:
  build:
    run: echo build-$(SHA) >> out
  push:
    deps: [build]
    run: echo push-$(SHA) >> out
"#,
    );

    run(&app, &["push"], &[]).unwrap();
    assert_eq!(read(dir.path(), "calls"), "call\n");
    assert_eq!(read(dir.path(), "out"), "build-abc123\npush-abc123\n");
}

#[test]
fn test_computed_variable_failure() {
    let (dir, app) = load(
        r#"
vars:
  - SHA!=exit 4
tasks:
  push:
    run: touch pushed-$(SHA)
"#,
    );

    let err = run(&app, &["push"], &[]).unwrap_err();
    assert!(matches!(
        err,
        MakeflowError::Variable(VariableError::ComputedVariableFailed { .. })
    ));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_file_target_staleness_with_sources() {
    let (dir, app) = load(
        r#"
tasks:
  bundle:
    output: dist/bundle.txt
    sources: ["src/*.txt"]
    run:
      - echo built >> builds
      - mkdir -p dist && cat src/*.txt > dist/bundle.txt
"#,
    );
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/a.txt"), "a\n").unwrap();

    run(&app, &["bundle"], &[]).unwrap();
    run(&app, &["bundle"], &[]).unwrap();
    assert_eq!(read(dir.path(), "builds"), "built\n");

    // Push the source into the future so it is strictly newer than the bundle
    let source = File::options()
        .write(true)
        .open(dir.path().join("src/a.txt"))
        .unwrap();
    source
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    run(&app, &["bundle"], &[]).unwrap();
    assert_eq!(read(dir.path(), "builds"), "built\nbuilt\n");
}

#[test]
fn test_actions_run_in_task_file_directory() {
    let (dir, app) = load(
        r#"
tasks:
  where:
    run:
      - pwd > where
      - exec: pwd > here
        dir: subdir
"#,
    );
    fs::create_dir(dir.path().join("subdir")).unwrap();

    run(&app, &["where"], &[]).unwrap();
    let root = dir.path().canonicalize().unwrap();
    let recorded = fs::canonicalize(read(dir.path(), "where").trim()).unwrap();
    assert_eq!(recorded, root);
    assert!(dir.path().join("subdir/here").exists());
}

#[test]
fn test_dotenv_sits_under_conditional_declaration() {
    let (dir, app) = {
        let (dir, path) = create_test_config(
            r#"
dotenv: [".env"]
vars:
  - MAKEFLOW_IT_REGION?=us-east-1
  - MAKEFLOW_IT_ZONE=a
tasks:
  show:
    run: echo $(MAKEFLOW_IT_REGION)-$(MAKEFLOW_IT_ZONE) > region
"#,
        );
        fs::write(
            dir.path().join(".env"),
            "MAKEFLOW_IT_REGION=eu-west-1\nMAKEFLOW_IT_ZONE=b\n",
        )
        .unwrap();
        let app = App::with_config_file(path).unwrap();
        (dir, app)
    };

    run(&app, &["show"], &[]).unwrap();
    assert_eq!(read(dir.path(), "region"), "eu-west-1-a\n");
}

#[test]
fn test_dry_run_leaves_no_trace() {
    let (dir, app) = load(
        r#"
tasks:
  make:
    run: touch made
"#,
    );

    app.run_targets(&["make".to_string()], &HashMap::new(), Verbosity::Silent, true)
        .unwrap();
    assert!(!dir.path().join("made").exists());
}
