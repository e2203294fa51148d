//! Task file parsing and discovery

use crate::config::types::{Action, ActionDetail, Config, Task};
use crate::error::{ConfigError, ConfigResult, MakeflowError};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default task file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["makeflow.yml", "makeflow.yaml"];

/// Find the task file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the task file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a task file from a path, following its includes
pub fn parse_config_file(path: &Path) -> Result<Config, MakeflowError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e))
    })?;

    parse_config(&contents, Some(path))
}

/// Parse a task file from a string
///
/// Includes are only followed when the file's own path is known, since
/// they are resolved relative to it.
pub fn parse_config(yaml: &str, config_path: Option<&Path>) -> Result<Config, MakeflowError> {
    let mut config: Config = serde_yaml::from_str(yaml)?;

    if let Some(path) = config_path {
        let mut chain = vec![canonical(path)];
        process_includes(&mut config, path, &mut chain)?;
    }

    Ok(config)
}

/// Parse with automatic file discovery
pub fn parse_config_auto() -> Result<(Config, PathBuf), MakeflowError> {
    let config_path = find_config_file()?;
    let config = parse_config_file(&config_path)?;
    Ok((config, config_path))
}

/// Merge included files into `config`.
///
/// Included variables are declared ahead of the including file's own, so
/// the includer can redefine them; included tasks are appended after its own.
fn process_includes(
    config: &mut Config,
    config_path: &Path,
    chain: &mut Vec<PathBuf>,
) -> Result<(), MakeflowError> {
    if config.include.is_empty() {
        return Ok(());
    }

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let mut included_vars = Vec::new();
    let mut included_tasks = Vec::new();
    let mut included_dotenv = Vec::new();

    for include in std::mem::take(&mut config.include) {
        let full_path = base_dir.join(&include);
        let key = canonical(&full_path);
        if chain.contains(&key) {
            return Err(ConfigError::IncludeFile {
                path: full_path,
                error: "include cycle".to_string(),
            }
            .into());
        }

        debug!(path = %full_path.display(), "including task file");
        let mut included = load_included(&full_path)?;

        chain.push(key);
        process_includes(&mut included, &full_path, chain)?;
        chain.pop();

        // Relative dotenv paths in an included file stay relative to that file
        let resolved = canonical(&full_path);
        let included_dir = resolved.parent().unwrap_or_else(|| Path::new("."));
        included_dotenv.extend(
            included
                .dotenv
                .iter()
                .map(|p| included_dir.join(p).display().to_string()),
        );
        included_vars.extend(included.vars);

        let prefix = Path::new(&include).parent().unwrap_or_else(|| Path::new(""));
        included_tasks.extend(
            included
                .tasks
                .into_iter()
                .map(|(name, task)| {
                    let task = rebase_task(&name, task, prefix);
                    (name, task)
                }),
        );
    }

    included_vars.append(&mut config.vars);
    config.vars = included_vars;
    config.tasks.extend(included_tasks);
    included_dotenv.append(&mut config.dotenv);
    config.dotenv = included_dotenv;

    Ok(())
}

/// Move an included task's paths under the included file's directory.
///
/// `prefix` is the include's directory relative to the including file.
/// Actions run from that directory unless they name their own `dir`.
/// Absolute paths and paths starting with a placeholder are left alone.
fn rebase_task(name: &str, mut task: Task, prefix: &Path) -> Task {
    if prefix.as_os_str().is_empty() {
        return task;
    }

    if task.phony == Some(false) && task.output.is_none() {
        task.output = Some(name.to_string());
    }
    task.output = task.output.map(|output| rebase_path(&output, prefix));
    task.sources = task
        .sources
        .iter()
        .map(|source| rebase_path(source, prefix))
        .collect();
    for action in &mut task.run {
        match action {
            Action::Simple(exec) => {
                *action = Action::Complex(ActionDetail {
                    exec: std::mem::take(exec),
                    print: None,
                    quiet: false,
                    dir: Some(prefix.display().to_string()),
                });
            }
            Action::Complex(detail) => {
                detail.dir = Some(match detail.dir.take() {
                    Some(dir) => rebase_path(&dir, prefix),
                    None => prefix.display().to_string(),
                });
            }
        }
    }

    task
}

fn rebase_path(path: &str, prefix: &Path) -> String {
    if path.starts_with('$') || Path::new(path).is_absolute() {
        return path.to_string();
    }
    prefix.join(path).display().to_string()
}

fn load_included(path: &Path) -> Result<Config, MakeflowError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    Ok(config)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Read the config's dotenv files, relative to `base_dir`.
///
/// Later files do not replace keys set by earlier ones.
pub fn load_dotenv_files(config: &Config, base_dir: &Path) -> ConfigResult<HashMap<String, String>> {
    let mut values = HashMap::new();

    for file in &config.dotenv {
        let path = base_dir.join(file);
        let iter = dotenvy::from_path_iter(&path).map_err(|e| ConfigError::IncludeFile {
            path: path.clone(),
            error: e.to_string(),
        })?;

        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::IncludeFile {
                path: path.clone(),
                error: e.to_string(),
            })?;
            values.entry(key).or_insert(value);
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
tasks:
  hello:
    usage: Say hello
    run: echo "hello"
"#;
        let config = parse_config(yaml, None).unwrap();
        assert_eq!(config.tasks.len(), 1);
        assert!(config.task("hello").is_some());
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("makeflow.yml");

        fs::write(&config_path, "tasks:\n  test:\n    run: echo test\n").unwrap();

        let found = find_config_file_from(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("makeflow.yml");
        let sub_dir = temp_dir.path().join("subdir");

        fs::create_dir(&sub_dir).unwrap();
        fs::write(&config_path, "tasks:\n  test:\n    run: echo test\n").unwrap();

        let found = find_config_file_from(sub_dir).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_config_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_config_file_from(temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_includes_are_merged() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("common.yml"),
            r#"
vars:
  - REGISTRY=registry.local
tasks:
  login:
    run: echo login
"#,
        )
        .unwrap();
        let main = temp_dir.path().join("makeflow.yml");
        fs::write(
            &main,
            r#"
include: [common.yml]
vars:
  - IMAGE=$(REGISTRY)/app
tasks:
  push:
    deps: [login]
"#,
        )
        .unwrap();

        let config = parse_config_file(&main).unwrap();
        let vars: Vec<String> = config
            .assignments()
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(vars, vec!["REGISTRY", "IMAGE"]);
        let tasks: Vec<&str> = config.tasks.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(tasks, vec!["push", "login"]);
        assert!(config.include.is_empty());
    }

    #[test]
    fn test_included_task_paths_follow_the_included_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("web")).unwrap();
        fs::write(
            temp_dir.path().join("web/tasks.yml"),
            r#"
tasks:
  bundle:
    output: dist/bundle.js
    sources: ["src/*.ts", "/abs/*.ts", "$(ROOT)/shared/*.ts"]
    run:
      - npm run build
      - exec: cp dist/bundle.js ../public
        dir: scripts
  assets:
    phony: false
    run: cp -r static assets
"#,
        )
        .unwrap();
        let main = temp_dir.path().join("makeflow.yml");
        fs::write(&main, "include: [web/tasks.yml]\ntasks:\n  all:\n    deps: [bundle]\n").unwrap();

        let config = parse_config_file(&main).unwrap();
        let bundle = config.task("bundle").unwrap();
        assert_eq!(bundle.output.as_deref(), Some("web/dist/bundle.js"));
        assert_eq!(
            bundle.sources,
            vec!["web/src/*.ts", "/abs/*.ts", "$(ROOT)/shared/*.ts"]
        );
        let dirs: Vec<Option<&str>> = bundle
            .run
            .iter()
            .map(|action| match action {
                Action::Complex(detail) => detail.dir.as_deref(),
                Action::Simple(_) => None,
            })
            .collect();
        assert_eq!(dirs, vec![Some("web"), Some("web/scripts")]);

        let assets = config.task("assets").unwrap();
        assert_eq!(assets.output.as_deref(), Some("web/assets"));
        assert!(!assets.is_phony());

        // Tasks of the including file are untouched
        assert!(config.task("all").unwrap().output.is_none());
    }

    #[test]
    fn test_include_cycle_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.yml"), "include: [b.yml]\n").unwrap();
        fs::write(temp_dir.path().join("b.yml"), "include: [a.yml]\n").unwrap();

        let result = parse_config_file(&temp_dir.path().join("a.yml"));
        assert!(matches!(
            result,
            Err(MakeflowError::Config(ConfigError::IncludeFile { .. }))
        ));
    }

    #[test]
    fn test_missing_include() {
        let temp_dir = TempDir::new().unwrap();
        let main = temp_dir.path().join("makeflow.yml");
        fs::write(&main, "include: [missing.yml]\n").unwrap();

        let result = parse_config_file(&main);
        assert!(matches!(
            result,
            Err(MakeflowError::Config(ConfigError::IncludeFile { .. }))
        ));
    }

    #[test]
    fn test_load_dotenv_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".env"), "SECRETS=s3cr3t\nTAG=fromfile\n").unwrap();
        fs::write(temp_dir.path().join(".env.local"), "TAG=ignored\nEXTRA=1\n").unwrap();

        let config = parse_config("dotenv: [.env, .env.local]\n", None).unwrap();
        let values = load_dotenv_files(&config, temp_dir.path()).unwrap();
        assert_eq!(values.get("SECRETS").map(String::as_str), Some("s3cr3t"));
        assert_eq!(values.get("TAG").map(String::as_str), Some("fromfile"));
        assert_eq!(values.get("EXTRA").map(String::as_str), Some("1"));
    }
}
