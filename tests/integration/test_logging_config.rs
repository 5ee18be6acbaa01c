use hephestos::cli::{Command, ProcessArgs, RunArgs, ValidateArgs};
use hephestos::logging::config::{LogFormat, LoggingConfig};
use hephestos::logging::layers::file::{log_file_path, LOG_FILE_NAME};
use hephestos::logging::{detect_context, ConsoleOutput, ExecutionContext};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_logging_env() {
    for v in &["HEPHESTOS_LOG_DIR", "HEPHESTOS_LOG_FORMAT", "HEPHESTOS_WORKER"] {
        env::remove_var(v);
    }
}

fn write_logging_toml(workspace: &std::path::Path, content: &str) {
    let dir = workspace.join(".hephestos").join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("logging.toml"), content).unwrap();
}

fn run_command() -> Command {
    Command::Run(RunArgs {
        workflow: PathBuf::from("order.json"),
        context: None,
        config: None,
        workspace: None,
    })
}

fn process_command() -> Command {
    Command::Process(ProcessArgs {
        definitions: PathBuf::from("workflows"),
        shop: "acme".to_string(),
        event: PathBuf::from("event.json"),
        config: None,
        workspace: None,
    })
}

#[test]
#[serial]
fn defaults_without_workspace_config() {
    clear_logging_env();
    let temp_dir = TempDir::new().unwrap();
    let config = LoggingConfig::load(Some(temp_dir.path())).unwrap();
    assert_eq!(config.default_level, "info");
    assert!(config.enable_file);
    assert_eq!(config.console_output, None);
    assert_eq!(config.format, LogFormat::Text);

    let path = log_file_path(&config, Some(temp_dir.path())).unwrap();
    assert!(path.ends_with(
        PathBuf::from(".hephestos")
            .join("logs")
            .join(LOG_FILE_NAME)
    ));
}

#[test]
#[serial]
fn workspace_logging_toml_is_applied() {
    clear_logging_env();
    let temp_dir = TempDir::new().unwrap();
    write_logging_toml(
        temp_dir.path(),
        r#"
[logging]
log_dir = "var/log"
default_level = "hephestos=debug,warn"
enable_file = false
console_output = "stdout"
format = "json"
"#,
    );

    let config = LoggingConfig::load(Some(temp_dir.path())).unwrap();
    assert_eq!(config.default_level, "hephestos=debug,warn");
    assert!(!config.enable_file);
    assert_eq!(config.console_output, Some(ConsoleOutput::Stdout));
    assert_eq!(config.format, LogFormat::Json);

    let path = log_file_path(&config, Some(temp_dir.path())).unwrap();
    assert!(path.ends_with(PathBuf::from("var").join("log").join(LOG_FILE_NAME)));
}

#[test]
#[serial]
fn env_overrides_win_over_file() {
    clear_logging_env();
    let temp_dir = TempDir::new().unwrap();
    write_logging_toml(temp_dir.path(), "[logging]\nformat = \"json\"\n");
    let custom_dir = TempDir::new().unwrap();

    env::set_var("HEPHESTOS_LOG_FORMAT", "text");
    env::set_var("HEPHESTOS_LOG_DIR", custom_dir.path());
    let result = LoggingConfig::load(Some(temp_dir.path()));
    clear_logging_env();

    let config = result.unwrap();
    assert_eq!(config.format, LogFormat::Text);
    assert_eq!(config.log_dir.as_deref(), Some(custom_dir.path()));
}

#[test]
#[serial]
fn invalid_level_and_format_are_rejected() {
    clear_logging_env();
    let temp_dir = TempDir::new().unwrap();
    write_logging_toml(temp_dir.path(), "[logging]\ndefault_level = \"hephestos=loud\"\n");
    let err = LoggingConfig::load(Some(temp_dir.path())).unwrap_err();
    assert!(err.to_string().contains("default_level"));

    let other = TempDir::new().unwrap();
    env::set_var("HEPHESTOS_LOG_FORMAT", "xml");
    let result = LoggingConfig::load(Some(other.path()));
    clear_logging_env();
    assert!(result.unwrap_err().to_string().contains("logging.format"));
}

#[test]
#[serial]
fn relative_log_dir_cannot_leave_the_workspace() {
    clear_logging_env();
    let temp_dir = TempDir::new().unwrap();
    write_logging_toml(temp_dir.path(), "[logging]\nlog_dir = \"../../outside\"\n");
    let config = LoggingConfig::load(Some(temp_dir.path())).unwrap();
    assert!(log_file_path(&config, Some(temp_dir.path())).is_err());
}

#[test]
#[serial]
fn commands_map_to_execution_contexts() {
    clear_logging_env();
    assert_eq!(detect_context(&run_command()), ExecutionContext::Interactive);
    assert_eq!(
        detect_context(&Command::Validate(ValidateArgs {
            workflow: PathBuf::from("order.json"),
            json: false,
        })),
        ExecutionContext::Interactive
    );
    assert_eq!(detect_context(&process_command()), ExecutionContext::Batch);
    assert!(ExecutionContext::Batch.quiet_by_default());

    env::set_var("HEPHESTOS_WORKER", "1");
    let context = detect_context(&process_command());
    clear_logging_env();
    assert_eq!(context, ExecutionContext::Worker);
}
