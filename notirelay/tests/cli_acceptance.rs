use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    events: PathBuf,
}

impl CliTestEnv {
    fn new(config: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(xdg_config.join("notirelay")).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        fs::write(xdg_config.join("notirelay/config.toml"), config)
            .expect("failed to write config");

        let events = base.join("events.jsonl");
        fs::write(
            &events,
            concat!(
                r#"{"packageName":"com.example.chat","postTime":1705312800000,"extras":{"android.title":"Hi","android.text":"there"}}"#,
                "\n",
                "\n",
                "not json\n",
                r#"{"packageName":"com.example.mail","postTime":1705312800123,"extras":"broken"}"#,
                "\n",
            ),
        )
        .expect("failed to write events");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
            events,
        }
    }

    fn events_arg(&self) -> &str {
        self.events.to_str().expect("temp path should be UTF-8")
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("notirelay"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute notirelay: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "notirelay {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn status_without_server_reports_not_ready_and_persists_device_id() {
    let env = CliTestEnv::new("");

    let output = run_bin(&env, &["status"]);
    assert_success(&["status"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Notification Relay Configuration"));
    assert!(stdout.contains("Server URL:      <not set>"));
    assert!(stdout.contains("Status: Not ready"));

    let device_id = fs::read_to_string(env.xdg_data.join("notirelay/device_id"))
        .expect("device id should be persisted");
    assert!(stdout.contains(device_id.trim()));

    let again = run_bin(&env, &["status"]);
    assert!(String::from_utf8_lossy(&again.stdout).contains(device_id.trim()));
}

#[test]
fn encode_prints_wire_json_and_falls_back_on_bad_extras() {
    let env = CliTestEnv::new("[device]\nid = \"device-1\"\n");
    let args = ["encode", "--input", env.events_arg()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("stdout should be JSON lines"))
        .collect();
    assert_eq!(lines.len(), 2);

    assert_eq!(lines[0]["packageName"], "com.example.chat");
    assert_eq!(lines[0]["title"], "Hi");
    assert_eq!(lines[0]["text"], "there");
    assert_eq!(lines[0]["timestamp"], "2024-01-15T10:00:00.000Z");
    assert_eq!(lines[0]["deviceId"], "device-1");

    assert_eq!(lines[1]["packageName"], "com.example.mail");
    assert!(lines[1]["title"].is_null());
    assert_eq!(lines[1]["extras"], serde_json::json!({}));
    assert_eq!(lines[1]["timestamp"], "2024-01-15T10:00:00.123Z");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 3: skipped"));
}

#[test]
fn relay_requires_configured_server() {
    let env = CliTestEnv::new("");
    let args = ["relay", "--input", env.events_arg()];

    let output = run_bin(&env, &args);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("delivery is not configured"));
}

#[test]
fn relay_drops_events_when_server_unreachable() {
    let env = CliTestEnv::new(
        "[delivery]\nserver_url = \"http://127.0.0.1:1\"\ntimeout_secs = 1\n\n[device]\nid = \"device-1\"\n",
    );
    let args = ["relay", "--input", env.events_arg()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Read:               2"));
    assert!(stdout.contains("Skipped:            1"));
    assert!(stdout.contains("Relayed:            2"));
    assert!(stdout.contains("Delivered:          0"));
    assert!(stdout.contains("Transport failures: 2"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    let failure_lines: Vec<_> = stderr
        .lines()
        .filter(|l| l.contains("transport_failure"))
        .collect();
    assert_eq!(failure_lines.len(), 2, "stderr:\n{}", stderr);
    assert!(failure_lines.iter().any(|l| l.contains("com.example.chat")));
    assert!(failure_lines.iter().all(|l| l.contains("cause=")));
}

#[test]
fn relay_verbose_writes_failures_to_log_file() {
    let env = CliTestEnv::new(
        "[delivery]\nserver_url = \"http://127.0.0.1:1\"\ntimeout_secs = 1\n\n[device]\nid = \"device-1\"\n",
    );
    let args = ["-v", "relay", "--input", env.events_arg()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert!(!String::from_utf8_lossy(&output.stderr).contains("transport_failure"));

    let log_dir = env.xdg_state.join("notirelay");
    let logged: String = fs::read_dir(&log_dir)
        .expect("log dir should exist")
        .map(|entry| fs::read_to_string(entry.expect("dir entry").path()).unwrap_or_default())
        .collect();
    assert_eq!(logged.matches("transport_failure").count(), 2, "log:\n{}", logged);
}

#[test]
fn relay_with_capture_off_sends_nothing() {
    let env = CliTestEnv::new(
        "[delivery]\nserver_url = \"http://127.0.0.1:1\"\n\n[device]\nid = \"device-1\"\n",
    );
    let args = ["relay", "--no-listen", "--input", env.events_arg()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Read:               2"));
    assert!(stdout.contains("Relayed:            0"));
    assert!(stdout.contains("Transport failures: 0"));
}
