use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[city]\n"
        + "field_width = 1000\n"
        + "field_height = 500\n"
        + "n_houses = 60\n"
        + "n_markets = 6\n"
        + "\n"
        + "[init]\n"
        + "n_people = 300\n"
        + "n_sick = 10\n"
        + "seed = 1234\n"
        + "\n"
        + "[driver]\n"
        + "prob_go_home = 0.05\n"
        + "\n"
        + "[output]\n"
        + "ticks_per_save = 16\n"
        + "saves_per_file = 32\n"
        + "save_people = true\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) -> bool {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_contagion"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        output.status.success()
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--sim-dir", test_dir_str, "create"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "create"]));

    assert!(run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]));

    let run_dir = test_dir.join("run-0000");
    assert!(run_dir.join("trajectory-0000.msgpack").is_file());
    assert!(run_dir.join("trajectory-0001.msgpack").is_file());
    assert!(run_dir.join("checkpoint.msgpack").is_file());

    assert!(run_bin(&["--sim-dir", test_dir_str, "analyze"]));
    assert!(run_dir.join("results.msgpack").is_file());
    assert!(test_dir.join("run-0001").join("results.msgpack").is_file());

    assert!(run_bin(&["--sim-dir", test_dir_str, "clean"]));
    assert!(!run_dir.exists());
    assert!(config_path.is_file());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn rejects_invalid_config() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = String::new()
        + "[city]\n"
        + "field_width = 1000\n"
        + "field_height = 500\n"
        + "n_houses = 10\n"
        + "n_markets = 10\n"
        + "\n"
        + "[init]\n"
        + "n_people = 30\n"
        + "n_sick = 1\n"
        + "\n"
        + "[driver]\n"
        + "prob_go_home = 0.05\n"
        + "\n"
        + "[output]\n"
        + "ticks_per_save = 4\n"
        + "saves_per_file = 4\n";

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let output = Command::new(env!("CARGO_BIN_EXE_contagion"))
        .args(["--sim-dir", test_dir_str, "create"])
        .output()
        .expect("failed to execute command");

    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
