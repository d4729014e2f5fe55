// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Installs/starts/stops the daemon as a systemd user service. The service
//! manager itself is an external collaborator; this module only writes the
//! unit file and shells out to `systemctl --user`.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

const UNIT_NAME: &str = "edgebridge.service";

fn unit_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/systemd/user"))
}

fn unit_path() -> Option<PathBuf> {
    unit_dir().map(|dir| dir.join(UNIT_NAME))
}

fn unit_contents() -> anyhow::Result<String> {
    let exe = std::env::current_exe()?;
    Ok(format!(
        "[Unit]\nDescription=edgebridge access-control daemon\nAfter=network-online.target\n\n[Service]\nExecStart={} run\nRestart=on-failure\nRestartSec=5\n\n[Install]\nWantedBy=default.target\n",
        exe.display()
    ))
}

pub fn install() -> i32 {
    let Some(path) = unit_path() else {
        eprintln!("error: HOME is not set, cannot locate systemd user unit directory");
        return 1;
    };
    if path.exists() {
        eprintln!("error: {} already installed", UNIT_NAME);
        return 4;
    }
    let contents = match unit_contents() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    if let Some(dir) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("error: creating {}: {e}", dir.display());
            return 1;
        }
    }
    let mut file = match std::fs::File::create(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: writing {}: {e}", path.display());
            return 1;
        }
    };
    if let Err(e) = file.write_all(contents.as_bytes()) {
        eprintln!("error: writing {}: {e}", path.display());
        return 1;
    }
    if !run_systemctl(&["--user", "daemon-reload"]) {
        return 1;
    }
    if !run_systemctl(&["--user", "enable", UNIT_NAME]) {
        return 1;
    }
    println!("installed {} at {}", UNIT_NAME, path.display());
    0
}

pub fn uninstall() -> i32 {
    let Some(path) = unit_path() else {
        eprintln!("error: HOME is not set, cannot locate systemd user unit directory");
        return 1;
    };
    if !path.exists() {
        eprintln!("error: {} is not installed", UNIT_NAME);
        return 1;
    }
    run_systemctl(&["--user", "disable", "--now", UNIT_NAME]);
    if let Err(e) = std::fs::remove_file(&path) {
        eprintln!("error: removing {}: {e}", path.display());
        return 1;
    }
    run_systemctl(&["--user", "daemon-reload"]);
    println!("uninstalled {}", UNIT_NAME);
    0
}

pub fn start() -> i32 {
    let Some(path) = unit_path() else {
        eprintln!("error: HOME is not set, cannot locate systemd user unit directory");
        return 1;
    };
    if !path.exists() {
        eprintln!("error: {} is not installed; run `install` first", UNIT_NAME);
        return 1;
    }
    let status = Command::new("systemctl").args(["--user", "is-active", "--quiet", UNIT_NAME]).status();
    if matches!(status, Ok(s) if s.success()) {
        eprintln!("error: {} is already running", UNIT_NAME);
        return 4;
    }
    if !run_systemctl(&["--user", "start", UNIT_NAME]) {
        return 1;
    }
    println!("started {}", UNIT_NAME);
    0
}

pub fn stop() -> i32 {
    if !run_systemctl(&["--user", "stop", UNIT_NAME]) {
        return 1;
    }
    println!("stopped {}", UNIT_NAME);
    0
}

fn run_systemctl(args: &[&str]) -> bool {
    match Command::new("systemctl").args(args).status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            eprintln!("error: systemctl {} exited with {status}", args.join(" "));
            false
        }
        Err(e) => {
            eprintln!("error: failed to run systemctl: {e}");
            false
        }
    }
}
