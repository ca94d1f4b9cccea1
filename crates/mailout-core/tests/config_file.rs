//! Scenario tests for configuration loading against real files and the
//! default config location.
//!
//! The default location is derived from `HOME`/`XDG_CONFIG_HOME`, so every
//! test in this binary serializes on a process-wide lock before touching or
//! depending on the environment.

#![allow(unsafe_code)]

use mailout_core::{Error, Message, from_config_file, get_default_configpath, resolve_path};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_env(key: &str, value: impl AsRef<OsStr>) {
    // SAFETY: every test in this binary holds ENV_LOCK while reading or
    // writing the environment, so no concurrent access can occur.
    unsafe { std::env::set_var(key, value) };
}

/// Points the default config location into `home` and returns it.
fn redirect_home(home: &TempDir) -> PathBuf {
    set_env("HOME", home.path());
    set_env("XDG_CONFIG_HOME", home.path().join(".config"));
    get_default_configpath()
}

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn message() -> Message {
    Message::from_bytes(b"From: me@here\r\nTo: you@there\r\nSubject: hi\r\n\r\nhello\r\n".to_vec())
}

#[test]
fn test_null_method_at_the_default_location() {
    let _guard = env_lock();
    let home = TempDir::new().unwrap();
    let default = redirect_home(&home);
    write_file(&default, "[outgoing]\nmethod = \"null\"\n");

    let mut sender = from_config_file(None, Some("outgoing"), false).unwrap();
    assert_eq!(sender.configpath(), Some(default.as_path()));

    sender.open().unwrap();
    sender.send(&message()).unwrap();
    sender.close().unwrap();
}

#[test]
fn test_fallback_reaches_the_default_file() {
    let _guard = env_lock();
    let home = TempDir::new().unwrap();
    let default = redirect_home(&home);
    write_file(&default, "[outgoing]\nmethod = \"null\"\n");

    let custom = home.path().join("elsewhere").join("app.toml");
    write_file(&custom, "[unrelated]\nkey = \"value\"\n");

    let through_fallback = from_config_file(Some(&custom), Some("outgoing"), true).unwrap();
    let direct = from_config_file(None, Some("outgoing"), false).unwrap();
    assert_eq!(through_fallback.configpath(), Some(default.as_path()));
    assert_eq!(through_fallback.configpath(), direct.configpath());
}

#[test]
fn test_failed_fallback_reports_both_files() {
    let _guard = env_lock();
    let home = TempDir::new().unwrap();
    let default = redirect_home(&home);

    let custom = home.path().join("elsewhere").join("app.toml");
    write_file(&custom, "[unrelated]\nkey = \"value\"\n");

    let err = from_config_file(Some(&custom), Some("outgoing"), true).unwrap_err();
    let Error::MissingConfig(inner) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(inner.configpaths, vec![default.clone(), custom.clone()]);
    assert_eq!(
        inner.to_string(),
        format!(
            "outgoing configuration not found in files: {}, {}",
            default.display(),
            custom.display()
        )
    );
}

#[test]
fn test_no_fallback_from_the_default_file_itself() {
    let _guard = env_lock();
    let home = TempDir::new().unwrap();
    let default = redirect_home(&home);

    let err = from_config_file(None, Some("outgoing"), true).unwrap_err();
    let Error::MissingConfig(inner) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(inner.configpaths, vec![default]);
}

#[test]
fn test_tilde_paths_ignore_the_configpath() {
    let _guard = env_lock();
    let home = TempDir::new().unwrap();
    set_env("HOME", home.path());

    let resolved = resolve_path(
        Path::new("~/foo/bar.txt"),
        Some(Path::new("/home/alice/conf/settings.toml")),
    );
    assert_eq!(resolved, home.path().join("foo").join("bar.txt"));
}

#[test]
fn test_relative_mbox_path_lands_beside_the_config_file() {
    let _guard = env_lock();
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("mailout.toml");
    fs::write(
        &config,
        "[outgoing]\nmethod = \"mbox\"\npath = \"inbox.mbox\"\n",
    )
    .unwrap();

    let mut sender = from_config_file(Some(&config), Some("outgoing"), false).unwrap();
    sender.send(&message()).unwrap();

    let written = fs::read_to_string(dir.path().join("inbox.mbox")).unwrap();
    assert!(written.starts_with("From me@here "));
    assert!(written.contains("Subject: hi"));
}
