//! In-memory stand-ins for the platform tools, shared by adapter tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::runner::{CommandOutput, CommandRunner, CommandSpec};
use super::windows::{
    ENV_CERT, ENV_STORE, ENV_THUMBPRINT, INSTALL_SCRIPT, QUERY_SCRIPT, REMOVE_SCRIPT,
};
use crate::engine::{CryptoEngine, OpensslEngine, Subject};
use crate::error::{PkiError, Result};
use crate::inspect::{Fingerprint, fingerprint_file};

/// Generate a throwaway root into `dir/ca.crt`.
pub(crate) fn write_test_root(dir: &Path) -> (PathBuf, Fingerprint) {
    fs::create_dir_all(dir).unwrap();
    let engine = OpensslEngine::new();
    let key = engine.generate_key(2048).unwrap();
    let cert = engine
        .self_sign_root(&key, &Subject::new("Test Root", "Test"), 1, 30)
        .unwrap();
    let path = dir.join("ca.crt");
    fs::write(&path, cert).unwrap();
    let fp = fingerprint_file(&path).unwrap();
    (path, fp)
}

/// Emulates `security`, PowerShell, `install`, `rm` and the Linux refresh tools.
///
/// Keychains and certificate stores are kept in memory keyed by location id;
/// `install` and `rm` touch the real filesystem so anchor checks see them.
pub(crate) struct FakeRunner {
    tools: HashSet<String>,
    failing: HashSet<String>,
    elevated: bool,
    stores: RefCell<HashMap<String, Vec<Fingerprint>>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl FakeRunner {
    fn with_tools(tools: &[&str], elevated: bool) -> Self {
        Self {
            tools: tools.iter().map(|t| t.to_string()).collect(),
            failing: HashSet::new(),
            elevated,
            stores: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn macos() -> Self {
        Self::with_tools(&["security", "sudo"], false)
    }

    pub(crate) fn linux(elevated: bool) -> Self {
        Self::with_tools(
            &["sudo", "install", "rm", "update-ca-certificates", "update-ca-trust"],
            elevated,
        )
    }

    pub(crate) fn windows() -> Self {
        Self::with_tools(&["pwsh", "powershell"], false)
    }

    /// Every invocation of `program` exits 1.
    pub(crate) fn failing(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    pub(crate) fn without_tool(mut self, name: &str) -> Self {
        self.tools.remove(name);
        self
    }

    pub(crate) fn seed(&self, location: &str, fingerprint: &Fingerprint) {
        self.stores
            .borrow_mut()
            .entry(location.to_string())
            .or_default()
            .push(fingerprint.clone());
    }

    pub(crate) fn holds(&self, location: &str, fingerprint: &Fingerprint) -> bool {
        self.stores
            .borrow()
            .get(location)
            .is_some_and(|fps| fps.contains(fingerprint))
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    fn add(&self, location: &str, fingerprint: Fingerprint) {
        if !self.holds(location, &fingerprint) {
            self.seed(location, &fingerprint);
        }
    }

    fn take(&self, location: &str, fingerprint: &Fingerprint) -> bool {
        let mut stores = self.stores.borrow_mut();
        let Some(fps) = stores.get_mut(location) else {
            return false;
        };
        let before = fps.len();
        fps.retain(|fp| fp != fingerprint);
        fps.len() != before
    }

    fn security(&self, args: &[String]) -> Result<CommandOutput> {
        let keychain = args.last().cloned().unwrap_or_default();
        match args.first().map(String::as_str) {
            Some("find-certificate") => {
                let stdout = self
                    .stores
                    .borrow()
                    .get(&keychain)
                    .map(|fps| {
                        fps.iter()
                            .map(|fp| format!("SHA-1 hash: {fp}\n"))
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                Ok(ok(stdout))
            }
            Some("add-trusted-cert") => {
                let target = value_after(args, "-k").unwrap_or_default();
                let fp = fingerprint_file(Path::new(&keychain))?;
                self.add(&target, fp);
                Ok(ok(String::new()))
            }
            Some("delete-certificate") => {
                let fp = Fingerprint::parse(&value_after(args, "-Z").unwrap_or_default())?;
                if self.take(&keychain, &fp) {
                    Ok(ok(String::new()))
                } else {
                    Ok(exit(44, "The specified item could not be found in the keychain."))
                }
            }
            _ => Ok(exit(1, "unknown security subcommand")),
        }
    }

    fn powershell(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let env = |key: &str| {
            spec.envs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        let store = env(ENV_STORE);
        let script = spec.args.last().map(String::as_str).unwrap_or_default();
        if script == QUERY_SCRIPT {
            let fp = Fingerprint::parse(&env(ENV_THUMBPRINT))?;
            Ok(if self.holds(&store, &fp) { ok(String::new()) } else { exit(3, "") })
        } else if script == INSTALL_SCRIPT {
            let fp = fingerprint_file(Path::new(&env(ENV_CERT)))?;
            self.add(&store, fp);
            Ok(ok(String::new()))
        } else if script == REMOVE_SCRIPT {
            let fp = Fingerprint::parse(&env(ENV_THUMBPRINT))?;
            Ok(if self.take(&store, &fp) { ok(String::new()) } else { exit(3, "") })
        } else {
            Ok(exit(1, "unexpected script"))
        }
    }
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout,
        stderr: String::new(),
    }
}

fn exit(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

fn value_after(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.clone());
        if !self.tools.contains(&spec.program) {
            return Err(PkiError::ToolMissing(format!("`{}` not found on PATH", spec.program)));
        }

        let (program, args) = if spec.program == "sudo" {
            match spec.args.split_first() {
                Some((program, rest)) => (program.as_str(), rest),
                None => return Ok(exit(1, "usage: sudo command")),
            }
        } else {
            (spec.program.as_str(), spec.args.as_slice())
        };
        if self.failing.contains(program) {
            return Ok(exit(1, &format!("{program}: simulated failure")));
        }

        match program {
            "security" => self.security(args),
            "pwsh" | "powershell" => self.powershell(spec),
            "install" => {
                let [.., src, dest] = args else {
                    return Ok(exit(1, "install: missing operand"));
                };
                let dest = Path::new(dest);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| PkiError::FileWrite(parent.to_path_buf(), e))?;
                }
                fs::copy(src, dest).map_err(|e| PkiError::FileWrite(dest.to_path_buf(), e))?;
                Ok(ok(String::new()))
            }
            "rm" => {
                if let Some(target) = args.last() {
                    let _ = fs::remove_file(target);
                }
                Ok(ok(String::new()))
            }
            "update-ca-certificates" | "update-ca-trust" => Ok(ok(String::new())),
            other => Ok(exit(127, &format!("{other}: command not found"))),
        }
    }

    fn tool_exists(&self, name: &str) -> bool {
        self.tools.contains(name)
    }

    fn is_elevated(&self) -> bool {
        self.elevated
    }
}
