//! Fixture trees standing in for /proc and /sys, and a scripted executor.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use uipm_agent::config::SystemPaths;
use uipm_agent::exec::{Executor, RawOutput};

pub const NET_DEV_HEADER: &str = "Inter-|   Receive                                                |  Transmit\n face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n";

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("proc/net")).expect("proc");
        fs::create_dir_all(dir.path().join("sys/class/net")).expect("class/net");
        fs::create_dir_all(dir.path().join("sys/bus/usb/devices")).expect("usb");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> SystemPaths {
        SystemPaths::new(self.proc_root(), self.sys_root())
    }

    pub fn proc_root(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    pub fn sys_root(&self) -> PathBuf {
        self.dir.path().join("sys")
    }

    pub fn write_proc(&self, rel: &str, contents: &str) {
        fs::write(self.proc_root().join(rel), contents).expect("write proc file");
    }

    pub fn remove_proc(&self, rel: &str) {
        let _ = fs::remove_file(self.proc_root().join(rel));
    }

    pub fn write_stat(&self, fields: [u64; 8]) {
        let f: Vec<String> = fields.iter().map(|v| v.to_string()).collect();
        let text = format!(
            "cpu  {} 0 0\ncpu0 {}\nintr 12345\nctxt 999\n",
            f.join(" "),
            f.join(" ")
        );
        self.write_proc("stat", &text);
    }

    pub fn write_net_dev(&self, rows: &[(&str, u64, u64)]) {
        let mut text = NET_DEV_HEADER.to_string();
        for (iface, rx, tx) in rows {
            text.push_str(&format!(
                "{iface:>6}: {rx} 100 0 0 0 0 0 0 {tx} 100 0 0 0 0 0 0\n"
            ));
        }
        self.write_proc("net/dev", &text);
    }

    /// Interface under /sys/class/net with the given flags and MAC.
    pub fn add_iface(&self, name: &str, flags: &str, mac: &str, wireless: bool) {
        let dir = self.sys_root().join("class/net").join(name);
        fs::create_dir_all(&dir).expect("iface dir");
        fs::write(dir.join("flags"), format!("{flags}\n")).expect("flags");
        fs::write(dir.join("address"), format!("{mac}\n")).expect("address");
        if wireless {
            fs::create_dir_all(dir.join("wireless")).expect("wireless");
        }
    }

    pub fn set_ifindex(&self, name: &str, index: u32) {
        let path = self.sys_root().join("class/net").join(name).join("ifindex");
        fs::write(path, format!("{index}\n")).expect("ifindex");
    }

    /// USB device node; `None` attributes are left absent.
    pub fn add_usb(
        &self,
        bus_id: &str,
        class: Option<&str>,
        vendor: Option<&str>,
        product: Option<&str>,
        status: Option<&str>,
    ) {
        let dir = self.sys_root().join("bus/usb/devices").join(bus_id);
        fs::create_dir_all(&dir).expect("usb dir");
        for (attr, val) in [
            ("bDeviceClass", class),
            ("idVendor", vendor),
            ("idProduct", product),
            ("usbip_status", status),
        ] {
            if let Some(v) = val {
                fs::write(dir.join(attr), format!("{v}\n")).expect("usb attr");
            }
        }
    }

    pub fn remove_usb(&self, bus_id: &str) {
        fs::remove_dir_all(self.sys_root().join("bus/usb/devices").join(bus_id)).expect("rm usb");
    }
}

#[derive(Clone)]
pub enum Reply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    NotFound,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Reply::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Replies per program name; unknown programs behave as not installed.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, program: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(program.to_string(), reply);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.first().map(String::as_str) == Some(program))
            .count()
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, program: &str, args: &[&str]) -> io::Result<RawOutput> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().map(|a| a.to_string()));
        self.calls.lock().unwrap().push(call);

        let reply = self.replies.lock().unwrap().get(program).cloned();
        match reply {
            Some(Reply::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(RawOutput {
                success: code == 0,
                code: Some(code),
                stdout: stdout.into_bytes(),
                stderr: stderr.into_bytes(),
            }),
            Some(Reply::NotFound) | None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "No such file or directory",
            )),
        }
    }
}
