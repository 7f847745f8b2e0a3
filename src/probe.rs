use std::env;
use std::fmt;
use std::process::Command;
use tracing::debug;

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            _ => Self::Other,
        }
    }

    fn os_name(self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::MacOs => "Darwin",
            Self::Other => env::consts::OS,
        }
    }
}

pub trait CommandRunner {
    /// Trimmed stdout of a successful run, or `None`.
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let output = match Command::new(program).args(args).output() {
            Ok(output) => output,
            Err(err) => {
                debug!(program, error = %err, "probe command unavailable");
                return None;
            }
        };
        if !output.status.success() {
            debug!(program, status = %output.status, "probe command failed");
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!stdout.is_empty()).then_some(stdout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemFacts {
    pub os: String,
    pub python: String,
    pub cpu: String,
    pub memory: String,
    pub gpu: String,
    pub local_ip: String,
    pub shell: String,
    pub terminal: String,
}

impl fmt::Display for SystemFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OS: {}", self.os)?;
        writeln!(f, "Python: {}", self.python)?;
        writeln!(f, "CPU: {}", self.cpu)?;
        writeln!(f, "Memory: {}", self.memory)?;
        writeln!(f, "GPU: {}", self.gpu)?;
        writeln!(f, "Local IP: {}", self.local_ip)?;
        writeln!(f, "Shell: {}", self.shell)?;
        write!(f, "Terminal: {}", self.terminal)
    }
}

pub fn probe() -> SystemFacts {
    probe_with(Platform::current(), &SystemCommandRunner, |key| env::var(key).ok())
}

pub fn probe_with(
    platform: Platform,
    runner: &impl CommandRunner,
    get_var: impl Fn(&str) -> Option<String>,
) -> SystemFacts {
    let run = |program: &str, args: &[&str]| runner.run(program, args);

    let os = match run("uname", &["-r"]) {
        Some(release) => format!("{} {}", platform.os_name(), release),
        None => platform.os_name().to_string(),
    };
    let python = run("python3", &["--version"])
        .map(|version| version.trim_start_matches("Python ").to_string());

    let (cpu, memory, gpu, local_ip) = match platform {
        Platform::Linux => (
            run("grep", &["-m1", "model name", "/proc/cpuinfo"])
                .map(|line| after_colon(&line)),
            run("grep", &["MemTotal", "/proc/meminfo"]).map(|line| after_colon(&line)),
            run("lshw", &["-C", "display"]),
            run("hostname", &["-I"]),
        ),
        Platform::MacOs => (
            run("sysctl", &["-n", "machdep.cpu.brand_string"]),
            run("sysctl", &["-n", "hw.memsize"]).map(|bytes| format_bytes(&bytes)),
            run("system_profiler", &["SPDisplaysDataType"]),
            run("ipconfig", &["getifaddr", "en0"]),
        ),
        Platform::Other => (None, None, None, None),
    };

    SystemFacts {
        os,
        python: or_unknown(python),
        cpu: or_unknown(cpu),
        memory: or_unknown(memory),
        gpu: or_unknown(gpu),
        local_ip: or_unknown(local_ip),
        shell: or_unknown(get_var("SHELL")),
        terminal: or_unknown(get_var("TERM_PROGRAM")),
    }
}

fn or_unknown(value: Option<String>) -> String {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn after_colon(line: &str) -> String {
    line.split_once(':')
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_else(|| line.trim().to_string())
}

fn format_bytes(raw: &str) -> String {
    match raw.trim().parse::<u64>() {
        Ok(bytes) => format!("{} GB", bytes / (1024 * 1024 * 1024)),
        Err(_) => raw.trim().to_string(),
    }
}
