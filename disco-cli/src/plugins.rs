//! Check plugins shipped with the command line tool.
//!
//! Agent sections follow the layout of the Linux agent. SNMP sections hold
//! one row per table entry.

use autochecks::Value;
use service_discovery::{CheckRegistry, CheckResult, CheckTypeDescriptor, Error, Result, SectionInput, State};

const SYS_DESCR: &str = ".1.3.6.1.2.1.1.1.0";

const DEFAULT_LEVELS: (f64, f64) = (80.0, 90.0);

/// Registry with all builtin check types.
pub fn builtin_registry() -> CheckRegistry {
    let mut registry = CheckRegistry::new();
    registry
        .register(uptime())
        .register(df())
        .register(mem())
        .register(cpu_loads())
        .register(snmp_uptime())
        .register(hr_cpu())
        .register(snmp_info());
    registry
}

/// One itemless service with empty parameters.
fn single_service(params: &str) -> Option<Vec<Value>> {
    Some(vec![Value::tuple([Value::None, Value::str(params)])])
}

fn words(input: &SectionInput, row: usize) -> Option<&[String]> {
    input.primary.get(row).map(Vec::as_slice)
}

fn number(word: Option<&String>) -> Result<f64> {
    word.and_then(|w| w.trim_end_matches('%').parse::<f64>().ok())
        .ok_or_else(|| Error::Other(format!("not a number: {word:?}")))
}

/// `(warn, crit)` from `params['levels']`, a tuple `params` or the default.
fn levels(params: &Value) -> (f64, f64) {
    let levels = params.get("levels").unwrap_or(params);
    match levels.as_seq() {
        Some([warn, crit]) => match (warn.as_float(), crit.as_float()) {
            (Some(warn), Some(crit)) => (warn, crit),
            _ => DEFAULT_LEVELS,
        },
        _ => DEFAULT_LEVELS,
    }
}

fn level_state(value: f64, (warn, crit): (f64, f64)) -> State {
    if value >= crit {
        State::Crit
    } else if value >= warn {
        State::Warn
    } else {
        State::Ok
    }
}

fn format_uptime(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (days, rest) = (total / 86_400, total % 86_400);
    format!(
        "Up since {days} days {:02}:{:02}:{:02}",
        rest / 3600,
        rest % 3600 / 60,
        rest % 60
    )
}

fn uptime() -> CheckTypeDescriptor {
    CheckTypeDescriptor::new("uptime", "Uptime")
        .discover(|_, input| {
            Ok(words(input, 0)
                .is_some_and(|row| number(row.first()).is_ok())
                .then(|| single_service("{}"))
                .flatten())
        })
        .check(|_, _, input| {
            let seconds = number(words(input, 0).and_then(|row| row.first()))?;
            Ok(CheckResult::new(State::Ok, format_uptime(seconds))
                .with_perfdata(format!("uptime={seconds:.0}")))
        })
}

/// `device fstype size used avail use% mountpoint`, sizes in kB.
fn df() -> CheckTypeDescriptor {
    const PSEUDO_FILESYSTEMS: &[&str] = &["tmpfs", "devtmpfs", "proc", "sysfs", "overlay"];

    CheckTypeDescriptor::new("df", "Filesystem %s")
        .group("filesystem")
        .discover(|_, input| {
            let services = input
                .primary
                .iter()
                .filter(|row| row.len() >= 7 && !PSEUDO_FILESYSTEMS.contains(&row[1].as_str()))
                .map(|row| Value::tuple([Value::str(row[6..].join(" ")), Value::str("{}")]))
                .collect();
            Ok(Some(services))
        })
        .check(|item, params, input| {
            let Some(row) = input
                .primary
                .iter()
                .find(|row| row.len() >= 7 && Some(row[6..].join(" ").as_str()) == item)
            else {
                return Ok(CheckResult::new(State::Unknown, "filesystem not found"));
            };
            let size = number(row.get(2))?;
            let used = number(row.get(3))?;
            let percent = if size > 0.0 { used / size * 100.0 } else { 0.0 };
            Ok(CheckResult::new(
                level_state(percent, levels(params)),
                format!(
                    "{percent:.1}% used ({:.2} of {:.2} GB)",
                    used / 1_048_576.0,
                    size / 1_048_576.0
                ),
            )
            .with_perfdata(format!("fs_used={used:.0}kB")))
        })
}

/// `Key: value kB` lines of `/proc/meminfo`.
fn mem() -> CheckTypeDescriptor {
    fn meminfo(input: &SectionInput, key: &str) -> Option<f64> {
        input
            .primary
            .iter()
            .find(|row| row.first().is_some_and(|k| k.trim_end_matches(':') == key))
            .and_then(|row| row.get(1))
            .and_then(|v| v.parse().ok())
    }

    CheckTypeDescriptor::new("mem", "Memory")
        .group("memory")
        .discover(|_, input| {
            let complete = meminfo(input, "MemTotal").is_some() && meminfo(input, "MemAvailable").is_some();
            Ok(complete.then(|| vec![Value::tuple([Value::None, Value::dict::<&str>([])])]))
        })
        .check(|_, params, input| {
            let (Some(total), Some(available)) = (meminfo(input, "MemTotal"), meminfo(input, "MemAvailable"))
            else {
                return Err(Error::Other("incomplete meminfo".into()));
            };
            let percent = if total > 0.0 { (total - available) / total * 100.0 } else { 0.0 };
            Ok(CheckResult::new(
                level_state(percent, levels(params)),
                format!("{percent:.1}% of RAM used"),
            )
            .with_perfdata(format!("mem_used={:.0}kB", total - available)))
        })
}

/// `load1 load5 load15 running/total last_pid [cpus]` in section `cpu`.
fn cpu_loads() -> CheckTypeDescriptor {
    CheckTypeDescriptor::new("cpu.loads", "CPU load")
        .group("cpu_load")
        .discover_legacy(|_, _, input| {
            Ok(words(input, 0)
                .is_some_and(|row| row.len() >= 3)
                .then(|| single_service("(5.0, 10.0)"))
                .flatten())
        })
        .check(|_, params, input| {
            let row = words(input, 0).ok_or_else(|| Error::Other("empty section".into()))?;
            let load15 = number(row.get(2))?;
            let cpus = row.get(5).and_then(|n| n.parse::<f64>().ok()).unwrap_or(1.0);
            let (warn, crit) = levels(params);
            Ok(CheckResult::new(
                level_state(load15, (warn * cpus, crit * cpus)),
                format!("15 min load {load15:.2}"),
            )
            .with_perfdata(format!("load15={load15:.2}")))
        })
}

/// `sysUpTime` in timeticks.
fn snmp_uptime() -> CheckTypeDescriptor {
    CheckTypeDescriptor::new("snmp_uptime", "Uptime")
        .snmp_scan(|scan| Ok(Value::Str(scan.oid_or(SYS_DESCR, "")?)))
        .discover(|_, _| Ok(single_service("{}")))
        .check(|_, _, input| {
            let ticks = number(words(input, 0).and_then(|row| row.first()))?;
            Ok(CheckResult::new(State::Ok, format_uptime(ticks / 100.0)))
        })
}

/// One row per processor with its load in percent.
fn hr_cpu() -> CheckTypeDescriptor {
    CheckTypeDescriptor::new("hr_cpu", "CPU utilization")
        .group("cpu_utilization")
        .snmp_scan(|scan| {
            let descr = scan.oid_or(SYS_DESCR, "")?.to_lowercase();
            Ok(Value::Bool(descr.contains("linux") || descr.contains("windows")))
        })
        .discover(|_, _| Ok(single_service("{}")))
        .check(|_, params, input| {
            let loads = input
                .primary
                .iter()
                .map(|row| number(row.first()))
                .collect::<Result<Vec<f64>>>()?;
            if loads.is_empty() {
                return Err(Error::Other("no processors".into()));
            }
            let util = loads.iter().sum::<f64>() / loads.len() as f64;
            Ok(CheckResult::new(
                level_state(util, levels(params)),
                format!("Total CPU: {util:.1}%"),
            )
            .with_perfdata(format!("util={util:.1}")))
        })
}

/// System group: description, contact, name, location. Every SNMP device has it.
fn snmp_info() -> CheckTypeDescriptor {
    CheckTypeDescriptor::new("snmp_info", "SNMP Info")
        .snmp_scan(|_| Ok(Value::Bool(true)))
        .handles_empty_data()
        .discover(|_, _| Ok(single_service("None")))
        .check(|_, _, input| {
            let fields: Vec<String> = input.primary.iter().map(|row| row.join(" ")).collect();
            Ok(CheckResult::new(State::Ok, fields.join(", ")))
        })
}
