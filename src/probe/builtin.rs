//! Built-in host probes.
//!
//! Each probe flattens one area of host state into string pairs. The procfs
//! backed ones fail with [`ProbeError::Io`] on hosts without `/proc`.

use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::future;

use crate::probe::netif::{interface_addrs, InterfaceAddrs};
use crate::probe::procfs::{parse_colon_pairs, parse_env_pairs, parse_kib, ProcFs};
use crate::probe::{ProbeContext, ProbeError, ProbeRegistry, ProbeResult};

/// Names of every probe registered by [`register_builtin`].
pub const BUILTIN_PROBES: &[&str] = &[
    "cpu-info",
    "env",
    "host-info",
    "load-avg",
    "memory-info",
    "network-info",
    "request-info",
    "status",
];

/// Register the built-in probes, reading host state from `fs`.
pub fn register_builtin(registry: &ProbeRegistry, fs: ProcFs) {
    registry.register("status", |_ctx| future::ready(status()));
    registry.register("env", |_ctx| future::ready(env()));
    registry.register("request-info", |ctx: ProbeContext| future::ready(request_info(&ctx)));

    let host_fs = fs.clone();
    registry.register("host-info", move |_ctx| future::ready(host_info(&host_fs)));
    let cpu_fs = fs.clone();
    registry.register("cpu-info", move |_ctx| future::ready(cpu_info(&cpu_fs)));
    let mem_fs = fs.clone();
    registry.register("memory-info", move |_ctx| future::ready(memory_info(&mem_fs)));
    let load_fs = fs.clone();
    registry.register("load-avg", move |_ctx| future::ready(load_avg(&load_fs)));
    registry.register("network-info", move |_ctx| {
        future::ready(
            interface_addrs()
                .map_err(ProbeError::from)
                .and_then(|addrs| network_info(&fs, &addrs)),
        )
    });

    tracing::info!(probes = BUILTIN_PROBES.len(), "Built-in probes registered");
}

pub fn status() -> Result<ProbeResult, ProbeError> {
    Ok(ProbeResult::new("status").with("status", "ok"))
}

pub fn env() -> Result<ProbeResult, ProbeError> {
    let mut result = ProbeResult::new("env");
    for (key, value) in std::env::vars_os() {
        result.insert(key.to_string_lossy(), value.to_string_lossy());
    }
    Ok(result)
}

/// Remote address and headers of the request being served.
pub fn request_info(ctx: &ProbeContext) -> Result<ProbeResult, ProbeError> {
    let mut result = ProbeResult::new("request-info");
    if let Some(meta) = ctx.metadata() {
        result.insert("RemoteAddr", &meta.remote_addr);
        for (name, values) in &meta.headers {
            let value = match values.as_slice() {
                [single] => single.clone(),
                many => format!("[{}]", many.join(" ")),
            };
            result.insert(format!("Header{name}"), value);
        }
    }
    Ok(result)
}

pub fn host_info(fs: &ProcFs) -> Result<ProbeResult, ProbeError> {
    let mut result = ProbeResult::new("host-info");
    result.insert("Hostname", fs.read_value("proc/sys/kernel/hostname")?);
    result.insert("OS", std::env::consts::OS);
    result.insert("KernelArch", std::env::consts::ARCH);
    result.insert("KernelVersion", fs.read_value("proc/sys/kernel/osrelease")?);

    // Minimal containers ship without os-release.
    if let Ok(text) = fs.read("etc/os-release") {
        let release = parse_env_pairs(&text);
        for (key, field) in [("ID", "Platform"), ("VERSION_ID", "PlatformVersion"), ("PRETTY_NAME", "PlatformName")] {
            if let Some(value) = release.get(key) {
                result.insert(field, value);
            }
        }
    }

    let uptime = fs.read_value("proc/uptime")?;
    let uptime_secs = uptime
        .split_whitespace()
        .next()
        .and_then(|secs| secs.parse::<f64>().ok())
        .ok_or_else(|| ProbeError::failed(format!("malformed /proc/uptime: {uptime}")))? as u64;
    result.insert("Uptime", uptime_secs);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    result.insert("BootTime", now.saturating_sub(uptime_secs));
    result.insert("Procs", fs.process_count()?);

    Ok(result)
}

pub fn cpu_info(fs: &ProcFs) -> Result<ProbeResult, ProbeError> {
    let text = fs.read("proc/cpuinfo")?;
    let blocks: Vec<_> = text
        .split("\n\n")
        .map(parse_colon_pairs)
        .filter(|block| block.contains_key("processor"))
        .collect();

    let mut result = ProbeResult::new("cpu-info");
    result.insert("CPUs", blocks.len());

    if let Some(first) = blocks.first() {
        for (key, field) in [
            ("vendor_id", "VendorID"),
            ("cpu family", "Family"),
            ("model", "Model"),
            ("model name", "ModelName"),
            ("stepping", "Stepping"),
            ("cpu MHz", "Mhz"),
            ("cache size", "CacheSize"),
            ("cpu cores", "Cores"),
            ("microcode", "Microcode"),
            ("flags", "Flags"),
        ] {
            if let Some(value) = first.get(key) {
                result.insert(field, value);
            }
        }
        if let Some(model) = first.get("model name") {
            result.summary = format!("{} x {}", blocks.len(), model);
        }
    }

    Ok(result)
}

pub fn memory_info(fs: &ProcFs) -> Result<ProbeResult, ProbeError> {
    let info = parse_colon_pairs(&fs.read("proc/meminfo")?);
    let field = |key: &str| info.get(key).and_then(|v| parse_kib(v));

    let total = field("MemTotal").ok_or_else(|| ProbeError::failed("MemTotal missing from /proc/meminfo"))?;
    let free = field("MemFree").unwrap_or_default();
    let buffers = field("Buffers").unwrap_or_default();
    let cached = field("Cached").unwrap_or_default();
    let available = field("MemAvailable").unwrap_or(free + buffers + cached);
    let used = total.saturating_sub(free + buffers + cached);
    let used_percent = if total == 0 { 0.0 } else { used as f64 / total as f64 * 100.0 };

    let mut result = ProbeResult::new("memory-info")
        .with_summary(format!("Total: {total}, Free:{free}, UsedPercent:{used_percent:.6}%"))
        .with("Total", total)
        .with("Available", available)
        .with("Used", used)
        .with("UsedPercent", format!("{used_percent:.6}"))
        .with("Free", free)
        .with("Buffers", buffers)
        .with("Cached", cached);

    for (key, name) in [("SwapTotal", "SwapTotal"), ("SwapFree", "SwapFree"), ("Shmem", "Shared"), ("Dirty", "Dirty")] {
        if let Some(value) = field(key) {
            result.insert(name, value);
        }
    }

    Ok(result)
}

pub fn load_avg(fs: &ProcFs) -> Result<ProbeResult, ProbeError> {
    let line = fs.read_value("proc/loadavg")?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [load1, load5, load15, ..] = fields.as_slice() else {
        return Err(ProbeError::failed(format!("malformed /proc/loadavg: {line}")));
    };

    Ok(ProbeResult::new("load-avg")
        .with("Load1", load1)
        .with("Load5", load5)
        .with("Load15", load15))
}

/// Link attributes from `/sys/class/net` joined with each interface's addresses.
pub fn network_info(fs: &ProcFs, addrs: &InterfaceAddrs) -> Result<ProbeResult, ProbeError> {
    let mut result = ProbeResult::new("network-info");
    for iface in fs.list("sys/class/net")? {
        let attr = |name: &str| fs.read_value(&format!("sys/class/net/{iface}/{name}")).unwrap_or_default();
        let iface_addrs = addrs.get(&iface).map(|a| a.join(" ")).unwrap_or_default();
        let value = format!(
            "Index:{} Flags:{} HardwareAddr:{} MTU:{} OperState:{} Addrs:[{}]",
            attr("ifindex"),
            attr("flags"),
            attr("address"),
            attr("mtu"),
            attr("operstate"),
            iface_addrs,
        );
        result.insert(iface, value);
    }
    Ok(result)
}
