//! Subcommand handlers. Each one takes a single snapshot and prints it.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;

use pci_sysfs::{
    CorrectableAerCounters, DeviceAerCounters, PciDevice, PciLocation, SysFs,
    UncorrectableAerCounters,
};

const THIN_SEP: &str = "------------------------------------------------------------";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn header(title: &str) {
    println!();
    println!("{}", format!("  {title}").bold());
    println!("{}", THIN_SEP);
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn devices(sysfs: &SysFs, json: bool) -> Result<()> {
    let devices = sysfs.pci_devices().context("Failed to scan PCI devices")?;
    if json {
        return print_json(&devices);
    }

    header("[PCI DEVICES]");
    for device in devices.values() {
        print_device(device);
    }
    println!("{}", THIN_SEP);
    println!("  {} devices", devices.len());
    Ok(())
}

fn print_device(device: &PciDevice) {
    println!(
        "  {}  class {:06x}  {:04x}:{:04x}  rev {:02x}",
        device.location.directory_name().cyan(),
        device.class,
        device.vendor,
        device.device,
        device.revision,
    );

    let mut details = Vec::new();
    if let Some(parent) = device.parent_location {
        details.push(format!("parent {}", parent.directory_name()));
    }
    if let Some(node) = device.numa_node {
        details.push(format!("numa {node}"));
    }
    if device.link.current_speed.is_some() || device.link.max_speed.is_some() {
        details.push(format!(
            "link {}/{} GT/s x{}/x{}",
            opt(device.link.current_speed),
            opt(device.link.max_speed),
            opt(device.link.current_width),
            opt(device.link.max_width),
        ));
    }
    if let Some(total) = device.sriov.totalvfs {
        details.push(format!("sriov {}/{} vfs", opt(device.sriov.numvfs), total));
    }
    if let Some(state) = &device.power.power_state {
        details.push(format!("power {state}"));
    }
    if !details.is_empty() {
        println!("      {}", details.join(", ").dimmed());
    }
}

pub fn aer(sysfs: &SysFs, location: &str, json: bool) -> Result<()> {
    let location = PciLocation::parse(location)?;
    let counters = sysfs
        .pci_device_aer(&location)
        .with_context(|| format!("Failed to read AER counters of {}", location.directory_name()))?;

    if json {
        return print_json(&counters);
    }

    header(&format!("[AER] {}", location.directory_name()));
    match counters {
        Some(counters) => print_device_aer(&counters),
        None => println!("  AER not supported"),
    }
    Ok(())
}

fn print_device_aer(counters: &DeviceAerCounters) {
    print_correctable(&counters.correctable);
    print_uncorrectable("Fatal", &counters.fatal);
    print_uncorrectable("NonFatal", &counters.non_fatal);

    let totals = [
        ("TotalErrCor", counters.root_port_total_err_cor),
        ("TotalErrFatal", counters.root_port_total_err_fatal),
        ("TotalErrNonFatal", counters.root_port_total_err_nonfatal),
    ];
    if totals.iter().any(|(_, v)| v.is_some()) {
        println!("  {}", "Root port".bold());
        for (name, value) in totals {
            println!("    {:<18} {}", name, opt(value));
        }
    }
}

fn print_correctable(counters: &CorrectableAerCounters) {
    println!("  {}", "Correctable".bold());
    print_nonzero(&[
        ("RxErr", counters.rx_err),
        ("BadTLP", counters.bad_tlp),
        ("BadDLLP", counters.bad_dllp),
        ("Rollover", counters.rollover),
        ("Timeout", counters.timeout),
        ("NonFatalErr", counters.non_fatal_err),
        ("CorrIntErr", counters.corr_int_err),
        ("HeaderOF", counters.header_of),
    ]);
}

fn print_uncorrectable(title: &str, counters: &UncorrectableAerCounters) {
    println!("  {}", title.bold());
    print_nonzero(&[
        ("Undefined", counters.undefined),
        ("DLP", counters.dlp),
        ("SDES", counters.sdes),
        ("TLP", counters.tlp),
        ("FCP", counters.fcp),
        ("CmpltTO", counters.cmplt_to),
        ("CmpltAbrt", counters.cmplt_abrt),
        ("UnxCmplt", counters.unx_cmplt),
        ("RxOF", counters.rx_of),
        ("MalfTLP", counters.malf_tlp),
        ("ECRC", counters.ecrc),
        ("UnsupReq", counters.unsup_req),
        ("ACSViol", counters.acs_viol),
        ("UncorrIntErr", counters.uncorr_int_err),
        ("BlockedTLP", counters.blocked_tlp),
        ("AtomicOpBlocked", counters.atomic_op_blocked),
        ("TLPBlockedErr", counters.tlp_blocked_err),
        ("PoisonTLPBlocked", counters.poison_tlp_blocked),
    ]);
}

/// Zero counters are the common case; only list the ones that moved.
fn print_nonzero(values: &[(&str, u64)]) {
    let mut any = false;
    for (name, value) in values.iter().filter(|(_, v)| *v != 0) {
        println!("    {:<18} {}", name, value.yellow());
        any = true;
    }
    if !any {
        println!("    {}", "no errors".green());
    }
}

pub fn rootports(sysfs: &SysFs, json: bool) -> Result<()> {
    let all = sysfs
        .root_port_aer_counters()
        .context("Failed to read root port AER counters")?;
    if json {
        return print_json(&all);
    }

    header("[ROOT PORTS]");
    println!(
        "  {:<14} {:>12} {:>12} {:>12}",
        "device", "correctable", "fatal", "nonfatal"
    );
    for (name, counters) in &all {
        println!(
            "  {:<14} {:>12} {:>12} {:>12}",
            name.cyan(),
            counters.total_err_cor,
            counters.total_err_fatal,
            counters.total_err_nonfatal
        );
    }
    Ok(())
}

pub fn net_aer(sysfs: &SysFs, iface: Option<&str>, json: bool) -> Result<()> {
    match iface {
        Some(name) => {
            let counters = sysfs
                .aer_counters_by_iface(name)
                .with_context(|| format!("Failed to read AER counters of {name}"))?;
            if json {
                return print_json(&counters);
            }
            header(&format!("[AER] {name}"));
            match counters {
                Some(c) => print_device_aer(&c.counters),
                None => println!("  AER not supported"),
            }
        }
        None => {
            let all = sysfs
                .aer_counters()
                .context("Failed to read interface AER counters")?;
            if json {
                return print_json(&all);
            }
            for (name, c) in &all {
                header(&format!("[AER] {name}"));
                print_device_aer(&c.counters);
            }
            if all.is_empty() {
                println!("  No interfaces with AER support");
            }
        }
    }
    Ok(())
}
