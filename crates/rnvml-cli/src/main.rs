mod report;

use clap::{Parser, Subcommand};
use tracing::warn;

use rnvml::Nvml;
use rnvml_core::config::{default_config_path, NvmlConfig};

#[derive(Parser)]
#[command(name = "rnvml")]
#[command(about = "rnvml - inspect NVIDIA GPUs through a version-probing NVML loader")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to the system-wide rnvml.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show driver versions and every visible GPU
    Info,

    /// Show which NVML symbol each operation is bound to
    Bindings,

    /// Register for every supported event on every GPU and wait once
    Events {
        /// Wait timeout in milliseconds (defaults to events.default_timeout_ms)
        #[arg(short, long)]
        timeout: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    rnvml_common::init_logging();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = NvmlConfig::load_or_default(&config_path);
    let nvml = Nvml::from_config(&config);

    nvml.init_configured(&config.init)?;

    let result = match cli.command {
        Commands::Info => run_info(&nvml, cli.json),
        Commands::Bindings => run_bindings(&nvml, cli.json),
        Commands::Events { timeout } => {
            let timeout = timeout.unwrap_or(config.events.default_timeout_ms);
            run_events(&nvml, timeout, cli.json)
        }
    };

    if let Err(e) = nvml.shutdown() {
        warn!("NVML shutdown failed: {}", e);
    }
    result
}

fn run_info(nvml: &Nvml, json: bool) -> anyhow::Result<()> {
    let report = report::SystemReport::collect(nvml)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Driver version: {}", report.driver_version);
    println!("NVML version:   {}", report.nvml_version);
    if let Some(cuda) = report.cuda_driver_version {
        println!("CUDA driver:    {}.{}", cuda / 1000, (cuda % 1000) / 10);
    }
    println!();

    if report.devices.is_empty() {
        println!("No GPUs found.");
    }
    for device in &report.devices {
        println!("  GPU {}: {}", device.index, device.name);
        println!("    UUID:     {}", device.uuid);
        println!("    PCI:      {}", device.pci_bus_id);
        println!(
            "    Memory:   {} MB total, {} MB used",
            device.memory.total / (1024 * 1024),
            device.memory.used / (1024 * 1024)
        );
        println!("    Processes: {}", device.process_count);
        println!();
    }

    if report.excluded_devices > 0 {
        println!("{} GPU(s) excluded by the driver", report.excluded_devices);
    }
    Ok(())
}

fn run_bindings(nvml: &Nvml, json: bool) -> anyhow::Result<()> {
    let bindings = nvml.bindings();

    if json {
        println!("{}", serde_json::to_string_pretty(&bindings)?);
        return Ok(());
    }

    for binding in &bindings {
        let status = if binding.resolved { "bound" } else { "missing" };
        println!(
            "{:<40} {:<48} {:?}  {}",
            format!("{:?}", binding.operation),
            binding.symbol,
            binding.version,
            status
        );
    }
    Ok(())
}

fn run_events(nvml: &Nvml, timeout_ms: u32, json: bool) -> anyhow::Result<()> {
    let Some(set) = rnvml::event::subscribe_supported(nvml)? else {
        anyhow::bail!("no GPU supports event notification");
    };

    let outcome = nvml.event_set_wait(&set, timeout_ms);
    nvml.event_set_free(set)?;
    let event = report::EventReport::from(outcome?);

    if json {
        println!("{}", serde_json::to_string_pretty(&event)?);
    } else {
        match event.event {
            Some(ref e) => println!(
                "{} on device {} (data {})",
                e.event_type, e.device, e.event_data
            ),
            None => println!("No event within {} ms", timeout_ms),
        }
    }
    Ok(())
}

