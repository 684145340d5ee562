// Configuration key command line tool
//
// Reads and writes configuration keys by name, the way `sigrok-cli --get`
// and `--config` do. Values are given as text and parsed according to the
// key's type, e.g. `samplerate=1M` or `amplitude=2.5`.

use clap::Parser;
use sigrok_wrapper::{Access, ConfigKey, Context, DemoBackend, DemoConfig, Driver};

#[derive(Parser)]
#[command(name = "config_keys")]
#[command(version = "1.0")]
#[command(about = "Get and set configuration keys of a device")]
#[command(long_about = "Resolve a driver specification such as 'demo:analog_channels=2', open its first device and read or write configuration keys by name, on the device or on one of its channel groups.")]
struct Args {
    /// Driver specification
    #[arg(short, long, default_value = "demo")]
    driver: String,

    /// Channel group to address instead of the device
    #[arg(short, long)]
    channel_group: Option<String>,

    /// Keys to read
    #[arg(short, long, help = "Key to read, may be repeated")]
    get: Vec<String>,

    /// Assignments to apply before reading
    #[arg(short, long, help = "key=value assignment, may be repeated")]
    set: Vec<String>,

    /// List every key identifier known to the library
    #[arg(long)]
    all_keys: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    if args.all_keys {
        for identifier in ConfigKey::identifiers() {
            if let Ok(key) = ConfigKey::from_identifier(identifier) {
                println!("{:<16} {:<9} {}", identifier, key.data_type(), key.description());
            }
        }
        return Ok(());
    }

    let context = Context::global_or_init(|| std::sync::Arc::new(DemoBackend::new(DemoConfig::default())));
    let mut driver = Driver::new(&context, &args.driver)?;
    let group = args.channel_group.as_deref();

    println!("Device: {}", driver);
    println!(
        "Keys on {}: {}",
        group.unwrap_or("device"),
        driver.device().config_keys(group)?.join(", ")
    );

    driver.with_device(|device| {
        for assignment in &args.set {
            let Some((key, value)) = assignment.split_once('=') else {
                eprintln!("Ignoring '{}': expected key=value", assignment);
                continue;
            };
            device.set_str(key, value, group)?;
            println!("✓ {} = {}", key, value);
        }

        for key in &args.get {
            match device.get(key, group)? {
                Access::Done(value) => println!("{} = {} [{}]", key, value, value.data_type()),
                Access::DeviceClosed => println!("{}: device closed", key),
            }
        }
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
