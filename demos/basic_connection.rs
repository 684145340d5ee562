// Basic driver lookup and device inspection example
//
// This example shows how to resolve a driver specification, open the device
// it finds and list its channels, channel groups and configuration keys.

use sigrok_wrapper::{Context, DemoBackend, Driver};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (optional)
    env_logger::init();

    println!("sigrok-wrapper Device Discovery Example");
    println!("=======================================\n");

    // One context per process
    let context = Context::new(DemoBackend::default());

    // Method 1: List all registered drivers
    println!("1. Registered drivers:");
    for name in context.driver_names() {
        println!("  - {}", name);
    }
    println!();

    // Method 2: Resolve a driver specification
    let spec = std::env::args().nth(1).unwrap_or_else(|| "demo".to_string());
    println!("2. Resolving '{}'...", spec);
    let mut driver = Driver::new(&context, &spec)?;
    println!("Found: {} ({})", driver, driver.long_name());

    // Method 3: Channels and channel groups
    println!("\n3. Device layout:");
    let device = driver.device();
    println!("  Channels: {}", device.channels().join(", "));
    println!("  Channel groups: {}", device.channel_groups().join(", "));

    // Method 4: Configuration keys per scope
    println!("\n4. Configuration keys:");
    println!("  device: {}", device.config_keys(None)?.join(", "));
    for group in device.channel_groups() {
        println!("  {}: {}", group, device.config_keys(Some(&group))?.join(", "));
    }

    // Method 5: Read the current values while the device is open
    println!("\n5. Current device values:");
    let device = driver.acquire()?;
    for key in device.config_keys(None)? {
        match device.get(&key, None) {
            Ok(value) => println!("  {} = {:?}", key, value.into_option()),
            Err(e) => println!("  {}: {}", key, e),
        }
    }
    drop(device);

    println!("\n6. Inspection completed, device closed again.");

    Ok(())
}
