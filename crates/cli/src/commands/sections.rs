//! `uavchat sections`: print the telemetry section catalog.

use uavchat_core::flight::SectionId;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Telemetry sections ({}):", SectionId::ALL.len());
    println!();
    for id in SectionId::ALL {
        println!("  {:<18} {}", id.as_str(), id.description());
    }
    Ok(())
}
