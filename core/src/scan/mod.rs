/// Scan orchestration
///
/// - **omoiyari**: the two-stage post-scan cooldown
/// - **scheduler**: the burst loop that drives the transport and applies the cooldown

pub mod omoiyari;
pub mod scheduler;

pub use omoiyari::{apply_omoiyari, Cooldown, CooldownStage, Omoiyari, TimerOmoiyari};
pub use scheduler::ScanScheduler;
