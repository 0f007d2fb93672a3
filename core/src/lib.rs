// Bluevery Core — BLE scan orchestration
//
// Repeated, time-boxed scan bursts against a BLE transport, a mandatory
// post-scan cooldown, and a small façade for characteristic reads/writes.
// The native radio stack and its event bridge stay outside this crate and are
// consumed through the `BlueveryCore` and `BlueveryListeners` traits.

pub mod bluevery;
pub mod error;
pub mod listeners;
pub mod options;
pub mod scan;
pub mod state;
pub mod transport;

pub use bluevery::{Bluevery, InitOutcome};
pub use error::{BlueveryError, CooldownError, TransportError};
pub use listeners::{BlueveryListeners, BroadcastListeners, ListenerHandle, PeripheralEvent};
pub use options::{BlueveryOptions, ScanOptions, ScanningSettings, DEFAULT_CONSIDERATION_MS};
pub use scan::{apply_omoiyari, Cooldown, CooldownStage, Omoiyari, ScanScheduler, TimerOmoiyari};
pub use state::{BlueveryState, DiscoveredPeripheral, SessionState, SessionStatePatch};
pub use transport::{BlueveryCore, CharacteristicAddress, WriteConfirmation};
