//! Identity of the bridged service, as the Nordic UART Service layout it
//! emulates.

use std::time::Duration;

/// Nordic UART Service.
pub const UART_SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// TX characteristic: notify, bridge -> peer.
pub const TX_CHARACTERISTIC_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// RX characteristic: write, peer -> bridge.
pub const RX_CHARACTERISTIC_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// Advertised device name.
pub const LOCAL_NAME: &str = "RPi-BLE-UART";

/// Largest frame pushed to the notify channel. Stays under typical
/// negotiated ATT payload limits.
pub const MAX_CHUNK: usize = 180;

/// Pump period (50Hz).
pub const DEFAULT_TICK: Duration = Duration::from_millis(20);
