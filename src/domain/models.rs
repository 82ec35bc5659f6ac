use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 128-bit identifier of the light's GATT service.
///
/// The light exposes a single characteristic under the same UUID, so this
/// value is used for both the service and the characteristic lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceIdentifier(Uuid);

impl ServiceIdentifier {
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ServiceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServiceIdentifier {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Advertised local name the light must carry to be connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Exact, case-sensitive comparison against an advertised name.
    pub fn matches(&self, advertised: Option<&str>) -> bool {
        advertised == Some(self.0.as_str())
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One RGBW color as sent to the light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorCommand {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub white: u8,
}

impl ColorCommand {
    pub const fn new(red: u8, green: u8, blue: u8, white: u8) -> Self {
        Self {
            red,
            green,
            blue,
            white,
        }
    }

    /// Parse an `RRGGBBWW` hex string, e.g. `"FF8D8B00"`.
    pub fn from_hex(hex: &str) -> anyhow::Result<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 8 {
            anyhow::bail!("Invalid color '{}': expected 8 hex digits (RRGGBBWW)", hex);
        }
        let value = u32::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid color '{}': {}", hex, e))?;
        let [red, green, blue, white] = value.to_be_bytes();
        Ok(Self::new(red, green, blue, white))
    }

    pub fn to_hex(&self) -> String {
        format!(
            "{:02X}{:02X}{:02X}{:02X}",
            self.red, self.green, self.blue, self.white
        )
    }
}

/// Connection phase reported to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Scanning,
    Connecting,
    DiscoveringServices,
    DiscoveringCharacteristics,
    Ready,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::DiscoveringServices => "discovering services",
            Self::DiscoveringCharacteristics => "discovering characteristics",
            Self::Ready => "ready",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionStatus(ConnectionStatus),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
