//! Android `KeyEvent` codes and key-press direction.

/// Subset of Android `KeyEvent` codes accepted by televisions.
///
/// The discriminants are the wire values; arbitrary codes can still be sent
/// through the raw `u32` send path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum KeyCode {
    Home = 3,
    Back = 4,
    Digit0 = 7,
    Digit1 = 8,
    Digit2 = 9,
    Digit3 = 10,
    Digit4 = 11,
    Digit5 = 12,
    Digit6 = 13,
    Digit7 = 14,
    Digit8 = 15,
    Digit9 = 16,
    DpadUp = 19,
    DpadDown = 20,
    DpadLeft = 21,
    DpadRight = 22,
    DpadCenter = 23,
    VolumeUp = 24,
    VolumeDown = 25,
    Power = 26,
    Enter = 66,
    Delete = 67,
    MediaPlayPause = 85,
    MediaStop = 86,
    MediaNext = 87,
    MediaPrevious = 88,
    MediaRewind = 89,
    MediaFastForward = 90,
    VolumeMute = 164,
    ChannelUp = 166,
    ChannelDown = 167,
    Guide = 172,
}

impl From<KeyCode> for u32 {
    fn from(code: KeyCode) -> u32 {
        code as u32
    }
}

/// Direction of a key-inject message.
///
/// `Short` models a full press-and-release in one message; `StartLong` and
/// `EndLong` bracket a held press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum Direction {
    StartLong = 1,
    EndLong = 2,
    #[default]
    Short = 3,
}

impl From<Direction> for u32 {
    fn from(direction: Direction) -> u32 {
        direction as u32
    }
}
